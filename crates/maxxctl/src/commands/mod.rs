//! Command dispatch: bridges CLI args -> console reads/mutations -> output.

pub mod config_cmd;
pub mod cooldowns;
pub mod dashboard;
pub mod requests;
pub mod settings;
pub mod util;
pub mod watch;

use std::sync::Arc;

use maxxctl_core::{Console, ConsoleConfig, QueryData, QueryObserver};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command.
///
/// `watch` keeps a live session with the push stream; everything else runs
/// inside a one-shot console.
pub async fn dispatch(
    cmd: Command,
    config: ConsoleConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return watch::handle(config, args, global).await;
    }

    Console::oneshot(config, |console| async move {
        Ok(run_oneshot(cmd, &console, global).await)
    })
    .await?
}

async fn run_oneshot(cmd: Command, console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Requests(args) => requests::handle(console, args, global).await,
        Command::Cooldowns(args) => cooldowns::handle(console, args, global).await,
        Command::Settings(args) => settings::handle(console, args, global).await,
        Command::Dashboard(args) => dashboard::handle(console, args, global).await,
        // Config and Completions are handled before dispatch, Watch above.
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Data of an observer whose read just succeeded.
pub(crate) fn loaded(observer: &QueryObserver) -> Result<Arc<QueryData>, CliError> {
    observer
        .data()
        .ok_or_else(|| CliError::Internal(format!("no data for {:?}", observer.key())))
}

/// Error for a cached payload of the wrong shape.
pub(crate) fn unexpected(what: &str) -> CliError {
    CliError::Internal(format!("unexpected payload for {what}"))
}
