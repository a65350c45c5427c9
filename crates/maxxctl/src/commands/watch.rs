//! `watch`: a live request table fed by the reconciled cache.
//!
//! Holds an observer on the newest request page for the whole session.
//! The reconciler merges pushed updates into that page; every change to
//! the entry redraws one frame.

use std::io::IsTerminal;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use maxxctl_core::{
    ConnectionState, Console, ConsoleConfig, InFlightSummary, PaginationParams, ProxyRequest,
    QueryState, RequestFilter,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::requests::RequestRow;
use super::util;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub async fn handle(
    config: ConsoleConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let stop_after = args
        .duration
        .as_deref()
        .map(|d| util::parse_duration("for", d))
        .transpose()?;

    let mut config = config;
    config.websocket_enabled = true;
    let console = Console::new(config)?;
    console.connect().await?;

    let result = follow(&console, &args, global, stop_after).await;
    console.disconnect().await;
    result
}

async fn follow(
    console: &Console,
    args: &WatchArgs,
    global: &GlobalOpts,
    stop_after: Option<Duration>,
) -> Result<(), CliError> {
    let filter = RequestFilter::from(args.filter);
    let params = PaginationParams {
        limit: Some(args.limit),
        before: None,
        provider_id: filter.provider_id,
        status: filter.status,
    };
    let mut page = console.requests(params).await?;
    let mut connection = console.connection_state();
    let in_flight = console.in_flight().await;

    let frame = Frame {
        format: global.output,
        color: output::should_color(global.color),
        redraw: global.output == OutputFormat::Table && std::io::stdout().is_terminal(),
        quiet: global.quiet,
    };

    let deadline = async {
        match stop_after {
            Some(after) => tokio::time::sleep_until(Instant::now() + after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    frame.draw(&page.state(), *connection.borrow(), in_flight.as_ref())?;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            () = &mut deadline => break,
            changed = page.changed() => {
                let Some(state) = changed else { break };
                frame.draw(&state, *connection.borrow(), in_flight.as_ref())?;
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                debug!(?state, "connection state changed");
                frame.draw(&page.state(), state, in_flight.as_ref())?;
            }
        }
    }
    Ok(())
}

struct Frame {
    format: OutputFormat,
    color: bool,
    redraw: bool,
    quiet: bool,
}

impl Frame {
    fn draw(
        &self,
        state: &QueryState,
        connection: ConnectionState,
        in_flight: Option<&tokio::sync::watch::Receiver<InFlightSummary>>,
    ) -> Result<(), CliError> {
        if self.quiet {
            return Ok(());
        }
        let items: Vec<ProxyRequest> = state
            .data
            .as_deref()
            .and_then(|d| d.as_page())
            .map(|p| p.items.clone())
            .unwrap_or_default();

        // Structured formats stream one document per frame.
        let format = match self.format {
            OutputFormat::Json => OutputFormat::JsonCompact,
            other => other,
        };
        let body = output::render_list(
            format,
            &items,
            |r| RequestRow::new(r, self.color),
            |r| r.id.to_string(),
        )?;

        if self.format != OutputFormat::Table {
            output::print_output(&body, false);
            return Ok(());
        }

        let in_flight = in_flight.map(|rx| rx.borrow().clone()).unwrap_or_default();
        let mut header = format!(
            "{}  |  {} in flight",
            connection_label(connection),
            in_flight.total
        );
        if let Some(ref err) = state.error {
            header.push_str("  |  ");
            header.push_str(&output::warn_label(err, self.color));
        }
        if self.redraw {
            print!("{CLEAR_SCREEN}");
        }
        output::print_output(&format!("{header}\n{body}"), false);
        Ok(())
    }
}

fn connection_label(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Connected => "live".into(),
        ConnectionState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionState::Disconnected => "disconnected".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_labels() {
        assert_eq!(connection_label(ConnectionState::Connected), "live");
        assert_eq!(
            connection_label(ConnectionState::Reconnecting { attempt: 3 }),
            "reconnecting (attempt 3)"
        );
    }
}
