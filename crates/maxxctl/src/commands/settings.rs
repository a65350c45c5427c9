//! Settings command handlers.

use serde::Serialize;
use tabled::Tabled;

use maxxctl_core::{Console, CoreError};

use crate::cli::{GlobalOpts, OutputFormat, SettingsArgs, SettingsCommand};
use crate::error::CliError;
use crate::output;

use super::{loaded, unexpected, util};

#[derive(Serialize, Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn not_found(key: &str) -> impl FnOnce(CoreError) -> CliError + '_ {
    move |err| match err {
        CoreError::NotFound { .. } => CliError::NotFound {
            resource_type: "setting".into(),
            identifier: key.into(),
            list_command: "settings list".into(),
        },
        other => other.into(),
    }
}

pub async fn handle(
    console: &Console,
    args: SettingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SettingsCommand::List => {
            let observer = console.settings().await?;
            let data = loaded(&observer)?;
            let settings = data.as_settings().ok_or_else(|| unexpected("settings"))?;

            // Structured formats keep the server's map shape.
            let out = match global.output {
                OutputFormat::Table => {
                    let rows: Vec<SettingRow> = settings
                        .iter()
                        .map(|(key, value)| SettingRow {
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .collect();
                    output::render_table(&rows)
                }
                OutputFormat::Plain => settings
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                format => {
                    output::render_single(format, settings, |_| String::new(), |_| String::new())?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Get { key } => {
            let observer = console.setting(&key).await.map_err(not_found(&key))?;
            let data = loaded(&observer)?;
            let value = data.as_setting().ok_or_else(|| unexpected("setting"))?;
            let row = SettingRow {
                key: key.clone(),
                value: value.to_owned(),
            };
            let out = output::render_single(
                global.output,
                &row,
                |r| r.value.clone(),
                |r| r.value.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Set { key, value } => {
            console.update_setting(&key, &value).await?;
            if !global.quiet {
                eprintln!("Set {key}");
            }
            Ok(())
        }

        SettingsCommand::Delete { key } => {
            if !util::confirm(
                "settings delete",
                &format!("Delete setting '{key}'?"),
                global.yes,
            )? {
                return Ok(());
            }
            console
                .delete_setting(&key)
                .await
                .map_err(not_found(&key))?;
            if !global.quiet {
                eprintln!("Deleted {key}");
            }
            Ok(())
        }
    }
}
