//! Dashboard handler: server-computed aggregates, shown as-is.

use maxxctl_core::Console;

use crate::cli::{DashboardArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{loaded, unexpected};

/// Top-level fields as `key  value` lines; nested values stay compact JSON.
fn overview(value: &serde_json::Value) -> String {
    let Some(object) = value.as_object() else {
        return value.to_string();
    };
    let width = object.keys().map(String::len).max().unwrap_or(0);
    object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key:width$}  {rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    console: &Console,
    args: DashboardArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let observer = if args.providers {
        console.provider_stats().await?
    } else {
        console.dashboard().await?
    };
    let data = loaded(&observer)?;
    let value = data.as_json().ok_or_else(|| unexpected("dashboard"))?;

    let out = output::render_single(global.output, value, overview, serde_json::Value::to_string)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
