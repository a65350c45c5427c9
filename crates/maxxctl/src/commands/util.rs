//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Utc};

use maxxctl_core::{RequestFilter, RequestStatus};

use crate::cli::{FilterArgs, StatusArg};
use crate::error::CliError;

impl From<StatusArg> for RequestStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => RequestStatus::Pending,
            StatusArg::InProgress => RequestStatus::InProgress,
            StatusArg::Completed => RequestStatus::Completed,
            StatusArg::Failed => RequestStatus::Failed,
            StatusArg::Cancelled => RequestStatus::Cancelled,
        }
    }
}

impl From<FilterArgs> for RequestFilter {
    fn from(args: FilterArgs) -> Self {
        RequestFilter {
            provider_id: args.provider,
            status: args.status.map(RequestStatus::from),
        }
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Parse a human duration flag such as `90s`, `15m` or `1h 30m`.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, CliError> {
    let duration = humantime::parse_duration(value).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("'{value}': {e}"),
    })?;
    if duration.is_zero() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(duration)
}

/// Resolve `--for` / `--until` into an absolute end time after `now`.
pub fn resolve_until(
    duration: Option<&str>,
    until: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, CliError> {
    let until = match (duration, until) {
        (Some(d), _) => {
            let d = parse_duration("for", d)?;
            let d = chrono::Duration::from_std(d).map_err(|e| CliError::Validation {
                field: "for".into(),
                reason: e.to_string(),
            })?;
            now + d
        }
        (None, Some(ts)) => DateTime::parse_from_rfc3339(ts)
            .map_err(|e| CliError::Validation {
                field: "until".into(),
                reason: format!("'{ts}' is not an RFC 3339 timestamp: {e}"),
            })?
            .with_timezone(&Utc),
        (None, None) => {
            return Err(CliError::Validation {
                field: "for".into(),
                reason: "either --for or --until is required".into(),
            });
        }
    };
    if until <= now {
        return Err(CliError::Validation {
            field: "until".into(),
            reason: format!("{} is not in the future", until.to_rfc3339()),
        });
    }
    Ok(until)
}
