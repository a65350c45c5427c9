//! CLI configuration: thin wrapper around `maxxctl_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use maxxctl_core::{ConsoleConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use maxxctl_config::{
    Config, Profile, config_path, load_config_or_default, parse_server_url,
    profile_to_console_config, save_config, store_token,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `ConsoleConfig` for this invocation.
///
/// Profile values first, then flags. Without a matching profile, `--server`
/// alone is enough; an explicitly named profile that does not exist is an
/// error.
pub fn build_console_config(global: &GlobalOpts, cfg: &Config) -> Result<ConsoleConfig, CliError> {
    let name = active_profile_name(global, cfg);

    let mut console = if let Some(profile) = cfg.profiles.get(&name) {
        profile_to_console_config(profile, &name, &cfg.defaults)?
    } else if global.profile.is_some() && global.server.is_none() {
        return Err(CliError::ProfileNotFound {
            name,
            available: available_profiles(cfg),
        });
    } else {
        let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let mut console = ConsoleConfig::new(parse_server_url(server)?);
        console.timeout = Duration::from_secs(cfg.defaults.timeout);
        console.flush_interval = Duration::from_millis(cfg.defaults.flush_interval_ms.max(1));
        if cfg.defaults.insecure {
            console.tls = TlsVerification::DangerAcceptInvalid;
        }
        console
    };

    apply_overrides(&mut console, global)?;
    Ok(console)
}

/// Apply CLI flag overrides on top of a profile-derived config.
fn apply_overrides(console: &mut ConsoleConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref server) = global.server {
        console.url = parse_server_url(server)?;
    }
    if let Some(ref token) = global.token {
        console.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        console.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        console.timeout = Duration::from_secs(secs);
    }
    Ok(())
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
