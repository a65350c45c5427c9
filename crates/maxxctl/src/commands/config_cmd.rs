//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Copy of `cfg` with plaintext tokens hidden.
fn masked(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

fn describe(cfg: &Config) -> String {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    let mut lines = vec![
        format!("Config file:  {}", config::config_path().display()),
        format!("Default:      {default}"),
        format!("Output:       {}", cfg.defaults.output),
        format!("Timeout:      {}s", cfg.defaults.timeout),
        format!("Flush:        {}ms", cfg.defaults.flush_interval_ms),
    ];
    if cfg.profiles.is_empty() {
        lines.push("\nNo profiles configured. Run: maxxctl config init".into());
    }
    for (name, p) in &cfg.profiles {
        let marker = if name == default { " *" } else { "" };
        let token = match (&p.token, &p.token_env) {
            (_, Some(env)) => format!("${env}"),
            (Some(_), None) => "plaintext".into(),
            (None, None) => "keyring / none".into(),
        };
        lines.push(format!("\n[{name}]{marker}"));
        lines.push(format!("  server:   {}", p.server));
        lines.push(format!("  token:    {token}"));
        if let Some(insecure) = p.insecure {
            lines.push(format!("  insecure: {insecure}"));
        }
        if let Some(ref ca) = p.ca_cert {
            lines.push(format!("  ca_cert:  {}", ca.display()));
        }
        if let Some(timeout) = p.timeout {
            lines.push(format!("  timeout:  {timeout}s"));
        }
    }
    lines.join("\n")
}

fn read_token(from_env: Option<&str>) -> Result<String, CliError> {
    let token = match from_env {
        Some(var) => std::env::var(var).map_err(|_| CliError::Validation {
            field: "from-env".into(),
            reason: format!("environment variable {var} is not set"),
        })?,
        None => rpassword::prompt_password("Admin token: ").map_err(prompt_err)?,
    };
    let token = token.trim().to_owned();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = masked(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, describe, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { from_env } => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }
            let token = read_token(from_env.as_deref())?;
            config::store_token(&name, &token)?;
            if !global.quiet {
                eprintln!("✓ Token stored in system keyring for profile '{name}'");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: adds or replaces one profile, keeping the others.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("maxxctl configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Server URL")
        .default("http://localhost:9880".into())
        .validate_with(|s: &String| config::parse_server_url(s).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()
        .map_err(prompt_err)?;

    let auth_choices = &[
        "Admin token, stored in system keyring (recommended)",
        "Admin token, saved to config file (plaintext)",
        "Admin token from an environment variable",
        "No authentication",
    ];
    let auth = Select::new()
        .with_prompt("Authentication")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        server,
        ..Profile::default()
    };
    match auth {
        0 => {
            let token = read_token(None)?;
            config::store_token(&profile_name, &token)?;
            eprintln!("   ✓ Token stored in system keyring");
        }
        1 => profile.token = Some(read_token(None)?),
        2 => {
            let var: String = Input::new()
                .with_prompt("Environment variable")
                .default("MAXX_ADMIN_TOKEN".into())
                .interact_text()
                .map_err(prompt_err)?;
            profile.token_env = Some(var);
        }
        _ => {}
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }
    let path = config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: maxxctl --profile {profile_name} dashboard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "local".into(),
            Profile {
                server: "http://localhost:9880".into(),
                token: Some("s3cret".into()),
                ..Profile::default()
            },
        );
        let shown = masked(&cfg);
        assert_eq!(shown.profiles["local"].token.as_deref(), Some(MASK));
        assert!(!describe(&shown).contains("s3cret"));
    }
}
