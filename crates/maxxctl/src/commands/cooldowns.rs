//! Cooldown command handlers.

use chrono::Utc;
use tabled::Tabled;

use maxxctl_core::{Console, CooldownView};

use crate::cli::{CooldownsArgs, CooldownsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CooldownRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Until")]
    until: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
}

impl CooldownRow {
    fn new(v: &CooldownView, color: bool) -> Self {
        let provider = match v.provider_name {
            Some(ref name) => format!("{} ({name})", v.provider_id),
            None => v.provider_id.to_string(),
        };
        let remaining = if v.remaining_seconds == 0 {
            v.remaining.clone()
        } else {
            output::warn_label(&v.remaining, color)
        };
        Self {
            provider,
            client: scope(&v.client_type).to_owned(),
            reason: v.reason.to_string(),
            until: v.until.map(|t| t.to_rfc3339()).unwrap_or_default(),
            remaining,
        }
    }
}

fn scope(client_type: &str) -> &str {
    if client_type.is_empty() { "all" } else { client_type }
}

fn applies_to(view: &CooldownView, client_type: Option<&str>) -> bool {
    client_type.is_none_or(|ct| {
        view.client_type.is_empty() || view.client_type == "all" || view.client_type == ct
    })
}

fn detail(v: &CooldownView) -> String {
    [
        format!("Provider:  {}", v.provider_id),
        format!("Name:      {}", v.provider_name.as_deref().unwrap_or("-")),
        format!("Client:    {}", scope(&v.client_type)),
        format!("Reason:    {}", v.reason),
        format!(
            "Until:     {}",
            v.until.map_or_else(|| "-".into(), |t| t.to_rfc3339())
        ),
        format!("Remaining: {}", v.remaining),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    args: CooldownsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        CooldownsCommand::List { client_type, all } => {
            console.cooldowns().await?;
            let now = Utc::now();
            let views = if all {
                console
                    .cooldown()
                    .list()
                    .unwrap_or_default()
                    .iter()
                    .map(|cd| CooldownView::new(cd, now))
                    .collect()
            } else {
                console.cooldown().active(now)?
            };
            let views: Vec<CooldownView> = views
                .into_iter()
                .filter(|v| applies_to(v, client_type.as_deref()))
                .collect();

            let out = output::render_list(
                global.output,
                &views,
                |v| CooldownRow::new(v, color),
                |v| v.provider_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CooldownsCommand::Get {
            provider,
            client_type,
        } => {
            console.cooldowns().await?;
            let view = console.cooldown().cooldown_for_provider(
                provider,
                client_type.as_deref(),
                Utc::now(),
            )?;
            let out = output::render_single(
                global.output,
                &view,
                |v| {
                    v.as_ref().map_or_else(
                        || format!("Provider {provider} is not cooling down"),
                        detail,
                    )
                },
                |v| v.as_ref().map(|v| v.remaining.clone()).unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CooldownsCommand::Clear { provider } => {
            if !util::confirm(
                "cooldowns clear",
                &format!("Clear the cooldown of provider {provider}?"),
                global.yes,
            )? {
                return Ok(());
            }
            console.clear_cooldown(provider).await?;
            if !global.quiet {
                eprintln!("Cooldown cleared for provider {provider}");
            }
            Ok(())
        }

        CooldownsCommand::Set {
            provider,
            duration,
            until,
            client_type,
        } => {
            let now = Utc::now();
            let until = util::resolve_until(duration.as_deref(), until.as_deref(), now)?;
            console
                .set_cooldown(provider, until, client_type.as_deref())
                .await?;
            if !global.quiet {
                let remaining = u64::try_from((until - now).num_seconds()).ok();
                eprintln!(
                    "Provider {provider} cooling down for {} ({}) until {}",
                    scope(client_type.as_deref().unwrap_or_default()),
                    maxxctl_core::cooldown::format_remaining(remaining),
                    until.to_rfc3339()
                );
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maxxctl_core::{Cooldown, CooldownReason};

    fn view(client_type: &str) -> CooldownView {
        let cd = Cooldown {
            provider_id: 1,
            provider_name: None,
            client_type: client_type.into(),
            until: Some(Utc::now() + chrono::Duration::seconds(90)),
            reason: CooldownReason::RateLimitExceeded,
        };
        CooldownView::new(&cd, Utc::now())
    }

    #[test]
    fn wildcards_apply_to_every_client_filter() {
        assert!(applies_to(&view(""), Some("codex")));
        assert!(applies_to(&view("all"), Some("codex")));
        assert!(applies_to(&view("codex"), Some("codex")));
        assert!(!applies_to(&view("claude"), Some("codex")));
        assert!(applies_to(&view("claude"), None));
    }

    #[test]
    fn row_names_wildcard_scope() {
        let row = CooldownRow::new(&view(""), false);
        assert_eq!(row.client, "all");
        assert_eq!(row.reason, "rate_limit_exceeded");
        assert!(row.remaining.starts_with("01m"), "{}", row.remaining);
    }
}
