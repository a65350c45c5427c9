// ── Cooldown activity and remaining time ──
//
// Everything here takes `now` explicitly. Activity is never stored; it is
// recomputed from `until` on every read.

use chrono::{DateTime, Utc};
use maxxctl_api::Cooldown;

/// Whether `cd` is active for `provider_id` at `now`.
///
/// A wildcard cooldown applies to every client type. A scoped cooldown
/// applies only when `client_type` names it.
pub fn matches(
    cd: &Cooldown,
    provider_id: u64,
    client_type: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if cd.provider_id != provider_id {
        return false;
    }
    let scope_matches = cd.is_wildcard() || client_type.is_some_and(|ct| ct == cd.client_type);
    scope_matches && cd.until.is_some_and(|until| until > now)
}

/// First active cooldown in list order.
pub fn find_active<'a>(
    cooldowns: &'a [Cooldown],
    provider_id: u64,
    client_type: Option<&str>,
    now: DateTime<Utc>,
) -> Option<&'a Cooldown> {
    cooldowns
        .iter()
        .find(|cd| matches(cd, provider_id, client_type, now))
}

/// Whole seconds until `cd` expires, floored at zero.
pub fn remaining_seconds(cd: &Cooldown, now: DateTime<Utc>) -> u64 {
    cd.until
        .map(|until| until.signed_duration_since(now).num_seconds())
        .and_then(|secs| u64::try_from(secs).ok())
        .unwrap_or(0)
}

/// Render a remaining duration as `HHh MMm SSs`, `MMm SSs` or `SSs`.
///
/// `None` stands for a value that could not be computed; it and zero
/// both render as `"Expired"`.
pub fn format_remaining(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s > 0) else {
        return "Expired".to_owned();
    };
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours:02}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes:02}m {secs:02}s")
    } else {
        format!("{secs:02}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use maxxctl_api::CooldownReason;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap_or_default()
    }

    fn cooldown(provider_id: u64, client_type: &str, secs: i64) -> Cooldown {
        Cooldown {
            provider_id,
            provider_name: None,
            client_type: client_type.into(),
            until: Some(now() + Duration::seconds(secs)),
            reason: CooldownReason::RateLimitExceeded,
        }
    }

    #[test]
    fn wildcard_matches_any_client_type() {
        for wildcard in ["", "all"] {
            let cd = cooldown(1, wildcard, 60);
            assert!(matches(&cd, 1, None, now()));
            assert!(matches(&cd, 1, Some("claude"), now()));
            assert!(!matches(&cd, 2, None, now()));
        }
    }

    #[test]
    fn scoped_cooldown_needs_matching_client_type() {
        let cd = cooldown(1, "codex", 60);
        assert!(matches(&cd, 1, Some("codex"), now()));
        assert!(!matches(&cd, 1, Some("claude"), now()));
        assert!(!matches(&cd, 1, None, now()));
    }

    #[test]
    fn expiry_is_strict() {
        let cd = cooldown(1, "", 0);
        assert!(!matches(&cd, 1, None, now()));
        assert!(matches(&cd, 1, None, now() - Duration::milliseconds(1)));

        let open = Cooldown {
            until: None,
            ..cooldown(1, "", 60)
        };
        assert!(!matches(&open, 1, None, now()));
    }

    #[test]
    fn first_active_entry_wins() {
        let list = vec![
            cooldown(1, "", -5),
            cooldown(1, "codex", 30),
            cooldown(1, "all", 90),
        ];
        let found = find_active(&list, 1, Some("codex"), now());
        assert_eq!(found, list.get(1));

        let found = find_active(&list, 1, Some("claude"), now());
        assert_eq!(found, list.get(2));

        assert!(find_active(&list, 9, None, now()).is_none());
    }

    #[test]
    fn remaining_seconds_floors_and_clamps() {
        let mut cd = cooldown(1, "", 0);
        cd.until = Some(now() + Duration::milliseconds(2_999));
        assert_eq!(remaining_seconds(&cd, now()), 2);

        cd.until = Some(now() - Duration::seconds(10));
        assert_eq!(remaining_seconds(&cd, now()), 0);

        cd.until = None;
        assert_eq!(remaining_seconds(&cd, now()), 0);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_remaining(Some(3_725)), "01h 02m 05s");
        assert_eq!(format_remaining(Some(3_600)), "01h 00m 00s");
        assert_eq!(format_remaining(Some(125)), "02m 05s");
        assert_eq!(format_remaining(Some(60)), "01m 00s");
        assert_eq!(format_remaining(Some(9)), "09s");
        assert_eq!(format_remaining(Some(0)), "Expired");
        assert_eq!(format_remaining(None), "Expired");
    }
}
