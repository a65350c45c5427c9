// ── Cooldown aggregation ──
//
// Pure activity/remaining-time functions, the cache-backed aggregator and
// the expiry scheduler that keeps the cached list honest as time passes.

mod aggregator;
mod scheduler;
mod timing;

pub use aggregator::{CooldownAggregator, CooldownLookup, CooldownView};
pub use scheduler::{EXPIRY_GRACE, expiry_delays};
pub use timing::{find_active, format_remaining, matches, remaining_seconds};

pub(crate) use scheduler::run_expiry_scheduler;
