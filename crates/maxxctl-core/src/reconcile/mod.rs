// ── Update reconciliation ──
//
// Push events become cache writes here. The merge functions are pure; the
// `Reconciler` owns batching, new-request detection and invalidation.

mod in_flight;
mod known;
mod merge;
mod reconciler;

pub use in_flight::InFlightSummary;
pub use known::{KnownIds, is_new_request};
pub use merge::{merge_into_infinite, merge_into_page, upsert_attempt};
pub use reconciler::{FlushReport, Reconciler, ReconcilerConfig};
