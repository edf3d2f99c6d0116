// ============================================================================
// Order Tracking Core
// ============================================================================
//
// Change detection and notification for orders moving through
// pending -> processing -> shipped -> delivered.
//
// - snapshot    - last observed record per order
// - reconciler  - polling loop that diffs the store against the snapshot
// - progression - timed automatic advances, one pending per order
// - notifier    - broadcast to connected subscribers
// - health      - outcome of the latest tick
//
// ============================================================================

mod health;
mod notifier;
mod progression;
mod reconciler;
mod snapshot;

pub use health::TrackerHealth;
pub use notifier::Notifier;
pub use progression::ProgressionEngine;
pub use reconciler::Reconciler;
pub use snapshot::SnapshotCache;
