//! Reconciliation of conquered and favorite passes
//!
//! The [`Reconciler`] owns the in-memory view and is the only thing that
//! mutates it. Every operation follows the same shape:
//!
//! 1. apply the change to the view synchronously (optimistic update)
//! 2. persist it: remote store when signed in, local fallback otherwise
//! 3. on remote failure, re-fetch the authoritative list and replace the view
//!
//! Conflicts are never merged. Whatever the remote store returns on the last
//! fetch wins.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Reconciler                                                     │
//! │  ├── view: ReconciledView          (conquests, derived set,     │
//! │  │                                  favorites)                  │
//! │  ├── session: identity + epoch     (bumped by every initialize, │
//! │  │                                  stale fetches are dropped)  │
//! │  ├── listeners: one task per (identity, record type)            │
//! │  │   └── change signal → full reload of that record type        │
//! │  ├── identity watcher              (re-runs initialize)         │
//! │  └── event_tx: broadcast::Sender<ViewEvent>                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

mod controller;
mod events;
mod view;

pub use controller::{Collaborators, Reconciler};
pub use events::{ChangeCause, MutationOutcome, SyncOutcome, ViewEvent};
pub use view::{ReconciledView, ViewSnapshot};

/// Default capacity for the view event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tuning for a [`Reconciler`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Drain signals already queued on a subscription before reloading, so
    /// a burst of remote writes costs one fetch
    pub coalesce_change_signals: bool,
    /// Capacity of the [`ViewEvent`] broadcast channel
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            coalesce_change_signals: true,
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}
