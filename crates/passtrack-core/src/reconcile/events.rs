//! Outcome and event types for reconciliation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Mutation:  Idle → OptimisticApplied → Confirmed                │
//! │                                      → Resynchronized           │
//! │                                      → Superseded  (identity    │
//! │                                         changed mid-flight)     │
//! │                                      → Unresolved  (write and   │
//! │                                         re-read both failed)    │
//! │                                                                 │
//! │  ViewEvent: broadcast to UI listeners                           │
//! │  ├── Changed: a slice of the view was replaced or edited        │
//! │  ├── IdentityChanged: view invalidated for a new account        │
//! │  └── ReadFailed: authoritative fetch failed, last state kept    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::types::{Identity, RecordType};

/// Where a mutating operation's state machine ended
///
/// This is informational; failures are recovered internally and never
/// returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The write was persisted and the optimistic state stands
    Confirmed,
    /// The write failed and the view was replaced with authoritative state
    Resynchronized,
    /// The identity changed before the operation finished; its follow-up
    /// was dropped so it cannot touch the new account's view
    Superseded,
    /// The write failed and so did the re-read; the optimistic state is
    /// still shown
    Unresolved,
    /// Nothing to do (e.g. editing details of a pass that is not conquered)
    Ignored,
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOutcome::Confirmed => write!(f, "confirmed"),
            MutationOutcome::Resynchronized => write!(f, "resynchronized"),
            MutationOutcome::Superseded => write!(f, "superseded"),
            MutationOutcome::Unresolved => write!(f, "unresolved"),
            MutationOutcome::Ignored => write!(f, "ignored"),
        }
    }
}

/// Result of fetching authoritative state into the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh data replaced the view
    Applied,
    /// The fetch failed; the last-known view was kept
    ReadFailed,
    /// The data arrived after an identity change and was discarded
    Stale,
    /// No identity is signed in, so there is nothing remote to fetch
    Skipped,
}

/// Why a slice of the view changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// Loaded by `initialize`
    Initialized,
    /// Local optimistic edit, not yet confirmed
    Optimistic,
    /// Replaced by an authoritative re-fetch after one of our writes
    Resynchronized,
    /// Replaced by a re-fetch triggered by the change feed
    RemoteSignal,
}

/// Notifications for UI listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Changed {
        record_type: RecordType,
        cause: ChangeCause,
    },
    IdentityChanged {
        identity: Option<Identity>,
    },
    ReadFailed {
        record_type: RecordType,
        message: String,
    },
}

impl ViewEvent {
    /// The record type this event concerns, if any
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            ViewEvent::Changed { record_type, .. } => Some(*record_type),
            ViewEvent::ReadFailed { record_type, .. } => Some(*record_type),
            ViewEvent::IdentityChanged { .. } => None,
        }
    }
}
