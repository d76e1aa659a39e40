//! Pass Tracker Core Library
//!
//! Keeps a user's conquered and favorite passes in sync with a remote store
//! while the UI stays instantly responsive.
//!
//! ## Overview
//!
//! Every edit is applied to an in-memory view first and persisted second.
//! When persistence fails, the affected record type is re-fetched and the
//! authoritative answer replaces the view. Signed-out users work against a
//! local fallback store; signing in switches the view to the account's data
//! and subscribes to a realtime change feed so edits made on other devices
//! show up without a manual refresh.
//!
//! ## Core Principles
//!
//! - **Optimistic**: the view changes before any network round-trip
//! - **Server wins**: conflicts are resolved by re-fetching, never merged
//! - **Identity-scoped**: a fetch started for one account never lands in
//!   another account's view
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use passtrack_core::*;
//!
//! #[tokio::main]
//! async fn main() -> TrackerResult<()> {
//!     let feed = Arc::new(FeedHub::new());
//!     let identity = Arc::new(SessionIdentity::with_identity(Some(Identity::new("alice")?)));
//!     let reconciler = Reconciler::new(
//!         Collaborators {
//!             identity,
//!             remote: Arc::new(MemoryRemote::new().with_feed(feed.clone())),
//!             feed,
//!             local: Arc::new(MemoryLocalStore::new()),
//!         },
//!         ReconcilerConfig::default(),
//!     );
//!
//!     reconciler.initialize().await;
//!     reconciler.toggle_conquest(&PassId::new("alpe-dhuez")?).await;
//!     println!("{:?}", reconciler.conquered_pass_ids());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod logging;
pub mod reconcile;
pub mod remote;
pub mod storage;
pub mod types;

// Re-exports
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use feed::{ChangeFeed, ChangeSignal, FeedHub, Subscription, SubscriptionHandle, SubscriptionId};
pub use identity::{IdentityProvider, SessionIdentity};
pub use reconcile::{
    ChangeCause, Collaborators, MutationOutcome, Reconciler, ReconcilerConfig, SyncOutcome,
    ViewEvent, ViewSnapshot,
};
pub use remote::{BackendConfig, MemoryRemote, RemoteStore, StorageRemote};
pub use storage::{LocalFallbackStore, MemoryLocalStore, Storage};
pub use types::*;
