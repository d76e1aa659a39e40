//! Identity provider for the tracker
//!
//! The reconciliation core only needs two things from whatever handles
//! authentication: who is signed in right now, and a way to hear about it
//! when that changes. Observers register through [`IdentityProvider::watch`]
//! and drop the receiver to unregister.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::types::Identity;

/// Source of the current account identity
pub trait IdentityProvider: Send + Sync {
    /// The signed-in account, or `None` in local-only mode
    fn current_identity(&self) -> Option<Identity>;

    /// Receiver that is notified on every login, logout or registration
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity holder driven by explicit login/logout calls
///
/// Every call notifies watchers, even when the identity is unchanged, since
/// callers treat a repeated login as a request to reload.
pub struct SessionIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl SessionIdentity {
    /// Start anonymous
    pub fn anonymous() -> Self {
        Self::with_identity(None)
    }

    pub fn with_identity(identity: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(identity);
        Self { tx }
    }

    pub fn login(&self, identity: Identity) {
        info!(%identity, "Identity signed in");
        self.tx.send_replace(Some(identity));
    }

    /// Registration signs the new account in directly
    pub fn register(&self, identity: Identity) {
        debug!(%identity, "Identity registered");
        self.login(identity);
    }

    pub fn logout(&self) {
        info!("Identity signed out");
        self.tx.send_replace(None);
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
