//! The reconciliation controller

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::events::{ChangeCause, MutationOutcome, SyncOutcome, ViewEvent};
use super::view::{ReconciledView, ViewSnapshot};
use super::ReconcilerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::feed::{ChangeFeed, ChangeSignal, SubscriptionHandle};
use crate::identity::IdentityProvider;
use crate::remote::RemoteStore;
use crate::storage::LocalFallbackStore;
use crate::types::{
    ConquestDetails, ConquestRecord, ExternalActivity, Identity, PassId, RecordType,
};

/// Everything the reconciler talks to
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub remote: Arc<dyn RemoteStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub local: Arc<dyn LocalFallbackStore>,
}

/// Identity the view currently belongs to
///
/// `epoch` increases on every `initialize`, so a fetch that started under an
/// older session can be recognised and dropped when it lands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Session {
    identity: Option<Identity>,
    epoch: u64,
}

/// A change-feed subscription and the task draining it
struct Listener {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct ControllerState {
    view: ReconciledView,
    session: Session,
    listeners: Vec<Listener>,
    identity_watcher: Option<JoinHandle<()>>,
}

struct Inner {
    collab: Collaborators,
    config: ReconcilerConfig,
    /// Never held across an await
    state: Mutex<ControllerState>,
    event_tx: broadcast::Sender<ViewEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(watcher) = state.identity_watcher.take() {
            watcher.abort();
        }
        for listener in state.listeners.drain(..) {
            self.collab.feed.unsubscribe(&listener.handle);
            listener.task.abort();
        }
    }
}

enum ConquestWrite {
    Upsert(ConquestRecord),
    Delete,
}

/// Owner of the reconciled view of conquered and favorite passes
///
/// Cheap to clone; clones share the same view. All mutating operations are
/// safe to call concurrently: each applies its optimistic change under the
/// state lock before its first await.
///
/// # Example
///
/// ```ignore
/// let reconciler = Reconciler::new(collaborators, ReconcilerConfig::default());
/// reconciler.initialize().await;
/// reconciler.watch_identity();
///
/// let alpe = PassId::new("alpe-dhuez")?;
/// reconciler.toggle_conquest(&alpe).await;
/// assert!(reconciler.is_conquered(&alpe));
/// ```
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(collab: Collaborators, config: ReconcilerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                collab,
                config,
                state: Mutex::new(ControllerState::default()),
                event_tx,
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Read Access
    // ═══════════════════════════════════════════════════════════════════════

    /// Identity the current view belongs to
    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.lock().session.identity.clone()
    }

    pub fn conquered_pass_ids(&self) -> BTreeSet<PassId> {
        self.inner.state.lock().view.conquered_pass_ids().clone()
    }

    pub fn conquests(&self) -> Vec<ConquestRecord> {
        self.inner.state.lock().view.conquests().to_vec()
    }

    pub fn favorite_pass_ids(&self) -> BTreeSet<PassId> {
        self.inner.state.lock().view.favorite_pass_ids().clone()
    }

    pub fn conquest(&self, pass_id: &PassId) -> Option<ConquestRecord> {
        self.inner.state.lock().view.conquest(pass_id).cloned()
    }

    pub fn is_conquered(&self, pass_id: &PassId) -> bool {
        self.inner.state.lock().view.is_conquered(pass_id)
    }

    pub fn is_favorite(&self, pass_id: &PassId) -> bool {
        self.inner.state.lock().view.is_favorite(pass_id)
    }

    /// Copy of the whole view, taken atomically
    pub fn snapshot(&self) -> ViewSnapshot {
        self.inner.state.lock().view.snapshot()
    }

    pub fn is_consistent(&self) -> bool {
        self.inner.state.lock().view.is_consistent()
    }

    /// Number of change-feed subscriptions this reconciler holds open
    pub fn live_subscriptions(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Subscribe to view events
    ///
    /// Multiple subscribers can exist; events are broadcast to all. A slow
    /// subscriber may observe `RecvError::Lagged` and should re-read the
    /// snapshot.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.event_tx.subscribe()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Load the view for whoever is signed in right now.
    ///
    /// Tears down existing subscriptions first. With an identity, subscribes
    /// to both record types and fetches both lists from the remote store;
    /// without one, loads conquests from the local fallback store. An
    /// identity change clears the view before anything is fetched, so the
    /// previous account's data is never shown under the new one.
    pub async fn initialize(&self) -> SyncOutcome {
        let identity = self.inner.collab.identity.current_identity();

        let (session, identity_changed) = {
            let mut state = self.inner.state.lock();
            let stale = std::mem::take(&mut state.listeners);
            self.teardown(stale);

            let identity_changed = state.session.identity != identity;
            state.session = Session {
                identity: identity.clone(),
                epoch: state.session.epoch + 1,
            };
            if identity_changed {
                state.view.clear();
            }

            let session = state.session.clone();
            if let Some(identity) = &identity {
                state.listeners = RecordType::ALL
                    .iter()
                    .map(|&record_type| self.spawn_listener(identity, record_type, &session))
                    .collect();
            }
            (session, identity_changed)
        };

        if identity_changed {
            info!(identity = ?session.identity, epoch = session.epoch, "Identity changed, view invalidated");
            self.emit(ViewEvent::IdentityChanged {
                identity: session.identity.clone(),
            });
        }

        let Some(identity) = session.identity.clone() else {
            return self.load_local(&session);
        };

        let remote = &self.inner.collab.remote;
        let (conquests, favorites) = tokio::join!(
            remote.list_conquests(&identity),
            remote.list_favorites(&identity),
        );
        let conquests = self.apply_conquests(&session, conquests, ChangeCause::Initialized);
        let favorites = self.apply_favorites(&session, favorites, ChangeCause::Initialized);

        match (conquests, favorites) {
            (SyncOutcome::Stale, _) | (_, SyncOutcome::Stale) => SyncOutcome::Stale,
            (SyncOutcome::ReadFailed, _) | (_, SyncOutcome::ReadFailed) => SyncOutcome::ReadFailed,
            _ => {
                info!(%identity, "View initialized from remote store");
                SyncOutcome::Applied
            }
        }
    }

    /// Re-run [`initialize`](Self::initialize) on every identity notification
    ///
    /// Replaces any watcher started earlier.
    pub fn watch_identity(&self) {
        let mut changes = self.inner.collab.identity.watch();
        let weak = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Reconciler { inner }.initialize().await;
            }
        });

        if let Some(previous) = self.inner.state.lock().identity_watcher.replace(task) {
            previous.abort();
        }
    }

    /// Stop watching identity and drop every change-feed subscription.
    ///
    /// The view itself is left as it is.
    pub fn shutdown(&self) {
        let (watcher, listeners) = {
            let mut state = self.inner.state.lock();
            (
                state.identity_watcher.take(),
                std::mem::take(&mut state.listeners),
            )
        };
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        self.teardown(listeners);
        debug!("Reconciler shut down");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutations
    // ═══════════════════════════════════════════════════════════════════════

    /// Mark `pass_id` conquered (dated today, UTC) or unmark it.
    pub async fn toggle_conquest(&self, pass_id: &PassId) -> MutationOutcome {
        let (session, write) = {
            let mut state = self.inner.state.lock();
            let write = if state.view.remove_conquest(pass_id).is_some() {
                ConquestWrite::Delete
            } else {
                let record = ConquestRecord::completed_today(pass_id.clone());
                state.view.upsert_conquest(record.clone());
                ConquestWrite::Upsert(record)
            };
            (state.session.clone(), write)
        };
        let removing = matches!(write, ConquestWrite::Delete);
        debug!(%pass_id, removing, "Conquest toggled");
        self.emit_changed(RecordType::Conquests, ChangeCause::Optimistic);

        let Some(identity) = session.identity.clone() else {
            let local = &self.inner.collab.local;
            let result = match &write {
                ConquestWrite::Upsert(record) => local.upsert_one(record),
                ConquestWrite::Delete => local.delete_one(pass_id),
            };
            self.log_local_failure(pass_id, result);
            return MutationOutcome::Confirmed;
        };

        let remote = &self.inner.collab.remote;
        let result = match &write {
            ConquestWrite::Upsert(record) => remote.upsert_conquest(&identity, record).await,
            ConquestWrite::Delete => remote.delete_conquest(&identity, pass_id).await,
        };
        match result {
            Ok(()) => MutationOutcome::Confirmed,
            Err(e) => {
                warn!(%identity, %pass_id, removing, error = %e, "Conquest write failed, resynchronizing");
                self.rollback(RecordType::Conquests, &session).await
            }
        }
    }

    /// Star or unstar `pass_id`.
    ///
    /// Without an identity the change lives in memory only.
    pub async fn toggle_favorite(&self, pass_id: &PassId) -> MutationOutcome {
        let (session, adding) = {
            let mut state = self.inner.state.lock();
            let adding = !state.view.remove_favorite(pass_id);
            if adding {
                state.view.insert_favorite(pass_id.clone());
            }
            (state.session.clone(), adding)
        };
        debug!(%pass_id, adding, "Favorite toggled");
        self.emit_changed(RecordType::Favorites, ChangeCause::Optimistic);

        let Some(identity) = session.identity.clone() else {
            return MutationOutcome::Confirmed;
        };

        let remote = &self.inner.collab.remote;
        let result = if adding {
            remote.upsert_favorite(&identity, pass_id).await
        } else {
            remote.delete_favorite(&identity, pass_id).await
        };
        match result {
            Ok(()) => MutationOutcome::Confirmed,
            Err(e) => {
                warn!(%identity, %pass_id, adding, error = %e, "Favorite write failed, resynchronizing");
                self.rollback(RecordType::Favorites, &session).await
            }
        }
    }

    /// Replace the photos of `pass_id`'s conquest, creating the conquest
    /// (dated today) if there is none.
    ///
    /// After a successful remote write the conquest list is re-fetched so the
    /// view reflects what the server actually kept.
    pub async fn save_photos(&self, pass_id: &PassId, photos: Vec<String>) -> MutationOutcome {
        let (session, record) = {
            let mut state = self.inner.state.lock();
            let record = match state.view.conquest(pass_id) {
                Some(existing) => ConquestRecord {
                    photos,
                    ..existing.clone()
                },
                None => ConquestRecord::completed_today(pass_id.clone()).with_photos(photos),
            };
            state.view.upsert_conquest(record.clone());
            (state.session.clone(), record)
        };
        debug!(%pass_id, photos = record.photos.len(), "Photos saved");
        self.emit_changed(RecordType::Conquests, ChangeCause::Optimistic);

        self.persist_record(&session, record).await
    }

    /// Overwrite notes and completion time of an existing conquest.
    ///
    /// `None` fields clear the stored value. Returns
    /// [`MutationOutcome::Ignored`] when `pass_id` is not conquered.
    pub async fn update_details(
        &self,
        pass_id: &PassId,
        details: ConquestDetails,
    ) -> MutationOutcome {
        let prepared = {
            let mut state = self.inner.state.lock();
            match state.view.conquest(pass_id).cloned() {
                Some(mut record) => {
                    record.personal_notes = details.personal_notes;
                    record.time_completed = details.time_completed;
                    state.view.upsert_conquest(record.clone());
                    Some((state.session.clone(), record))
                }
                None => None,
            }
        };
        let Some((session, record)) = prepared else {
            debug!(%pass_id, "Details edit ignored, pass not conquered");
            return MutationOutcome::Ignored;
        };
        self.emit_changed(RecordType::Conquests, ChangeCause::Optimistic);

        self.persist_record(&session, record).await
    }

    /// Record `pass_id` as conquered by an imported external activity.
    ///
    /// An existing conquest keeps its photos and notes; date, time and the
    /// activity link come from `activity`.
    pub async fn link_external_activity(
        &self,
        pass_id: &PassId,
        activity: &ExternalActivity,
    ) -> MutationOutcome {
        let (session, record) = {
            let mut state = self.inner.state.lock();
            let mut record = state
                .view
                .conquest(pass_id)
                .cloned()
                .unwrap_or_else(|| ConquestRecord::new(pass_id.clone(), activity.date));
            record.apply_activity(activity);
            state.view.upsert_conquest(record.clone());
            (state.session.clone(), record)
        };
        debug!(%pass_id, activity_id = %activity.id, "External activity linked");
        self.emit_changed(RecordType::Conquests, ChangeCause::Optimistic);

        self.persist_record(&session, record).await
    }

    /// Reload `record_type` from the remote store and replace that slice of
    /// the view, whatever else is in flight.
    pub async fn on_remote_change_signal(&self, record_type: RecordType) -> SyncOutcome {
        let session = self.inner.state.lock().session.clone();
        self.resync(record_type, &session, ChangeCause::RemoteSignal)
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════

    fn spawn_listener(
        &self,
        identity: &Identity,
        record_type: RecordType,
        session: &Session,
    ) -> Listener {
        let subscription = self.inner.collab.feed.subscribe(identity, record_type);
        let task = tokio::spawn(listen(
            Arc::downgrade(&self.inner),
            subscription.signals,
            record_type,
            session.clone(),
            self.inner.config.coalesce_change_signals,
        ));
        Listener {
            handle: subscription.handle,
            task,
        }
    }

    fn teardown(&self, listeners: Vec<Listener>) {
        for listener in listeners {
            self.inner.collab.feed.unsubscribe(&listener.handle);
            listener.task.abort();
        }
    }

    /// Upsert a full record and re-fetch on success
    async fn persist_record(&self, session: &Session, record: ConquestRecord) -> MutationOutcome {
        let Some(identity) = session.identity.clone() else {
            let result = self.inner.collab.local.upsert_one(&record);
            self.log_local_failure(&record.pass_id, result);
            return MutationOutcome::Confirmed;
        };

        match self
            .inner
            .collab
            .remote
            .upsert_conquest(&identity, &record)
            .await
        {
            Ok(()) => {
                match self
                    .resync(RecordType::Conquests, session, ChangeCause::Resynchronized)
                    .await
                {
                    SyncOutcome::Stale => MutationOutcome::Superseded,
                    _ => MutationOutcome::Confirmed,
                }
            }
            Err(e) => {
                warn!(%identity, pass_id = %record.pass_id, error = %e, "Conquest upsert failed, resynchronizing");
                self.rollback(RecordType::Conquests, session).await
            }
        }
    }

    /// Undo an optimistic change by adopting the authoritative list
    async fn rollback(&self, record_type: RecordType, session: &Session) -> MutationOutcome {
        match self
            .resync(record_type, session, ChangeCause::Resynchronized)
            .await
        {
            SyncOutcome::Applied => MutationOutcome::Resynchronized,
            SyncOutcome::Stale => MutationOutcome::Superseded,
            SyncOutcome::ReadFailed | SyncOutcome::Skipped => MutationOutcome::Unresolved,
        }
    }

    async fn resync(
        &self,
        record_type: RecordType,
        session: &Session,
        cause: ChangeCause,
    ) -> SyncOutcome {
        let Some(identity) = session.identity.as_ref() else {
            debug!(%record_type, "No identity, nothing to resynchronize");
            return SyncOutcome::Skipped;
        };

        let remote = &self.inner.collab.remote;
        match record_type {
            RecordType::Conquests => {
                let fetched = remote.list_conquests(identity).await;
                self.apply_conquests(session, fetched, cause)
            }
            RecordType::Favorites => {
                let fetched = remote.list_favorites(identity).await;
                self.apply_favorites(session, fetched, cause)
            }
        }
    }

    fn load_local(&self, session: &Session) -> SyncOutcome {
        match self.inner.collab.local.load() {
            Ok(records) => {
                let count = records.len();
                if self.apply(session, |view| view.replace_conquests(records)) {
                    info!(count, "View initialized from local fallback store");
                    self.emit_changed(RecordType::Conquests, ChangeCause::Initialized);
                    SyncOutcome::Applied
                } else {
                    SyncOutcome::Stale
                }
            }
            Err(e) => self.read_failed(RecordType::Conquests, e),
        }
    }

    fn apply_conquests(
        &self,
        session: &Session,
        fetched: TrackerResult<Vec<ConquestRecord>>,
        cause: ChangeCause,
    ) -> SyncOutcome {
        match fetched {
            Ok(records) => {
                let count = records.len();
                if self.apply(session, |view| view.replace_conquests(records)) {
                    debug!(count, ?cause, "Conquests replaced");
                    self.emit_changed(RecordType::Conquests, cause);
                    SyncOutcome::Applied
                } else {
                    debug!(epoch = session.epoch, "Discarding stale conquest fetch");
                    SyncOutcome::Stale
                }
            }
            Err(e) => self.read_failed(RecordType::Conquests, e),
        }
    }

    fn apply_favorites(
        &self,
        session: &Session,
        fetched: TrackerResult<Vec<PassId>>,
        cause: ChangeCause,
    ) -> SyncOutcome {
        match fetched {
            Ok(passes) => {
                let count = passes.len();
                if self.apply(session, |view| view.replace_favorites(passes)) {
                    debug!(count, ?cause, "Favorites replaced");
                    self.emit_changed(RecordType::Favorites, cause);
                    SyncOutcome::Applied
                } else {
                    debug!(epoch = session.epoch, "Discarding stale favorite fetch");
                    SyncOutcome::Stale
                }
            }
            Err(e) => self.read_failed(RecordType::Favorites, e),
        }
    }

    /// Run `f` on the view only if `session` is still current
    fn apply(&self, session: &Session, f: impl FnOnce(&mut ReconciledView)) -> bool {
        let mut state = self.inner.state.lock();
        if state.session != *session {
            return false;
        }
        f(&mut state.view);
        debug_assert!(state.view.is_consistent());
        true
    }

    fn read_failed(&self, record_type: RecordType, error: TrackerError) -> SyncOutcome {
        warn!(%record_type, error = %error, "Fetch failed, keeping last-known view");
        self.emit(ViewEvent::ReadFailed {
            record_type,
            message: error.to_string(),
        });
        SyncOutcome::ReadFailed
    }

    fn log_local_failure(&self, pass_id: &PassId, result: TrackerResult<()>) {
        if let Err(e) = result {
            warn!(%pass_id, error = %e, "Local fallback write failed");
        }
    }

    fn emit_changed(&self, record_type: RecordType, cause: ChangeCause) {
        self.emit(ViewEvent::Changed { record_type, cause });
    }

    fn emit(&self, event: ViewEvent) {
        let _ = self.inner.event_tx.send(event);
    }
}

/// Drain one subscription, reloading its record type on every signal
async fn listen(
    inner: Weak<Inner>,
    mut signals: mpsc::UnboundedReceiver<ChangeSignal>,
    record_type: RecordType,
    session: Session,
    coalesce: bool,
) {
    while let Some(signal) = signals.recv().await {
        let mut coalesced = 0usize;
        if coalesce {
            while signals.try_recv().is_ok() {
                coalesced += 1;
            }
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        trace!(identity = %signal.identity, %record_type, coalesced, "Change signal received");
        Reconciler { inner }
            .resync(record_type, &session, ChangeCause::RemoteSignal)
            .await;
    }
    trace!(%record_type, "Change listener stopped");
}
