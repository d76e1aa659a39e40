//! Shared fixtures for reconciler integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use passtrack_core::{
    Collaborators, ConquestRecord, FeedHub, Identity, MemoryLocalStore, MemoryRemote, PassId,
    Reconciler, ReconcilerConfig, RemoteStore, SessionIdentity, TrackerError, TrackerResult,
    ViewEvent,
};
use tokio::sync::{broadcast, Semaphore};

pub fn pass(s: &str) -> PassId {
    PassId::new(s).unwrap()
}

pub fn ident(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

/// Remote call kinds that can be held back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Upsert,
    Delete,
}

/// Remote store wrapper that can fail or hold back calls on demand
pub struct FlakyRemote {
    inner: MemoryRemote,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    gates: Mutex<HashMap<(Op, Identity), Arc<Semaphore>>>,
    waiting: AtomicUsize,
    reads: AtomicUsize,
}

impl FlakyRemote {
    pub fn new(inner: MemoryRemote) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            gates: Mutex::new(HashMap::new()),
            waiting: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    /// The wrapped store, bypassing every fault
    pub fn inner(&self) -> &MemoryRemote {
        &self.inner
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Block `op` calls for `identity` until permits are added to the
    /// returned semaphore.
    pub fn hold(&self, op: Op, identity: &Identity) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().insert((op, identity.clone()), gate.clone());
        gate
    }

    /// Calls currently parked behind a gate
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// List calls seen so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self, op: Op, identity: &Identity) {
        let gate = self.gates.lock().get(&(op, identity.clone())).cloned();
        if let Some(gate) = gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn before_read(&self, identity: &Identity) -> TrackerResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pass_gate(Op::List, identity).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TrackerError::Remote("injected read failure".into()));
        }
        Ok(())
    }

    async fn before_write(&self, op: Op, identity: &Identity) -> TrackerResult<()> {
        self.pass_gate(op, identity).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::Remote("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    async fn list_conquests(&self, identity: &Identity) -> TrackerResult<Vec<ConquestRecord>> {
        self.before_read(identity).await?;
        self.inner.list_conquests(identity).await
    }

    async fn upsert_conquest(
        &self,
        identity: &Identity,
        record: &ConquestRecord,
    ) -> TrackerResult<()> {
        self.before_write(Op::Upsert, identity).await?;
        self.inner.upsert_conquest(identity, record).await
    }

    async fn delete_conquest(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        self.before_write(Op::Delete, identity).await?;
        self.inner.delete_conquest(identity, pass_id).await
    }

    async fn list_favorites(&self, identity: &Identity) -> TrackerResult<Vec<PassId>> {
        self.before_read(identity).await?;
        self.inner.list_favorites(identity).await
    }

    async fn upsert_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        self.before_write(Op::Upsert, identity).await?;
        self.inner.upsert_favorite(identity, pass_id).await
    }

    async fn delete_favorite(&self, identity: &Identity, pass_id: &PassId) -> TrackerResult<()> {
        self.before_write(Op::Delete, identity).await?;
        self.inner.delete_favorite(identity, pass_id).await
    }
}

/// One simulated device: a reconciler plus handles to its collaborators
pub struct Device {
    pub reconciler: Reconciler,
    pub identity: Arc<SessionIdentity>,
    pub local: Arc<MemoryLocalStore>,
}

/// A backend that several devices can share
pub struct Backend {
    pub remote: Arc<FlakyRemote>,
    pub feed: Arc<FeedHub>,
}

impl Backend {
    pub fn new() -> Self {
        Self::with_remote(MemoryRemote::new())
    }

    /// Wrap `remote`, attaching a fresh feed to it
    pub fn with_remote(remote: MemoryRemote) -> Self {
        let feed = Arc::new(FeedHub::new());
        Self {
            remote: Arc::new(FlakyRemote::new(remote.with_feed(feed.clone()))),
            feed,
        }
    }

    /// A backend whose writes publish no change signals
    pub fn detached() -> Self {
        Self {
            remote: Arc::new(FlakyRemote::new(MemoryRemote::new())),
            feed: Arc::new(FeedHub::new()),
        }
    }

    pub fn device(&self, identity: Option<Identity>) -> Device {
        self.device_with(identity, Arc::new(MemoryLocalStore::new()), ReconcilerConfig::default())
    }

    pub fn device_with(
        &self,
        identity: Option<Identity>,
        local: Arc<MemoryLocalStore>,
        config: ReconcilerConfig,
    ) -> Device {
        let provider = Arc::new(SessionIdentity::with_identity(identity));
        let reconciler = Reconciler::new(
            Collaborators {
                identity: provider.clone(),
                remote: self.remote.clone(),
                feed: self.feed.clone(),
                local: local.clone(),
            },
            config,
        );
        Device {
            reconciler,
            identity: provider,
            local,
        }
    }
}

/// Wait for the first event matching `pred`, failing after two seconds
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<ViewEvent>,
    pred: impl Fn(&ViewEvent) -> bool,
) -> ViewEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for view event")
}

/// Yield until `cond` holds, failing after two seconds
pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
