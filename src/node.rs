use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::Config;
use crate::error::{BoardError, Result};
use crate::model::{Message, MessageId, PeerAddress, Snapshot};
use crate::shutdown::Shutdown;
use crate::state::{MergeReport, SharedState};
use crate::store::snapshot_file::SnapshotStore;
use crate::sync::client::{self, SweepReport};
use crate::sync::server;

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Everything a node's threads share: one state, one store, one config.
#[derive(Debug)]
pub(crate) struct NodeCore {
    pub(crate) config: Config,
    pub(crate) state: SharedState,
    pub(crate) store: SnapshotStore,
    pub(crate) self_port: u16,
    disconnected: Mutex<BTreeSet<PeerAddress>>,
}

impl NodeCore {
    pub(crate) fn new(config: Config, state: SharedState, store: SnapshotStore, self_port: u16) -> Self {
        Self {
            config,
            state,
            store,
            self_port,
            disconnected: Mutex::new(BTreeSet::new()),
        }
    }

    fn disconnected(&self) -> MutexGuard<'_, BTreeSet<PeerAddress>> {
        self.disconnected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn mark_disconnected(&self, addr: PeerAddress) {
        self.disconnected().insert(addr);
    }

    pub(crate) fn mark_reachable(&self, addr: PeerAddress) {
        self.disconnected().remove(&addr);
    }

    pub(crate) fn disconnected_peers(&self) -> Vec<PeerAddress> {
        self.disconnected().iter().copied().collect()
    }
}

/// A running board node: a responder on an ephemeral port plus a periodic
/// puller, both working against the same shared state.
///
/// Dropping a `Node` fires its shutdown signal without waiting; use
/// [`Node::stop`] for a bounded wait.
pub struct Node {
    core: Arc<NodeCore>,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<()>>,
}

impl Node {
    /// Hydrate from the store, bind the server, and launch both background threads.
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let store = SnapshotStore::new(&config.store_path);
        let state = SharedState::from_snapshot(store.load());

        let listener = server::bind(config.host)?;
        let port = listener.local_addr()?.port();
        state.register_self_port(port);
        store.persist(&state)?;

        let core = Arc::new(NodeCore::new(config, state, store, port));
        let shutdown = Shutdown::new();

        let server = {
            let core = Arc::clone(&core);
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("peerboard-server".into())
                .spawn(move || server::run(listener, core, shutdown))?
        };

        let sweeper = {
            let core = Arc::clone(&core);
            let signal = shutdown.clone();
            thread::Builder::new()
                .name("peerboard-sweep".into())
                .spawn(move || client::run_sweeps(core, signal))
        };
        let sweeper = match sweeper {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                return Err(e.into());
            }
        };

        tracing::info!(
            port,
            author = %core.config.author_name,
            store = %core.store.path().display(),
            "node started"
        );

        Ok(Self {
            core,
            shutdown,
            workers: vec![server, sweeper],
        })
    }

    pub fn current_server_port(&self) -> u16 {
        self.core.self_port
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// Post a message as this node's author. The message is kept in memory
    /// even when the following write to disk fails; the error is returned.
    pub fn author_message(&self, text: &str) -> Result<MessageId> {
        let now = Utc::now().timestamp();
        let id = self.core.state.add(
            &self.core.config.author_name,
            text,
            self.core.self_port,
            now,
        );
        self.core.store.persist(&self.core.state)?;
        tracing::debug!(%id, "message authored");
        Ok(id)
    }

    /// Pull one peer's snapshot and merge it in.
    pub fn pull_one(&self, addr: PeerAddress) -> Result<MergeReport> {
        client::pull_one(&self.core, addr)
    }

    /// Run one sweep on the calling thread, outside the periodic schedule.
    pub fn sweep_now(&self) -> SweepReport {
        client::sweep_once(&self.core)
    }

    pub fn list_messages(&self) -> Vec<Message> {
        self.core.state.list_messages()
    }

    pub fn peers(&self) -> Vec<PeerAddress> {
        self.core.state.peers()
    }

    pub fn disconnected_peers(&self) -> Vec<PeerAddress> {
        self.core.disconnected_peers()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.core.state.snapshot()
    }

    /// Signal both background threads and wait up to `timeout` for them to
    /// exit. Responders already writing to a peer are left to finish.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.shutdown.trigger();
        let deadline = Instant::now() + timeout;

        while self.workers.iter().any(|w| !w.is_finished()) {
            if Instant::now() >= deadline {
                tracing::warn!(?timeout, "background workers did not stop in time");
                return Err(BoardError::ShutdownTimeout(timeout));
            }
            thread::sleep(JOIN_POLL);
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("background worker panicked");
            }
        }
        tracing::info!(port = self.core.self_port, "node stopped");
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
