//! Puller side: fetch snapshots from peers and fold them into local state.

use std::net::{Shutdown as NetShutdown, TcpStream};
use std::sync::Arc;

use crate::error::{BoardError, Result};
use crate::model::{PeerAddress, Snapshot};
use crate::node::NodeCore;
use crate::shutdown::Shutdown;
use crate::state::MergeReport;
use crate::wire;

/// Outcome of one sweep across known peers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Peers that accepted a connection, whether or not their snapshot decoded.
    pub contacted: Vec<PeerAddress>,
    pub unreachable: Vec<PeerAddress>,
    /// Reached, but the snapshot could not be read.
    pub failed: Vec<PeerAddress>,
    pub new_peers: usize,
    pub new_messages: usize,
    pub persisted: bool,
}

/// Connect, read one frame, close. Connection failures map to
/// [`BoardError::PeerUnreachable`]; everything after connecting is a read or
/// decode failure.
fn fetch(core: &NodeCore, addr: PeerAddress) -> Result<Snapshot> {
    let socket = addr.socket_addr(core.config.host);
    let mut stream = TcpStream::connect_timeout(&socket, core.config.connect_timeout())
        .map_err(|source| BoardError::PeerUnreachable { addr, source })?;

    stream.set_read_timeout(Some(core.config.io_timeout()))?;
    let snapshot = wire::read_snapshot(&mut stream);
    // Already done with the socket; a failed shutdown changes nothing.
    let _ = stream.shutdown(NetShutdown::Both);
    snapshot
}

fn merge_from(core: &NodeCore, addr: PeerAddress, snapshot: Snapshot) -> MergeReport {
    let report = core.state.merge(snapshot);
    for id in &report.collisions {
        tracing::warn!(peer = %addr, %id, "peer sent a different record for a known id; keeping ours");
    }
    tracing::debug!(
        peer = %addr,
        new_peers = report.new_peers,
        new_messages = report.new_messages,
        "merged peer snapshot"
    );
    report
}

/// On-demand pull of a single peer, persisted on success.
pub(crate) fn pull_one(core: &NodeCore, addr: PeerAddress) -> Result<MergeReport> {
    let snapshot = match fetch(core, addr) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if matches!(e, BoardError::PeerUnreachable { .. }) {
                tracing::info!(peer = %addr, "peer not available for connection");
            } else {
                core.mark_reachable(addr);
                tracing::warn!(peer = %addr, error = %e, "discarding snapshot from peer");
            }
            return Err(e);
        }
    };
    core.mark_reachable(addr);

    let report = merge_from(core, addr, snapshot);
    core.store.persist(&core.state)?;
    Ok(report)
}

/// Pull from known peers in ascending order until `sweep_cap` have been
/// reached, then persist once. Targets are a copy of the peer set taken at
/// the start, so peers learned mid-sweep wait for the next one.
pub(crate) fn sweep_once(core: &NodeCore) -> SweepReport {
    let mut report = SweepReport::default();
    let targets = core.state.peers();
    if targets.is_empty() {
        return report;
    }

    let cap = core.config.sweep_cap;
    for addr in targets {
        if report.contacted.len() >= cap {
            break;
        }
        if addr.port() == core.self_port {
            continue;
        }

        match fetch(core, addr) {
            Ok(snapshot) => {
                core.mark_reachable(addr);
                report.contacted.push(addr);
                let merged = merge_from(core, addr, snapshot);
                report.new_peers += merged.new_peers;
                report.new_messages += merged.new_messages;
            }
            Err(BoardError::PeerUnreachable { .. }) => {
                tracing::debug!(peer = %addr, "peer unreachable this sweep");
                core.mark_disconnected(addr);
                report.unreachable.push(addr);
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "discarding snapshot from peer");
                core.mark_reachable(addr);
                report.contacted.push(addr);
                report.failed.push(addr);
            }
        }
    }

    match core.store.persist(&core.state) {
        Ok(()) => report.persisted = true,
        Err(e) => tracing::error!(error = %e, "failed to persist after sweep"),
    }
    report
}

/// Background loop: wait one interval, sweep, repeat until shutdown.
pub(crate) fn run_sweeps(core: Arc<NodeCore>, shutdown: Shutdown) {
    let interval = core.config.sweep_interval();
    while !shutdown.wait_timeout(interval) {
        let report = sweep_once(&core);
        if !report.contacted.is_empty() || !report.unreachable.is_empty() {
            tracing::debug!(
                contacted = report.contacted.len(),
                unreachable = report.unreachable.len(),
                new_messages = report.new_messages,
                "sweep finished"
            );
        }
    }
    tracing::info!(port = core.self_port, "sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::SharedState;
    use crate::store::snapshot_file::SnapshotStore;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::{TempDir, tempdir};

    fn core_with_peers(dir: &TempDir, self_port: u16, peers: &[u16]) -> NodeCore {
        let config = Config::new("ada", dir.path().join("board.json"));
        let state = SharedState::new();
        state.register_self_port(self_port);
        let mut seed = Snapshot::default();
        seed.peers.extend(peers.iter().copied().map(PeerAddress::new));
        state.merge(seed);
        let store = SnapshotStore::new(&config.store_path);
        NodeCore::new(config, state, store, self_port)
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn empty_peer_set_is_a_noop() {
        let dir = tempdir().unwrap();
        let config = Config::new("ada", dir.path().join("board.json"));
        let store = SnapshotStore::new(&config.store_path);
        let core = NodeCore::new(config, SharedState::new(), store, 1);

        let report = sweep_once(&core);
        assert_eq!(report, SweepReport::default());
        assert!(!core.store.path().exists());
    }

    #[test]
    fn unreachable_peers_stay_known_and_are_recorded() {
        let dir = tempdir().unwrap();
        let dead = closed_port();
        let core = core_with_peers(&dir, 1, &[dead]);
        let before = core.state.snapshot();

        let report = sweep_once(&core);
        assert_eq!(report.unreachable, vec![PeerAddress::new(dead)]);
        assert!(report.contacted.is_empty());
        assert!(report.persisted);
        assert_eq!(core.state.snapshot(), before);
        assert_eq!(core.disconnected_peers(), vec![PeerAddress::new(dead)]);
    }

    #[test]
    fn pull_one_from_dead_port_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let core = core_with_peers(&dir, 1, &[]);
        let before = core.state.snapshot();

        let err = pull_one(&core, PeerAddress::new(closed_port())).unwrap_err();
        assert_eq!(err.code(), "peer_unreachable");
        assert_eq!(core.state.snapshot(), before);
        assert!(!core.store.path().exists());
    }

    #[test]
    fn pull_one_drops_malformed_snapshot_without_persisting() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"\0\0\0\x03abc").unwrap();
        });

        let core = core_with_peers(&dir, 1, &[]);
        let before = core.state.snapshot();
        let err = pull_one(&core, PeerAddress::new(port)).unwrap_err();
        server.join().unwrap();

        assert_eq!(err.code(), "decode_error");
        assert_eq!(core.state.message_count(), 0);
        assert_eq!(core.state.snapshot(), before);
        assert!(!core.store.path().exists());
    }

    #[test]
    fn garbage_peer_is_contacted_but_contributes_nothing() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&[0, 0, 0, 5, b'{', b'x']).unwrap();
        });

        let core = core_with_peers(&dir, 1, &[port]);
        let report = sweep_once(&core);
        server.join().unwrap();

        assert_eq!(report.contacted, vec![PeerAddress::new(port)]);
        assert_eq!(report.failed, vec![PeerAddress::new(port)]);
        assert_eq!(core.state.message_count(), 0);
        assert!(core.disconnected_peers().is_empty());
    }
}
