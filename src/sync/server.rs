//! Responder side: serve the current snapshot to every peer that connects.
//!
//! The accept loop polls a non-blocking listener and checks the shutdown
//! signal between attempts, so stopping takes effect within one
//! `accept_poll_ms` interval rather than immediately. Responders already
//! spawned are not interrupted.

use std::io::ErrorKind;
use std::net::{IpAddr, Shutdown as NetShutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crate::error::Result;
use crate::node::NodeCore;
use crate::shutdown::Shutdown;
use crate::wire;

/// Bind an ephemeral port on `host`.
pub fn bind(host: IpAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind((host, 0))?;
    Ok(listener)
}

pub(crate) fn run(listener: TcpListener, core: Arc<NodeCore>, shutdown: Shutdown) {
    if let Err(e) = listener.set_nonblocking(true) {
        tracing::error!(error = %e, "cannot poll listener; server not running");
        return;
    }
    let poll = core.config.accept_poll();
    tracing::info!(port = core.self_port, "listening for peers");

    while !shutdown.is_triggered() {
        match listener.accept() {
            Ok((stream, remote)) => {
                tracing::debug!(%remote, "peer connected");
                let core = Arc::clone(&core);
                let spawned = thread::Builder::new()
                    .name("peerboard-responder".into())
                    .spawn(move || respond(stream, &core));
                if let Err(e) = spawned {
                    tracing::warn!(%remote, error = %e, "could not spawn responder");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                shutdown.wait_timeout(poll);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                shutdown.wait_timeout(poll);
            }
        }
    }

    tracing::info!(port = core.self_port, "server stopped");
}

fn respond(stream: TcpStream, core: &NodeCore) {
    if let Err(e) = serve(stream, core) {
        tracing::debug!(error = %e, "responder gave up");
    }
}

/// Write one framed snapshot and close. The peer vanishing mid-write is
/// not retried.
fn serve(mut stream: TcpStream, core: &NodeCore) -> Result<()> {
    // Accepted sockets inherit non-blocking mode on some platforms.
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(core.config.io_timeout()))?;

    let snapshot = core.state.snapshot();
    wire::write_snapshot(&mut stream, &snapshot)?;
    stream.shutdown(NetShutdown::Write)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::SharedState;
    use crate::store::snapshot_file::SnapshotStore;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn serves_snapshot_then_stops_on_signal() {
        let dir = tempdir().unwrap();
        let config = Config::new("ada", dir.path().join("board.json"));
        let listener = bind(config.host).unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = SharedState::new();
        state.register_self_port(port);
        state.add("ada", "hi", port, 1);
        let store = SnapshotStore::new(&config.store_path);
        let core = Arc::new(NodeCore::new(config, state, store, port));

        let shutdown = Shutdown::new();
        let handle = {
            let core = Arc::clone(&core);
            let shutdown = shutdown.clone();
            thread::spawn(move || run(listener, core, shutdown))
        };

        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let served = wire::read_snapshot(&mut stream).unwrap();
        assert_eq!(served, core.state.snapshot());

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn peer_hanging_up_mid_write_does_not_stop_the_server() {
        let dir = tempdir().unwrap();
        let config = Config::new("ada", dir.path().join("board.json"));
        let listener = bind(config.host).unwrap();
        let port = listener.local_addr().unwrap().port();

        // Large enough that the frame cannot sit in the socket buffers whole.
        let state = SharedState::new();
        let body = "x".repeat(1024);
        for n in 0..4096 {
            state.add("ada", &body, port, n);
        }
        let store = SnapshotStore::new(&config.store_path);
        let core = Arc::new(NodeCore::new(config, state, store, port));

        let shutdown = Shutdown::new();
        let handle = {
            let core = Arc::clone(&core);
            let shutdown = shutdown.clone();
            thread::spawn(move || run(listener, core, shutdown))
        };

        for _ in 0..3 {
            let early = TcpStream::connect(("127.0.0.1", port)).unwrap();
            drop(early);
        }

        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let served = wire::read_snapshot(&mut stream).unwrap();
        assert_eq!(served.messages.len(), 4096);

        shutdown.trigger();
        handle.join().unwrap();
    }
}
