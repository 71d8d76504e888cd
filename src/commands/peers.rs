use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::store::snapshot_file::SnapshotStore;

pub fn run(store_path: &Path, format: Format) -> Result<()> {
    let snapshot = SnapshotStore::new(store_path).read()?.unwrap_or_default();
    let peers: Vec<_> = snapshot.peers.into_iter().collect();
    println!("{}", output::render_peers(&peers, format)?);
    Ok(())
}
