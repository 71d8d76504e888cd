use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};
use crate::state::SharedState;
use crate::store::snapshot_file::SnapshotStore;

/// Print the messages held in a store file without starting a node.
/// A missing file lists as empty; a corrupt one is an error here.
pub fn run(store_path: &Path, format: Format) -> Result<()> {
    let snapshot = SnapshotStore::new(store_path).read()?.unwrap_or_default();
    let messages = SharedState::from_snapshot(snapshot).list_messages();
    println!("{}", output::render_messages(&messages, format)?);
    Ok(())
}
