//! A peer-to-peer message board.
//!
//! Each [`Node`] keeps an append-only message map and a set of known peer
//! ports, serves its snapshot to any peer that connects, and periodically
//! pulls snapshots from up to `sweep_cap` known peers. Merging is a plain
//! union, so every node converges on the union of what it has heard.

pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod node;
pub mod output;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod sync;
pub mod wire;

pub use config::Config;
pub use error::{BoardError, Result};
pub use model::{Message, MessageId, MessageRecord, PeerAddress, Snapshot};
pub use node::Node;
pub use state::{MergeReport, SharedState};
pub use sync::client::SweepReport;
