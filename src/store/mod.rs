pub mod lock;
pub mod snapshot_file;
