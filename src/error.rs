use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::PeerAddress;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("store unavailable at '{}': {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("peer {addr} is not available for connection: {source}")]
    PeerUnreachable {
        addr: PeerAddress,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot: {0}")]
    Decode(String),

    #[error("snapshot frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(u64),

    #[error("background workers still running after {0:?}")]
    ShutdownTimeout(Duration),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoardError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::PeerUnreachable { .. } => "peer_unreachable",
            Self::Decode(_) => "decode_error",
            Self::FrameTooLarge(_) => "frame_too_large",
            Self::ShutdownTimeout(_) => "shutdown_timeout",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;
