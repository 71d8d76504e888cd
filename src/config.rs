//! Node configuration.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_SWEEP_CAP: usize = 5;
/// Environment variable consulted for the author name when no flag is given.
pub const AUTHOR_ENV: &str = "PEERBOARD_AUTHOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub author_name: String,
    pub store_path: PathBuf,
    /// Host the server binds and peers are dialled on.
    pub host: IpAddr,
    pub sweep_interval_ms: u64,
    /// Most peers reached per sweep.
    pub sweep_cap: usize,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub accept_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author_name: "anonymous".to_string(),
            store_path: PathBuf::from("peerboard.json"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            sweep_cap: DEFAULT_SWEEP_CAP,
            connect_timeout_ms: 2_000,
            io_timeout_ms: 5_000,
            accept_poll_ms: 50,
        }
    }
}

impl Config {
    pub fn new(author_name: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            author_name: author_name.into(),
            store_path: store_path.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| BoardError::store(path, e))?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Settle `author_name` in precedence order: command-line flag, then
    /// environment, then the value already loaded from a config file, then a
    /// generated `author-xxxxxxxx` name. Blank candidates are skipped.
    pub fn resolve_author(&mut self, flag: Option<String>, env: Option<String>, from_file: bool) {
        let explicit = [flag, env]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty());

        match explicit {
            Some(name) => self.author_name = name,
            None if from_file && !self.author_name.trim().is_empty() => {}
            None => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                self.author_name = format!("author-{}", &token[..8]);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.author_name.trim().is_empty() {
            return Err(BoardError::InvalidConfig("author_name must be non-empty".into()));
        }
        if self.sweep_cap == 0 {
            return Err(BoardError::InvalidConfig("sweep_cap must be at least 1".into()));
        }
        for (name, value) in [
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("io_timeout_ms", self.io_timeout_ms),
            ("accept_poll_ms", self.accept_poll_ms),
        ] {
            if value == 0 {
                return Err(BoardError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }
}
