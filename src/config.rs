use crate::application::payment::PollPolicy;
use crate::domain::wallet::{ApiKey, Wallet};
use crate::error::{Result, TicketError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "LNTICKET_CONFIG";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/lnticket";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the extension is mounted, e.g. `http://localhost:5000/lnticket`.
    pub base_url: String,
    pub wallets: Vec<Wallet>,
    /// Key for list requests. Defaults to the first wallet's invoice key.
    pub read_key: Option<ApiKey>,
    pub request_timeout_secs: u64,
    pub poll: PollPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wallets: Vec::new(),
            read_key: None,
            request_timeout_secs: 10,
            poll: PollPolicy::default(),
        }
    }
}

impl Config {
    /// Loads the config from `path`, else from `$LNTICKET_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
                _ => {
                    debug!("no config file given, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TicketError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            TicketError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), wallets = config.wallets.len(), "config loaded");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
