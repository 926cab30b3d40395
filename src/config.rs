use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// The file looked up in the working directory when no config is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "WatchpointControl.toml";

/// The main struct for the configuration of wpctl.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub rsp: Rsp,
    pub viewer: Viewer,
    pub ui: Ui,
}

/// The connection to the GDB stub, e.g. adv_jtag_bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rsp {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for Rsp {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            connect_timeout_ms: 3000,
            read_timeout_ms: 2000,
        }
    }
}

impl Rsp {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// The websocket which publishes register values to remote viewers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Viewer {
    pub enabled: bool,
    pub websocket: String,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            enabled: false,
            websocket: "localhost:3031".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ui {
    /// Re-read the registers every this many milliseconds. Zero disables polling.
    pub poll_interval_ms: u64,
    pub tick_rate_ms: u64,
    pub read_on_start: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            poll_interval_ms: 0,
            tick_rate_ms: 250,
            read_on_start: true,
        }
    }
}

impl Config {
    /// Loads the given file, or the default file if it exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !path.exists() {
                    log::debug!("No {} found, using the defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Reading the config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Parsing the config file {}", path.display()))?;
        log::info!("Loaded the config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
