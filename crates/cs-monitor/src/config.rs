//! Monitor configuration, loaded from TOML.

use serde::Deserialize;

use cs_isotp::IsoTpConfig;
use cs_uds::UdsConfig;

/// How tracing output is formatted on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// How decoded records are printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// candump log to replay. The second CLI argument overrides it.
    #[serde(default)]
    pub log_path: Option<String>,
    /// Interfaces beyond this many (in order of first appearance) are ignored.
    #[serde(default = "default_bus_count")]
    pub bus_count: usize,
    #[serde(default)]
    pub isotp: IsoTpConfig,
    #[serde(default)]
    pub uds: UdsConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub output: OutputFormat,
    /// Also print every reassembled transport message.
    #[serde(default)]
    pub show_transport: bool,
}

fn default_bus_count() -> usize {
    1
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            bus_count: default_bus_count(),
            isotp: IsoTpConfig::default(),
            uds: UdsConfig::default(),
            log_format: LogFormat::default(),
            output: OutputFormat::default(),
            show_transport: false,
        }
    }
}

impl MonitorConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
