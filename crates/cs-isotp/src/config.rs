//! Engine configuration, loadable from TOML as part of a larger config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the PCI byte sits in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// PCI is the first payload byte.
    #[default]
    Normal,
    /// The first payload byte is a target address; PCI follows it.
    Extended,
}

impl Addressing {
    /// Bytes a Single Frame can carry.
    pub fn single_frame_max(self) -> usize {
        match self {
            Self::Normal => 7,
            Self::Extended => 6,
        }
    }

    /// Bytes a First Frame carries after its length field.
    pub fn first_frame_capacity(self) -> usize {
        match self {
            Self::Normal => 6,
            Self::Extended => 5,
        }
    }

    /// Bytes a Consecutive Frame carries after its sequence nibble.
    pub fn consecutive_frame_capacity(self) -> usize {
        self.single_frame_max()
    }

    /// Offset of the PCI byte in the CAN payload.
    pub fn pci_offset(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Extended => 1,
        }
    }
}

/// Whether the engine answers inbound First Frames with Flow Control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControlRole {
    /// Listen only, never send Flow Control.
    #[default]
    Passive,
    /// Reply to each First Frame with one Continue-To-Send frame.
    Respond,
}

/// Which identifiers the engine processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    ProcessAll,
    /// Only identifiers matched by a registered filter or id pair.
    RegisteredOnly,
}

/// ISO-TP engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoTpConfig {
    #[serde(default)]
    pub addressing: Addressing,
    /// Target address byte leading our SF/FF/CF frames under extended
    /// addressing. Without one, outbound frames carry no address byte.
    #[serde(default)]
    pub target_address: Option<u8>,
    #[serde(default)]
    pub flow_control: FlowControlRole,
    /// Accept inbound frames at all.
    #[serde(default = "default_reception")]
    pub reception: bool,
    #[serde(default)]
    pub filter_mode: FilterMode,
    /// Wait for the receiver's Flow Control after sending a First Frame.
    /// When false, Consecutive Frames follow back-to-back.
    #[serde(default = "default_honor_flow_control")]
    pub honor_flow_control: bool,
    /// Reassembly sessions idle this long are dropped.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_ms: u64,
    /// Outbound transfers waiting this long for Flow Control fail.
    #[serde(default = "default_flow_control_timeout")]
    pub flow_control_timeout_ms: u64,
    /// Block size advertised in our Flow Control replies.
    #[serde(default)]
    pub fc_block_size: u8,
    /// STmin advertised in our Flow Control replies (raw ISO 15765-2 encoding).
    #[serde(default = "default_fc_separation_time")]
    pub fc_separation_time: u8,
    /// Filler for unused bytes of transmitted SF/FF/CF frames.
    #[serde(default = "default_padding")]
    pub padding: u8,
    /// FC(Wait) frames tolerated in a row before a transfer is abandoned.
    #[serde(default = "default_max_wait_frames")]
    pub max_wait_frames: u8,
}

fn default_reception() -> bool {
    true
}

fn default_honor_flow_control() -> bool {
    true
}

fn default_session_timeout() -> u64 {
    1000
}

fn default_flow_control_timeout() -> u64 {
    1000
}

fn default_fc_separation_time() -> u8 {
    3
}

fn default_padding() -> u8 {
    0xAA
}

fn default_max_wait_frames() -> u8 {
    10
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            addressing: Addressing::default(),
            target_address: None,
            flow_control: FlowControlRole::default(),
            reception: default_reception(),
            filter_mode: FilterMode::default(),
            honor_flow_control: default_honor_flow_control(),
            session_timeout_ms: default_session_timeout(),
            flow_control_timeout_ms: default_flow_control_timeout(),
            fc_block_size: 0,
            fc_separation_time: default_fc_separation_time(),
            padding: default_padding(),
            max_wait_frames: default_max_wait_frames(),
        }
    }
}

impl IsoTpConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn flow_control_timeout(&self) -> Duration {
        Duration::from_millis(self.flow_control_timeout_ms)
    }
}
