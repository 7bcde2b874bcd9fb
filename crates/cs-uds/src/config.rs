//! UDS handler configuration.

use serde::{Deserialize, Serialize};

use cs_isotp::IdPair;

/// Which transport messages the handler decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UdsFilterMode {
    #[default]
    ProcessAll,
    /// Only messages on either side of a registered request/response pair.
    RegisteredPairs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdsConfig {
    #[serde(default)]
    pub filter_mode: UdsFilterMode,
    /// Tester/ECU identifier pairs, e.g. `0x7E0`/`0x7E8`.
    #[serde(default)]
    pub pairs: Vec<IdPair>,
}
