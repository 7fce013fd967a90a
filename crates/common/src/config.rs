//! # Configuration
//!
//! TOML-backed settings for the instance tree and the DataModel. Every field
//! has a serde default, so a partial file (or none) is valid.
//!
//! ```toml
//! [tree]
//! server = true
//! screen_size = [1280.0, 720.0]
//!
//! [data_model]
//! name = "Game"
//! net_id_start = 100
//! ```

use std::path::Path;

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data_model::NETID_START;
use crate::error::{InstanceError, Result};
use crate::instance::NetworkId;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BloxConfig {
    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub data_model: DataModelConfig,
}

/// Instance tree settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Server trees replicate to an attached replicator; clients never do
    #[serde(default)]
    pub server: bool,

    /// Pixel size ScreenGuis lay out against
    #[serde(default = "default_screen_size")]
    pub screen_size: [f32; 2],
}

fn default_screen_size() -> [f32; 2] {
    [800.0, 600.0]
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            server: false,
            screen_size: default_screen_size(),
        }
    }
}

impl TreeConfig {
    pub fn screen_size(&self) -> Vec2 {
        Vec2::from_array(self.screen_size)
    }
}

/// DataModel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModelConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// First dynamic network id handed out
    #[serde(default = "default_net_id_start")]
    pub net_id_start: NetworkId,
}

fn default_name() -> String {
    "Game".to_string()
}

fn default_net_id_start() -> NetworkId {
    NETID_START
}

impl Default for DataModelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            net_id_start: default_net_id_start(),
        }
    }
}

impl BloxConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| InstanceError::Config(e.to_string()))?;
        if config.data_model.net_id_start < NETID_START {
            warn!(
                "net_id_start {} overlaps reserved ids, using {}",
                config.data_model.net_id_start, NETID_START
            );
            config.data_model.net_id_start = NETID_START;
        }
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| InstanceError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Save as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| InstanceError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| InstanceError::Config(e.to_string()))
    }
}
