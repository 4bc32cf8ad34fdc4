//! Proxy configuration, read from a TOML file such as `rpcctx.toml`:
//!
//! ```toml
//! attrs_field = "attrs"
//! strict_fields = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Runtime options shared by every proxy built from one set of collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// JSON-backed field whose presence enables the key-based attribute view.
    #[serde(default = "default_attrs_field")]
    pub attrs_field: String,
    /// Fail on reads and writes of undeclared fields instead of yielding null.
    #[serde(default)]
    pub strict_fields: bool,
}

fn default_attrs_field() -> String {
    "attrs".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            attrs_field: default_attrs_field(),
            strict_fields: false,
        }
    }
}

impl ProxyConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Loads config from a file.
    /// Falls back to defaults with a warning if the file is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No proxy config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded proxy config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse proxy config {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read proxy config {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}
