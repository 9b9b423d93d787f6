pub mod types;

pub use types::{Config, ReleaseSettings};

use anyhow::{Context, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a TOML file, or fall back to the defaults when
    /// no path is given. Missing keys take their default values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }
}
