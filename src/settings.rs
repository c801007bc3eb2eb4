//! Loading [`ClientConfig`] from a TOML file and the environment.
//!
//! Layering, lowest first: built-in defaults, the optional file, then
//! `RTS_CLIENT_*` variables (`RTS_CLIENT_GATHER_COOLDOWN=0.8`).

use crate::error::ConfigError;
use crate::types::ClientConfig;
use ::config::{Config, Environment, File};
use log::debug;
use std::path::Path;

pub const ENV_PREFIX: &str = "RTS_CLIENT";

impl ClientConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading client config from {}", path.display());
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        // Missing keys fall back to `Default` through `#[serde(default)]`.
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!(
            "rts-client-core-settings-{}.toml",
            std::process::id()
        ));
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "gather_cooldown = 1.25").unwrap();
            writeln!(f, "player_name = \"Ana\"").unwrap();
        }

        let cfg = ClientConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.gather_cooldown, 1.25);
        assert_eq!(cfg.player_name, "Ana");
        assert_eq!(cfg.map_width, 256);
        assert_eq!(cfg.max_reconnect_attempts, 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = Path::new("/nonexistent/rts-client.toml");
        assert!(ClientConfig::load(Some(path)).is_err());
    }
}
