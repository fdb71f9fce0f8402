//! JSON config file adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Every field is
//! optional in the file; missing fields take their defaults.  Saves go
//! through a sibling temp file and a rename so a crash never leaves a
//! half-written config behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::GuardianConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<GuardianConfig, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("config: {} not found, using defaults", self.path.display());
                return Ok(GuardianConfig::default());
            }
            Err(e) => {
                warn!("config: cannot read {}: {}", self.path.display(), e);
                return Err(ConfigError::IoError);
            }
        };
        let config: GuardianConfig = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("config: {} is not valid: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("config: loaded {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &GuardianConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config).map_err(|_| ConfigError::IoError)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("config: cannot write {}: {}", self.path.display(), e);
                ConfigError::IoError
            })?;
        info!("config: saved {}", self.path.display());
        Ok(())
    }
}
