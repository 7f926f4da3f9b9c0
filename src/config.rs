use crate::auth::pam::DEFAULT_PAM_SERVICE;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pam: PamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PamConfig {
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pam: PamConfig {
                service: DEFAULT_PAM_SERVICE.to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
                console: true,
            },
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        info!("Using PAM service '{}' from {}", config.pam.service, path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
        debug!("Wrote configuration for PAM service '{}' to {}", self.pam.service, path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pam.service.is_empty() {
            return Err(anyhow!("PAM service name cannot be empty"));
        }

        // PAM looks the service up as a file name under /etc/pam.d
        if self.pam.service.contains('/') {
            return Err(anyhow!("Invalid PAM service name: {}", self.pam.service));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(anyhow!("Invalid log level: {}", self.logging.level));
        }

        if !self.logging.console && self.logging.file.is_none() {
            return Err(anyhow!("Logging needs at least one of console or file output"));
        }

        if let Some(file) = &self.logging.file {
            if Path::new(file).file_name().is_none() {
                return Err(anyhow!("Invalid log file path: {}", file));
            }
        }

        Ok(())
    }
}
