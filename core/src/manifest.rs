use std::{fs, path::Path};

use serde_derive::Deserialize;
use thiserror::Error;

use crate::version::parse_version;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Unable to read manifest '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("Unable to decode manifest '{0}': {1}")]
    Decode(String, serde_json::Error),
    #[error("No deployed version found in '{0}'")]
    NoLatestVersion(String),
}

/// Installed tools manifest (`settings.json`)
#[derive(Debug, Deserialize)]
struct Settings {
    version: Option<String>,
}

/// Deployed tools manifest (`setup.json`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    last_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolsVersion {
    pub installed: Option<u32>,
    pub latest: u32,
}

impl ToolsVersion {
    /// Compare installed tools version with the deployed one. A missing or
    /// unreadable installed version is reported as `installed: None`.
    pub fn check(settings: &Path, setup: &Path) -> Result<Self, ManifestError> {
        let setup_display = setup.display().to_string();
        let raw = fs::read_to_string(setup)
            .map_err(|error| ManifestError::Read(setup_display.clone(), error))?;
        let deployed: Setup = serde_json::from_str(&raw)
            .map_err(|error| ManifestError::Decode(setup_display.clone(), error))?;
        let latest = deployed
            .last_version
            .as_deref()
            .and_then(parse_version)
            .ok_or(ManifestError::NoLatestVersion(setup_display))?;

        let installed = match fs::read_to_string(settings) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings.version.as_deref().and_then(parse_version),
                Err(error) => {
                    log::warn!(
                        "Unable to decode installed manifest '{}': {}",
                        settings.display(),
                        error
                    );
                    None
                }
            },
            Err(_) => None,
        };

        log::info!(
            "Installed tools version: {:?}, deployed version: {}",
            installed,
            latest
        );
        Ok(Self { installed, latest })
    }

    pub fn needs_update(&self) -> bool {
        match self.installed {
            Some(installed) => self.latest > installed,
            None => true,
        }
    }
}
