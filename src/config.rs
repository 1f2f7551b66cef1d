//! TOML configuration shared by the server and the CLI.
//!
//! Every section is optional; secrets are read from the environment, not from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::guide::DEFAULT_THRESHOLD_KM;
use crate::route::TimestampPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub guidance: GuidanceConfig,
    pub route: RouteConfig,
    pub speech: SpeechConfig,
    pub translator: TranslatorConfig,
    pub directions: DirectionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per container
    pub root: PathBuf,
    pub telemetry_container: String,
    pub custom_route_container: String,
    /// Blobs named with this prefix live in the custom route container
    pub custom_route_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            telemetry_container: "telemetry-data".to_string(),
            custom_route_container: "geojsonfiles".to_string(),
            custom_route_prefix: "customroute_".to_string(),
        }
    }
}

impl StorageConfig {
    /// Container a guidance blob is read from
    pub fn container_for(&self, blob_name: &str) -> &str {
        if blob_name.starts_with(&self.custom_route_prefix) {
            &self.custom_route_container
        } else {
            &self.telemetry_container
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GuidanceConfig {
    pub threshold_km: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            threshold_km: DEFAULT_THRESHOLD_KM,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RouteConfig {
    pub timestamp_policy: TimestampPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpeechConfig {
    pub region: String,
    pub voice: String,
    pub language: String,
    pub gender: String,
    pub output_format: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            region: "eastus".to_string(),
            voice: "es-ES-AlvaroNeural".to_string(),
            language: "es-ES".to_string(),
            gender: "Male".to_string(),
            output_format: "audio-16khz-32kbitrate-mono-mp3".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranslatorConfig {
    pub endpoint: String,
    pub region: String,
    pub target_language: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.cognitive.microsofttranslator.com".to_string(),
            region: "eastus".to_string(),
            target_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DirectionsConfig {
    pub endpoint: String,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://atlas.microsoft.com/route/directions/json".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
