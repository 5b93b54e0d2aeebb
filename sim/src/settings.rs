//! Run settings for the `sim` binary.
//!
//! Read from the JSON file named by `ARM_SAMPLER_CONFIG` when set, then
//! overridden field by field from the environment:
//! `ARM_SAMPLER_OUTPUT_DIR`, `ARM_SAMPLER_SEED`, `ARM_SAMPLER_TRIALS`,
//! `BRIDGE_URL`.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use arm_sampler::config::{unique_file_name, DriverConfig, ReplayConfig, SamplerConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::robot_config::ArmModel;

pub const CONFIG_ENV: &str = "ARM_SAMPLER_CONFIG";

#[derive(Debug)]
pub enum SettingsError {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SettingsError::Io(_, e) => Some(e),
            SettingsError::Json(e) => Some(e),
            SettingsError::Invalid(_) => None,
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SettingsError::Io(ref path, ref e) => write!(f, "Could not read {}: {}", path.display(), e),
            SettingsError::Json(ref e) => write!(f, "Invalid settings JSON: {}", e),
            SettingsError::Invalid(ref msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    /// WebSocket server streaming joint angles.
    pub url: String,
    /// Physics rate of the live loop (Hz).
    pub rate_hz: f64,
    /// Seconds between tool-position reports sent back to the server.
    pub report_interval_s: f64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
            rate_hz: 50.0,
            report_interval_s: 1.0,
        }
    }
}

impl BridgeSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(format!("Bridge URL {:?} must use ws:// or wss://.", self.url));
        }
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            return Err("Bridge rate must be greater than 0.".to_string());
        }
        if !(self.report_interval_s.is_finite() && self.report_interval_s > 0.0) {
            return Err("Bridge report interval must be greater than 0.".to_string());
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub arm: ArmModel,
    pub sampler: SamplerConfig,
    pub replay: ReplayConfig,
    pub driver: DriverConfig,
    pub bridge: BridgeSettings,
    /// Directory for generated files without an explicit path.
    pub output_dir: PathBuf,
    /// Where results go when the requested file cannot be written.
    /// Defaults to the system temp directory.
    pub fallback_dir: Option<PathBuf>,
    /// Fixed seed; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Dataset replayed by `validate` when none is given on the command line.
    pub dataset: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            arm: ArmModel::default(),
            sampler: SamplerConfig::default(),
            replay: ReplayConfig::default(),
            driver: DriverConfig::default(),
            bridge: BridgeSettings::default(),
            output_dir: PathBuf::from("."),
            fallback_dir: None,
            seed: None,
            dataset: None,
        }
    }
}

impl Settings {
    /// Settings file (if any) plus process environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        info!("Loaded settings from {}", path.display());
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply overrides from `lookup`; unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("ARM_SAMPLER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(seed) = lookup("ARM_SAMPLER_SEED") {
            match seed.parse::<u64>() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn!("Ignoring ARM_SAMPLER_SEED={:?}: not an integer", seed),
            }
        }
        if let Some(trials) = lookup("ARM_SAMPLER_TRIALS") {
            match trials.parse::<usize>() {
                Ok(trials) => self.sampler.trials = trials,
                Err(_) => warn!("Ignoring ARM_SAMPLER_TRIALS={:?}: not an integer", trials),
            }
        }
        if let Some(url) = lookup("BRIDGE_URL") {
            self.bridge.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.arm.validate().map_err(SettingsError::Invalid)?;
        self.sampler.validate().map_err(SettingsError::Invalid)?;
        self.replay.validate().map_err(SettingsError::Invalid)?;
        self.driver.validate().map_err(SettingsError::Invalid)?;
        self.bridge.validate().map_err(SettingsError::Invalid)?;
        Ok(())
    }

    pub fn generation_output(&self) -> PathBuf {
        self.sampler.resolve_output(&self.output_dir)
    }

    pub fn report_output(&self) -> PathBuf {
        self.replay.resolve_output(&self.output_dir)
    }

    /// Fresh file name in the fallback directory.
    pub fn fallback_output(&self, prefix: &str) -> PathBuf {
        self.fallback_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(unique_file_name(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let settings = Settings::from_json(r#"{"seed": 7, "sampler": {"trials": 12}}"#).unwrap();
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.sampler.trials, 12);
        assert_eq!(settings.sampler.window_size, 5);
        assert_eq!(settings.arm, ArmModel::four_axis());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ARM_SAMPLER_OUTPUT_DIR", "/tmp/runs"),
            ("ARM_SAMPLER_SEED", "99"),
            ("ARM_SAMPLER_TRIALS", "not-a-number"),
            ("BRIDGE_URL", "ws://10.0.0.4:9000"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.output_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.sampler.trials, 100);
        assert_eq!(settings.bridge.url, "ws://10.0.0.4:9000");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_bridge_url_needs_websocket_scheme() {
        let mut settings = Settings::default();
        settings.bridge.url = "127.0.0.1:8765".to_string();
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_fallback_output_defaults_to_temp_dir() {
        let settings = Settings::default();
        assert!(settings.fallback_output("joint_data").starts_with(std::env::temp_dir()));
        let settings = Settings {
            fallback_dir: Some(PathBuf::from("/spare")),
            ..Default::default()
        };
        assert!(settings.fallback_output("test_result").starts_with("/spare"));
    }

    #[test]
    fn test_generated_names_land_in_output_dir() {
        let settings = Settings {
            output_dir: PathBuf::from("/data"),
            ..Default::default()
        };
        let path = settings.generation_output();
        assert!(path.starts_with("/data"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("joint_data_") && name.ends_with(".csv"));
        assert!(settings
            .report_output()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("test_result_"));
    }
}
