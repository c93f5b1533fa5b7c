use crate::recording::SENSOR_CHANNELS;
use crate::window::{BoundaryRule, WindowError, WindowSpec};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "actirank.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActirankConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_rate")]
    pub rate_hz: f64,
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Stride between training windows (half a window by default).
    #[serde(default = "default_training_step")]
    pub training_step: usize,
    /// Stride between detection windows. Unset means one full window.
    #[serde(default)]
    pub inference_step: Option<usize>,
    #[serde(default)]
    pub boundary: BoundaryRule,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate(),
            channels: default_channels(),
            window_size: default_window_size(),
            training_step: default_training_step(),
            inference_step: None,
            boundary: BoundaryRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest recording accepted for detection, in samples.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Only the first `max_files` recordings (sorted by name) are used.
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            max_files: None,
            extension: default_extension(),
        }
    }
}

// Defaults
fn default_rate() -> f64 {
    50.0
}
fn default_channels() -> usize {
    SENSOR_CHANNELS
}
fn default_window_size() -> usize {
    128
}
fn default_training_step() -> usize {
    64
}
fn default_model_path() -> PathBuf {
    PathBuf::from("model").join("classifier.json")
}
fn default_max_samples() -> usize {
    2_000_000
}
fn default_test_fraction() -> f64 {
    0.2
}
fn default_seed() -> u64 {
    42
}
fn default_extension() -> String {
    "log".to_string()
}

impl SamplingConfig {
    pub fn inference_window(&self) -> Result<WindowSpec, WindowError> {
        let step = self.inference_step.unwrap_or(self.window_size);
        WindowSpec::new(self.window_size, step, self.boundary)
    }

    pub fn training_window(&self) -> Result<WindowSpec, WindowError> {
        WindowSpec::new(self.window_size, self.training_step, self.boundary)
    }
}

impl ActirankConfig {
    /// Read `path` if it exists, otherwise return defaults. Relative model
    /// paths are kept as written; they resolve against the working
    /// directory.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: ActirankConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        if !(s.rate_hz.is_finite() && s.rate_hz > 0.0) {
            bail!("sampling.rate_hz must be positive, got {}", s.rate_hz);
        }
        if s.channels == 0 {
            bail!("sampling.channels must be positive");
        }
        s.inference_window()?;
        s.training_window()?;
        if s.training_step > s.window_size {
            bail!(
                "sampling.training_step ({}) exceeds window_size ({})",
                s.training_step,
                s.window_size
            );
        }
        let t = &self.training;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            bail!(
                "training.test_fraction must be in (0, 1), got {}",
                t.test_fraction
            );
        }
        if self.limits.max_samples == 0 {
            bail!("limits.max_samples must be positive");
        }
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ActirankConfig::default();
        assert_eq!(config.sampling.rate_hz, 50.0);
        assert_eq!(config.sampling.window_size, 128);
        assert_eq!(config.sampling.training_step, 64);
        assert_eq!(config.sampling.channels, 23);
        assert_eq!(config.sampling.boundary, BoundaryRule::Exclusive);
        let spec = config.sampling.inference_window().unwrap();
        assert_eq!(spec.step, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ActirankConfig::from_toml(
            r#"
            [sampling]
            boundary = "inclusive"

            [model]
            path = "/srv/models/har.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.sampling.boundary, BoundaryRule::Inclusive);
        assert_eq!(config.sampling.window_size, 128);
        assert_eq!(config.model.path, PathBuf::from("/srv/models/har.json"));
        assert_eq!(config.training.seed, 42);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ActirankConfig::from_toml("[sampling]\nwindow_size = 0\n").is_err());
        assert!(ActirankConfig::from_toml("[sampling]\nrate_hz = 0.0\n").is_err());
        assert!(ActirankConfig::from_toml("[sampling]\ntraining_step = 200\n").is_err());
        assert!(ActirankConfig::from_toml("[training]\ntest_fraction = 1.0\n").is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ActirankConfig::load_or_default(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, ActirankConfig::default());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = ActirankConfig::default();
        config.sampling.inference_step = Some(64);
        config.training.max_files = Some(3);
        config.persist(&path).unwrap();

        let loaded = ActirankConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
