//! Saving and loading trained networks.
//!
//! A checkpoint is a directory holding three files:
//!
//! - `deepar.mpk`: weights, written by Burn's named MessagePack recorder
//! - `config.json`: the [`DeepARConfig`] the weights were built from
//! - `properties.json`: string properties such as `RMSSE` and `Loss`
//!
//! # Example
//!
//! ```rust,ignore
//! use deepar_models::checkpoint::{load_checkpoint, save_checkpoint, ModelProperties};
//!
//! let properties = ModelProperties::new()
//!     .with_epoch(3)
//!     .with_metric("RMSSE", 0.84211)
//!     .with_metric("Loss", 4.12345);
//! save_checkpoint("output/model", &config, &network, &properties)?;
//!
//! let loaded = load_checkpoint::<NdArray>("output/model", &device)?;
//! let predictor = loaded.into_inference();
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

use crate::deepar::{DeepARConfig, DeepARNetwork, DeepARPredictionNetwork};

/// Weights file stem; the recorder appends `.mpk`.
pub const WEIGHTS_STEM: &str = "deepar";
/// Network configuration file.
pub const CONFIG_FILE: &str = "config.json";
/// Properties file.
pub const PROPERTIES_FILE: &str = "properties.json";

/// String properties stored next to the weights.
///
/// Metric values are formatted with five decimals, so a checkpoint saved
/// with an RMSSE of 0.8421137 reads back as `"0.84211"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelProperties {
    /// Epoch (0-indexed) the weights come from.
    pub epoch: Option<usize>,
    /// Named properties.
    pub properties: BTreeMap<String, String>,
}

impl ModelProperties {
    /// Create empty properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Set a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a metric property, formatted `%.5f`.
    #[must_use]
    pub fn with_metric(self, key: impl Into<String>, value: f32) -> Self {
        self.with_property(key, format!("{value:.5}"))
    }

    /// Get a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Save to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path.as_ref(), self)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }
}

/// A network restored from a checkpoint directory.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    /// Configuration the weights were built from.
    pub config: DeepARConfig,
    /// Restored module.
    pub network: DeepARNetwork<B>,
    /// Stored properties.
    pub properties: ModelProperties,
}

impl<B: Backend> LoadedModel<B> {
    /// Wrap the restored weights as the prediction variant.
    #[must_use]
    pub fn into_inference(self) -> DeepARPredictionNetwork<B> {
        DeepARPredictionNetwork::from_parts(self.config, self.network)
    }
}

/// Write a checkpoint into `dir`, replacing any previous one.
///
/// # Errors
///
/// Returns [`CheckpointError::Save`] if any file cannot be written.
pub fn save_checkpoint<B: Backend>(
    dir: impl AsRef<Path>,
    config: &DeepARConfig,
    network: &DeepARNetwork<B>,
    properties: &ModelProperties,
) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .map_err(|e| CheckpointError::Save(format!("{}: {}", dir.display(), e)))?;

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    Recorder::<B>::record(&recorder, network.clone().into_record(), dir.join(WEIGHTS_STEM))
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    write_json(&dir.join(CONFIG_FILE), config)?;
    properties.save(dir.join(PROPERTIES_FILE))?;

    tracing::debug!("Saved checkpoint to {}", dir.display());
    Ok(())
}

/// Restore a checkpoint written by [`save_checkpoint`].
///
/// # Errors
///
/// Returns [`CheckpointError::NotFound`] if `dir` holds no weights and
/// [`CheckpointError::Load`] if a file is unreadable or inconsistent.
pub fn load_checkpoint<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<LoadedModel<B>> {
    let dir = dir.as_ref();
    let weights = dir.join(WEIGHTS_STEM);
    if !weights.with_extension("mpk").is_file() {
        return Err(CheckpointError::NotFound(dir.to_path_buf()));
    }

    let config: DeepARConfig = read_json(&dir.join(CONFIG_FILE))?;
    let network = config
        .init::<B>(device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = Recorder::<B>::load(&recorder, weights, device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    let properties = ModelProperties::load(dir.join(PROPERTIES_FILE))?;

    Ok(LoadedModel {
        config,
        network: network.load_record(record),
        properties,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| CheckpointError::Save(e.to_string()))?;
    std::fs::write(path, json)
        .map_err(|e| CheckpointError::Save(format!("{}: {}", path.display(), e)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CheckpointError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CheckpointError::Load(format!("{}: {}", path.display(), e)))
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// No checkpoint at the given location.
    #[error("No checkpoint found in {}", .0.display())]
    NotFound(PathBuf),
}

impl CheckpointError {
    /// Whether a model could not be loaded.
    #[must_use]
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use deepar_core::Frequency;

    type TestBackend = NdArray;

    fn config() -> DeepARConfig {
        DeepARConfig::new(Frequency::Monthly, 12, vec![112]).with_hidden_size(8)
    }

    #[test]
    fn test_metric_formatting() {
        let props = ModelProperties::new()
            .with_metric("RMSSE", 0.842_113_7)
            .with_metric("Loss", 4.0);
        assert_eq!(props.get("RMSSE"), Some("0.84211"));
        assert_eq!(props.get("Loss"), Some("4.00000"));
        assert_eq!(props.get("MASE"), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let network = config().init::<TestBackend>(&device).unwrap();
        let props = ModelProperties::new().with_epoch(2).with_metric("RMSSE", 1.5);

        save_checkpoint(dir.path(), &config(), &network, &props).unwrap();
        assert!(dir.path().join("deepar.mpk").is_file());

        let loaded = load_checkpoint::<TestBackend>(dir.path(), &device).unwrap();
        assert_eq!(loaded.config, config());
        assert_eq!(loaded.properties, props);
    }

    #[test]
    fn test_missing_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_checkpoint::<TestBackend>(dir.path().join("nope"), &Default::default())
            .unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
        assert!(err.is_load());
    }

    #[test]
    fn test_corrupt_config_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let network = config().init::<TestBackend>(&device).unwrap();
        save_checkpoint(dir.path(), &config(), &network, &ModelProperties::new()).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();

        let err = load_checkpoint::<TestBackend>(dir.path(), &device).unwrap_err();
        assert!(matches!(err, CheckpointError::Load(_)));
    }
}
