// External imports
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Internal imports
use crate::error::ForecastError;
use crate::model::Architecture;

/// # Model Artifact Metadata
///
/// Saved alongside each serialized parameter set so the network can be
/// rebuilt with the exact architecture it was trained with before the
/// weights are loaded back in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactMetadata {
    /// Crate version that produced the artifact
    pub version: String,

    /// Unix timestamp when the artifact was saved
    pub timestamp: u64,

    /// Which recurrent cell the artifact holds weights for
    pub architecture: Architecture,

    /// Number of input features per time step
    pub input_size: usize,

    /// Dimension of the recurrent hidden state
    pub hidden_size: usize,

    /// Number of output features (the forecast horizon)
    pub output_size: usize,

    /// Number of stacked recurrent layers
    pub num_layers: usize,

    /// Dropout probability used during training
    pub dropout: f64,

    /// Input window length the model was trained on
    pub look_back: usize,

    /// Forecast horizon the model was trained on
    pub look_forward: usize,
}

impl ArtifactMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        architecture: Architecture,
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        num_layers: usize,
        dropout: f64,
        look_back: usize,
        look_forward: usize,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Local::now().timestamp() as u64,
            architecture,
            input_size,
            hidden_size,
            output_size,
            num_layers,
            dropout,
            look_back,
            look_forward,
        }
    }
}

/// # Model Store
///
/// One artifact per metric key under a flat directory:
///
/// * `<model_dir>/<key>.bin` - serialized network parameters
/// * `<model_dir>/<key>.meta.json` - [`ArtifactMetadata`] sidecar
///
/// Saving the same key again overwrites both files, so retraining
/// replaces the previous artifact in place.
#[derive(Debug)]
pub struct ModelStore {
    model_dir: PathBuf,
}

impl ModelStore {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Whether a complete artifact (weights and metadata) exists for a key.
    pub fn contains(&self, key: &str) -> bool {
        self.weights_path(key).exists() && self.metadata_path(key).exists()
    }

    // Keys may contain dots, so the extension is appended rather than set.
    fn weights_path(&self, key: &str) -> PathBuf {
        self.model_dir.join(format!("{}.bin", key))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.model_dir.join(format!("{}.meta.json", key))
    }

    /// Persist a trained model and its metadata sidecar for a key.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        key: &str,
        model: M,
        metadata: &ArtifactMetadata,
    ) -> Result<(), ForecastError> {
        fs::create_dir_all(&self.model_dir).map_err(|e| {
            ForecastError::Storage(format!(
                "failed to create model directory {}: {}",
                self.model_dir.display(),
                e
            ))
        })?;

        let weights_path = self.weights_path(key);
        model
            .save_file::<BinFileRecorder<FullPrecisionSettings>, _>(
                &weights_path,
                &Default::default(),
            )
            .map_err(|e| {
                ForecastError::Storage(format!(
                    "failed to save weights to {}: {}",
                    weights_path.display(),
                    e
                ))
            })?;

        let metadata_json = serde_json::to_string_pretty(metadata)
            .map_err(|e| ForecastError::Storage(format!("failed to encode metadata: {}", e)))?;
        let metadata_path = self.metadata_path(key);
        fs::write(&metadata_path, metadata_json).map_err(|e| {
            ForecastError::Storage(format!(
                "failed to write metadata to {}: {}",
                metadata_path.display(),
                e
            ))
        })?;

        log::info!(
            "saved model artifact for '{}' at {}",
            key,
            weights_path.display()
        );
        Ok(())
    }

    /// Read the metadata sidecar for a key.
    ///
    /// A key with no artifact (or a half-written one missing either file)
    /// reports `ModelNotFound`.
    pub fn load_metadata(&self, key: &str) -> Result<ArtifactMetadata, ForecastError> {
        if !self.contains(key) {
            return Err(ForecastError::ModelNotFound(key.to_string()));
        }

        let metadata_path = self.metadata_path(key);
        let metadata_json = fs::read_to_string(&metadata_path).map_err(|e| {
            ForecastError::Storage(format!(
                "failed to read metadata from {}: {}",
                metadata_path.display(),
                e
            ))
        })?;
        serde_json::from_str(&metadata_json).map_err(|e| {
            ForecastError::Storage(format!(
                "failed to decode metadata from {}: {}",
                metadata_path.display(),
                e
            ))
        })
    }

    /// Load saved weights into a freshly constructed model.
    ///
    /// The caller rebuilds the network from [`ArtifactMetadata`] first so
    /// the parameter shapes line up with the recorded ones.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        key: &str,
        model: M,
        device: &B::Device,
    ) -> Result<M, ForecastError> {
        let weights_path = self.weights_path(key);
        if !weights_path.exists() {
            return Err(ForecastError::ModelNotFound(key.to_string()));
        }

        model
            .load_file::<BinFileRecorder<FullPrecisionSettings>, _>(
                &weights_path,
                &Default::default(),
                device,
            )
            .map_err(|e| {
                ForecastError::Storage(format!(
                    "failed to load weights from {}: {}",
                    weights_path.display(),
                    e
                ))
            })
    }
}
