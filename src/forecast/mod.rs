// Sliding-window preparation, training, and inference for per-metric
// forecasting models.

pub mod predictor;
pub mod trainer;
pub mod windowing;

// External imports
use burn_ndarray::{NdArray, NdArrayDevice};

// Internal imports
use crate::constants;
use crate::error::ForecastError;
use crate::model::{Architecture, TimeSeriesGru, TimeSeriesLstm};
use crate::util::model_store::{ArtifactMetadata, ModelStore};
use crate::util::normalizer::MinMaxNormalizer;

pub use trainer::TrainingBackend;

/// Backend used for inference on stored models.
pub type InferenceBackend = NdArray<f32>;

/// # Forecast Configuration
///
/// Window geometry, architecture, and training hyperparameters the
/// service applies to every metric key. Built once at startup and passed
/// into [`Forecaster`] construction.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Trailing samples per input window
    pub look_back: usize,

    /// Forecast horizon in samples
    pub look_forward: usize,

    /// Recurrent cell used for newly trained models
    pub architecture: Architecture,

    /// Dimension of the recurrent hidden state
    pub hidden_size: usize,

    /// Number of stacked recurrent layers
    pub num_layers: usize,

    /// Training epochs per run
    pub epochs: usize,

    /// Windows per optimizer step
    pub batch_size: usize,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Dropout probability between stacked layers
    pub dropout: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            look_back: constants::LOOK_BACK,
            look_forward: constants::LOOK_FORWARD,
            architecture: Architecture::default(),
            hidden_size: constants::HIDDEN_SIZE,
            num_layers: constants::NUM_LAYERS,
            epochs: constants::EPOCHS,
            batch_size: constants::BATCH_SIZE,
            learning_rate: constants::LEARNING_RATE,
            dropout: constants::DROPOUT,
        }
    }
}

/// Per-request training hyperparameter overrides. Fields left unset fall
/// back to the service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainOverrides {
    pub epochs: Option<usize>,
    pub n_layers: Option<usize>,
    pub batch_size: Option<usize>,
}

/// # Forecaster
///
/// Owns the training and prediction paths for every metric key. Training
/// fits a fresh network on a windowed history and persists it; prediction
/// restores the persisted network and forecasts from the most recent
/// window.
#[derive(Debug)]
pub struct Forecaster {
    config: ForecastConfig,
    store: ModelStore,
}

impl Forecaster {
    pub fn new(config: ForecastConfig, store: ModelStore) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// # Train a Model for One Key
    ///
    /// Windows the raw history, fits a new network of the configured
    /// architecture, and overwrites any previous artifact for the key.
    /// Training runs on raw values; scaling is applied per prediction
    /// request instead.
    ///
    /// Returns the final epoch's average loss.
    pub fn train(
        &self,
        key: &str,
        series: &[f64],
        overrides: &TrainOverrides,
    ) -> Result<f64, ForecastError> {
        let epochs = overrides.epochs.unwrap_or(self.config.epochs);
        let num_layers = overrides.n_layers.unwrap_or(self.config.num_layers);
        let batch_size = overrides.batch_size.unwrap_or(self.config.batch_size);

        let windowed = windowing::prepare(series, self.config.look_back, self.config.look_forward)?;
        if windowed.len() < batch_size {
            // One full batch is the floor for a training run.
            return Err(ForecastError::InsufficientHistory {
                got: series.len(),
                need: self.config.look_back + self.config.look_forward + batch_size - 1,
            });
        }

        let device = NdArrayDevice::Cpu;
        let (inputs, labels) = windowed.to_tensors::<TrainingBackend>(&device);
        let training = trainer::TrainingConfig {
            epochs,
            batch_size,
            learning_rate: self.config.learning_rate,
        };

        log::info!(
            "training {} model for '{}': {} windows, {} epochs, batch size {}",
            self.config.architecture,
            key,
            windowed.len(),
            epochs,
            batch_size
        );

        let metadata = ArtifactMetadata::new(
            self.config.architecture,
            1,
            self.config.hidden_size,
            self.config.look_forward,
            num_layers,
            self.config.dropout,
            self.config.look_back,
            self.config.look_forward,
        );

        let loss = match self.config.architecture {
            Architecture::Gru => {
                let model = TimeSeriesGru::<TrainingBackend>::new(
                    1,
                    self.config.hidden_size,
                    self.config.look_forward,
                    num_layers,
                    self.config.dropout,
                    &device,
                );
                let (model, loss) = trainer::train_network(model, inputs, labels, &training)?;
                self.store.save(key, model, &metadata)?;
                loss
            }
            Architecture::Lstm => {
                let model = TimeSeriesLstm::<TrainingBackend>::new(
                    1,
                    self.config.hidden_size,
                    self.config.look_forward,
                    num_layers,
                    self.config.dropout,
                    &device,
                );
                let (model, loss) = trainer::train_network(model, inputs, labels, &training)?;
                self.store.save(key, model, &metadata)?;
                loss
            }
        };

        log::info!("trained '{}': final avg loss {:.6}", key, loss);
        Ok(loss)
    }

    /// # Predict From a History Tail
    ///
    /// Scales the history into [0, 1], feeds the most recent `look_back`
    /// samples through the stored model for the key, and maps the forecast
    /// back to the original scale.
    pub fn predict(&self, key: &str, series: &[f64]) -> Result<Vec<f64>, ForecastError> {
        if series.len() < self.config.look_back {
            return Err(ForecastError::InsufficientHistory {
                got: series.len(),
                need: self.config.look_back,
            });
        }

        let normalizer = MinMaxNormalizer::fit(series);
        let scaled = normalizer.normalize(series);
        let window = &scaled[scaled.len() - self.config.look_back..];

        let metadata = self.store.load_metadata(key)?;
        let device = NdArrayDevice::Cpu;

        let forecast = match metadata.architecture {
            Architecture::Gru => {
                let model = TimeSeriesGru::<InferenceBackend>::new(
                    metadata.input_size,
                    metadata.hidden_size,
                    metadata.output_size,
                    metadata.num_layers,
                    metadata.dropout,
                    &device,
                );
                let model = self.store.load(key, model, &device)?;
                predictor::forecast_window(&model, window, &device)?
            }
            Architecture::Lstm => {
                let model = TimeSeriesLstm::<InferenceBackend>::new(
                    metadata.input_size,
                    metadata.hidden_size,
                    metadata.output_size,
                    metadata.num_layers,
                    metadata.dropout,
                    &device,
                );
                let model = self.store.load(key, model, &device)?;
                predictor::forecast_window(&model, window, &device)?
            }
        };

        Ok(normalizer.denormalize(&forecast))
    }
}
