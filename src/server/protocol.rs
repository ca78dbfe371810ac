// External imports
use serde::{Deserialize, Serialize};

// Internal imports
use crate::error::ForecastError;
use crate::forecast::TrainOverrides;

/// One sample of a metric history as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricObservation {
    /// Observed value at this position in the series
    pub value: f64,

    /// Metric label the sample belongs to; informational only, the
    /// request-level key decides which model is touched
    #[serde(default)]
    pub metric: String,
}

/// # Forecast Request
///
/// One JSON object per connection, newline terminated. Every field is
/// optional on the wire; which operations run is decided by which
/// histories are present and non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Metric key naming the model to train or query
    #[serde(default)]
    pub key: Option<String>,

    /// History to fit a new model on; presence requests training
    #[serde(default)]
    pub train_history: Option<Vec<MetricObservation>>,

    /// History to forecast from; presence requests a prediction
    #[serde(default)]
    pub predict_history: Option<Vec<MetricObservation>>,

    /// Socket path the training response is delivered to
    #[serde(default)]
    pub resp_recv_address: Option<String>,

    /// Optional per-request hyperparameter overrides
    #[serde(default)]
    pub epochs: Option<usize>,
    #[serde(default)]
    pub n_layers: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl ForecastRequest {
    /// Training is requested by a present, non-empty train history.
    pub fn wants_train(&self) -> bool {
        self.train_history.as_ref().is_some_and(|h| !h.is_empty())
    }

    /// Prediction is requested by a present, non-empty predict history.
    pub fn wants_predict(&self) -> bool {
        self.predict_history.as_ref().is_some_and(|h| !h.is_empty())
    }

    pub fn overrides(&self) -> TrainOverrides {
        TrainOverrides {
            epochs: self.epochs,
            n_layers: self.n_layers,
            batch_size: self.batch_size,
        }
    }
}

/// Strip observations down to the raw value series the forecaster consumes.
pub fn observation_values(history: &[MetricObservation]) -> Vec<f64> {
    history.iter().map(|o| o.value).collect()
}

/// # Forecast Response
///
/// Sent back on the inbound connection for predictions and dialed out to
/// `resp_recv_address` for training results. Unused fields are serialized
/// as explicit nulls so callers see a stable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    /// Whether the key has a usable trained model
    pub trained: bool,

    /// Key the response refers to
    pub key: Option<String>,

    /// Forecast horizon values, prediction responses only
    pub prediction: Option<Vec<f64>>,

    /// Final epoch average loss, training responses only
    pub loss: Option<f64>,

    /// Empty on success, human-readable failure otherwise
    pub error: String,
}

impl ForecastResponse {
    pub fn predicted(key: &str, prediction: Vec<f64>) -> Self {
        Self {
            trained: true,
            key: Some(key.to_string()),
            prediction: Some(prediction),
            loss: None,
            error: String::new(),
        }
    }

    pub fn trained(key: &str, loss: f64) -> Self {
        Self {
            trained: true,
            key: Some(key.to_string()),
            prediction: None,
            loss: Some(loss),
            error: String::new(),
        }
    }

    pub fn failed(key: Option<&str>, error: &ForecastError) -> Self {
        Self {
            trained: false,
            key: key.map(str::to_string),
            prediction: None,
            loss: None,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}
