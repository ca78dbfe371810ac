// External imports
use thiserror::Error;

/// Errors surfaced by the forecasting service.
///
/// Every variant that reaches the request router is folded into the `error`
/// field of the wire response; none of them abort the serving process.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The series is too short for the configured window sizes.
    #[error("insufficient history: got {got} samples, need at least {need}")]
    InsufficientHistory { got: usize, need: usize },

    /// An internal windowing or tensor-shape invariant was violated.
    #[error("data shape error: {0}")]
    DataShape(String),

    /// Prediction was requested for a key that was never trained.
    #[error("no trained model for key '{0}'")]
    ModelNotFound(String),

    /// The numeric backend failed while fitting a model.
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// A training result could not be delivered to the callback address.
    #[error("delivery to callback failed: {0}")]
    Delivery(String),

    /// The request payload was malformed or failed validation.
    #[error("bad request: {0}")]
    Decode(String),

    /// Reading or writing a model artifact failed outside the not-found case.
    #[error("model storage error: {0}")]
    Storage(String),
}
