// External imports
use log::warn;

// Internal imports
use super::protocol::{observation_values, ForecastRequest, ForecastResponse, MetricObservation};
use crate::error::ForecastError;
use crate::forecast::{Forecaster, TrainOverrides};

/// Which operations one inbound request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operations {
    Predict,
    Train,
    Both,
}

impl Operations {
    pub fn includes_predict(self) -> bool {
        matches!(self, Operations::Predict | Operations::Both)
    }

    pub fn includes_train(self) -> bool {
        matches!(self, Operations::Train | Operations::Both)
    }
}

/// Classify a request by which histories are present and non-empty.
/// `None` means the request asked for nothing at all.
pub fn classify(request: &ForecastRequest) -> Option<Operations> {
    match (request.wants_train(), request.wants_predict()) {
        (false, false) => None,
        (true, false) => Some(Operations::Train),
        (false, true) => Some(Operations::Predict),
        (true, true) => Some(Operations::Both),
    }
}

/// A validated training run plus the socket path its result is owed to.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainJob {
    pub key: String,
    pub series: Vec<f64>,
    pub overrides: TrainOverrides,
    pub callback_address: String,
}

/// # Dispatch
///
/// What the transport does with one decoded request. The two fields are
/// the two response-delivery strategies: `reply` goes back on the inbound
/// connection before it is half-closed, `train` runs afterwards and its
/// result is dialed out to the job's callback address.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub reply: Option<ForecastResponse>,
    pub train: Option<TrainJob>,
}

/// # Request Router
///
/// Validates decoded requests, runs the prediction path inline, and hands
/// training work back to the transport as [`TrainJob`]s. Every domain
/// failure is folded into a [`ForecastResponse`] with its `error` field
/// set; the router itself never fails.
#[derive(Debug)]
pub struct RequestRouter {
    forecaster: Forecaster,
}

impl RequestRouter {
    pub fn new(forecaster: Forecaster) -> Self {
        Self { forecaster }
    }

    /// Decide what to do with one request.
    pub fn dispatch(&self, request: &ForecastRequest) -> Dispatch {
        let operations = match classify(request) {
            Some(operations) => operations,
            None => {
                let err = ForecastError::Decode(
                    "request carries neither train_history nor predict_history".to_string(),
                );
                return Dispatch {
                    reply: Some(ForecastResponse::failed(request.key.as_deref(), &err)),
                    train: None,
                };
            }
        };

        let key = match validate(request, operations) {
            Ok(key) => key,
            Err(err) => {
                warn!("rejected request: {}", err);
                return Dispatch {
                    reply: Some(ForecastResponse::failed(request.key.as_deref(), &err)),
                    train: None,
                };
            }
        };

        let mut dispatch = Dispatch::default();

        if operations.includes_predict() {
            let series = history_values(request.predict_history.as_deref());
            dispatch.reply = Some(match self.forecaster.predict(&key, &series) {
                Ok(prediction) => ForecastResponse::predicted(&key, prediction),
                Err(err) => {
                    warn!("prediction for '{}' failed: {}", key, err);
                    ForecastResponse::failed(Some(&key), &err)
                }
            });
        }

        if operations.includes_train() {
            // validate() already required the address for any training request.
            if let Some(address) = request.resp_recv_address.as_deref() {
                dispatch.train = Some(TrainJob {
                    key,
                    series: history_values(request.train_history.as_deref()),
                    overrides: request.overrides(),
                    callback_address: address.to_string(),
                });
            }
        }

        dispatch
    }

    /// Run a training job to completion and build the callback response.
    pub fn run_train(&self, job: &TrainJob) -> ForecastResponse {
        match self.forecaster.train(&job.key, &job.series, &job.overrides) {
            Ok(loss) => ForecastResponse::trained(&job.key, loss),
            Err(err) => {
                warn!("training for '{}' failed: {}", job.key, err);
                ForecastResponse::failed(Some(&job.key), &err)
            }
        }
    }
}

fn history_values(history: Option<&[MetricObservation]>) -> Vec<f64> {
    history.map(observation_values).unwrap_or_default()
}

/// Check everything that can be rejected before any model work starts.
fn validate(request: &ForecastRequest, operations: Operations) -> Result<String, ForecastError> {
    let key = request.key.as_deref().unwrap_or_default();
    if key.is_empty() {
        return Err(ForecastError::Decode("missing metric key".to_string()));
    }
    // Keys become file stems under the model directory.
    if key.contains('/') || key.contains("..") {
        return Err(ForecastError::Decode(format!(
            "metric key '{}' must be a plain file stem",
            key
        )));
    }

    if operations.includes_train() {
        check_finite("train_history", request.train_history.as_deref())?;
    }
    if operations.includes_predict() {
        check_finite("predict_history", request.predict_history.as_deref())?;
    }

    for (name, value) in [
        ("epochs", request.epochs),
        ("n_layers", request.n_layers),
        ("batch_size", request.batch_size),
    ] {
        if value == Some(0) {
            return Err(ForecastError::Decode(format!(
                "{} override must be at least 1",
                name
            )));
        }
    }

    // Training results are only ever delivered to the callback socket.
    if operations.includes_train() && request.resp_recv_address.is_none() {
        return Err(ForecastError::Decode(
            "resp_recv_address is required for training requests".to_string(),
        ));
    }

    Ok(key.to_string())
}

fn check_finite(
    name: &str,
    history: Option<&[MetricObservation]>,
) -> Result<(), ForecastError> {
    let finite = history
        .unwrap_or_default()
        .iter()
        .all(|o| o.value.is_finite());
    if finite {
        Ok(())
    } else {
        Err(ForecastError::Decode(format!(
            "{} contains a non-finite value",
            name
        )))
    }
}
