// External imports
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::{Int, Shape, Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use log::debug;
use rand::seq::SliceRandom;

// Internal imports
use crate::error::ForecastError;
use crate::model::SeriesNet;

/// Backend used for gradient-based training.
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Resolved hyperparameters for one training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

/// # Train a Forecasting Network
///
/// Runs Adam over mean squared error for the configured number of epochs.
/// Window order is reshuffled every epoch and windows are consumed in
/// fixed-size batches; a trailing batch that cannot be filled is dropped.
///
/// Returns the trained model together with the final epoch's average loss.
///
/// # Errors
///
/// * `TrainingFailed` when the run cannot produce a usable model: zero
///   epochs or batch size, fewer windows than one batch, or a non-finite
///   epoch loss.
pub fn train_network<M>(
    mut model: M,
    inputs: Tensor<TrainingBackend, 3>,
    labels: Tensor<TrainingBackend, 2>,
    config: &TrainingConfig,
) -> Result<(M, f64), ForecastError>
where
    M: SeriesNet<TrainingBackend> + AutodiffModule<TrainingBackend>,
{
    if config.epochs == 0 || config.batch_size == 0 {
        return Err(ForecastError::TrainingFailed(format!(
            "epochs and batch size must be positive (epochs={}, batch_size={})",
            config.epochs, config.batch_size
        )));
    }

    let num_windows = inputs.dims()[0];
    if num_windows < config.batch_size {
        return Err(ForecastError::TrainingFailed(format!(
            "{} windows cannot fill one batch of {}",
            num_windows, config.batch_size
        )));
    }

    let device = inputs.device();
    let mut optimizer = AdamConfig::new().init();
    let mut indices: Vec<usize> = (0..num_windows).collect();
    let mut final_loss = 0.0;

    for epoch in 1..=config.epochs {
        indices.shuffle(&mut rand::rng());

        let mut epoch_loss = 0.0;
        let mut num_batches = 0usize;

        for batch in indices.chunks_exact(config.batch_size) {
            let batch_indices: Vec<i32> = batch.iter().map(|&i| i as i32).collect();
            let indices_data = TensorData::new(batch_indices, Shape::new([config.batch_size]));
            let batch_selector =
                Tensor::<TrainingBackend, 1, Int>::from_data(indices_data, &device);

            let batch_inputs = inputs.clone().select(0, batch_selector.clone());
            let batch_labels = labels.clone().select(0, batch_selector);

            let predictions = model.forward(batch_inputs);
            let diff = predictions - batch_labels;
            let loss = (diff.clone() * diff).mean();
            epoch_loss += loss.clone().into_scalar() as f64;
            num_batches += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let avg_loss = epoch_loss / num_batches as f64;
        if !avg_loss.is_finite() {
            return Err(ForecastError::TrainingFailed(format!(
                "loss became non-finite at epoch {}/{}",
                epoch, config.epochs
            )));
        }

        debug!(
            "epoch {}/{} - avg loss: {:.6}",
            epoch, config.epochs, avg_loss
        );
        final_loss = avg_loss;
    }

    Ok((model, final_loss))
}
