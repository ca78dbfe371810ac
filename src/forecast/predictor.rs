// External imports
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};

// Internal imports
use crate::error::ForecastError;
use crate::model::SeriesNet;

/// # Forecast From a Single Window
///
/// Packs the most recent `look_back` observations into a `[1, len, 1]`
/// tensor, runs one forward pass, and returns the forecast horizon as
/// plain values. The caller owns normalization on both sides.
pub fn forecast_window<B, M>(
    model: &M,
    window: &[f64],
    device: &B::Device,
) -> Result<Vec<f64>, ForecastError>
where
    B: Backend,
    M: SeriesNet<B>,
{
    if window.is_empty() {
        return Err(ForecastError::DataShape(
            "cannot forecast from an empty window".to_string(),
        ));
    }

    let buffer: Vec<f32> = window.iter().map(|&v| v as f32).collect();
    let input = Tensor::<B, 1>::from_floats(buffer.as_slice(), device)
        .reshape(Shape::new([1, window.len(), 1]));

    let output = model.forward(input);
    let output_data = output.into_data().convert::<f32>();
    let values = output_data.as_slice::<f32>().map_err(|e| {
        ForecastError::DataShape(format!("failed to extract forecast values: {:?}", e))
    })?;

    Ok(values.iter().map(|&v| v as f64).collect())
}
