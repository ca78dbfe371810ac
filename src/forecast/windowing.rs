// External imports
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor};

// Internal imports
use crate::error::ForecastError;

/// One supervised training example: `look_back` consecutive observations
/// paired with the `look_forward` observations that followed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub input: Vec<f64>,
    pub label: Vec<f64>,
}

/// An ordered set of sliding windows cut from a single metric history,
/// ready to be packed into training tensors.
#[derive(Debug, Clone)]
pub struct WindowedSeries {
    windows: Vec<Window>,
    look_back: usize,
    look_forward: usize,
}

impl WindowedSeries {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn look_back(&self) -> usize {
        self.look_back
    }

    pub fn look_forward(&self) -> usize {
        self.look_forward
    }

    /// # Pack Windows Into Tensors
    ///
    /// Flattens the windows into contiguous f32 buffers and reshapes them
    /// into the shapes the recurrent networks consume:
    ///
    /// * inputs: `[num_windows, look_back, 1]` (one feature per time step)
    /// * labels: `[num_windows, look_forward]`
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let num_windows = self.windows.len();

        let mut input_buffer: Vec<f32> = Vec::with_capacity(num_windows * self.look_back);
        let mut label_buffer: Vec<f32> = Vec::with_capacity(num_windows * self.look_forward);
        for window in &self.windows {
            input_buffer.extend(window.input.iter().map(|&v| v as f32));
            label_buffer.extend(window.label.iter().map(|&v| v as f32));
        }

        let inputs = Tensor::<B, 1>::from_floats(input_buffer.as_slice(), device)
            .reshape(Shape::new([num_windows, self.look_back, 1]));
        let labels = Tensor::<B, 1>::from_floats(label_buffer.as_slice(), device)
            .reshape(Shape::new([num_windows, self.look_forward]));

        (inputs, labels)
    }
}

/// # Prepare Sliding Windows
///
/// Cuts a raw metric history into supervised (input, label) window pairs.
///
/// Labels are drawn from the series with the first `look_back` points
/// dropped, inputs from the series with the last `look_forward` points
/// dropped. Each source is then swept independently with a stride-1
/// sliding window and the two passes are paired positionally, so pair
/// `i` holds observations `[i, i + look_back)` as input and
/// `[i + look_back, i + look_back + look_forward)` as label.
///
/// A series of length `L` yields `L - look_back - look_forward + 1`
/// pairs and must satisfy `L > look_back + look_forward`.
///
/// # Errors
///
/// * `InsufficientHistory` when the series cannot fill a single pair
/// * `DataShape` when a window length is zero or the two sweeps disagree
pub fn prepare(
    series: &[f64],
    look_back: usize,
    look_forward: usize,
) -> Result<WindowedSeries, ForecastError> {
    if look_back == 0 || look_forward == 0 {
        return Err(ForecastError::DataShape(format!(
            "window lengths must be positive (look_back={}, look_forward={})",
            look_back, look_forward
        )));
    }
    if series.len() <= look_back + look_forward {
        return Err(ForecastError::InsufficientHistory {
            got: series.len(),
            need: look_back + look_forward + 1,
        });
    }

    let labels_source = &series[look_back..];
    let inputs_source = &series[..series.len() - look_forward];

    let mut label_windows: Vec<Vec<f64>> = Vec::with_capacity(labels_source.len());
    for i in 0..=labels_source.len() - look_forward {
        label_windows.push(labels_source[i..i + look_forward].to_vec());
    }

    let mut input_windows: Vec<Vec<f64>> = Vec::with_capacity(inputs_source.len());
    for i in 0..=inputs_source.len() - look_back {
        input_windows.push(inputs_source[i..i + look_back].to_vec());
    }

    if input_windows.len() != label_windows.len() {
        return Err(ForecastError::DataShape(format!(
            "window pairing mismatch: {} input windows vs {} label windows",
            input_windows.len(),
            label_windows.len()
        )));
    }

    let windows = input_windows
        .into_iter()
        .zip(label_windows)
        .map(|(input, label)| Window { input, label })
        .collect();

    Ok(WindowedSeries {
        windows,
        look_back,
        look_forward,
    })
}
