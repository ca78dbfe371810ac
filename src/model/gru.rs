// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

// Internal imports
use crate::constants::DROPOUT;
use crate::model::SeriesNet;

/// # TimeSeriesGru
///
/// A stacked GRU network for multi-step metric forecasting. Each layer keeps
/// a single hidden state per sequence element; the last layer's final hidden
/// state is projected through a ReLU and a linear head onto the forecast
/// horizon.
///
/// ## Mathematical Representation
///
/// For input x_t at time t and previous hidden state h_(t-1):
///
/// 1. Update gate: z_t = σ(W_z · x_t + U_z · h_(t-1))
/// 2. Reset gate: r_t = σ(W_r · x_t + U_r · h_(t-1))
/// 3. Candidate state: n_t = tanh(W_n · x_t + r_t ∘ (U_n · h_(t-1)))
/// 4. New hidden state: h_t = (1 - z_t) ∘ n_t + z_t ∘ h_(t-1)
///
/// Where σ is the sigmoid function and ∘ denotes element-wise multiplication.
/// The three gate projections per layer are fused into one `Linear` of width
/// `3 * hidden_size` and split per gate at each step.
#[derive(Module, Debug)]
pub struct TimeSeriesGru<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    output_size: usize,
    num_layers: usize,

    // One input/hidden projection pair per stacked layer
    input_weights: Vec<Linear<B>>,
    hidden_weights: Vec<Linear<B>>,

    // Applied between stacked layers, not after the last
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> TimeSeriesGru<B> {
    /// Create a new stacked GRU sized for one scalar feature per time step
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of features per time step
    /// * `hidden_size` - Number of features in each hidden state
    /// * `output_size` - Forecast horizon (values emitted per sequence)
    /// * `num_layers` - Number of stacked recurrent layers (minimum 1)
    /// * `dropout_prob` - Dropout probability between stacked layers
    /// * `device` - Device to allocate tensors on
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        num_layers: usize,
        dropout_prob: f64,
        device: &B::Device,
    ) -> Self {
        let num_layers = num_layers.max(1);
        let dropout_prob = if dropout_prob <= 0.0 {
            DROPOUT
        } else {
            dropout_prob
        };

        // For GRU we need 3 gates (update, reset, new) combined
        let gate_size = 3 * hidden_size;

        let mut input_weights = Vec::with_capacity(num_layers);
        let mut hidden_weights = Vec::with_capacity(num_layers);
        for layer in 0..num_layers {
            // Layers past the first consume the previous layer's hidden states
            let in_features = if layer == 0 { input_size } else { hidden_size };
            input_weights.push(LinearConfig::new(in_features, gate_size).init(device));
            hidden_weights.push(LinearConfig::new(hidden_size, gate_size).init(device));
        }

        let dropout = DropoutConfig::new(dropout_prob).init();
        let output = LinearConfig::new(hidden_size, output_size).init(device);

        Self {
            input_size,
            hidden_size,
            output_size,
            num_layers,
            input_weights,
            hidden_weights,
            dropout,
            output,
        }
    }

    /// Getter for input_size
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Getter for output_size
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Run one stacked layer over the full sequence
    ///
    /// Input shape is [batch_size, seq_len, in_features] where in_features is
    /// `input_size` for layer 0 and `hidden_size` afterwards. Returns the
    /// hidden state at every step, shape [batch_size, seq_len, hidden_size].
    fn layer_forward(&self, layer: usize, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let batch_size = x.dims()[0];
        let seq_len = x.dims()[1];
        let in_features = x.dims()[2];
        let device = x.device();

        let input_weights = &self.input_weights[layer];
        let hidden_weights = &self.hidden_weights[layer];

        // Initial hidden state (zeros)
        let mut h = Tensor::zeros([batch_size, self.hidden_size], &device);

        let mut output_sequence = Tensor::zeros([batch_size, seq_len, self.hidden_size], &device);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, in_features]);

            let input_projection = input_weights.forward(x_t);
            let hidden_projection = hidden_weights.forward(h.clone());

            // Split the fused projections into the three gates
            let input_gates = input_projection.reshape([batch_size, 3, self.hidden_size]);
            let z_input = input_gates
                .clone()
                .narrow(1, 0, 1)
                .reshape([batch_size, self.hidden_size]); // update gate
            let r_input = input_gates
                .clone()
                .narrow(1, 1, 1)
                .reshape([batch_size, self.hidden_size]); // reset gate
            let n_input = input_gates
                .narrow(1, 2, 1)
                .reshape([batch_size, self.hidden_size]); // new gate

            let hidden_gates = hidden_projection.reshape([batch_size, 3, self.hidden_size]);
            let z_hidden = hidden_gates
                .clone()
                .narrow(1, 0, 1)
                .reshape([batch_size, self.hidden_size]);
            let r_hidden = hidden_gates
                .clone()
                .narrow(1, 1, 1)
                .reshape([batch_size, self.hidden_size]);
            let n_hidden = hidden_gates
                .narrow(1, 2, 1)
                .reshape([batch_size, self.hidden_size]);

            let z = activation::sigmoid(z_input + z_hidden);
            let r = activation::sigmoid(r_input + r_hidden);

            // Candidate state gated by the reset gate
            let n = activation::tanh(n_input + (r * n_hidden));

            // h = (1-z) * n + z * h
            h = (Tensor::ones_like(&z) - z.clone()) * n + z * h;

            output_sequence = output_sequence.slice_assign(
                [0..batch_size, t..t + 1, 0..self.hidden_size],
                h.clone().reshape([batch_size, 1, self.hidden_size]),
            );
        }

        output_sequence
    }

    /// Forward pass producing one forecast row per sequence
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, seq_len, input_size]
    ///
    /// # Returns
    ///
    /// Forecast tensor of shape [batch_size, output_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let batch_size = x.dims()[0];

        let mut sequence = x;
        for layer in 0..self.num_layers {
            sequence = self.layer_forward(layer, sequence);
            if layer + 1 < self.num_layers {
                sequence = self.dropout.forward(sequence);
            }
        }

        // Pool the last step of the top layer
        let seq_len = sequence.dims()[1];
        let last = sequence
            .narrow(1, seq_len - 1, 1)
            .reshape([batch_size, self.hidden_size]);

        self.output.forward(activation::relu(last))
    }
}

impl<B: Backend> SeriesNet<B> for TimeSeriesGru<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        TimeSeriesGru::forward(self, input)
    }
}
