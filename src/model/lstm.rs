// External imports
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

// Internal imports
use crate::constants::DROPOUT;
use crate::model::SeriesNet;

/// Stacked LSTM network for multi-step metric forecasting.
///
/// Mirrors [`crate::model::TimeSeriesGru`] with separate cell and hidden
/// states per layer: the four gate projections (input, forget, cell, output)
/// are fused into one `Linear` of width `4 * hidden_size` per layer.
#[derive(Module, Debug)]
pub struct TimeSeriesLstm<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    output_size: usize,
    num_layers: usize,

    input_weights: Vec<Linear<B>>,
    hidden_weights: Vec<Linear<B>>,

    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> TimeSeriesLstm<B> {
    /// Create a new stacked LSTM
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

        // input, forget, cell, output gates combined
        let gate_size = 4 * hidden_size;

        let mut input_weights = Vec::with_capacity(num_layers);
        let mut hidden_weights = Vec::with_capacity(num_layers);
        for layer in 0..num_layers {
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
    fn layer_forward(&self, layer: usize, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let batch_size = x.dims()[0];
        let seq_len = x.dims()[1];
        let in_features = x.dims()[2];
        let device = x.device();

        let input_weights = &self.input_weights[layer];
        let hidden_weights = &self.hidden_weights[layer];

        // Initial hidden and cell states (zeros)
        let mut h = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut c = Tensor::zeros([batch_size, self.hidden_size], &device);

        let mut output_sequence = Tensor::zeros([batch_size, seq_len, self.hidden_size], &device);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, in_features]);

            let input_projection = input_weights.forward(x_t);
            let hidden_projection = hidden_weights.forward(h);

            // Combine projections, then split into the four gates
            let gates = (input_projection + hidden_projection).reshape([
                batch_size,
                4,
                self.hidden_size,
            ]);
            let i_gate = gates
                .clone()
                .narrow(1, 0, 1)
                .reshape([batch_size, self.hidden_size]);
            let f_gate = gates
                .clone()
                .narrow(1, 1, 1)
                .reshape([batch_size, self.hidden_size]);
            let g_gate = gates
                .clone()
                .narrow(1, 2, 1)
                .reshape([batch_size, self.hidden_size]);
            let o_gate = gates
                .narrow(1, 3, 1)
                .reshape([batch_size, self.hidden_size]);

            let i = activation::sigmoid(i_gate);
            let f = activation::sigmoid(f_gate);
            let g = activation::tanh(g_gate);
            let o = activation::sigmoid(o_gate);

            c = f * c + i * g;
            h = o * activation::tanh(c.clone());

            output_sequence = output_sequence.slice_assign(
                [0..batch_size, t..t + 1, 0..self.hidden_size],
                h.clone().reshape([batch_size, 1, self.hidden_size]),
            );
        }

        output_sequence
    }

    /// Forward pass producing one forecast row per sequence
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let batch_size = x.dims()[0];

        let mut sequence = x;
        for layer in 0..self.num_layers {
            sequence = self.layer_forward(layer, sequence);
            if layer + 1 < self.num_layers {
                sequence = self.dropout.forward(sequence);
            }
        }

        let seq_len = sequence.dims()[1];
        let last = sequence
            .narrow(1, seq_len - 1, 1)
            .reshape([batch_size, self.hidden_size]);

        self.output.forward(activation::relu(last))
    }
}

impl<B: Backend> SeriesNet<B> for TimeSeriesLstm<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        TimeSeriesLstm::forward(self, input)
    }
}
