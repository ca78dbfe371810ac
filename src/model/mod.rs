// External imports
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod gru;
pub mod lstm;

pub use gru::TimeSeriesGru;
pub use lstm::TimeSeriesLstm;

/// Recurrent architecture backing a stored model.
///
/// The tag is persisted in the artifact metadata so prediction can rebuild
/// the same network shape that training saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    #[serde(rename = "GRU")]
    Gru,
    #[serde(rename = "LSTM")]
    Lstm,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Gru => write!(f, "GRU"),
            Architecture::Lstm => write!(f, "LSTM"),
        }
    }
}

impl FromStr for Architecture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gru" => Ok(Architecture::Gru),
            "lstm" => Ok(Architecture::Lstm),
            other => Err(anyhow::anyhow!(
                "unknown architecture '{}', expected 'gru' or 'lstm'",
                other
            )),
        }
    }
}

/// Common forward interface over the sequence networks.
///
/// Input shape is `[batch_size, seq_len, input_size]`; the output is one
/// forecast row per batch element, shape `[batch_size, output_size]`.
pub trait SeriesNet<B: Backend>: Module<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2>;
}
