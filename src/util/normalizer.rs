/// # Min-Max Normalizer
///
/// Scales a metric history into the [0, 1] range the recurrent networks
/// are trained against, and maps forecasts back to the original scale.
///
/// The scaler is fitted on one series and applied to values from the same
/// series, so `denormalize(normalize(x)) == x` up to float rounding. A
/// constant series has no span; its range is pinned to 1.0 so the round
/// trip still holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxNormalizer {
    min: f64,
    range: f64,
}

impl MinMaxNormalizer {
    /// Fit the scaler to the observed extremes of a series.
    pub fn fit(series: &[f64]) -> Self {
        if series.is_empty() {
            return Self {
                min: 0.0,
                range: 1.0,
            };
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in series {
            min = min.min(value);
            max = max.max(value);
        }

        // Guard against division by zero for flat series.
        let range = if (max - min).abs() < 1e-10 {
            1.0
        } else {
            max - min
        };

        Self { min, range }
    }

    pub fn normalize(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.min) / self.range).collect()
    }

    pub fn denormalize(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.range + self.min).collect()
    }
}
