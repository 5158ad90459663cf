use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, CoingymResult};

/// Reverses a prior feature normalization so backtest output is reported in
/// original units. Fitting happens upstream; only the inverse is needed here.
pub trait FeatureScaler {
    /// Maps a matrix of scaled values back to original units, column by
    /// column. The column order must match the order used when fitting.
    fn inverse_transform(&self, scaled: &Array2<f64>) -> CoingymResult<Array2<f64>>;
}

/// Column-wise standardization: `scaled = (x - mean) / std`.
///
/// Columns with zero spread are stored with `std = 1.0` so transforming is
/// total; the inverse then reproduces the constant column exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> CoingymResult<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(AgentError::InvalidInput(
                "Cannot fit a scaler on an empty matrix".to_string(),
            )
            .into());
        }

        let mut mean = Vec::with_capacity(cols);
        let mut std = Vec::with_capacity(cols);

        for col in data.columns() {
            let m = col.sum() / rows as f64;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / rows as f64;
            let s = var.sqrt();
            mean.push(m);
            std.push(if s > 0.0 { s } else { 1.0 });
        }

        Ok(Self { mean, std })
    }

    pub fn transform(&self, data: &Array2<f64>) -> CoingymResult<Array2<f64>> {
        self.check_width(data)?;
        let mut out = data.clone();
        for (j, mut col) in out.columns_mut().into_iter().enumerate() {
            col.mapv_inplace(|v| (v - self.mean[j]) / self.std[j]);
        }
        Ok(out)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn check_width(&self, data: &Array2<f64>) -> CoingymResult<()> {
        if data.ncols() != self.mean.len() {
            return Err(AgentError::ShapeMismatch(format!(
                "Scaler was fitted on {} columns but received {}",
                self.mean.len(),
                data.ncols()
            ))
            .into());
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn inverse_transform(&self, scaled: &Array2<f64>) -> CoingymResult<Array2<f64>> {
        self.check_width(scaled)?;
        let mut out = scaled.clone();
        for (j, mut col) in out.columns_mut().into_iter().enumerate() {
            col.mapv_inplace(|v| v * self.std[j] + self.mean[j]);
        }
        Ok(out)
    }
}
