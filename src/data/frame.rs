use ndarray::{Array1, Array2};
use polars::{
    frame::DataFrame,
    prelude::{Column, DataType},
};

use crate::{
    data::MarketCol,
    error::{CoingymResult, DataError},
};

/// A validated, immutable view over the prepared market dataset.
///
/// Construction enforces the dataset contract once, so that the environment,
/// the backtester and the reports can consume rows without re-checking:
///
/// - `close` and `log_return` are present and numeric,
/// - every `log_return` entry is finite (a NaN reward would silently poison
///   balance compounding),
/// - at least two rows exist (one transition),
/// - if a `timestamp` column is present it is strictly increasing.
#[derive(Debug, Clone)]
pub struct MarketFrame {
    df: DataFrame,
    log_returns: Vec<f64>,
}

impl MarketFrame {
    pub fn new(df: DataFrame) -> CoingymResult<Self> {
        if df.height() < 2 {
            return Err(DataError::InsufficientRows(df.height()).into());
        }

        column_as_f64(&df, MarketCol::Close.as_str())?;
        let log_returns = column_as_f64(&df, MarketCol::LogReturn.as_str())?;
        for (row, v) in log_returns.iter().enumerate() {
            if !v.is_finite() {
                return Err(DataError::NonFinite {
                    col: MarketCol::LogReturn.as_str().to_string(),
                    row,
                }
                .into());
            }
        }

        if df.column(MarketCol::Timestamp.as_str()).is_ok() {
            validate_chronological(&df)?;
        }

        Ok(Self { df, log_returns })
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Per-row natural log returns, validated finite at construction.
    pub fn log_returns(&self) -> &[f64] {
        &self.log_returns
    }

    /// Names of the observable feature columns, in frame order.
    ///
    /// The supervised `target` label and the `timestamp` index are bookkeeping
    /// columns, not market state, and are excluded from observations.
    pub fn feature_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .filter(|name| {
                name.as_str() != MarketCol::Target.as_str()
                    && name.as_str() != MarketCol::Timestamp.as_str()
            })
            .map(|name| name.to_string())
            .collect()
    }

    /// Dimensionality of a single observation row.
    pub fn state_size(&self) -> usize {
        self.feature_names().len()
    }

    /// The full observation matrix, one row per dataset row.
    pub fn feature_matrix(&self) -> CoingymResult<Array2<f64>> {
        let names = self.feature_names();
        let mut mat = Array2::<f64>::zeros((self.df.height(), names.len()));

        for (j, name) in names.iter().enumerate() {
            let values = column_as_f64(&self.df, name)?;
            for (i, v) in values.into_iter().enumerate() {
                mat[[i, j]] = v;
            }
        }

        Ok(mat)
    }

    /// A single column as `f64`, rejecting nulls.
    pub fn column_f64(&self, name: &str) -> CoingymResult<Vec<f64>> {
        column_as_f64(&self.df, name)
    }

    /// A single observation row.
    pub fn observation(&self, row: usize) -> CoingymResult<Array1<f64>> {
        if row >= self.df.height() {
            return Err(DataError::DataFrame(format!(
                "Row {row} out of bounds for frame of height {}",
                self.df.height()
            ))
            .into());
        }

        let names = self.feature_names();
        let mut obs = Array1::<f64>::zeros(names.len());
        for (j, name) in names.iter().enumerate() {
            let values = column_as_f64(&self.df, name)?;
            obs[j] = values[row];
        }
        Ok(obs)
    }
}

fn column_as_f64(df: &DataFrame, name: &str) -> CoingymResult<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))?;

    let casted: Column = column
        .cast(&DataType::Float64)
        .map_err(|e| DataError::DataFrame(format!("Column '{name}' is not numeric: {e}")))?;

    let ca = casted
        .f64()
        .map_err(|e| DataError::DataFrame(format!("Column '{name}': {e}")))?;

    ca.into_iter()
        .enumerate()
        .map(|(row, opt)| {
            opt.ok_or_else(|| {
                DataError::DataFrame(format!("Null value in column '{name}' at row {row}")).into()
            })
        })
        .collect()
}

fn validate_chronological(df: &DataFrame) -> CoingymResult<()> {
    let timestamps = column_as_f64(df, MarketCol::Timestamp.as_str())?;
    for (row, pair) in timestamps.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(DataError::NotChronological(format!(
                "timestamp at row {} ({}) is not after row {} ({})",
                row + 1,
                pair[1],
                row,
                pair[0]
            ))
            .into());
        }
    }
    Ok(())
}
