use polars::{
    frame::DataFrame,
    prelude::{
        DataType, Expr, IntoLazy, JoinArgs, JoinType, Null, PlSmallStr, col, lit, when,
    },
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::{
    backtest::BacktestCol,
    error::{CoingymError, CoingymResult, DataError},
};

/// Column names of the single-row metrics report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MetricCol {
    SharpeRatio,
    MaxDrawdown,
    RiskAdjustedReturn,
    Volatility,
    Beta,
    Alpha,
}

impl From<MetricCol> for PlSmallStr {
    fn from(value: MetricCol) -> Self {
        value.as_str().into()
    }
}

impl MetricCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Aggregate performance metrics over one backtest.
///
/// Every field is `None` when its denominator is undefined (zero variance,
/// empty input, a single row under sample statistics). Sample statistics use
/// one delta degree of freedom throughout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean over standard deviation of per-step strategy returns, zero
    /// risk-free rate.
    pub sharpe_ratio: Option<f64>,
    /// Largest relative drop of the cumulative return from its running peak.
    pub max_drawdown: Option<f64>,
    /// Total return over standard deviation.
    pub risk_adjusted_return: Option<f64>,
    /// Standard deviation of per-step strategy returns.
    pub volatility: Option<f64>,
    /// Covariance with the benchmark over benchmark variance.
    pub beta: Option<f64>,
    /// Total strategy return minus total benchmark return.
    pub alpha: Option<f64>,
}

/// Computes all metrics over the strategy and benchmark return frames.
///
/// The two frames are aligned on `row_id` with an inner join, so metrics that
/// compare against the benchmark only consider rows the strategy actually
/// traded on.
pub fn performance_metrics(
    strategy: &DataFrame,
    benchmark: &DataFrame,
) -> CoingymResult<PerformanceMetrics> {
    let aligned = strategy
        .clone()
        .lazy()
        .join(
            benchmark.clone().lazy(),
            [col(BacktestCol::RowId)],
            [col(BacktestCol::RowId)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
        .map_err(convert_err)?;

    if aligned.is_empty() {
        return Ok(PerformanceMetrics {
            sharpe_ratio: None,
            max_drawdown: None,
            risk_adjusted_return: None,
            volatility: None,
            beta: None,
            alpha: None,
        });
    }

    let joined = aligned
        .lazy()
        .select(exprs())
        .collect()
        .map_err(convert_err)?;

    let get = |metric: MetricCol| -> CoingymResult<Option<f64>> {
        Ok(joined
            .column(metric.as_str())
            .map_err(|_| DataError::DataFrame(format!("Missing metric column {metric}")))?
            .f64()
            .map_err(|e| DataError::DataFrame(format!("Metric {metric} is not f64: {e}")))?
            .get(0)
            .filter(|v| v.is_finite()))
    };

    Ok(PerformanceMetrics {
        sharpe_ratio: get(MetricCol::SharpeRatio)?,
        max_drawdown: get(MetricCol::MaxDrawdown)?,
        risk_adjusted_return: get(MetricCol::RiskAdjustedReturn)?,
        volatility: get(MetricCol::Volatility)?,
        beta: get(MetricCol::Beta)?,
        alpha: get(MetricCol::Alpha)?,
    })
}

fn exprs() -> Vec<Expr> {
    MetricCol::iter()
        .map(|metric| {
            let expr = match metric {
                MetricCol::SharpeRatio => sharpe_ratio_expr(),
                MetricCol::MaxDrawdown => max_drawdown_expr(),
                MetricCol::RiskAdjustedReturn => risk_adjusted_return_expr(),
                MetricCol::Volatility => volatility_expr(),
                MetricCol::Beta => beta_expr(),
                MetricCol::Alpha => alpha_expr(),
            };
            expr.alias(metric).cast(DataType::Float64)
        })
        .collect()
}

// ================================================================================================
// Metric Expressions
// ================================================================================================

fn sharpe_ratio_expr() -> Expr {
    let returns = col(BacktestCol::StrategyReturn);
    safe_div(returns.clone().mean(), returns.std(1))
}

/// Largest value of `1 - cumulative / running_max(cumulative)` over time.
fn max_drawdown_expr() -> Expr {
    let cumulative = col(BacktestCol::CumulativeStrategyReturn);
    let running_max = cumulative.clone().cum_max(false);
    (lit(1.0) - safe_div(cumulative, running_max)).max()
}

fn risk_adjusted_return_expr() -> Expr {
    let returns = col(BacktestCol::StrategyReturn);
    safe_div(returns.clone().sum(), returns.std(1))
}

fn volatility_expr() -> Expr {
    col(BacktestCol::StrategyReturn).std(1)
}

/// Sample covariance with the benchmark over sample benchmark variance.
fn beta_expr() -> Expr {
    let strategy = col(BacktestCol::StrategyReturn);
    let benchmark = col(BacktestCol::BenchmarkReturnStep);

    let n = strategy.clone().count().cast(DataType::Float64);
    let centered =
        (strategy.clone() - strategy.mean()) * (benchmark.clone() - benchmark.clone().mean());
    let covariance = safe_div(centered.sum(), n - lit(1.0));

    safe_div(covariance, benchmark.var(1))
}

fn alpha_expr() -> Expr {
    col(BacktestCol::StrategyReturn).sum() - col(BacktestCol::BenchmarkReturnStep).sum()
}

// ================================================================================================
// Helper Functions
// ================================================================================================

/// Division that yields null instead of infinity on a zero denominator, so
/// undefined metrics surface as `None` rather than poisoning comparisons.
fn safe_div(numerator: Expr, denominator: Expr) -> Expr {
    when(denominator.clone().eq(lit(0.0)))
        .then(lit(Null {}))
        .otherwise(numerator / denominator)
}

fn convert_err(e: polars::error::PolarsError) -> CoingymError {
    DataError::DataFrame(format!("Error while computing performance metrics: {e}")).into()
}

#[cfg(test)]
mod tests {
    use polars::{df, prelude::Column};

    use super::*;

    const TOL: f64 = 1e-9;

    fn returns_frames(strategy: &[f64], benchmark: &[f64]) -> (DataFrame, DataFrame) {
        assert_eq!(strategy.len(), benchmark.len());
        let ids: Vec<u32> = (0..strategy.len() as u32).collect();

        let cumulative = |returns: &[f64]| -> Vec<f64> {
            let mut sum = 0.0;
            returns
                .iter()
                .map(|r| {
                    sum += r;
                    sum.exp() - 1.0
                })
                .collect()
        };

        let s = DataFrame::new(vec![
            Column::new(BacktestCol::RowId.name(), ids.clone()),
            Column::new(BacktestCol::StrategyReturn.name(), strategy.to_vec()),
            Column::new(
                BacktestCol::CumulativeStrategyReturn.name(),
                cumulative(strategy),
            ),
        ])
        .unwrap();

        let b = DataFrame::new(vec![
            Column::new(BacktestCol::RowId.name(), ids),
            Column::new(BacktestCol::BenchmarkReturnStep.name(), benchmark.to_vec()),
            Column::new(
                BacktestCol::CumulativeBenchmarkReturn.name(),
                cumulative(benchmark),
            ),
        ])
        .unwrap();

        (s, b)
    }

    fn sample_std(values: &[f64]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    }

    // ========================================================================
    // Test: Sharpe Ratio
    // ========================================================================

    #[test]
    fn test_sharpe_ratio_on_reference_series() {
        let returns = [0.01, 0.02, -0.01, 0.03, -0.02];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let expected = mean / sample_std(&returns);
        let sharpe = metrics.sharpe_ratio.expect("sharpe should be defined");
        assert!((sharpe - expected).abs() < TOL, "expected {expected}, got {sharpe}");
    }

    #[test]
    fn test_zero_variance_yields_none() {
        let returns = [0.01, 0.01, 0.01];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();

        assert_eq!(metrics.sharpe_ratio, None, "zero spread has no sharpe");
        assert_eq!(metrics.risk_adjusted_return, None);
        assert_eq!(metrics.beta, None, "zero benchmark variance has no beta");
    }

    // ========================================================================
    // Test: Volatility and Risk-Adjusted Return
    // ========================================================================

    #[test]
    fn test_volatility_is_sample_std() {
        let returns = [0.02, -0.01, 0.04, 0.0];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();
        let vol = metrics.volatility.unwrap();
        assert!((vol - sample_std(&returns)).abs() < TOL);
    }

    #[test]
    fn test_risk_adjusted_return_is_sum_over_std() {
        let returns = [0.02, -0.01, 0.04, 0.0];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();
        let expected = returns.iter().sum::<f64>() / sample_std(&returns);
        assert!((metrics.risk_adjusted_return.unwrap() - expected).abs() < TOL);
    }

    // ========================================================================
    // Test: Max Drawdown
    // ========================================================================

    #[test]
    fn test_max_drawdown_measures_drop_from_peak() {
        let returns = [0.10, -0.05, -0.05, 0.02];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();

        // Recompute by hand from the cumulative curve.
        let mut sum = 0.0;
        let cumulative: Vec<f64> = returns
            .iter()
            .map(|r| {
                sum += r;
                sum.exp() - 1.0
            })
            .collect();
        let mut peak = f64::NEG_INFINITY;
        let mut expected = f64::NEG_INFINITY;
        for c in &cumulative {
            peak = peak.max(*c);
            if peak != 0.0 {
                expected = expected.max(1.0 - c / peak);
            }
        }

        let dd = metrics.max_drawdown.unwrap();
        assert!((dd - expected).abs() < TOL, "expected {expected}, got {dd}");
        assert!(dd > 0.0, "the curve does fall from its peak");
    }

    // ========================================================================
    // Test: Beta and Alpha
    // ========================================================================

    #[test]
    fn test_beta_of_benchmark_against_itself_is_one() {
        let returns = [0.01, 0.02, -0.01, 0.03, -0.02];
        let (s, b) = returns_frames(&returns, &returns);

        let metrics = performance_metrics(&s, &b).unwrap();
        let beta = metrics.beta.unwrap();
        assert!((beta - 1.0).abs() < TOL, "self-beta must be 1, got {beta}");
    }

    #[test]
    fn test_alpha_is_difference_of_sums() {
        let strategy = [0.02, 0.01, 0.03];
        let benchmark = [0.01, 0.01, 0.01];
        let (s, b) = returns_frames(&strategy, &benchmark);

        let metrics = performance_metrics(&s, &b).unwrap();
        let alpha = metrics.alpha.unwrap();
        assert!((alpha - 0.03).abs() < TOL, "expected 0.03, got {alpha}");
    }

    // ========================================================================
    // Test: Alignment and Degenerate Input
    // ========================================================================

    #[test]
    fn test_metrics_align_on_row_id() {
        let strategy = [0.02, 0.01];
        let benchmark = [0.01, 0.01, 0.01, 0.01];

        let s = DataFrame::new(vec![
            Column::new(BacktestCol::RowId.name(), vec![2u32, 3]),
            Column::new(BacktestCol::StrategyReturn.name(), strategy.to_vec()),
            Column::new(
                BacktestCol::CumulativeStrategyReturn.name(),
                vec![0.02, 0.03],
            ),
        ])
        .unwrap();
        let ids: Vec<u32> = (0..4).collect();
        let b = DataFrame::new(vec![
            Column::new(BacktestCol::RowId.name(), ids),
            Column::new(BacktestCol::BenchmarkReturnStep.name(), benchmark.to_vec()),
            Column::new(
                BacktestCol::CumulativeBenchmarkReturn.name(),
                vec![0.01, 0.02, 0.03, 0.04],
            ),
        ])
        .unwrap();

        let metrics = performance_metrics(&s, &b).unwrap();

        // Only benchmark rows 2 and 3 count: alpha = 0.03 - 0.02.
        let alpha = metrics.alpha.unwrap();
        assert!((alpha - 0.01).abs() < TOL, "expected 0.01, got {alpha}");
    }

    #[test]
    fn test_empty_input_yields_all_none() {
        let (s, b) = returns_frames(&[], &[]);
        let metrics = performance_metrics(&s, &b).unwrap();

        assert_eq!(metrics.sharpe_ratio, None);
        assert_eq!(metrics.max_drawdown, None);
        assert_eq!(metrics.risk_adjusted_return, None);
        assert_eq!(metrics.volatility, None);
        assert_eq!(metrics.beta, None);
        assert_eq!(metrics.alpha, None);
    }
}
