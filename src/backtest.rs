use itertools::Itertools;
use ndarray::Array2;
use polars::{
    frame::DataFrame,
    prelude::{Column, Expr, FillNullStrategy, IntoLazy, PlSmallStr, col, lit},
};
use serde::{Deserialize, Serialize};
use strum::EnumCount;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    agent::PolicyModel,
    data::{MarketCol, frame::MarketFrame, scaler::FeatureScaler},
    error::{AgentError, CoingymError, CoingymResult, DataError},
    gym::Action,
};

/// Column names of the backtest output frames.
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
pub enum BacktestCol {
    RowId,
    Position,
    StrategyReturn,
    CumulativeStrategyReturn,
    BenchmarkReturnStep,
    CumulativeBenchmarkReturn,
}

impl From<BacktestCol> for PlSmallStr {
    fn from(value: BacktestCol) -> Self {
        value.as_str().into()
    }
}

impl BacktestCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Output of a full backtest pass over a historical dataset.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    /// `{row_id, strategy_return, cumulative_strategy_return}`, rows with
    /// undefined values dropped, `row_id` indexing into the input frame.
    pub strategy: DataFrame,
    /// `{row_id, benchmark_return_step, cumulative_benchmark_return}` of the
    /// buy-and-hold benchmark over the same rows.
    pub benchmark: DataFrame,
    /// The input frame with scaled feature columns restored to original
    /// units, for reporting.
    pub restored: DataFrame,
}

/// Replays a frozen policy over every historical row at once.
///
/// This is not a stateful walk through the environment: the policy is scored
/// in one batched call, the per-row argmax becomes a trade signal, and the
/// signals are turned into lagged positions. A hold signal never closes an
/// open position; it propagates the last buy/sell decision forward.
#[tracing::instrument(skip_all, fields(rows = frame.height()))]
pub fn run_backtest<P, S>(
    policy: &P,
    frame: &MarketFrame,
    scaler: &S,
) -> CoingymResult<BacktestReport>
where
    P: PolicyModel + ?Sized,
    S: FeatureScaler + ?Sized,
{
    let actions = predict_actions(policy, frame)?;
    let restored = restore_original_units(frame, scaler)?;

    let strategy = strategy_returns(frame, &actions)?;
    let benchmark = benchmark_returns(frame)?;

    tracing::info!(
        strategy_rows = strategy.height(),
        benchmark_rows = benchmark.height(),
        "backtest complete"
    );

    Ok(BacktestReport {
        strategy,
        benchmark,
        restored,
    })
}

/// Scores all rows in one batched call and picks the argmax action per row.
pub fn predict_actions<P>(policy: &P, frame: &MarketFrame) -> CoingymResult<Vec<Action>>
where
    P: PolicyModel + ?Sized,
{
    let features = frame.feature_matrix()?;
    let scores = policy.predict(&features)?;

    if scores.nrows() != frame.height() || scores.ncols() != Action::COUNT {
        return Err(AgentError::ShapeMismatch(format!(
            "Policy returned {}x{} scores for {} rows and {} actions",
            scores.nrows(),
            scores.ncols(),
            frame.height(),
            Action::COUNT,
        ))
        .into());
    }

    // Reverse scan so exact ties resolve to the lowest action index.
    let actions = scores
        .rows()
        .into_iter()
        .map(|row| {
            let best = row
                .iter()
                .rev()
                .position_max_by(|a, b| a.total_cmp(b))
                .map(|rev| row.len() - 1 - rev)
                .unwrap_or(Action::Hold.to_index());
            Action::from_index(best)
        })
        .collect();

    Ok(actions)
}

/// Maps scaled feature columns back to original units.
///
/// The latent `lstm_feature` has no original unit, `log_return` is already
/// unitless and `target`/`timestamp` are bookkeeping, so those columns pass
/// through unchanged.
pub fn restore_original_units<S>(frame: &MarketFrame, scaler: &S) -> CoingymResult<DataFrame>
where
    S: FeatureScaler + ?Sized,
{
    let names: Vec<String> = frame
        .feature_names()
        .into_iter()
        .filter(|name| {
            name != MarketCol::LstmFeature.as_str() && name != MarketCol::LogReturn.as_str()
        })
        .collect();

    let mut scaled = Array2::<f64>::zeros((frame.height(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let values = frame.column_f64(name)?;
        for (i, v) in values.into_iter().enumerate() {
            scaled[[i, j]] = v;
        }
    }

    let original = scaler.inverse_transform(&scaled)?;

    let mut df = frame.as_df().clone();
    for (j, name) in names.iter().enumerate() {
        let values: Vec<f64> = original.column(j).to_vec();
        df.with_column(Column::new(name.as_str().into(), values))
            .map_err(|e| DataError::DataFrame(format!("Failed to restore '{name}': {e}")))?;
    }

    Ok(df)
}

/// Turns per-row trade signals into lagged strategy returns.
///
/// Buy maps to position 1, sell to 0 and hold to null; nulls are forward
/// filled so the last decision carries, then the position is lagged one row
/// against the log return to avoid lookahead. Rows without a defined lagged
/// position are dropped.
pub fn strategy_returns(frame: &MarketFrame, actions: &[Action]) -> CoingymResult<DataFrame> {
    if actions.len() != frame.height() {
        return Err(AgentError::ShapeMismatch(format!(
            "{} actions for {} rows",
            actions.len(),
            frame.height()
        ))
        .into());
    }

    let positions: Vec<Option<f64>> = actions
        .iter()
        .map(|action| match action {
            Action::Buy => Some(1.0),
            Action::Sell => Some(0.0),
            Action::Hold => None,
        })
        .collect();

    let df = DataFrame::new(vec![
        row_id_column(frame.height()),
        Column::new(BacktestCol::Position.name(), positions),
        Column::new(MarketCol::LogReturn.name(), frame.log_returns().to_vec()),
    ])
    .map_err(convert_err)?;

    df.lazy()
        .with_column(
            col(BacktestCol::Position)
                .fill_null_with_strategy(FillNullStrategy::Forward(None))
                .alias(BacktestCol::Position),
        )
        .with_column(
            (col(BacktestCol::Position).shift(lit(1)) * col(MarketCol::LogReturn))
                .alias(BacktestCol::StrategyReturn),
        )
        .with_column(
            cumulative_return_expr(BacktestCol::StrategyReturn)
                .alias(BacktestCol::CumulativeStrategyReturn),
        )
        .drop_nulls(None)
        .select([
            col(BacktestCol::RowId),
            col(BacktestCol::StrategyReturn),
            col(BacktestCol::CumulativeStrategyReturn),
        ])
        .collect()
        .map_err(convert_err)
}

/// Buy-and-hold benchmark: the log return column itself, compounded the same
/// way as the strategy returns.
pub fn benchmark_returns(frame: &MarketFrame) -> CoingymResult<DataFrame> {
    let df = DataFrame::new(vec![
        row_id_column(frame.height()),
        Column::new(
            BacktestCol::BenchmarkReturnStep.name(),
            frame.log_returns().to_vec(),
        ),
    ])
    .map_err(convert_err)?;

    df.lazy()
        .with_column(
            cumulative_return_expr(BacktestCol::BenchmarkReturnStep)
                .alias(BacktestCol::CumulativeBenchmarkReturn),
        )
        .drop_nulls(None)
        .collect()
        .map_err(convert_err)
}

// ================================================================================================
// Helper Functions
// ================================================================================================

/// `exp(cumulative sum) - 1` over a log-return column.
fn cumulative_return_expr(return_col: BacktestCol) -> Expr {
    col(return_col).cum_sum(false).exp() - lit(1.0)
}

fn row_id_column(height: usize) -> Column {
    let ids: Vec<u32> = (0..height as u32).collect();
    Column::new(BacktestCol::RowId.name(), ids)
}

fn convert_err(e: polars::error::PolarsError) -> CoingymError {
    DataError::DataFrame(format!("Error while building backtest returns: {e}")).into()
}
