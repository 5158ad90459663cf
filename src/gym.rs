use ndarray::Array1;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

pub mod env;
pub mod fees;

/// The discrete action space of the trading environment.
///
/// One enum end to end: the agent emits it, the environment consumes it and
/// the backtester maps network output column `i` to `Action::from_index(i)`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

impl Action {
    /// Index of this action in the Q-network output layer.
    pub fn to_index(self) -> usize {
        match self {
            Action::Hold => 0,
            Action::Buy => 1,
            Action::Sell => 2,
        }
    }

    /// Inverse of [`Action::to_index`]. Out-of-range indices fall back to
    /// `Hold`, the only always-safe action.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Action::Buy,
            2 => Action::Sell,
            _ => Action::Hold,
        }
    }
}

/// Whether the simulated account currently holds the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Position {
    Flat,
    Long,
}

impl Position {
    pub fn is_long(&self) -> bool {
        matches!(self, Self::Long)
    }
}

/// The outcome of a single environment transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Feature row at the post-advance cursor.
    pub observation: Array1<f64>,
    /// Log return earned over the step; zero while flat.
    pub reward: f64,
    /// True once the cursor has reached the final row.
    pub done: bool,
}
