use ndarray::Array2;

use crate::error::CoingymResult;

pub mod dqn;
pub mod network;
pub mod replay;

/// A frozen policy scored over a batch of states at once.
///
/// Output column `i` holds the score of `Action::from_index(i)`, so the
/// output width is always the size of the action space. The backtester is
/// the main consumer; it never steps the environment, it only ranks actions
/// per historical row.
pub trait PolicyModel {
    /// Scores every action for every row of `states`.
    ///
    /// `states` is `(n_rows, state_size)`; the result is `(n_rows, 3)`.
    fn predict(&self, states: &Array2<f64>) -> CoingymResult<Array2<f64>>;
}
