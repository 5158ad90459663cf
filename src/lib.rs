//! Research pipeline for a DQN trading agent on Bitcoin market data.
//!
//! The crate is organized around the lifecycle of one experiment:
//!
//! - [`data`]: the validated market dataset and feature scaling,
//! - [`gym`]: the trading environment, its actions and the exchange fee
//!   schedule,
//! - [`agent`]: the Q-network, replay buffer and epsilon-greedy agent,
//! - [`train`]: the episode loop that produces a trained model,
//! - [`backtest`]: replaying the greedy policy over the dataset into
//!   per-step and cumulative return series,
//! - [`report`]: performance metrics over those return series,
//! - [`io`]: per-run artifact directories and (de)serialization.

pub mod agent;
pub mod backtest;
pub mod data;
pub mod error;
pub mod gym;
pub mod io;
pub mod report;
pub mod train;

pub use agent::{
    PolicyModel,
    dqn::{AgentConfig, DqnAgent},
    network::QNetwork,
    replay::{Experience, ReplayBuffer},
};
pub use backtest::{BacktestCol, BacktestReport, run_backtest};
pub use data::{
    MarketCol,
    frame::MarketFrame,
    scaler::{FeatureScaler, StandardScaler},
};
pub use error::{CoingymError, CoingymResult};
pub use gym::{
    Action, Position, Step,
    env::{EnvConfig, TradingEnv},
};
pub use io::RunDirectory;
pub use report::{MetricCol, PerformanceMetrics, performance_metrics};
pub use train::{TrainConfig, TrainReport, Trainer, train_model};
