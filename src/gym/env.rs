use ndarray::{Array1, Array2};

use crate::{
    data::frame::MarketFrame,
    error::{CoingymResult, EnvError},
    gym::{Action, Position, Step, fees},
};

/// Configuration for [`TradingEnv`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvConfig {
    /// Account balance at the start of every episode, in USD.
    pub initial_balance: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
        }
    }
}

impl EnvConfig {
    pub fn with_initial_balance(mut self, initial_balance: f64) -> Self {
        self.initial_balance = initial_balance;
        self
    }
}

/// Fee-aware single-asset trading environment over a fixed row sequence.
///
/// The state machine is {Flat, Long} x step cursor. A buy while flat or a
/// sell while long charges the tiered taker fee on the full balance and flips
/// the position; every other (action, position) pair is a no-op. The cursor
/// advances by one per step, clamped to the final row, and the episode is
/// terminal once the cursor sits on that row.
///
/// Reward is the precomputed log return at the post-advance row while long
/// and zero while flat; the balance compounds by `exp(reward)` only while
/// long, so balance and cumulative reward stay consistent by construction.
#[derive(Debug, Clone)]
pub struct TradingEnv {
    cfg: EnvConfig,

    // Observation rows and per-row log returns, extracted once.
    features: Array2<f64>,
    log_returns: Vec<f64>,

    balance: f64,
    position: Position,
    current_step: usize,
    done: bool,
}

impl TradingEnv {
    pub fn new(frame: &MarketFrame, cfg: EnvConfig) -> CoingymResult<Self> {
        if !(cfg.initial_balance > 0.0) {
            return Err(EnvError::InvalidConfig(format!(
                "initial_balance must be positive, got {}",
                cfg.initial_balance
            ))
            .into());
        }

        Ok(Self {
            features: frame.feature_matrix()?,
            log_returns: frame.log_returns().to_vec(),
            balance: cfg.initial_balance,
            position: Position::Flat,
            current_step: 0,
            done: false,
            cfg,
        })
    }

    /// Restores the initial episode state and returns the first observation.
    #[tracing::instrument(skip(self))]
    pub fn reset(&mut self) -> Array1<f64> {
        self.balance = self.cfg.initial_balance;
        self.position = Position::Flat;
        self.current_step = 0;
        self.done = false;

        tracing::debug!(balance = self.balance, "environment reset");
        self.observation()
    }

    /// Advances the environment by one transition.
    ///
    /// Calling `step` on a terminal environment is a caller bug and returns
    /// [`EnvError::SteppedPastTerminal`] instead of repeating the terminal
    /// reward.
    pub fn step(&mut self, action: Action) -> CoingymResult<Step> {
        if self.done {
            return Err(EnvError::SteppedPastTerminal.into());
        }

        match (action, self.position) {
            (Action::Buy, Position::Flat) => {
                self.balance -= fees::fee(self.balance);
                self.position = Position::Long;
            }
            (Action::Sell, Position::Long) => {
                self.balance -= fees::fee(self.balance);
                self.position = Position::Flat;
            }
            // Buy while long, sell while flat and hold are no-ops.
            _ => {}
        }

        let last = self.log_returns.len() - 1;
        self.current_step = (self.current_step + 1).min(last);

        let reward = if self.position.is_long() {
            self.log_returns[self.current_step]
        } else {
            0.0
        };
        if self.position.is_long() {
            self.balance *= reward.exp();
        }

        self.done = self.current_step >= last;

        Ok(Step {
            observation: self.observation(),
            reward,
            done: self.done,
        })
    }

    pub fn observation(&self) -> Array1<f64> {
        self.features.row(self.current_step).to_owned()
    }

    pub fn state_size(&self) -> usize {
        self.features.ncols()
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
