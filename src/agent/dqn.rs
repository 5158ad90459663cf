use std::path::Path;

use ndarray::Array1;
use rand::{Rng, SeedableRng, rngs::StdRng};
use strum::EnumCount;

use crate::{
    agent::{
        network::QNetwork,
        replay::{Experience, ReplayBuffer},
    },
    error::CoingymResult,
    gym::Action,
};

/// Hyperparameters of the DQN agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Discount factor for future rewards.
    pub gamma: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    /// Exploration floor.
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay, applied once per replay call.
    pub epsilon_decay: f64,
    pub learning_rate: f64,
    /// Replay buffer capacity.
    pub memory_capacity: usize,
    /// Hidden layer widths of the Q-network.
    pub hidden_layers: Vec<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            epsilon: 0.9,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 0.001,
            memory_capacity: 2000,
            hidden_layers: vec![64, 64, 32],
        }
    }
}

/// DQN agent: epsilon-greedy policy over a primary Q-network, with a bounded
/// replay buffer and a target network synchronized on the caller's cadence.
///
/// Replay targets are bootstrapped from the **primary** network, not the
/// target network. The target network exists for callers that want a frozen
/// snapshot of the policy; keeping it out of the target computation is a
/// deliberate simplification over canonical double-DQN.
#[derive(Debug, Clone)]
pub struct DqnAgent {
    primary: QNetwork,
    target: QNetwork,
    buffer: ReplayBuffer,
    cfg: AgentConfig,
    epsilon: f64,
    rng: StdRng,
}

impl DqnAgent {
    pub fn new(state_size: usize, cfg: AgentConfig) -> CoingymResult<Self> {
        Self::with_rng(state_size, cfg, StdRng::from_os_rng())
    }

    /// Deterministic construction for tests and reproducible runs.
    pub fn with_seed(state_size: usize, cfg: AgentConfig, seed: u64) -> CoingymResult<Self> {
        Self::with_rng(state_size, cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(state_size: usize, cfg: AgentConfig, mut rng: StdRng) -> CoingymResult<Self> {
        let mut layer_sizes = Vec::with_capacity(cfg.hidden_layers.len() + 2);
        layer_sizes.push(state_size);
        layer_sizes.extend(&cfg.hidden_layers);
        layer_sizes.push(Action::COUNT);

        let primary = QNetwork::new(&layer_sizes, cfg.learning_rate, &mut rng)?;
        let mut target = QNetwork::new(&layer_sizes, cfg.learning_rate, &mut rng)?;
        target.copy_from(&primary);

        Ok(Self {
            buffer: ReplayBuffer::new(cfg.memory_capacity),
            epsilon: cfg.epsilon,
            primary,
            target,
            cfg,
            rng,
        })
    }

    /// Epsilon-greedy action selection over the primary network.
    pub fn act(&mut self, state: &Array1<f64>) -> CoingymResult<Action> {
        if self.rng.random::<f64>() < self.epsilon {
            return Ok(Action::from_index(self.rng.random_range(0..Action::COUNT)));
        }
        let index = self.primary.best_action(state)?;
        Ok(Action::from_index(index))
    }

    pub fn remember(
        &mut self,
        state: Array1<f64>,
        action: Action,
        reward: f64,
        next_state: Array1<f64>,
        done: bool,
    ) {
        self.buffer.push(Experience {
            state,
            action,
            reward,
            next_state,
            done,
        });
    }

    /// Trains the primary network on a uniform sample of past experiences.
    ///
    /// Errors if the buffer holds fewer than `batch_size` experiences; the
    /// training loop is expected to gate on [`DqnAgent::memory_len`] first.
    /// Epsilon decays once per call, not once per sample.
    pub fn replay(&mut self, batch_size: usize) -> CoingymResult<()> {
        let batch: Vec<Experience> = self
            .buffer
            .sample(batch_size, &mut self.rng)?
            .into_iter()
            .cloned()
            .collect();

        for exp in &batch {
            let target = if exp.done {
                exp.reward
            } else {
                let next_q = self.primary.forward(&exp.next_state)?;
                let max_next = next_q.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                exp.reward + self.cfg.gamma * max_next
            };
            self.primary
                .fit_action(&exp.state, exp.action.to_index(), target)?;
        }

        if self.epsilon > self.cfg.epsilon_min {
            self.epsilon = (self.epsilon * self.cfg.epsilon_decay).max(self.cfg.epsilon_min);
        }

        Ok(())
    }

    /// Copies primary parameters into the target network, verbatim.
    pub fn update_target(&mut self) {
        self.target.copy_from(&self.primary);
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn memory_len(&self) -> usize {
        self.buffer.len()
    }

    /// The frozen policy view of the primary network.
    pub fn policy(&self) -> &QNetwork {
        &self.primary
    }

    pub fn target_network(&self) -> &QNetwork {
        &self.target
    }

    /// Persists the primary network's parameters.
    pub fn save(&self, path: &Path) -> CoingymResult<()> {
        self.primary.save(path)
    }

    /// Replaces the primary network's parameters. The target network is left
    /// untouched; callers sync it explicitly when they need to.
    pub fn load(&mut self, path: &Path) -> CoingymResult<()> {
        self.primary = QNetwork::load(path)?;
        Ok(())
    }
}
