use std::collections::VecDeque;

use ndarray::Array1;
use rand::{Rng, seq::index};

use crate::{
    error::{AgentError, CoingymResult},
    gym::Action,
};

/// One observed transition, stored verbatim for later replay.
#[derive(Debug, Clone)]
pub struct Experience {
    pub state: Array1<f64>,
    pub action: Action,
    pub reward: f64,
    pub next_state: Array1<f64>,
    pub done: bool,
}

/// Bounded FIFO store of past transitions.
///
/// Once capacity is reached the oldest experience is evicted silently, so the
/// buffer always holds the most recent window of behavior.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draws `batch_size` distinct experiences uniformly at random.
    pub fn sample<R: Rng>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> CoingymResult<Vec<&Experience>> {
        if self.buffer.len() < batch_size {
            return Err(AgentError::InsufficientExperiences {
                needed: batch_size,
                have: self.buffer.len(),
            }
            .into());
        }

        let picks = index::sample(rng, self.buffer.len(), batch_size);
        Ok(picks.iter().map(|i| &self.buffer[i]).collect())
    }
}
