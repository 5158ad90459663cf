use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    agent::PolicyModel,
    error::{AgentError, CoingymResult, IoError},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    /// `(fan_in, fan_out)` weight matrix.
    weights: Array2<f64>,
    biases: Array1<f64>,
}

impl DenseLayer {
    fn init<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        // Xavier uniform keeps early Q-values in a sane range.
        let scale = (6.0 / (fan_in + fan_out) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.random_range(-scale..scale)),
            biases: Array1::zeros(fan_out),
        }
    }
}

/// A plain MLP Q-value approximator: ReLU hidden layers, linear output.
///
/// Training is single-sample SGD that nudges only the taken action's output
/// toward its target; outputs for other actions are left untouched for that
/// sample. No momentum, no clipping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
    learning_rate: f64,
}

impl QNetwork {
    /// Builds a network with the given layer sizes, input first, output last.
    pub fn new<R: Rng>(layer_sizes: &[usize], learning_rate: f64, rng: &mut R) -> CoingymResult<Self> {
        if layer_sizes.len() < 2 {
            return Err(AgentError::InvalidInput(format!(
                "Need at least an input and an output layer, got {} sizes",
                layer_sizes.len()
            ))
            .into());
        }
        if layer_sizes.iter().any(|&s| s == 0) {
            return Err(AgentError::InvalidInput("Layer sizes must be non-zero".to_string()).into());
        }

        let layers = layer_sizes
            .windows(2)
            .map(|pair| DenseLayer::init(pair[0], pair[1], rng))
            .collect();

        Ok(Self {
            layers,
            learning_rate,
        })
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].biases.len()
    }

    /// Forward pass keeping every layer activation, input included.
    fn activations(&self, state: &Array1<f64>) -> CoingymResult<Vec<Array1<f64>>> {
        if state.len() != self.input_size() {
            return Err(AgentError::ShapeMismatch(format!(
                "Network expects state size {} but received {}",
                self.input_size(),
                state.len()
            ))
            .into());
        }

        let last = self.layers.len() - 1;
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(state.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = acts[i].dot(&layer.weights) + &layer.biases;
            if i < last {
                z.mapv_inplace(|v| v.max(0.0));
            }
            acts.push(z);
        }

        Ok(acts)
    }

    /// Q-values for a single state.
    pub fn forward(&self, state: &Array1<f64>) -> CoingymResult<Array1<f64>> {
        let mut acts = self.activations(state)?;
        Ok(acts.pop().unwrap_or_default())
    }

    /// Index of the highest-valued action for a single state. Exact ties
    /// resolve to the lowest index.
    pub fn best_action(&self, state: &Array1<f64>) -> CoingymResult<usize> {
        let q = self.forward(state)?;
        let best = q.iter().enumerate().fold(0, |best, (i, v)| {
            if v.total_cmp(&q[best]).is_gt() { i } else { best }
        });
        Ok(best)
    }

    /// Nudges the output for `action_index` toward `target` on one sample.
    pub fn fit_action(
        &mut self,
        state: &Array1<f64>,
        action_index: usize,
        target: f64,
    ) -> CoingymResult<()> {
        if action_index >= self.output_size() {
            return Err(AgentError::InvalidInput(format!(
                "Action index {action_index} out of range for output size {}",
                self.output_size()
            ))
            .into());
        }

        let acts = self.activations(state)?;
        let output = &acts[acts.len() - 1];

        let mut delta = Array1::<f64>::zeros(self.output_size());
        delta[action_index] = output[action_index] - target;

        for i in (0..self.layers.len()).rev() {
            let input = &acts[i];

            // Propagate before mutating this layer's weights.
            let delta_prev = if i > 0 {
                let mut d = self.layers[i].weights.dot(&delta);
                // ReLU derivative from the post-activation value.
                for (v, a) in d.iter_mut().zip(input.iter()) {
                    if *a <= 0.0 {
                        *v = 0.0;
                    }
                }
                Some(d)
            } else {
                None
            };

            let grad_w = input
                .view()
                .insert_axis(Axis(1))
                .dot(&delta.view().insert_axis(Axis(0)));
            self.layers[i].weights.scaled_add(-self.learning_rate, &grad_w);
            self.layers[i].biases.scaled_add(-self.learning_rate, &delta);

            if let Some(d) = delta_prev {
                delta = d;
            }
        }

        Ok(())
    }

    /// Replaces this network's parameters with `other`'s, verbatim.
    pub fn copy_from(&mut self, other: &QNetwork) {
        self.layers = other.layers.clone();
        self.learning_rate = other.learning_rate;
    }

    pub fn save(&self, path: &Path) -> CoingymResult<()> {
        let file = File::create(path).map_err(IoError::Io)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self).map_err(IoError::Json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> CoingymResult<Self> {
        let file = File::open(path).map_err(IoError::Io)?;
        let reader = BufReader::new(file);
        let network = serde_json::from_reader(reader).map_err(IoError::Json)?;
        Ok(network)
    }
}

impl PolicyModel for QNetwork {
    fn predict(&self, states: &Array2<f64>) -> CoingymResult<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((states.nrows(), self.output_size()));
        for (i, row) in states.rows().into_iter().enumerate() {
            let q = self.forward(&row.to_owned())?;
            out.row_mut(i).assign(&q);
        }
        Ok(out)
    }
}
