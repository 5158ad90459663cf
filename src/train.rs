use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    agent::dqn::{AgentConfig, DqnAgent},
    data::frame::MarketFrame,
    error::{CoingymResult, EnvError},
    gym::env::{EnvConfig, TradingEnv},
    io::RunDirectory,
};

/// Shape of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainConfig {
    pub episodes: usize,
    pub max_steps_per_episode: usize,
    /// Replay batch size; replay only fires once the buffer holds more than
    /// this many experiences.
    pub batch_size: usize,
    /// Target network sync cadence, in episodes.
    pub target_sync_interval: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_steps_per_episode: 10,
            batch_size: 64,
            target_sync_interval: 1,
        }
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    pub episodes: usize,
    pub total_steps: usize,
    pub replay_calls: usize,
    pub final_epsilon: f64,
    pub final_balance: f64,
}

/// Drives one agent through repeated episodes on one environment.
///
/// Training is an offline batch job: any error during a step propagates and
/// aborts the run, there are no retries.
#[derive(Debug)]
pub struct Trainer {
    env: TradingEnv,
    agent: DqnAgent,
    cfg: TrainConfig,
}

impl Trainer {
    pub fn new(env: TradingEnv, agent: DqnAgent, cfg: TrainConfig) -> CoingymResult<Self> {
        if cfg.episodes == 0 || cfg.max_steps_per_episode == 0 || cfg.batch_size == 0 {
            return Err(EnvError::InvalidConfig(format!(
                "episodes, max_steps_per_episode and batch_size must be positive, got {cfg:?}"
            ))
            .into());
        }
        Ok(Self { env, agent, cfg })
    }

    #[tracing::instrument(skip(self), fields(episodes = self.cfg.episodes))]
    pub fn run(&mut self) -> CoingymResult<TrainReport> {
        let bar = progress_bar(self.cfg.episodes as u64)?;
        let mut total_steps = 0usize;
        let mut replay_calls = 0usize;

        for episode in 0..self.cfg.episodes {
            let mut state = self.env.reset();

            for _ in 0..self.cfg.max_steps_per_episode {
                let action = self.agent.act(&state)?;
                let step = self.env.step(action)?;

                self.agent.remember(
                    state,
                    action,
                    step.reward,
                    step.observation.clone(),
                    step.done,
                );
                state = step.observation;
                total_steps += 1;

                if self.agent.memory_len() > self.cfg.batch_size {
                    self.agent.replay(self.cfg.batch_size)?;
                    replay_calls += 1;
                }

                if step.done {
                    break;
                }
            }

            if self.cfg.target_sync_interval > 0
                && (episode + 1) % self.cfg.target_sync_interval == 0
            {
                self.agent.update_target();
            }

            tracing::info!(
                episode,
                balance = self.env.balance(),
                epsilon = self.agent.epsilon(),
                "episode complete"
            );
            bar.inc(1);
        }

        bar.finish();

        Ok(TrainReport {
            episodes: self.cfg.episodes,
            total_steps,
            replay_calls,
            final_epsilon: self.agent.epsilon(),
            final_balance: self.env.balance(),
        })
    }

    pub fn agent(&self) -> &DqnAgent {
        &self.agent
    }

    pub fn into_agent(self) -> DqnAgent {
        self.agent
    }
}

/// Trains a fresh agent on the frame and persists the primary network into
/// the run directory. Returns the trained agent and the run summary.
pub fn train_model(
    frame: &MarketFrame,
    env_cfg: EnvConfig,
    agent_cfg: AgentConfig,
    train_cfg: TrainConfig,
    run: &RunDirectory,
) -> CoingymResult<(DqnAgent, TrainReport)> {
    let env = TradingEnv::new(frame, env_cfg)?;
    let agent = DqnAgent::new(env.state_size(), agent_cfg)?;

    let mut trainer = Trainer::new(env, agent, train_cfg)?;
    let report = trainer.run()?;

    let agent = trainer.into_agent();
    agent.save(&run.model_path())?;
    tracing::info!(model = %run.model_path().display(), "model persisted");

    Ok((agent, report))
}

// ================================================================================================
// Helper Functions
// ================================================================================================
fn progress_bar(capacity: u64) -> CoingymResult<ProgressBar> {
    let bar = ProgressBar::new(capacity);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta_precise}) {msg}")
            .map_err(EnvError::ProgressBar)?
            .progress_chars("#>-"));
    Ok(bar)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    fn training_frame(rows: usize) -> MarketFrame {
        let close: Vec<f64> = (0..rows).map(|i| 100.0 + (i as f64).sin()).collect();
        let log_return: Vec<f64> = (0..rows).map(|i| 0.01 * ((i % 3) as f64 - 1.0)).collect();
        let df = df!("close" => close, "log_return" => log_return).unwrap();
        MarketFrame::new(df).unwrap()
    }

    fn small_agent(state_size: usize, memory_capacity: usize) -> DqnAgent {
        let cfg = AgentConfig {
            hidden_layers: vec![8],
            memory_capacity,
            ..Default::default()
        };
        DqnAgent::with_seed(state_size, cfg, 11).unwrap()
    }

    fn trainer_with(cfg: TrainConfig) -> Trainer {
        let frame = training_frame(50);
        let env = TradingEnv::new(&frame, EnvConfig::default()).unwrap();
        let agent = small_agent(env.state_size(), 256);
        Trainer::new(env, agent, cfg).unwrap()
    }

    // ========================================================================
    // Test: Loop Shape
    // ========================================================================

    #[test]
    fn test_run_caps_steps_per_episode() {
        let cfg = TrainConfig {
            episodes: 3,
            max_steps_per_episode: 5,
            batch_size: 4,
            target_sync_interval: 1,
        };
        let mut trainer = trainer_with(cfg);
        let report = trainer.run().unwrap();

        assert_eq!(report.episodes, 3);
        assert_eq!(
            report.total_steps, 15,
            "50-row frame never terminates within 5 steps"
        );
    }

    #[test]
    fn test_short_frame_ends_episode_early() {
        let frame = training_frame(3);
        let env = TradingEnv::new(&frame, EnvConfig::default()).unwrap();
        let agent = small_agent(env.state_size(), 64);
        let cfg = TrainConfig {
            episodes: 2,
            max_steps_per_episode: 10,
            batch_size: 4,
            target_sync_interval: 1,
        };

        let report = Trainer::new(env, agent, cfg).unwrap().run().unwrap();

        // A 3-row frame is terminal after 2 steps.
        assert_eq!(report.total_steps, 4, "episodes must break on done");
    }

    // ========================================================================
    // Test: Replay Gating
    // ========================================================================

    #[test]
    fn test_replay_waits_for_buffer_to_exceed_batch_size() {
        let cfg = TrainConfig {
            episodes: 1,
            max_steps_per_episode: 8,
            batch_size: 64,
            target_sync_interval: 1,
        };
        let mut trainer = trainer_with(cfg);
        let report = trainer.run().unwrap();

        assert_eq!(report.replay_calls, 0, "8 experiences never exceed batch 64");
        assert_eq!(report.final_epsilon, 0.9, "no replay means no epsilon decay");
    }

    #[test]
    fn test_replay_fires_once_buffer_is_large_enough() {
        let cfg = TrainConfig {
            episodes: 4,
            max_steps_per_episode: 10,
            batch_size: 8,
            target_sync_interval: 1,
        };
        let mut trainer = trainer_with(cfg);
        let report = trainer.run().unwrap();

        // 40 steps total; replay fires from the 9th experience on.
        assert_eq!(report.replay_calls, 32);
        assert!(
            report.final_epsilon < 0.9,
            "epsilon must decay once replay runs"
        );
    }

    // ========================================================================
    // Test: Configuration and Persistence
    // ========================================================================

    #[test]
    fn test_zero_episodes_rejected() {
        let frame = training_frame(10);
        let env = TradingEnv::new(&frame, EnvConfig::default()).unwrap();
        let agent = small_agent(env.state_size(), 64);
        let cfg = TrainConfig {
            episodes: 0,
            ..Default::default()
        };

        assert!(Trainer::new(env, agent, cfg).is_err());
    }

    #[test]
    fn test_train_model_persists_the_network() {
        let base = std::env::temp_dir().join(format!("coingym_train_{}", std::process::id()));
        std::fs::remove_dir_all(&base).ok();
        std::fs::create_dir_all(&base).unwrap();
        let run = RunDirectory::create(&base).unwrap();

        let frame = training_frame(20);
        let train_cfg = TrainConfig {
            episodes: 2,
            max_steps_per_episode: 5,
            batch_size: 4,
            target_sync_interval: 1,
        };
        let agent_cfg = AgentConfig {
            hidden_layers: vec![8],
            ..Default::default()
        };

        let (agent, report) =
            train_model(&frame, EnvConfig::default(), agent_cfg, train_cfg, &run).unwrap();

        assert!(run.model_path().exists(), "model artifact must be written");
        assert_eq!(report.total_steps, 10);

        let mut reloaded = small_agent(frame.state_size(), 64);
        reloaded.load(&run.model_path()).unwrap();
        let state = frame.observation(0).unwrap();
        let a = agent.policy().forward(&state).unwrap();
        let b = reloaded.policy().forward(&state).unwrap();
        for j in 0..3 {
            assert!((a[j] - b[j]).abs() < 1e-12);
        }

        std::fs::remove_dir_all(&base).ok();
    }
}
