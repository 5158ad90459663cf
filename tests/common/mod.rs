use std::path::PathBuf;

use coingym::{AgentConfig, MarketFrame, StandardScaler, TrainConfig};
use ndarray::Array2;
use polars::{df, prelude::Column};
use tracing_subscriber::EnvFilter;

/// Installs a test log subscriber once; subsequent calls are no-ops.
pub fn setup_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init()
        .ok();
}

/// A synthetic dataset in original units: a drifting close price, its log
/// returns and one extra indicator column.
pub fn setup_market_frame(rows: usize) -> MarketFrame {
    let log_returns: Vec<f64> = (0..rows)
        .map(|i| if i == 0 { 0.0 } else { 0.01 * (i as f64).sin() })
        .collect();

    let mut close = Vec::with_capacity(rows);
    let mut price = 20_000.0f64;
    for r in &log_returns {
        price *= r.exp();
        close.push(price);
    }

    let rsi: Vec<f64> = (0..rows).map(|i| 50.0 + 10.0 * (i as f64 * 0.7).sin()).collect();

    let df = df!(
        "close" => close,
        "log_return" => log_returns,
        "rsi" => rsi,
    )
    .unwrap();
    MarketFrame::new(df).unwrap()
}

/// Standardizes the unit-bearing columns (`close`, `rsi`) the way the
/// preprocessing stage would, returning the scaled frame and the fitted
/// scaler needed to undo it.
pub fn setup_scaled_frame(raw: &MarketFrame) -> (MarketFrame, StandardScaler) {
    let names = ["close", "rsi"];

    let mut data = Array2::<f64>::zeros((raw.height(), names.len()));
    for (j, name) in names.iter().enumerate() {
        for (i, v) in raw.column_f64(name).unwrap().into_iter().enumerate() {
            data[[i, j]] = v;
        }
    }

    let scaler = StandardScaler::fit(&data).unwrap();
    let scaled = scaler.transform(&data).unwrap();

    let mut df = raw.as_df().clone();
    for (j, name) in names.iter().enumerate() {
        df.with_column(Column::new((*name).into(), scaled.column(j).to_vec()))
            .unwrap();
    }

    (MarketFrame::new(df).unwrap(), scaler)
}

pub fn setup_agent_config() -> AgentConfig {
    AgentConfig {
        hidden_layers: vec![8, 8],
        memory_capacity: 128,
        ..Default::default()
    }
}

pub fn setup_train_config() -> TrainConfig {
    TrainConfig {
        episodes: 3,
        max_steps_per_episode: 10,
        batch_size: 8,
        target_sync_interval: 1,
    }
}

pub fn setup_temp_base(tag: &str) -> PathBuf {
    let base =
        std::env::temp_dir().join(format!("coingym_it_{tag}_{}", std::process::id()));
    std::fs::remove_dir_all(&base).ok();
    std::fs::create_dir_all(&base).unwrap();
    base
}
