use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use chrono::Local;
use polars::prelude::{CsvWriter, LazyCsvReader, LazyFileListReader, PlPath, SerWriter};

use crate::{
    data::{frame::MarketFrame, scaler::StandardScaler},
    error::{CoingymResult, DataError, IoError},
};

/// File name of the persisted primary Q-network.
pub const MODEL_FILE: &str = "dqn_model.json";
/// File name of the processed dataset snapshot.
pub const DATASET_FILE: &str = "data.csv";
/// File name of the fitted feature scaler.
pub const SCALER_FILE: &str = "scaler.json";

/// A per-run artifact directory named after the current date.
///
/// `create` picks `YYYYMMDD` under the base directory; if that name is taken
/// by a non-empty directory it falls back to `YYYYMMDD_1`, `YYYYMMDD_2` and
/// so on. An existing but empty directory is reused. Every run owns exactly
/// the model, dataset and scaler artifacts written into it.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    #[tracing::instrument]
    pub fn create(base: &Path) -> CoingymResult<Self> {
        let stamp = Local::now().format("%Y%m%d").to_string();

        let mut suffix = 0usize;
        let path = loop {
            let name = if suffix == 0 {
                stamp.clone()
            } else {
                format!("{stamp}_{suffix}")
            };
            let candidate = base.join(&name);

            if !candidate.exists() || is_empty_dir(&candidate)? {
                break candidate;
            }
            suffix += 1;
        };

        std::fs::create_dir_all(&path).map_err(|e| {
            IoError::FileSystem(format!(
                "Failed to create run directory {}: {e}",
                path.display()
            ))
        })?;

        tracing::info!(path = %path.display(), "run directory created");
        Ok(Self { path })
    }

    /// Opens an existing run directory by name.
    pub fn open(base: &Path, name: &str) -> CoingymResult<Self> {
        let path = base.join(name);
        if !path.is_dir() {
            return Err(IoError::FileSystem(format!(
                "Run directory {} does not exist",
                path.display()
            ))
            .into());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model_path(&self) -> PathBuf {
        self.path.join(MODEL_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.path.join(DATASET_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.path.join(SCALER_FILE)
    }

    /// Snapshots the processed dataset alongside the model it trained.
    pub fn save_dataset(&self, frame: &MarketFrame) -> CoingymResult<()> {
        let file = File::create(self.dataset_path()).map_err(IoError::Io)?;
        let mut df = frame.as_df().clone();
        CsvWriter::new(BufWriter::new(file))
            .finish(&mut df)
            .map_err(|e| IoError::WriteFailed(format!("CSV write failed: {e}")))?;
        Ok(())
    }

    pub fn load_dataset(&self) -> CoingymResult<MarketFrame> {
        let path = self.dataset_path();
        let path_str = path
            .to_str()
            .ok_or_else(|| IoError::ReadFailed(format!("Non-UTF-8 path: {}", path.display())))?;

        let df = LazyCsvReader::new(PlPath::new(path_str))
            .with_has_header(true)
            .finish()
            .map_err(|e| DataError::DataFrame(format!("Failed to read {path_str}: {e}")))?
            .collect()
            .map_err(|e| DataError::DataFrame(format!("Failed to collect {path_str}: {e}")))?;

        MarketFrame::new(df)
    }

    pub fn save_scaler(&self, scaler: &StandardScaler) -> CoingymResult<()> {
        let file = File::create(self.scaler_path()).map_err(IoError::Io)?;
        serde_json::to_writer(BufWriter::new(file), scaler).map_err(IoError::Json)?;
        Ok(())
    }

    pub fn load_scaler(&self) -> CoingymResult<StandardScaler> {
        let file = File::open(self.scaler_path()).map_err(IoError::Io)?;
        let scaler = serde_json::from_reader(BufReader::new(file)).map_err(IoError::Json)?;
        Ok(scaler)
    }
}

fn is_empty_dir(path: &Path) -> CoingymResult<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path).map_err(IoError::Io)?;
    Ok(entries.next().is_none())
}
