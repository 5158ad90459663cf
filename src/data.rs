use polars::prelude::PlSmallStr;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

pub mod frame;
pub mod scaler;

/// Well-known column names of the prepared market dataset.
///
/// The dataset arrives with `close` and `log_return` always present, an
/// optional binary `target` label left over from supervised preprocessing,
/// an optional latent `lstm_feature` and an optional `timestamp` column.
/// Any further numeric columns are treated as opaque features.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MarketCol {
    Close,
    LogReturn,
    Target,
    LstmFeature,
    Timestamp,
}

impl From<MarketCol> for PlSmallStr {
    fn from(value: MarketCol) -> Self {
        value.as_str().into()
    }
}

impl MarketCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}
