// Library exports for chartset

pub mod csv_reader;
pub mod data;
pub mod date;
pub mod error;

// Dataset pipeline
pub mod chain;
pub mod engine;
pub mod group;
pub mod ir;
pub mod pivot;
pub mod scatter;
pub mod variant;

// Statistics
pub mod regression;
pub mod summary;
pub mod trendline;

pub use data::{Row, RowSet, Value};
pub use engine::{build_datasets, DatasetResult};
pub use error::{EngineError, EngineResult};
pub use ir::{
    AxisSpec, ChartRequest, ChartType, ColumnFormat, ColumnFormats, ColumnType, DatasetOption,
    TrendlineDataset, TrendlineSpec, TrendlineType,
};
pub use trendline::compute_trendline;
pub use variant::Pivot;

use serde::Deserialize;

/// How JSON output is written.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub enum OutputStyle {
    #[serde(rename = "compact")]
    #[default]
    Compact,
    #[serde(rename = "pretty")]
    Pretty,
}

impl OutputStyle {
    pub fn render(self, result: &DatasetResult) -> serde_json::Result<String> {
        match self {
            OutputStyle::Compact => serde_json::to_string(result),
            OutputStyle::Pretty => serde_json::to_string_pretty(result),
        }
    }
}
