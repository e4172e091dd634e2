// Series aggregates over one dataset column

use serde::{Deserialize, Serialize};

use crate::data::Value;
use crate::ir::DatasetOption;

/// Aggregates a legend headline or descriptive trendline can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Current,
    Total,
    Average,
    Median,
    Min,
    Max,
}

/// Numeric cells of one column, in row order. Non-numeric cells are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSummary {
    values: Vec<f64>,
}

impl SeriesSummary {
    pub fn from_values<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        Self {
            values: cells.into_iter().filter_map(Value::as_number).collect(),
        }
    }

    pub fn from_column(dataset: &DatasetOption, column: usize) -> Self {
        Self::from_values(dataset.column(column))
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Last numeric value.
    pub fn current(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn average(&self) -> Option<f64> {
        (!self.values.is_empty()).then(|| self.total() / self.values.len() as f64)
    }

    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            Some(sorted[mid])
        } else {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn evaluate(&self, aggregate: Aggregate) -> Option<f64> {
        match aggregate {
            Aggregate::Current => self.current(),
            Aggregate::Total => Some(self.total()),
            Aggregate::Average => self.average(),
            Aggregate::Median => self.median(),
            Aggregate::Min => self.min(),
            Aggregate::Max => self.max(),
        }
    }
}

/// `value` as a share of `total`, e.g. `"33.33%"`. A zero total gives `"0%"`.
pub fn format_percentage(value: f64, total: f64) -> String {
    if total == 0.0 || !total.is_finite() || !value.is_finite() {
        return "0%".to_string();
    }
    let percent = (value / total * 100.0 * 100.0).round() / 100.0;
    let text = format!("{:.2}", percent);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{}%", text)
}
