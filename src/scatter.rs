// Scatter pivot: one output row per input row, no aggregation

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::chain::{self, KeyValuePair};
use crate::data::{cell, Row, Value};
use crate::group::row_key;
use crate::ir::{dataset_ids, ColumnFormats, DatasetOption};
use crate::pivot::create_dimensions;

/// Missing scatter cells default to null, unlike bar/line/pie.
pub const SCATTER_MISSING_VALUE: Value = Value::Null;

/// Fields that shape a scatter dataset.
#[derive(Debug, Clone, Copy)]
pub struct ScatterFields<'a> {
    pub x: &'a str,
    pub measures: &'a [String],
    pub categories: &'a [String],
    pub size: Option<&'a str>,
}

/// Category keys in first-seen order. Used only to split series.
pub fn scatter_categories(rows: &[Row], category_fields: &[String]) -> IndexSet<String> {
    rows.iter().map(|row| row_key(row, category_fields)).collect()
}

/// `[x, series..., category?, size?]`, each encoded as a key chain.
pub fn scatter_dimensions(
    fields: &ScatterFields<'_>,
    categories: &IndexSet<String>,
) -> Vec<String> {
    let mut dims = vec![chain::encode(&[KeyValuePair::new(fields.x, "")])];
    dims.extend(create_dimensions(fields.measures, categories));
    if !fields.categories.is_empty() {
        let pairs: Vec<KeyValuePair> = fields
            .categories
            .iter()
            .map(|f| KeyValuePair::key_only(f.clone()))
            .collect();
        dims.push(chain::encode(&pairs));
    }
    if let Some(size) = fields.size {
        dims.push(chain::encode(&[KeyValuePair::new(size, "")]));
    }
    dims
}

/// Build the single scatter dataset.
///
/// A series cell is filled only when the row belongs to that series'
/// category; every other cell takes the measure's placeholder.
pub fn scatter_pivot(
    rows: &[Row],
    fields: &ScatterFields<'_>,
    formats: &ColumnFormats,
) -> DatasetOption {
    let categories = scatter_categories(rows, fields.categories);
    let dimensions = scatter_dimensions(fields, &categories);

    let placeholders: Vec<Value> = fields
        .measures
        .iter()
        .map(|m| {
            formats
                .get(m)
                .map(|f| f.missing_value(&SCATTER_MISSING_VALUE))
                .unwrap_or(SCATTER_MISSING_VALUE)
        })
        .collect();

    let source: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            let category_key = row_key(row, fields.categories);
            let mut out = Vec::with_capacity(dimensions.len());
            out.push(cell(row, fields.x).clone());

            for (measure, placeholder) in fields.measures.iter().zip(&placeholders) {
                for category in &categories {
                    let value = cell(row, measure);
                    if *category == category_key && !value.is_null() {
                        out.push(value.clone());
                    } else {
                        out.push(placeholder.clone());
                    }
                }
            }

            if !fields.categories.is_empty() {
                out.push(Value::Text(category_key));
            }
            if let Some(size) = fields.size {
                out.push(cell(row, size).clone());
            }
            out
        })
        .collect();

    tracing::debug!(
        rows = source.len(),
        series = fields.measures.len() * categories.len(),
        "built scatter dataset"
    );

    DatasetOption::new(dataset_ids::SCATTER, Arc::new(dimensions), source)
}

/// Tooltip keys: the explicit tooltip fields, or the measures plus x when
/// none are set. The size field is always appended.
pub fn scatter_tooltip_keys(
    tooltip_fields: &[String],
    fields: &ScatterFields<'_>,
    categories: &IndexSet<String>,
) -> Vec<String> {
    let mut keys: Vec<String> = if tooltip_fields.is_empty() {
        let mut base = fields.measures.to_vec();
        base.push(fields.x.to_string());
        base
    } else {
        tooltip_fields.to_vec()
    };
    if let Some(size) = fields.size {
        keys.push(size.to_string());
    }
    create_dimensions(&keys, categories)
}

/// Observed bounds of a size column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
}

/// Size-column bounds per series, owned by whoever renders the chart.
///
/// Entries never outlive the cache, so two charts with different caches
/// cannot see each other's ranges.
#[derive(Debug, Clone, Default)]
pub struct SizeRangeCache {
    ranges: HashMap<String, SizeRange>,
}

impl SizeRangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds of `column` in `dataset`, computed once per series.
    /// `None` when the column holds no numbers.
    pub fn range(
        &mut self,
        series: &str,
        dataset: &DatasetOption,
        column: usize,
    ) -> Option<SizeRange> {
        if let Some(range) = self.ranges.get(series) {
            return Some(*range);
        }
        let range = dataset
            .column(column)
            .filter_map(Value::as_number)
            .fold(None, |acc: Option<SizeRange>, v| match acc {
                None => Some(SizeRange { min: v, max: v }),
                Some(r) => Some(SizeRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })?;
        self.ranges.insert(series.to_string(), range);
        Some(range)
    }

    pub fn invalidate(&mut self, series: &str) {
        self.ranges.remove(series);
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Map `value` linearly from `range` into `[low, high]`.
pub fn scale_point_size(value: f64, range: SizeRange, (low, high): (f64, f64)) -> f64 {
    if range.min == range.max {
        return (low + high) / 2.0;
    }
    let ratio = (value - range.min) / (range.max - range.min);
    low + ratio * (high - low)
}

/// Point size of every row of a scatter dataset for one series. Without a
/// size column every point gets the smallest size.
pub fn point_sizes(
    dataset: &DatasetOption,
    series: &str,
    size_field: Option<&str>,
    dot_size: (f64, f64),
    cache: &mut SizeRangeCache,
) -> Vec<f64> {
    let column = size_field.and_then(|field| {
        let dimension = chain::encode(&[KeyValuePair::new(field, "")]);
        dataset.column_index(&dimension)
    });

    let range = column.and_then(|c| cache.range(series, dataset, c).map(|r| (c, r)));
    match range {
        Some((c, r)) => dataset
            .source
            .iter()
            .map(|row| {
                let v = row.get(c).map(Value::coerce_number).unwrap_or(r.min);
                scale_point_size(v, r, dot_size)
            })
            .collect(),
        None => vec![dot_size.0; dataset.source.len()],
    }
}
