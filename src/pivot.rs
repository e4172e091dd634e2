// Pivot materialization: grouped buckets -> dense dataset matrix

use crate::chain::{self, KeyValuePair};
use crate::data::Value;
use crate::group::GroupedRows;
use crate::ir::{AxisSpec, ColumnFormats};

/// Default placeholder for missing bar/line/pie cells.
pub const DEFAULT_MISSING_VALUE: Value = Value::Number(0.0);

/// One dimension key per (measure, category) pair, measures outermost.
pub fn create_dimensions<'a, I>(measures: &[String], categories: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
    I::IntoIter: Clone,
{
    let categories = categories.into_iter();
    let mut keys = Vec::new();
    for measure in measures {
        for category in categories.clone() {
            keys.push(chain::append_to_chain(
                &[KeyValuePair::key_only(measure.clone())],
                Some(category),
            ));
        }
    }
    keys
}

/// Dataset dimensions: the plain x label followed by every series key.
pub fn dimensions(grouped: &GroupedRows, measures: &[String], x_fields: &[String]) -> Vec<String> {
    let mut dims = vec![x_fields.join(",")];
    dims.extend(create_dimensions(measures, &grouped.categories));
    dims
}

/// Tooltip keys: the explicit tooltip fields, falling back to every measure.
pub fn tooltip_keys<'a, I>(
    tooltip_fields: &[String],
    measures: &[String],
    categories: I,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
    I::IntoIter: Clone,
{
    let fields = if tooltip_fields.is_empty() {
        measures
    } else {
        tooltip_fields
    };
    create_dimensions(fields, categories)
}

/// True when an explicit tooltip field is on neither y axis.
pub fn has_mismatched_tooltips(axis: &AxisSpec) -> bool {
    axis.tooltip_fields()
        .iter()
        .any(|field| !axis.y.contains(field) && !axis.y2.contains(field))
}

/// Build one row per x value, one cell per (measure, category).
///
/// Numeric bucket values are kept as-is; everything else is replaced with the
/// measure's configured placeholder (or `0` when none is configured), so every
/// missing cell of a column carries the same value.
pub fn materialize(
    grouped: &GroupedRows,
    measures: &[String],
    formats: &ColumnFormats,
) -> Vec<Vec<Value>> {
    let placeholders: Vec<Value> = measures
        .iter()
        .map(|measure| {
            formats
                .get(measure)
                .map(|f| f.missing_value(&DEFAULT_MISSING_VALUE))
                .unwrap_or(DEFAULT_MISSING_VALUE)
        })
        .collect();

    grouped
        .x_values
        .iter()
        .map(|x| {
            let mut row = Vec::with_capacity(1 + measures.len() * grouped.categories.len());
            row.push(Value::Text(x.clone()));
            for (measure, placeholder) in measures.iter().zip(&placeholders) {
                for category in &grouped.categories {
                    let value = match grouped.measure(x, category, measure) {
                        Some(v) if v.is_number() => v.clone(),
                        _ => placeholder.clone(),
                    };
                    row.push(value);
                }
            }
            row
        })
        .collect()
}
