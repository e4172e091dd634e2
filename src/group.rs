// Row grouping: buckets raw rows by (x, category) and sums colliding measures

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};

use crate::chain::{self, KeyValuePair};
use crate::data::{cell, Row, Value};
use crate::date::value_timestamp_millis;

/// Joins non-numeric measure values that land in the same bucket.
pub const GROUPING_SEPARATOR: &str = " - ";

/// Measure values of one bucket, keyed by measure field.
pub type Measures = IndexMap<String, Value>;

/// Output of [`group_rows`]. Every set keeps first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedRows {
    /// Encoded x keys.
    pub x_values: IndexSet<String>,
    /// Encoded category keys; a single empty key when there are no category fields.
    pub categories: IndexSet<String>,
    /// (x key, category key) -> measures.
    pub buckets: IndexMap<(String, String), Measures>,
}

impl GroupedRows {
    pub fn measure(&self, x: &str, category: &str, field: &str) -> Option<&Value> {
        self.buckets
            .get(&(x.to_string(), category.to_string()))
            .and_then(|m| m.get(field))
    }
}

/// Encode the values of `fields` in `row` as a key chain.
pub fn row_key(row: &Row, fields: &[String]) -> String {
    let pairs: Vec<KeyValuePair> = fields
        .iter()
        .map(|field| KeyValuePair::new(field.clone(), cell(row, field).to_label()))
        .collect();
    chain::encode(&pairs)
}

/// Group rows by their x and category keys in a single pass.
///
/// Colliding numeric measures are summed; any other collision keeps the value
/// when both sides are equal and otherwise joins them with
/// [`GROUPING_SEPARATOR`].
pub fn group_rows<'a, I>(
    rows: I,
    x_fields: &[String],
    category_fields: &[String],
    measure_fields: &[String],
) -> GroupedRows
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut grouped = GroupedRows::default();

    for row in rows {
        let category_key = row_key(row, category_fields);
        let x_key = row_key(row, x_fields);

        grouped.categories.insert(category_key.clone());
        grouped.x_values.insert(x_key.clone());

        let measures: Measures = measure_fields
            .iter()
            .map(|field| (field.clone(), cell(row, field).clone()))
            .collect();

        match grouped.buckets.get_mut(&(x_key.clone(), category_key.clone())) {
            None => {
                grouped.buckets.insert((x_key, category_key), measures);
            }
            Some(existing) => merge_measures(existing, measures),
        }
    }

    tracing::debug!(
        x_values = grouped.x_values.len(),
        categories = grouped.categories.len(),
        buckets = grouped.buckets.len(),
        "grouped rows"
    );

    grouped
}

fn merge_measures(existing: &mut Measures, incoming: Measures) {
    for (field, new_value) in incoming {
        let slot = existing.entry(field).or_insert(Value::Null);
        *slot = merge_value(slot, new_value);
    }
}

/// Combine two measure values that landed in the same bucket.
pub fn merge_value(current: &Value, incoming: Value) -> Value {
    if let (Value::Number(a), Value::Number(b)) = (current, &incoming) {
        return Value::Number(a + b);
    }
    if *current == incoming {
        return incoming;
    }
    Value::Text(format!(
        "{}{}{}",
        joined_label(current),
        GROUPING_SEPARATOR,
        joined_label(&incoming)
    ))
}

// Nulls contribute nothing to a joined label.
fn joined_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_label(),
    }
}

/// Stable sort of rows by their date-typed x fields so that first-seen x order
/// is chronological. Numbers compare numerically; text compares by parsed
/// timestamp; unparseable values go last.
pub fn sort_rows_by_date_fields<'a>(rows: &'a [Row], date_fields: &[String]) -> Vec<&'a Row> {
    let mut sorted: Vec<&Row> = rows.iter().collect();
    if date_fields.is_empty() {
        return sorted;
    }

    sorted.sort_by(|a, b| {
        for field in date_fields {
            let ordering = compare_temporal(cell(a, field), cell(b, field));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    sorted
}

fn compare_temporal(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x.total_cmp(&y);
    }
    match (value_timestamp_millis(a), value_timestamp_millis(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
