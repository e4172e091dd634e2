// Chart-type variant pipeline
//
// Each transform reads the most recently added dataset and appends a new one.
// `Pivot::current()` is the dataset a renderer should draw.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use crate::chain;
use crate::data::Value;
use crate::ir::{dataset_ids, ChartRequest, ChartType, DatasetOption, SortDirection};

/// Label of the synthetic pie slice that absorbs small slices.
pub const OTHER_LABEL: &str = "Other";

/// Ordered dataset variants: the base pivot followed by every derived
/// variant, keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    base: DatasetOption,
    variants: IndexMap<String, DatasetOption>,
}

impl Pivot {
    pub fn new(base: DatasetOption) -> Self {
        Self {
            base,
            variants: IndexMap::new(),
        }
    }

    /// Append a variant; re-using an id moves that variant to the end.
    pub fn push(&mut self, dataset: DatasetOption) {
        if dataset.id == self.base.id {
            self.base = dataset;
            self.variants.clear();
            return;
        }
        self.variants.shift_remove(&dataset.id);
        self.variants.insert(dataset.id.clone(), dataset);
    }

    /// The last variant added, or the base when nothing was derived.
    pub fn current(&self) -> &DatasetOption {
        self.variants.last().map_or(&self.base, |(_, d)| d)
    }

    /// The dataset every variant was derived from.
    pub fn base(&self) -> &DatasetOption {
        &self.base
    }

    pub fn get(&self, id: &str) -> Option<&DatasetOption> {
        if id == self.base.id {
            return Some(&self.base);
        }
        self.variants.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|d| d.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetOption> {
        std::iter::once(&self.base).chain(self.variants.values())
    }

    pub fn len(&self) -> usize {
        1 + self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_datasets(self) -> Vec<DatasetOption> {
        std::iter::once(self.base)
            .chain(self.variants.into_values())
            .collect()
    }
}

impl Serialize for Pivot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Inputs of the variant pipeline beyond the base dataset.
#[derive(Debug, Clone, Default)]
pub struct VariantContext {
    /// Series keys of the primary y axis, in dimension order.
    pub y_axis_keys: Vec<String>,
    /// How many x fields are date-typed.
    pub date_x_fields: usize,
}

/// Run every transform that applies to `request` on top of `base`.
pub fn build_pivot(base: DatasetOption, request: &ChartRequest, ctx: &VariantContext) -> Pivot {
    let mut pivot = Pivot::new(base);

    if let ChartType::Pie = request.chart_type {
        if let Some(min_percent) = request.pie_minimum_slice_percentage.filter(|p| *p > 0.0) {
            add_pie_minimum_variants(&mut pivot, &ctx.y_axis_keys, min_percent);
        }
    }

    if request.is_percentage_stack() {
        apply(&mut pivot, dataset_ids::RELATIVE_STACK, relative_stack);
    }

    if request.has_active_bar_sort() {
        let keys = bar_sort_keys(pivot.current(), request, &ctx.y_axis_keys);
        if !keys.is_empty() {
            apply(&mut pivot, dataset_ids::SORTED_BY_BAR, |source| {
                sort_by_columns(source, &keys)
            });
        }
    }

    let wants_raw_dates = match request.chart_type {
        ChartType::Line | ChartType::Combo => ctx.date_x_fields == 1,
        ChartType::Bar | ChartType::Pie | ChartType::Scatter => false,
    };
    if wants_raw_dates {
        apply(&mut pivot, dataset_ids::RAW_WITH_DATE_NOT_DELIMITED, undelimit_dates);
    }

    tracing::debug!(variants = ?pivot.ids().collect::<Vec<_>>(), "built dataset variants");
    pivot
}

// Applies `transform` to the current variant. Empty datasets are left alone.
fn apply<F>(pivot: &mut Pivot, id: &str, transform: F)
where
    F: FnOnce(&[Vec<Value>]) -> Vec<Vec<Value>>,
{
    let current = pivot.current();
    if current.source.is_empty() {
        return;
    }
    let next = current.derive(id, transform(&current.source));
    pivot.push(next);
}

fn add_pie_minimum_variants(pivot: &mut Pivot, y_axis_keys: &[String], min_percent: f64) {
    let current = pivot.current().clone();
    if current.source.is_empty() {
        return;
    }
    let width = current.dimensions.len();

    for (y_index, key) in y_axis_keys.iter().enumerate() {
        let column = current.column_index(key).unwrap_or(y_index + 1);
        let slices = pie_minimum_slices(&current.source, column, min_percent, width);
        pivot.push(current.derive(dataset_ids::pie_minimum(key), slices));
    }
}

/// Fold slices below `min_percent` of the column total into one "Other" row.
///
/// Rows come back sorted by the column, descending. The sum of the column is
/// unchanged.
pub fn pie_minimum_slices(
    source: &[Vec<Value>],
    column: usize,
    min_percent: f64,
    width: usize,
) -> Vec<Vec<Value>> {
    let value_at = |row: &Vec<Value>| row.get(column).map(Value::coerce_number).unwrap_or(0.0);

    let total: f64 = source.iter().map(value_at).sum();
    let threshold = total * min_percent / 100.0;

    let mut sorted: Vec<&Vec<Value>> = source.iter().collect();
    sorted.sort_by(|a, b| value_at(b).total_cmp(&value_at(a)));

    let mut main = Vec::with_capacity(sorted.len());
    let mut other_total = 0.0;
    let mut has_small = false;
    for row in sorted {
        let reading = row.get(column).and_then(Value::numeric_reading);
        match reading {
            Some(v) if v >= threshold => main.push(row.clone()),
            _ => {
                has_small = true;
                other_total += value_at(row);
            }
        }
    }

    if has_small {
        let mut other = vec![Value::Number(0.0); width.max(column + 1)];
        other[0] = Value::text(OTHER_LABEL);
        other[column] = Value::Number(other_total);
        main.push(other);
    }
    main
}

/// Scale each row's numeric cells to percentages of the row total.
///
/// Rows whose total is zero come back unchanged. Nulls in a scaled row become
/// zero; other non-numeric cells pass through.
pub fn relative_stack(source: &[Vec<Value>]) -> Vec<Vec<Value>> {
    source
        .iter()
        .map(|row| {
            let Some((label, values)) = row.split_first() else {
                return row.clone();
            };
            let total: f64 = values.iter().filter_map(Value::as_number).sum();
            if total == 0.0 {
                return row.clone();
            }

            let mut out = Vec::with_capacity(row.len());
            out.push(label.clone());
            out.extend(values.iter().map(|v| match v {
                Value::Null => Value::Number(0.0),
                Value::Number(n) if n.is_finite() => Value::Number(n / total * 100.0),
                other => other.clone(),
            }));
            out
        })
        .collect()
}

/// Sort keys for the bar sort: for each y measure with a direction, every
/// series column of that measure, in dimension order.
pub fn bar_sort_keys(
    dataset: &DatasetOption,
    request: &ChartRequest,
    y_axis_keys: &[String],
) -> Vec<(usize, SortDirection)> {
    let mut keys = Vec::new();
    for (measure, direction) in request.axis.y.iter().zip(&request.bar_sort_by) {
        if *direction == SortDirection::None {
            continue;
        }
        for key in y_axis_keys {
            if chain::measure_key(key).as_deref() != Some(measure.as_str()) {
                continue;
            }
            if let Some(index) = dataset.column_index(key) {
                keys.push((index, *direction));
            }
        }
    }
    keys
}

/// Stable multi-key sort. Unreadable cells compare as zero.
pub fn sort_by_columns(source: &[Vec<Value>], keys: &[(usize, SortDirection)]) -> Vec<Vec<Value>> {
    let mut sorted = source.to_vec();
    sorted.sort_by(|a, b| {
        for &(index, direction) in keys {
            let va = a.get(index).map(Value::coerce_number).unwrap_or(0.0);
            let vb = b.get(index).map(Value::coerce_number).unwrap_or(0.0);
            let ordering = match direction {
                SortDirection::Asc => va.total_cmp(&vb),
                SortDirection::Desc => vb.total_cmp(&va),
                SortDirection::None => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    sorted
}

/// Replace each encoded row label with the raw date string it wraps.
pub fn undelimit_dates(source: &[Vec<Value>]) -> Vec<Vec<Value>> {
    source
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(Value::Text(label)) = row.first() {
                out[0] = Value::Text(chain::undelimited_value(label));
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AxisSpec, GroupType};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn num(v: f64) -> Value {
        Value::Number(v)
    }

    fn base(source: Vec<Vec<Value>>) -> DatasetOption {
        DatasetOption::new(
            dataset_ids::RAW,
            Arc::new(vec!["x".to_string(), "a__🔑__".to_string(), "b__🔑__".to_string()]),
            source,
        )
    }

    fn request(chart_type: ChartType) -> ChartRequest {
        ChartRequest::new(
            chart_type,
            AxisSpec {
                x: vec!["x".into()],
                y: vec!["a".into(), "b".into()],
                ..Default::default()
            },
        )
    }

    fn ctx() -> VariantContext {
        VariantContext {
            y_axis_keys: vec!["a__🔑__".to_string(), "b__🔑__".to_string()],
            date_x_fields: 0,
        }
    }

    #[test]
    fn test_relative_stack() {
        let source = vec![
            vec![Value::text("r1"), num(10.0), num(30.0)],
            vec![Value::text("r2"), num(0.0), Value::Null],
            vec![Value::text("r3"), num(5.0), Value::Null],
        ];
        let out = relative_stack(&source);
        assert_eq!(out[0], vec![Value::text("r1"), num(25.0), num(75.0)]);
        assert_eq!(out[1], source[1]);
        assert_eq!(out[2], vec![Value::text("r3"), num(100.0), num(0.0)]);
    }

    #[test]
    fn test_bar_sort_is_stable() {
        let source = vec![
            vec![Value::text("first"), num(1.0), num(0.0)],
            vec![Value::text("second"), num(2.0), num(0.0)],
            vec![Value::text("third"), num(1.0), num(0.0)],
        ];
        let out = sort_by_columns(&source, &[(1, SortDirection::Asc)]);
        let labels: Vec<&Value> = out.iter().map(|r| &r[0]).collect();
        assert_eq!(
            labels,
            vec![&Value::text("first"), &Value::text("third"), &Value::text("second")]
        );
    }

    #[test]
    fn test_bar_sort_tie_break() {
        let source = vec![
            vec![Value::text("p"), num(1.0), num(1.0)],
            vec![Value::text("q"), num(1.0), num(3.0)],
            vec![Value::text("r"), num(2.0), Value::Null],
        ];
        let out = sort_by_columns(&source, &[(1, SortDirection::Desc), (2, SortDirection::Desc)]);
        let labels: Vec<String> = out.iter().map(|r| r[0].to_label()).collect();
        assert_eq!(labels, vec!["r", "q", "p"]);
    }

    #[test]
    fn test_pie_minimum_groups_small_slices() {
        let source = vec![
            vec![Value::text("a"), num(1.0)],
            vec![Value::text("b"), num(90.0)],
            vec![Value::text("c"), num(2.0)],
            vec![Value::text("d"), num(7.0)],
        ];
        let out = pie_minimum_slices(&source, 1, 5.0, 2);
        assert_eq!(
            out,
            vec![
                vec![Value::text("b"), num(90.0)],
                vec![Value::text("d"), num(7.0)],
                vec![Value::text(OTHER_LABEL), num(3.0)],
            ]
        );
    }

    #[test]
    fn test_pipeline_pie_variants_per_key() {
        let source = vec![
            vec![Value::text("a"), num(1.0), num(50.0)],
            vec![Value::text("b"), num(99.0), num(50.0)],
        ];
        let mut req = request(ChartType::Pie);
        req.pie_minimum_slice_percentage = Some(10.0);
        let pivot = build_pivot(base(source), &req, &ctx());

        let ids: Vec<&str> = pivot.ids().collect();
        assert_eq!(ids, vec!["raw", "pie-minimum-a__🔑__", "pie-minimum-b__🔑__"]);
        assert_eq!(pivot.get("pie-minimum-a__🔑__").unwrap().source.len(), 2);
        assert_eq!(pivot.get("pie-minimum-b__🔑__").unwrap().source.len(), 2);
        assert_eq!(pivot.current().id, "pie-minimum-b__🔑__");
    }

    #[test]
    fn test_pipeline_layers_sort_on_stack() {
        let source = vec![
            vec![Value::text("a"), num(1.0), num(3.0)],
            vec![Value::text("b"), num(3.0), num(1.0)],
        ];
        let mut req = request(ChartType::Bar);
        req.bar_group_type = Some(GroupType::PercentageStack);
        req.bar_sort_by = vec![SortDirection::Desc, SortDirection::None];
        let pivot = build_pivot(base(source), &req, &ctx());

        let ids: Vec<&str> = pivot.ids().collect();
        assert_eq!(ids, vec!["raw", "relative-stack", "sorted-by-bar"]);
        let current = pivot.current();
        assert_eq!(current.source[0], vec![Value::text("b"), num(75.0), num(25.0)]);
        assert!(Arc::ptr_eq(&current.dimensions, &pivot.base().dimensions));
    }

    #[test]
    fn test_pipeline_raw_dates_for_line() {
        let source = vec![vec![Value::text("date__🔑__2024-01-01"), num(1.0), num(2.0)]];
        let mut context = ctx();
        context.date_x_fields = 1;
        let pivot = build_pivot(base(source), &request(ChartType::Line), &context);
        assert_eq!(pivot.current().id, "raw-with-date-not-delimited");
        assert_eq!(pivot.current().source[0][0], Value::text("2024-01-01"));
        assert_eq!(pivot.base().source[0][0], Value::text("date__🔑__2024-01-01"));
    }

    #[test]
    fn test_pipeline_empty_dataset_is_noop() {
        let mut req = request(ChartType::Bar);
        req.bar_group_type = Some(GroupType::PercentageStack);
        let pivot = build_pivot(base(Vec::new()), &req, &ctx());
        assert_eq!(pivot.len(), 1);
        assert_eq!(pivot.current().id, "raw");
    }

    proptest! {
        #[test]
        fn test_pie_minimum_conserves_total(
            values in prop::collection::vec(0.0f64..1000.0, 1..20),
            min_percent in 0.0f64..=100.0,
        ) {
            let source: Vec<Vec<Value>> = values
                .iter()
                .enumerate()
                .map(|(i, v)| vec![Value::text(format!("s{}", i)), num(*v)])
                .collect();
            let out = pie_minimum_slices(&source, 1, min_percent, 2);
            let before: f64 = values.iter().sum();
            let after: f64 = out.iter().map(|r| r[1].coerce_number()).sum();
            prop_assert!((before - after).abs() < 1e-6 * before.max(1.0));
        }
    }
}
