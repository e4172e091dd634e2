// Engine: rows + chart request -> datasets, axis keys and trendlines
//
// Pipeline:
//   1. Bar/line/pie/combo: date-order rows, group, materialize, run variants
//      Scatter: one row per input row
//   2. Derive y, y2 and tooltip keys
//   3. Compute trendlines on the current variant

use std::sync::Arc;

use serde::Serialize;

use crate::data::{Row, RowSet};
use crate::group::{group_rows, sort_rows_by_date_fields};
use crate::ir::{
    column_type_of, dataset_ids, ChartRequest, ChartType, DatasetOption, TrendlineDataset,
    TrendlineIssue,
};
use crate::pivot::{self, create_dimensions};
use crate::scatter::{scatter_categories, scatter_pivot, scatter_tooltip_keys, ScatterFields};
use crate::trendline::{compute_trendline, supports_trendlines};
use crate::variant::{build_pivot, Pivot, VariantContext};

/// Everything a chart renderer needs from one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResult {
    /// Base dataset followed by its variants; draw `datasets.current()`.
    pub datasets: Pivot,
    pub y_axis_keys: Vec<String>,
    pub y2_axis_keys: Vec<String>,
    pub tooltip_keys: Vec<String>,
    pub has_mismatched_tooltips_and_measures: bool,
    pub trendlines: Vec<TrendlineDataset>,
    pub trendline_errors: Vec<TrendlineIssue>,
}

impl DatasetResult {
    pub fn current(&self) -> &DatasetOption {
        self.datasets.current()
    }
}

struct Pivoted {
    datasets: Pivot,
    y_axis_keys: Vec<String>,
    y2_axis_keys: Vec<String>,
    tooltip_keys: Vec<String>,
}

/// Transform `rows` into chart datasets as described by `request`.
///
/// Never fails: unusable input yields empty datasets and key lists, and a
/// failing trendline is reported in `trendline_errors` without affecting
/// anything else.
pub fn build_datasets(request: &ChartRequest, rows: &RowSet) -> DatasetResult {
    tracing::debug!(
        chart_type = ?request.chart_type,
        rows = rows.len(),
        "building datasets"
    );

    let pivoted = match request.chart_type {
        ChartType::Scatter => pivot_scatter(request, &rows.rows),
        ChartType::Bar | ChartType::Line | ChartType::Pie | ChartType::Combo => {
            pivot_grouped(request, &rows.rows)
        }
    };

    let (trendlines, trendline_errors) = build_trendlines(request, pivoted.datasets.current());

    DatasetResult {
        datasets: pivoted.datasets,
        y_axis_keys: pivoted.y_axis_keys,
        y2_axis_keys: pivoted.y2_axis_keys,
        tooltip_keys: pivoted.tooltip_keys,
        has_mismatched_tooltips_and_measures: pivot::has_mismatched_tooltips(&request.axis),
        trendlines,
        trendline_errors,
    }
}

fn pivot_grouped(request: &ChartRequest, rows: &[Row]) -> Pivoted {
    let axis = &request.axis;
    let formats = &request.column_label_formats;
    let measures = axis.measure_fields();

    // Date x fields order the rows unless something else decides the order
    let orders_by_date = match request.chart_type {
        ChartType::Pie | ChartType::Scatter => false,
        ChartType::Bar => !request.has_active_bar_sort(),
        ChartType::Line | ChartType::Combo => true,
    };
    let date_fields: Vec<String> = if orders_by_date {
        axis.x
            .iter()
            .filter(|field| column_type_of(formats, field).is_date())
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let ordered = sort_rows_by_date_fields(rows, &date_fields);
    let grouped = group_rows(ordered, &axis.x, &axis.category, &measures);

    let dimensions = pivot::dimensions(&grouped, &measures, &axis.x);
    let source = pivot::materialize(&grouped, &measures, formats);
    let base = DatasetOption::new(dataset_ids::RAW, Arc::new(dimensions), source);

    let y_axis_keys = create_dimensions(&axis.y, &grouped.categories);
    let y2_axis_keys = match request.chart_type {
        ChartType::Combo => create_dimensions(&axis.y2, &grouped.categories),
        _ => Vec::new(),
    };
    let tooltip_keys = pivot::tooltip_keys(axis.tooltip_fields(), &measures, &grouped.categories);

    let context = VariantContext {
        y_axis_keys: y_axis_keys.clone(),
        date_x_fields: date_fields.len(),
    };
    let datasets = build_pivot(base, request, &context);

    Pivoted {
        datasets,
        y_axis_keys,
        y2_axis_keys,
        tooltip_keys,
    }
}

fn pivot_scatter(request: &ChartRequest, rows: &[Row]) -> Pivoted {
    let axis = &request.axis;
    let measures = axis.measure_fields();
    let fields = ScatterFields {
        x: axis.x.first().map(String::as_str).unwrap_or_default(),
        measures: &measures,
        categories: &axis.category,
        size: axis.size.first().map(String::as_str),
    };

    let dataset = scatter_pivot(rows, &fields, &request.column_label_formats);
    let categories = scatter_categories(rows, &axis.category);

    Pivoted {
        datasets: Pivot::new(dataset),
        y_axis_keys: create_dimensions(&axis.y, &categories),
        y2_axis_keys: Vec::new(),
        tooltip_keys: scatter_tooltip_keys(axis.tooltip_fields(), &fields, &categories),
    }
}

fn build_trendlines(
    request: &ChartRequest,
    dataset: &DatasetOption,
) -> (Vec<TrendlineDataset>, Vec<TrendlineIssue>) {
    let mut trendlines = Vec::new();
    let mut issues = Vec::new();

    if request.trendlines.is_empty() {
        return (trendlines, issues);
    }
    if !supports_trendlines(request.chart_type) {
        tracing::warn!(
            chart_type = ?request.chart_type,
            count = request.trendlines.len(),
            "trendlines are not drawn on this chart type, skipping"
        );
        return (trendlines, issues);
    }

    for spec in &request.trendlines {
        match compute_trendline(spec, dataset, &request.column_label_formats) {
            Ok(computed) => trendlines.extend(computed),
            Err(e) => {
                tracing::warn!(
                    column = %spec.column_id,
                    kind = spec.kind.slug(),
                    error = %e,
                    "trendline failed"
                );
                issues.push(TrendlineIssue {
                    column_id: spec.column_id.clone(),
                    kind: spec.kind,
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        trendlines = trendlines.len(),
        errors = issues.len(),
        "computed trendlines"
    );
    (trendlines, issues)
}
