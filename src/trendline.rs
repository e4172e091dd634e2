// Trendline engine: regression and descriptive overlays for one measure

use std::cmp::Ordering;
use std::sync::Arc;

use crate::chain;
use crate::data::Value;
use crate::date::{parse_timestamp_millis, value_timestamp_millis};
use crate::error::EngineResult;
use crate::ir::{
    column_type_of, dataset_ids, ChartType, ColumnFormats, DatasetOption, TrendlineDataset,
    TrendlineSpec, TrendlineType,
};
use crate::regression::{self, Fit, LinearScale, Point, MILLIS_PER_DAY};
use crate::summary::{Aggregate, SeriesSummary};

/// Chart types that draw trendline overlays.
pub fn supports_trendlines(chart_type: ChartType) -> bool {
    match chart_type {
        ChartType::Bar | ChartType::Line | ChartType::Scatter | ChartType::Combo => true,
        ChartType::Pie => false,
    }
}

/// How row labels are turned into regression x values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxisKind {
    Numeric,
    Date,
    Categorical,
}

impl XAxisKind {
    /// Classify the x axis of `dataset` from the type of its first x field.
    pub fn of(dataset: &DatasetOption, formats: &ColumnFormats) -> Self {
        let field = dataset
            .dimensions
            .first()
            .and_then(|d| chain::decode(d).into_iter().next())
            .map(|pair| pair.key)
            .unwrap_or_default();
        let column_type = column_type_of(formats, &field);
        if column_type.is_numeric() {
            XAxisKind::Numeric
        } else if column_type.is_date() {
            XAxisKind::Date
        } else {
            XAxisKind::Categorical
        }
    }

    /// Regression x for one row label. `None` when the label cannot be read.
    fn read(self, label: &Value, index: usize) -> Option<f64> {
        match self {
            XAxisKind::Categorical => Some(index as f64),
            XAxisKind::Numeric => match label {
                Value::Text(s) => chain::undelimited_value(s).trim().parse::<f64>().ok(),
                other => other.as_number(),
            }
            .filter(|x| x.is_finite()),
            XAxisKind::Date => match label {
                Value::Text(s) => parse_timestamp_millis(&chain::undelimited_value(s)),
                other => value_timestamp_millis(other),
            }
            .map(|ms| ms as f64),
        }
    }
}

/// Series columns of `dataset` whose measure is `column_id`.
pub fn series_columns(dataset: &DatasetOption, column_id: &str) -> Vec<usize> {
    dataset
        .dimensions
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, dim)| chain::measure_key(dim).as_deref() == Some(column_id))
        .map(|(i, _)| i)
        .collect()
}

/// Compute the overlays `spec` asks for on `dataset`, one per matching series.
///
/// Returns an empty list when the trendline does not apply: hidden, a
/// non-numeric column, no matching series, or too few points to fit.
///
/// # Errors
///
/// Exponential regression over a series containing a zero or negative value,
/// and polynomial regression of an unsupported degree.
pub fn compute_trendline(
    spec: &TrendlineSpec,
    dataset: &DatasetOption,
    formats: &ColumnFormats,
) -> EngineResult<Vec<TrendlineDataset>> {
    if !spec.show || !column_type_of(formats, &spec.column_id).is_numeric() {
        return Ok(Vec::new());
    }

    let columns = series_columns(dataset, &spec.column_id);
    if columns.is_empty() || dataset.source.is_empty() {
        return Ok(Vec::new());
    }

    let x_kind = XAxisKind::of(dataset, formats);
    let ordered = order_rows(dataset, x_kind);

    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        let series = dataset.dimensions[column].clone();
        let produced = if spec.kind.is_descriptive() {
            descriptive(spec, &ordered, column, &series)
        } else {
            regression_overlay(spec, &ordered, x_kind, column, &series)?
        };
        match produced {
            Some(trendline) => out.push(trendline),
            None => tracing::warn!(
                series = %series,
                kind = spec.kind.slug(),
                "trendline not applicable to series"
            ),
        }
    }
    Ok(out)
}

// Numeric and date x axes are fitted in x order; categories keep dataset order.
fn order_rows(dataset: &DatasetOption, x_kind: XAxisKind) -> DatasetOption {
    if x_kind == XAxisKind::Categorical {
        return dataset.clone();
    }
    let mut keyed: Vec<(Option<f64>, &Vec<Value>)> = dataset
        .source
        .iter()
        .enumerate()
        .map(|(i, row)| (row.first().and_then(|label| x_kind.read(label, i)), row))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    let source = keyed.into_iter().map(|(_, row)| row.clone()).collect();
    dataset.derive(dataset.id.clone(), source)
}

fn aggregate_for(kind: TrendlineType) -> Option<Aggregate> {
    match kind {
        TrendlineType::Average => Some(Aggregate::Average),
        TrendlineType::Median => Some(Aggregate::Median),
        TrendlineType::Min => Some(Aggregate::Min),
        TrendlineType::Max => Some(Aggregate::Max),
        _ => None,
    }
}

fn descriptive(
    spec: &TrendlineSpec,
    dataset: &DatasetOption,
    column: usize,
    series: &str,
) -> Option<TrendlineDataset> {
    let aggregate = aggregate_for(spec.kind)?;
    let value = SeriesSummary::from_column(dataset, column).evaluate(aggregate)?;
    Some(TrendlineDataset {
        dataset: DatasetOption::new(
            format!("{}-{}", spec.kind.slug(), series),
            Arc::new(vec![series.to_string()]),
            vec![vec![Value::Number(value)]],
        ),
        equation: None,
        spec: spec.clone(),
        series: series.to_string(),
    })
}

// X values a fit runs on. Linear fits keep the raw reading (epoch ms for
// dates). The curved fits count days from the first date, and logarithmic
// fits start counting at 1 so that ln(x) is defined.
fn fit_domain(kind: TrendlineType, x_kind: XAxisKind, xs: &[f64]) -> Vec<f64> {
    let log_shift = if kind == TrendlineType::LogarithmicRegression {
        1.0
    } else {
        0.0
    };
    match (kind, x_kind) {
        (TrendlineType::LinearRegression, _) | (_, XAxisKind::Numeric) => xs.to_vec(),
        (_, XAxisKind::Date) => {
            let first = xs.iter().copied().fold(f64::INFINITY, f64::min);
            xs.iter()
                .map(|x| (x - first) / MILLIS_PER_DAY + log_shift)
                .collect()
        }
        (_, XAxisKind::Categorical) => xs.iter().map(|x| x + log_shift).collect(),
    }
}

fn regression_overlay(
    spec: &TrendlineSpec,
    dataset: &DatasetOption,
    x_kind: XAxisKind,
    column: usize,
    series: &str,
) -> EngineResult<Option<TrendlineDataset>> {
    // 1. Read x for every row; an unreadable label makes the series unfit
    let mut xs = Vec::with_capacity(dataset.source.len());
    for (i, row) in dataset.source.iter().enumerate() {
        match row.first().and_then(|label| x_kind.read(label, i)) {
            Some(x) => xs.push(x),
            None => return Ok(None),
        }
    }

    // 2. Points with a numeric y
    let xs = fit_domain(spec.kind, x_kind, &xs);
    let points: Vec<Point> = dataset
        .source
        .iter()
        .zip(&xs)
        .filter_map(|(row, x)| {
            row.get(column)
                .and_then(Value::as_number)
                .map(|y| Point::new(*x, y))
        })
        .collect();

    // 3. Fit
    let mut id_prefix = spec.kind.slug();
    let fitted: Option<(Vec<f64>, String)> = match spec.kind {
        TrendlineType::LinearRegression => {
            let fit = match x_kind {
                XAxisKind::Numeric => regression::linear(&points),
                XAxisKind::Date => {
                    let (ts, ys): (Vec<f64>, Vec<f64>) =
                        points.iter().map(|p| (p.x, p.y)).unzip();
                    regression::linear_by_timestamp(&ys, &ts)
                }
                XAxisKind::Categorical => {
                    let ys: Vec<Option<f64>> = dataset
                        .source
                        .iter()
                        .map(|row| row.get(column).and_then(Value::as_number))
                        .collect();
                    regression::linear_slope(&ys)
                }
            };
            if fit.is_some_and(|f| f.scale != LinearScale::Numeric) {
                id_prefix = dataset_ids::LINEAR_SLOPE;
            }
            fit.map(|f| (f.predict_all(&xs), f.equation()))
        }
        TrendlineType::LogarithmicRegression => {
            regression::logarithmic(&points).map(|f| (f.predict_all(&xs), f.equation()))
        }
        TrendlineType::ExponentialRegression => {
            regression::exponential(&points)?.map(|f| (f.predict_all(&xs), f.equation()))
        }
        TrendlineType::PolynomialRegression => {
            regression::polynomial(&points, spec.polynomial_order)?
                .map(|f| (f.predict_all(&xs), f.equation()))
        }
        TrendlineType::Average
        | TrendlineType::Median
        | TrendlineType::Min
        | TrendlineType::Max => None,
    };

    let Some((predicted, equation)) = fitted else {
        return Ok(None);
    };
    if predicted.iter().any(|y| !y.is_finite()) {
        return Ok(None);
    }

    // 4. Overlay the predictions on the series column
    let source = dataset
        .source
        .iter()
        .zip(predicted)
        .map(|(row, y)| {
            let mut row = row.clone();
            if let Some(cell) = row.get_mut(column) {
                *cell = Value::Number(y);
            }
            row
        })
        .collect();

    Ok(Some(TrendlineDataset {
        dataset: dataset.derive(format!("{}-{}", id_prefix, series), source),
        equation: Some(equation),
        spec: spec.clone(),
        series: series.to_string(),
    }))
}
