use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::Value;

// =============================================================================
// Input: request configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Scatter,
    Combo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    #[default]
    Text,
    Boolean,
    #[serde(other)]
    Other,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Number)
    }

    pub fn is_date(self) -> bool {
        matches!(self, ColumnType::Date)
    }
}

/// Per-column metadata consulted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFormat {
    #[serde(default, alias = "type")]
    pub column_type: ColumnType,
    /// `None` when the setting is absent (engine default applies),
    /// `Some(Value::Null)` when it is an explicit null, otherwise the literal.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub replace_missing_data_with: Option<Value>,
}

impl ColumnFormat {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            replace_missing_data_with: None,
        }
    }

    pub fn with_replacement(mut self, value: Value) -> Self {
        self.replace_missing_data_with = Some(value);
        self
    }

    /// The placeholder for a missing cell of this column.
    pub fn missing_value(&self, default: &Value) -> Value {
        self.replace_missing_data_with
            .clone()
            .unwrap_or_else(|| default.clone())
    }
}

// A present `null` must stay distinguishable from an absent field.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub type ColumnFormats = HashMap<String, ColumnFormat>;

/// Look up the column type, treating unknown columns as text.
pub fn column_type_of(formats: &ColumnFormats, column: &str) -> ColumnType {
    formats
        .get(column)
        .map(|f| f.column_type)
        .unwrap_or_default()
}

/// Field lists chosen for each encoding channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AxisSpec {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub category: Vec<String>,
    pub y2: Vec<String>,
    pub size: Vec<String>,
    /// `None` derives tooltips from the measures.
    pub tooltip: Option<Vec<String>>,
}

impl AxisSpec {
    pub fn tooltip_fields(&self) -> &[String] {
        self.tooltip.as_deref().unwrap_or(&[])
    }

    /// y, y2 and tooltip fields, de-duplicated in first-seen order.
    pub fn measure_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in self
            .y
            .iter()
            .chain(self.y2.iter())
            .chain(self.tooltip_fields().iter())
        {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    Group,
    Stack,
    PercentageStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendlineType {
    Average,
    Median,
    Min,
    Max,
    LinearRegression,
    LogarithmicRegression,
    ExponentialRegression,
    PolynomialRegression,
}

impl TrendlineType {
    pub fn is_descriptive(self) -> bool {
        matches!(
            self,
            TrendlineType::Average | TrendlineType::Median | TrendlineType::Min | TrendlineType::Max
        )
    }

    /// Prefix of the dataset id emitted for this trendline.
    pub fn slug(self) -> &'static str {
        match self {
            TrendlineType::Average => "average",
            TrendlineType::Median => "median",
            TrendlineType::Min => "min",
            TrendlineType::Max => "max",
            TrendlineType::LinearRegression => "linear-regression",
            TrendlineType::LogarithmicRegression => "logarithmic-regression",
            TrendlineType::ExponentialRegression => "exponential-regression",
            TrendlineType::PolynomialRegression => "polynomial-regression",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_polynomial_order() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendlineSpec {
    #[serde(rename = "type")]
    pub kind: TrendlineType,
    pub column_id: String,
    #[serde(default = "default_true")]
    pub show: bool,
    /// Only degree 2 (and the degenerate degree 1) are supported today.
    #[serde(default = "default_polynomial_order")]
    pub polynomial_order: usize,
}

impl TrendlineSpec {
    pub fn new(kind: TrendlineType, column_id: impl Into<String>) -> Self {
        Self {
            kind,
            column_id: column_id.into(),
            show: true,
            polynomial_order: default_polynomial_order(),
        }
    }
}

fn default_dot_size() -> (f64, f64) {
    (3.0, 15.0)
}

/// Everything the engine needs besides the rows themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    #[serde(alias = "selectedChartType")]
    pub chart_type: ChartType,
    #[serde(alias = "selectedAxis")]
    pub axis: AxisSpec,
    #[serde(default)]
    pub column_label_formats: ColumnFormats,
    #[serde(default)]
    pub bar_sort_by: Vec<SortDirection>,
    #[serde(default)]
    pub bar_group_type: Option<GroupType>,
    #[serde(default)]
    pub line_group_type: Option<GroupType>,
    #[serde(default)]
    pub pie_minimum_slice_percentage: Option<f64>,
    #[serde(default)]
    pub trendlines: Vec<TrendlineSpec>,
    #[serde(default = "default_dot_size")]
    pub scatter_dot_size: (f64, f64),
}

impl ChartRequest {
    pub fn new(chart_type: ChartType, axis: AxisSpec) -> Self {
        Self {
            chart_type,
            axis,
            column_label_formats: ColumnFormats::new(),
            bar_sort_by: Vec::new(),
            bar_group_type: None,
            line_group_type: None,
            pie_minimum_slice_percentage: None,
            trendlines: Vec::new(),
            scatter_dot_size: default_dot_size(),
        }
    }

    pub fn has_active_bar_sort(&self) -> bool {
        self.chart_type == ChartType::Bar
            && self.bar_sort_by.iter().any(|d| *d != SortDirection::None)
    }

    pub fn is_percentage_stack(&self) -> bool {
        match self.chart_type {
            ChartType::Bar => self.bar_group_type == Some(GroupType::PercentageStack),
            ChartType::Line => self.line_group_type == Some(GroupType::PercentageStack),
            ChartType::Pie | ChartType::Scatter | ChartType::Combo => false,
        }
    }
}

// =============================================================================
// Output: datasets
// =============================================================================

/// One named dataset matrix. `source[r][0]` is the row label; `source[r][i]`
/// lines up with `dimensions[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOption {
    pub id: String,
    /// Shared by every variant derived from the same base pivot.
    pub dimensions: Arc<Vec<String>>,
    pub source: Vec<Vec<Value>>,
}

impl DatasetOption {
    pub fn new(
        id: impl Into<String>,
        dimensions: Arc<Vec<String>>,
        source: Vec<Vec<Value>>,
    ) -> Self {
        Self {
            id: id.into(),
            dimensions,
            source,
        }
    }

    /// A variant that keeps this dataset's dimensions.
    pub fn derive(&self, id: impl Into<String>, source: Vec<Vec<Value>>) -> Self {
        Self::new(id, Arc::clone(&self.dimensions), source)
    }

    pub fn column_index(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dimension)
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.source.iter().filter_map(move |row| row.get(index))
    }
}

/// Dataset ids shared between producer and consumers.
pub mod dataset_ids {
    pub const RAW: &str = "raw";
    pub const RELATIVE_STACK: &str = "relative-stack";
    pub const SORTED_BY_BAR: &str = "sorted-by-bar";
    pub const RAW_WITH_DATE_NOT_DELIMITED: &str = "raw-with-date-not-delimited";
    pub const SCATTER: &str = "scatter-dataset";
    pub const LINEAR_SLOPE: &str = "linear-slope";

    pub fn pie_minimum(y_axis_key: &str) -> String {
        format!("pie-minimum-{}", y_axis_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendlineDataset {
    #[serde(flatten)]
    pub dataset: DatasetOption,
    pub equation: Option<String>,
    #[serde(flatten)]
    pub spec: TrendlineSpec,
    /// Series (dimension key) this overlay was computed from.
    pub series: String,
}

/// A trendline that failed without affecting the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendlineIssue {
    pub column_id: String,
    pub kind: TrendlineType,
    pub message: String,
}
