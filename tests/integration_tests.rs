use chartset::chain;
use chartset::csv_reader;
use chartset::scatter::{point_sizes, SizeRangeCache};
use chartset::{build_datasets, ChartRequest, RowSet, TrendlineSpec, TrendlineType, Value};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_request(name: &str) -> ChartRequest {
    let text = fs::read_to_string(fixture(name)).expect("Failed to read request fixture");
    serde_json::from_str(&text).expect("Failed to parse request fixture")
}

fn load_sales() -> RowSet {
    let text = fs::read_to_string(fixture("sales.csv")).expect("Failed to read CSV fixture");
    csv_reader::read_csv_str(&text).expect("Failed to parse CSV fixture")
}

/// Helper function to run chartset with a request file and rows on stdin
fn run_chartset(args: &[&str], stdin_content: &str) -> Result<JsonValue, String> {
    let mut child = Command::new("cargo")
        .args(["run", "--quiet", "--bin", "chartset", "--"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_content.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        serde_json::from_slice(&output.stdout).map_err(|e| format!("Invalid JSON output: {}", e))
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

#[test]
fn test_line_chart_from_csv() {
    let request = load_request("line_request.json");
    let result = build_datasets(&request, &load_sales());

    let ids: Vec<&str> = result.datasets.ids().collect();
    assert_eq!(ids, vec!["raw", "raw-with-date-not-delimited"]);

    // Rows are grouped in date order; West on 2024-01-02 is summed
    let raw = result.datasets.base();
    assert_eq!(raw.dimensions[0], "date");
    assert_eq!(
        raw.source,
        vec![
            vec![Value::text("date__🔑__2024-01-01"), Value::Number(100.0), Value::Null],
            vec![Value::text("date__🔑__2024-01-02"), Value::Null, Value::Number(250.0)],
            vec![Value::text("date__🔑__2024-01-03"), Value::Number(300.0), Value::Null],
        ]
    );
    assert!(raw.source.iter().all(|row| row.len() == raw.dimensions.len()));

    let current = result.current();
    assert_eq!(current.source[2][0], Value::text("2024-01-03"));

    let labels: Vec<Vec<chain::KeyValuePair>> =
        result.y_axis_keys.iter().map(|k| chain::decode(k)).collect();
    assert_eq!(labels[0][0], chain::KeyValuePair::new("region", "East"));
    assert_eq!(labels[1][0], chain::KeyValuePair::new("region", "West"));
}

#[test]
fn test_line_chart_trendlines() {
    let request = load_request("line_request.json");
    let result = build_datasets(&request, &load_sales());

    // West has a single point, so only East gets a regression line
    let ids: Vec<&str> = result.trendlines.iter().map(|t| t.dataset.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "linear-slope-region__🔑__East__📝__revenue__🔑__",
            "average-region__🔑__East__📝__revenue__🔑__",
            "average-region__🔑__West__📝__revenue__🔑__",
        ]
    );

    let east = &result.trendlines[0];
    assert_eq!(east.dataset.source.len(), 3);
    let middle = east.dataset.source[1][1].coerce_number();
    assert!((middle - 200.0).abs() < 1e-6);
    assert!(east.equation.as_deref().unwrap_or_default().starts_with("y = "));

    assert_eq!(result.trendlines[1].dataset.source, vec![vec![Value::Number(200.0)]]);
    assert!(result.trendline_errors.is_empty());
}

#[test]
fn test_bar_percentage_stack_and_sort() {
    let mut request: ChartRequest = serde_json::from_value(json!({
        "chartType": "bar",
        "axis": {"x": ["region"], "y": ["units", "margin"]},
        "columnLabelFormats": {
            "units": {"columnType": "number"},
            "margin": {"columnType": "number"}
        },
        "barGroupType": "percentage-stack",
        "barSortBy": ["none", "asc"]
    }))
    .unwrap();
    request.trendlines = vec![TrendlineSpec::new(TrendlineType::Max, "units")];
    let result = build_datasets(&request, &load_sales());

    let ids: Vec<&str> = result.datasets.ids().collect();
    assert_eq!(ids, vec!["raw", "relative-stack", "sorted-by-bar"]);

    // West: units 8, margin 1.0; East: units 8, margin 0.2
    let raw = result.datasets.base();
    assert_eq!(raw.source[0][0], Value::text("region__🔑__West"));
    assert_eq!(raw.source[0][1], Value::Number(8.0));
    assert_eq!(raw.source[1][1], Value::Number(8.0));

    let stacked = result.datasets.get("relative-stack").unwrap();
    for row in &stacked.source {
        let total: f64 = row[1..].iter().map(Value::coerce_number).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    // Ascending by the margin share puts East first
    let sorted = result.current();
    assert_eq!(sorted.source[0][0], Value::text("region__🔑__East"));
    assert_eq!(sorted.source[1][0], Value::text("region__🔑__West"));
    assert_eq!(result.trendlines.len(), 1);
}

#[test]
fn test_pie_minimum_slices() {
    let request: ChartRequest = serde_json::from_value(json!({
        "chartType": "pie",
        "axis": {"x": ["date"], "y": ["units"]},
        "columnLabelFormats": {"units": {"columnType": "number"}},
        "pieMinimumSlicePercentage": 20
    }))
    .unwrap();
    let result = build_datasets(&request, &load_sales());

    let pie = result.current();
    assert_eq!(pie.id, "pie-minimum-units__🔑__");
    // Totals: 01 -> 2, 02 -> 5, 03 -> 9; 2 is below 20% of 16
    assert_eq!(
        pie.source,
        vec![
            vec![Value::text("date__🔑__2024-01-03"), Value::Number(9.0)],
            vec![Value::text("date__🔑__2024-01-02"), Value::Number(5.0)],
            vec![Value::text("Other"), Value::Number(2.0)],
        ]
    );
}

#[test]
fn test_scatter_with_sizes_and_trendline() {
    let mut request = load_request("scatter_request.json");
    request.trendlines = vec![TrendlineSpec::new(TrendlineType::LinearRegression, "revenue")];
    let result = build_datasets(&request, &load_sales());

    let dataset = result.current();
    assert_eq!(dataset.id, "scatter-dataset");
    assert_eq!(
        *dataset.dimensions,
        vec!["units__🔑__", "revenue__🔑__", "margin__🔑__"]
    );
    assert_eq!(dataset.source.len(), 5);
    assert_eq!(dataset.source[4][1], Value::Null);
    assert_eq!(
        result.tooltip_keys,
        vec!["revenue__🔑__", "units__🔑__", "margin__🔑__"]
    );

    let mut cache = SizeRangeCache::new();
    let sizes = point_sizes(
        dataset,
        "revenue__🔑__",
        Some("margin"),
        request.scatter_dot_size,
        &mut cache,
    );
    assert_eq!(sizes.len(), 5);
    assert!((sizes[4] - 15.0).abs() < 1e-9);
    assert!((sizes[1] - 3.0).abs() < 1e-9);

    // revenue = 50 * units on every populated row
    let trend = &result.trendlines[0];
    assert_eq!(trend.dataset.id, "linear-regression-revenue__🔑__");
    assert_eq!(trend.equation.as_deref(), Some("y = 50.00x + 0.00"));
}

#[test]
fn test_output_serializes_to_camel_case() {
    let request = load_request("line_request.json");
    let result = build_datasets(&request, &load_sales());
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["datasets"].is_array());
    assert_eq!(json["datasets"][0]["id"], "raw");
    assert!(json["yAxisKeys"].is_array());
    assert_eq!(json["hasMismatchedTooltipsAndMeasures"], false);
    assert_eq!(json["trendlines"][1]["type"], "average");
    assert_eq!(json["trendlines"][1]["columnId"], "revenue");
}

#[test]
fn test_cli_csv_from_file() {
    let request = fixture("line_request.json");
    let data = fixture("sales.csv");
    let result = run_chartset(
        &[
            "--request",
            request.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
        ],
        "",
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json["datasets"].as_array().unwrap().len(), 2);
    assert_eq!(json["datasets"][1]["id"], "raw-with-date-not-delimited");
}

#[test]
fn test_cli_json_from_stdin() {
    let request = fixture("scatter_request.json");
    let rows = r#"[
        {"units": 1, "revenue": 10, "margin": 0.5},
        {"units": 1, "revenue": 20, "margin": 0.5}
    ]"#;
    let result = run_chartset(&["--request", request.to_str().unwrap(), "--pretty"], rows);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let json = result.unwrap();
    assert_eq!(json["datasets"][0]["source"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_csv_from_stdin() {
    let request = fixture("line_request.json");
    let csv = fs::read_to_string(fixture("sales.csv")).expect("Failed to read CSV fixture");
    let result = run_chartset(
        &["--request", request.to_str().unwrap(), "--input-format", "csv"],
        &csv,
    );
    assert!(result.is_ok(), "Failed: {:?}", result.err());
}

#[test]
fn test_cli_rejects_bad_rows() {
    let request = fixture("line_request.json");
    let result = run_chartset(&["--request", request.to_str().unwrap()], "{\"not\": \"an array\"}");
    assert!(result.is_err());
}

#[test]
fn test_cli_missing_request() {
    let result = run_chartset(&["--request", "does/not/exist.json"], "[]");
    assert!(result.is_err());
}
