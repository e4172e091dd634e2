use anyhow::{bail, Context, Result};
use chartset::{build_datasets, csv_reader, ChartRequest, OutputStyle, RowSet};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "chartset")]
#[command(about = "Pivot query rows into chart-ready datasets and trendlines", long_about = None)]
struct Args {
    /// Chart request as JSON (chartType, axis, columnLabelFormats, ...)
    #[arg(long)]
    request: PathBuf,

    /// Rows to chart; read from stdin when omitted
    #[arg(long)]
    data: Option<PathBuf>,

    /// Row format; defaults to the --data extension, or JSON for stdin
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    // RUST_LOG takes precedence; logs go to stderr so stdout stays JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chartset=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // Read the chart request
    let request_text = fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request {}", args.request.display()))?;
    let request: ChartRequest =
        serde_json::from_str(&request_text).context("Failed to parse chart request")?;

    // Read the rows
    let format = args
        .input_format
        .unwrap_or_else(|| detect_format(args.data.as_deref()));
    let rows = read_rows(args.data.as_deref(), format)?;

    tracing::info!(
        chart_type = ?request.chart_type,
        rows = rows.len(),
        trendlines = request.trendlines.len(),
        "building datasets"
    );

    let result = build_datasets(&request, &rows);
    for issue in &result.trendline_errors {
        tracing::warn!(column = %issue.column_id, "{}", issue.message);
    }

    // Write JSON to stdout
    let style = if args.pretty {
        OutputStyle::Pretty
    } else {
        OutputStyle::Compact
    };
    let json = style.render(&result).context("Failed to serialize datasets")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).context("Failed to write datasets to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}

fn detect_format(path: Option<&Path>) -> InputFormat {
    match path.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => InputFormat::Csv,
        _ => InputFormat::Json,
    }
}

fn read_rows(path: Option<&Path>, format: InputFormat) -> Result<RowSet> {
    let text = match path {
        Some(p) => {
            fs::read_to_string(p).with_context(|| format!("Failed to read data {}", p.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read rows from stdin")?;
            buf
        }
    };

    if text.trim().is_empty() {
        bail!("No input rows: expected a JSON array or CSV with a header row");
    }

    match format {
        InputFormat::Csv => csv_reader::read_csv_str(&text).context("Failed to parse CSV rows"),
        InputFormat::Json => RowSet::from_json_str(&text).context("Failed to parse JSON rows"),
    }
}
