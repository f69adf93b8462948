//! Billing export discovery and loading.
//!
//! Reads delimited billing tables and coerces every line into a typed
//! [`Record`], so the aggregation layer never has to check column presence.

use std::io::Read;
use std::path::{Path, PathBuf};

use billsort_core::error::{BillError, Result};
use billsort_core::formatting::format_currency;
use billsort_core::models::{Dataset, Record, REQUIRED_COLUMNS};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, error, info, warn};

/// Columns checked, in order, for a usage date.
const DATE_COLUMNS: [&str; 3] = ["Date", "BillingDate", "UsageDate"];
/// Columns checked, in order, for a resource region.
const REGION_COLUMNS: [&str; 2] = ["ResourceLocation", "Region"];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];

// ── Discovery ─────────────────────────────────────────────────────────────────

/// A bill export found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct BillFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl BillFile {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_bill_files(dir: &Path) -> Vec<BillFile> {
    if !dir.exists() {
        warn!("Bills directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<BillFile> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_csv(entry.path()))
        .map(|entry| BillFile {
            size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
            path: entry.into_path(),
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load a billing export from `path`.
///
/// Fails with [`BillError::NotFound`] when the file is missing and
/// [`BillError::Format`] when a required column is absent.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        error!("File not found: {}", path.display());
        return Err(BillError::NotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    load_dataset_from_reader(file, &source)
}

/// Load a billing export from any byte source, e.g. an uploaded buffer.
pub fn load_dataset_from_reader<R: Read>(mut reader: R, source: &str) -> Result<Dataset> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_dataset(&decode_text(bytes), source)
}

/// Parse delimited text into a [`Dataset`].
///
/// Comma is tried first; semicolon is used when the comma pass is
/// structurally invalid or produces a single-column header.
pub fn parse_dataset(content: &str, source: &str) -> Result<Dataset> {
    let table = match read_table(content, b',') {
        Ok(table) if table.headers.len() > 1 => table,
        Ok(single) => read_table(content, b';').unwrap_or(single),
        Err(comma_err) => {
            debug!("Comma parse failed ({}); retrying with ';'", comma_err);
            read_table(content, b';').map_err(|semi_err| {
                BillError::Parse(format!("comma: {comma_err}; semicolon: {semi_err}"))
            })?
        }
    };

    let dataset = build_dataset(table, source)?;

    info!("Loaded {} records from {}", dataset.len(), source);
    info!(
        "Data prepared: {} records, {} total cost",
        dataset.len(),
        format_currency(dataset.total_cost())
    );

    Ok(dataset)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

struct RawTable {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl RawTable {
    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Read `content` with `delimiter`. Short rows are accepted and padded at
/// lookup time; a row with more fields than the header is a structural error.
fn read_table(content: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.len() > headers.len() {
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            return Err(BillError::Parse(format!(
                "line {line}: expected {} fields, found {}",
                headers.len(),
                row.len()
            )));
        }
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

fn build_dataset(table: RawTable, source: &str) -> Result<Dataset> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| table.position(col).is_none())
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        error!("Missing required columns: {:?}", missing);
        info!("Available columns: {:?}", table.headers);
        return Err(BillError::Format {
            missing,
            available: table.headers,
        });
    }

    // Presence checked above.
    let required_idx = REQUIRED_COLUMNS.map(|col| table.position(col).unwrap_or_default());
    let [category_idx, service_idx, resource_idx, cost_idx] = required_idx;

    let date_idx = DATE_COLUMNS.iter().find_map(|col| table.position(col));
    let region_idx = REGION_COLUMNS.iter().find_map(|col| table.position(col));

    let extra_idx: Vec<usize> = (0..table.headers.len())
        .filter(|i| !required_idx.contains(i))
        .collect();
    let extra_columns: Vec<String> = extra_idx.iter().map(|&i| table.headers[i].clone()).collect();

    let mut coerced = 0usize;
    let records: Vec<Record> = table
        .rows
        .iter()
        .map(|row| {
            let field = |i: usize| row.get(i).unwrap_or("");

            let raw_cost = field(cost_idx);
            let cost = coerce_cost(raw_cost).unwrap_or_else(|| {
                coerced += 1;
                debug!("Unparseable cost {:?}; using 0", raw_cost);
                0.0
            });

            Record {
                category: field(category_idx).trim().to_string(),
                service: field(service_idx).trim().to_string(),
                resource: field(resource_idx).trim().to_string(),
                cost,
                date: date_idx.and_then(|i| parse_date(field(i))),
                region: region_idx
                    .map(|i| field(i).trim())
                    .filter(|s| !s.is_empty())
                    .map(String::from),
                extras: extra_idx.iter().map(|&i| field(i).to_string()).collect(),
            }
        })
        .collect();

    if coerced > 0 {
        warn!("{} cost values could not be parsed and were set to 0", coerced);
    }

    Ok(Dataset::new(source, extra_columns, records))
}

/// Parse a cost cell. Blank, non-numeric and non-finite values yield `None`.
fn coerce_cost(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date cell in any of the common export formats.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Decode raw bytes as UTF-8 (minus any BOM), falling back to Windows-1252
/// for spreadsheet-exported files.
fn decode_text(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            debug!("Input is not UTF-8; decoding as Windows-1252");
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
