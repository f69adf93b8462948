//! Report rendering and export.
//!
//! The text summary is a fixed block layout that downstream tooling greps, so
//! section titles and label spelling are kept stable. The CSV export writes
//! the combined sorted report in `BillSort.csv` layout; the workbook export
//! carries every view on its own sheet.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use billsort_core::error::{BillError, Result};
use billsort_core::formatting::{format_currency, format_number, round_cents};
use billsort_core::models::{CombinedRow, DimensionSummary, Record, REQUIRED_COLUMNS};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use tracing::{error, info};

use crate::analysis::CostAnalyzer;

const TOP_ENTRIES: usize = 3;
/// Lines on the workbook's Top_Costs sheet.
const TOP_COSTS_SHEET_ROWS: usize = 20;

/// JSON shape of the combined report: rows plus headline totals.
#[derive(Debug, Serialize)]
pub struct CombinedReportPayload<'a> {
    pub data: &'a [CombinedRow],
    pub total_records: usize,
    pub total_cost: f64,
}

impl<'a> CombinedReportPayload<'a> {
    pub fn new(rows: &'a [CombinedRow]) -> Self {
        let total: f64 = rows.iter().map(|r| r.cost).sum();
        Self {
            data: rows,
            total_records: rows.len(),
            total_cost: round_cents(total),
        }
    }

    /// Keep only the first `limit` rows in `data`. The totals still describe
    /// the whole report.
    pub fn limited(mut self, limit: Option<usize>) -> Self {
        if let Some(n) = limit {
            self.data = &self.data[..n.min(self.data.len())];
        }
        self
    }
}

/// Render the multi-section text summary of the loaded dataset.
pub fn render_summary(analyzer: &CostAnalyzer) -> String {
    if !analyzer.is_loaded() {
        return "No data loaded.".to_string();
    }

    let summary = analyzer.summary();
    let services = analyzer.by_service();
    let categories = analyzer.by_category();
    let combined = analyzer.combined_sorted_report();

    let analysis_date = summary
        .analysis_date
        .map(|d| {
            d.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default();

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== BILLING ANALYSIS REPORT ===");
    let _ = writeln!(out, "Analysis Date: {}", analysis_date);
    let _ = writeln!(
        out,
        "Data Source: {}",
        summary.source.as_deref().unwrap_or_default()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "OVERVIEW:");
    let _ = writeln!(
        out,
        "- Total Records: {}",
        format_number(summary.total_records as f64, 0)
    );
    let _ = writeln!(out, "- Total Cost: {}", format_currency(summary.total_cost));
    let _ = writeln!(out, "- Average Cost: {}", format_currency(summary.avg_cost));
    let _ = writeln!(
        out,
        "- Cost Range: {} - {}",
        format_currency(summary.min_cost),
        format_currency(summary.max_cost)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "BREAKDOWN:");
    let _ = writeln!(out, "- Unique Services: {}", summary.unique_services);
    let _ = writeln!(out, "- Unique Categories: {}", summary.unique_categories);
    let _ = writeln!(out, "- Unique Resources: {}", summary.unique_resources);
    let _ = writeln!(out);

    let _ = writeln!(out, "TOP {} SERVICES BY COST:", TOP_ENTRIES);
    for row in services.iter().take(TOP_ENTRIES) {
        let _ = writeln!(
            out,
            "- {}: {} ({:.1}%)",
            row.key,
            format_currency(row.total_cost),
            row.percentage
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "TOP {} CATEGORIES BY COST:", TOP_ENTRIES);
    for row in categories.iter().take(TOP_ENTRIES) {
        let _ = writeln!(
            out,
            "- {}: {} ({:.1}%)",
            row.key,
            format_currency(row.total_cost),
            row.percentage
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "COMBINED SORTED REPORT:");
    let _ = writeln!(
        out,
        "- Records in sorted order: {}",
        format_number(combined.len() as f64, 0)
    );
    let _ = writeln!(
        out,
        "- Sort criteria: MeterCategory\u{2191}, ConsumedService\u{2191}, Cost\u{2193}"
    );
    let _ = writeln!(out, "- Export format: BillSort.csv compatible");
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "TOP {} HIGHEST COST ITEMS (from Combined Sorted Report):",
        TOP_ENTRIES
    );
    for row in combined.iter().take(TOP_ENTRIES) {
        let _ = writeln!(
            out,
            "- {} > {} > {}: {}",
            row.category,
            row.service,
            row.resource,
            format_currency(row.cost)
        );
    }
    let _ = writeln!(out);
    out.push_str("=== END OF REPORT ===");
    out
}

/// Timestamped export destination under `reports_dir`.
pub fn default_export_path(reports_dir: &Path, now: DateTime<Local>) -> PathBuf {
    reports_dir.join(format!("BillSort_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

/// Write the combined report to `path` as CSV.
///
/// The file is written beside the destination and renamed into place, so a
/// failed export never leaves a partial file at `path`.
pub fn export_combined_csv(rows: &[CombinedRow], path: &Path) -> Result<PathBuf> {
    if rows.is_empty() {
        error!("Cannot export: combined report is empty");
        return Err(BillError::EmptyReport);
    }

    let export_err = |source: io::Error| BillError::Export {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(export_err)?;
    }

    let tmp = path.with_extension("csv.tmp");
    if let Err(e) = write_rows(rows, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(export_err(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(export_err(e));
    }

    info!("Combined report exported to {}", path.display());
    Ok(path.to_path_buf())
}

/// Timestamped workbook destination under `reports_dir`.
pub fn default_excel_path(reports_dir: &Path, now: DateTime<Local>) -> PathBuf {
    reports_dir.join(format!("BillAnalysis_{}.xlsx", now.format("%Y%m%d_%H%M%S")))
}

/// Write the whole analysis to an `.xlsx` workbook at `path`.
///
/// Sheets, in order: `Summary`, `By_Service`, `By_Category`, `By_Resource`,
/// `Combined_Sorted`, `Top_Costs` (the 20 most expensive lines) and
/// `Raw_Data` (every line with its passthrough columns).
pub fn export_excel(analyzer: &CostAnalyzer, path: &Path) -> Result<PathBuf> {
    let Some(dataset) = analyzer.dataset() else {
        error!("No data to export");
        return Err(BillError::EmptyReport);
    };

    let export_err = |source: io::Error| BillError::Export {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(export_err)?;
    }

    let mut workbook = build_workbook(analyzer, dataset.records(), dataset.extra_columns())
        .map_err(|e| export_err(io::Error::other(e)))?;

    let tmp = path.with_extension("xlsx.tmp");
    if let Err(e) = workbook.save(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(export_err(io::Error::other(e)));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(export_err(e));
    }

    info!("Analysis exported to {}", path.display());
    Ok(path.to_path_buf())
}

fn build_workbook(
    analyzer: &CostAnalyzer,
    records: &[Record],
    extra_columns: &[String],
) -> std::result::Result<Workbook, XlsxError> {
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();

    let summary = analyzer.summary();
    let sheet = add_sheet(&mut workbook, "Summary", &["Metric", "Value"], &bold)?;
    sheet
        .write_string(1, 0, "Total Records")?
        .write_number(1, 1, summary.total_records as f64)?;
    sheet
        .write_string(2, 0, "Total Cost")?
        .write_string(2, 1, format_currency(summary.total_cost))?;
    sheet
        .write_string(3, 0, "Average Cost")?
        .write_string(3, 1, format_currency(summary.avg_cost))?;
    sheet
        .write_string(4, 0, "Unique Services")?
        .write_number(4, 1, summary.unique_services as f64)?;
    sheet
        .write_string(5, 0, "Unique Categories")?
        .write_number(5, 1, summary.unique_categories as f64)?;
    sheet
        .write_string(6, 0, "Unique Resources")?
        .write_number(6, 1, summary.unique_resources as f64)?;

    write_dimension_sheet(
        &mut workbook,
        "By_Service",
        ["ConsumedService", "Categories"],
        &analyzer.by_service(),
        &bold,
    )?;
    write_dimension_sheet(
        &mut workbook,
        "By_Category",
        ["MeterCategory", "Services"],
        &analyzer.by_category(),
        &bold,
    )?;

    let headers = [
        "ResourceName",
        "Total_Cost",
        "Avg_Cost",
        "Usage_Count",
        "Service",
        "Category",
        "Percentage",
    ];
    let sheet = add_sheet(&mut workbook, "By_Resource", &headers, &bold)?;
    for (i, row) in analyzer.by_resource().iter().enumerate() {
        let r = (i + 1) as u32;
        sheet
            .write_string(r, 0, &row.resource)?
            .write_number(r, 1, round_cents(row.total_cost))?
            .write_number(r, 2, round_cents(row.avg_cost))?
            .write_number(r, 3, row.usage_count as f64)?
            .write_string(r, 4, &row.service)?
            .write_string(r, 5, &row.category)?
            .write_number(r, 6, row.percentage)?;
    }

    let sheet = add_sheet(&mut workbook, "Combined_Sorted", &REQUIRED_COLUMNS, &bold)?;
    for (i, row) in analyzer.combined_sorted_report().iter().enumerate() {
        let r = (i + 1) as u32;
        sheet
            .write_string(r, 0, &row.category)?
            .write_string(r, 1, &row.service)?
            .write_string(r, 2, &row.resource)?
            .write_number(r, 3, row.cost)?;
    }

    let sheet = add_sheet(&mut workbook, "Top_Costs", &REQUIRED_COLUMNS, &bold)?;
    write_records(sheet, &analyzer.top_costs(TOP_COSTS_SHEET_ROWS), false)?;

    let mut headers: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    headers.extend(extra_columns.iter().map(String::as_str));
    let sheet = add_sheet(&mut workbook, "Raw_Data", &headers, &bold)?;
    write_records(sheet, records, true)?;

    Ok(workbook)
}

fn add_sheet<'a>(
    workbook: &'a mut Workbook,
    name: &str,
    headers: &[&str],
    bold: &Format,
) -> std::result::Result<&'a mut Worksheet, XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    for (col, title) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, bold)?;
    }
    Ok(sheet)
}

/// By-service or by-category sheet; `labels` names the key and related columns.
fn write_dimension_sheet(
    workbook: &mut Workbook,
    name: &str,
    labels: [&str; 2],
    rows: &[DimensionSummary],
    bold: &Format,
) -> std::result::Result<(), XlsxError> {
    let headers = [
        labels[0],
        "Total_Cost",
        "Avg_Cost",
        "Usage_Count",
        "Unique_Resources",
        labels[1],
        "Percentage",
    ];
    let sheet = add_sheet(workbook, name, &headers, bold)?;
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet
            .write_string(r, 0, &row.key)?
            .write_number(r, 1, round_cents(row.total_cost))?
            .write_number(r, 2, round_cents(row.avg_cost))?
            .write_number(r, 3, row.usage_count as f64)?
            .write_number(r, 4, row.unique_resources as f64)?
            .write_string(r, 5, row.related_label())?
            .write_number(r, 6, row.percentage)?;
    }
    Ok(())
}

fn write_records(
    sheet: &mut Worksheet,
    records: &[Record],
    with_extras: bool,
) -> std::result::Result<(), XlsxError> {
    for (i, record) in records.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet
            .write_string(r, 0, &record.category)?
            .write_string(r, 1, &record.service)?
            .write_string(r, 2, &record.resource)?
            .write_number(r, 3, record.cost)?;
        if with_extras {
            for (j, value) in record.extras.iter().enumerate() {
                sheet.write_string(r, (REQUIRED_COLUMNS.len() + j) as u16, value)?;
            }
        }
    }
    Ok(())
}

fn write_rows(rows: &[CombinedRow], path: &Path) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REQUIRED_COLUMNS)?;
    for row in rows {
        let cost = format!("{:.2}", row.cost);
        writer.write_record([
            row.category.as_str(),
            row.service.as_str(),
            row.resource.as_str(),
            cost.as_str(),
        ])?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use chrono::TimeZone;
    use tempfile::TempDir;

    const SCENARIO: &str = "MeterCategory,ConsumedService,ResourceName,Cost\n\
        Storage,Microsoft.Storage,disk1,10.00\n\
        Storage,Microsoft.Storage,disk1,5.00\n\
        Storage,Microsoft.Storage,disk2,7.00\n\
        Compute,Microsoft.Compute,vm1,20.00\n";

    fn loaded() -> CostAnalyzer {
        let mut analyzer = CostAnalyzer::new();
        analyzer
            .load_from_reader(SCENARIO.as_bytes(), "bill.csv")
            .unwrap();
        analyzer
    }

    fn row(category: &str, service: &str, resource: &str, cost: f64) -> CombinedRow {
        CombinedRow {
            category: category.to_string(),
            service: service.to_string(),
            resource: resource.to_string(),
            cost,
        }
    }

    #[test]
    fn test_summary_without_data() {
        assert_eq!(render_summary(&CostAnalyzer::new()), "No data loaded.");
    }

    #[test]
    fn test_summary_sections() {
        let text = render_summary(&loaded());

        assert!(text.starts_with("=== BILLING ANALYSIS REPORT ==="));
        assert!(text.contains("Data Source: bill.csv"));
        assert!(text.contains("- Total Records: 4"));
        assert!(text.contains("- Total Cost: $42.00"));
        assert!(text.contains("- Average Cost: $10.50"));
        assert!(text.contains("- Cost Range: $5.00 - $20.00"));
        assert!(text.contains("- Unique Services: 2"));
        assert!(text.contains("- Unique Resources: 3"));
        assert!(text.contains("- Microsoft.Storage: $22.00 (52.4%)"));
        assert!(text.contains("- Compute: $20.00 (47.6%)"));
        assert!(text.contains("- Records in sorted order: 3"));
        assert!(text.ends_with("=== END OF REPORT ==="));
    }

    #[test]
    fn test_summary_top_items_follow_combined_order() {
        let text = render_summary(&loaded());
        let first = text
            .find("- Compute > Microsoft.Compute > vm1: $20.00")
            .unwrap();
        let second = text
            .find("- Storage > Microsoft.Storage > disk1: $15.00")
            .unwrap();
        let third = text
            .find("- Storage > Microsoft.Storage > disk2: $7.00")
            .unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_default_export_path() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = default_export_path(Path::new("reports"), now);
        assert_eq!(path, PathBuf::from("reports/BillSort_20240309_140507.csv"));
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("BillSort.csv");
        let rows = vec![
            row("Compute", "Microsoft.Compute", "vm1", 20.0),
            row("Storage", "Microsoft.Storage", "disk, primary", 15.5),
        ];

        let written = export_combined_csv(&rows, &dest).unwrap();
        assert_eq!(written, dest);

        let content = fs::read_to_string(&dest).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "MeterCategory,ConsumedService,ResourceName,Cost");
        assert_eq!(lines[1], "Compute,Microsoft.Compute,vm1,20.00");
        assert_eq!(lines[2], "Storage,Microsoft.Storage,\"disk, primary\",15.50");
        assert!(!dest.with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_export_empty_report_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("BillSort.csv");
        let err = export_combined_csv(&[], &dest).unwrap_err();
        assert!(matches!(err, BillError::EmptyReport));
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_to_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let dest = blocker.join("BillSort.csv");

        let err = export_combined_csv(&[row("A", "B", "C", 1.0)], &dest).unwrap_err();
        match err {
            BillError::Export { path, .. } => assert_eq!(path, dest),
            other => panic!("expected export error, got {other:?}"),
        }
    }

    #[test]
    fn test_export_then_reload_matches_report() {
        let analyzer = loaded();
        let rows = analyzer.combined_sorted_report();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("BillSort.csv");
        export_combined_csv(&rows, &dest).unwrap();

        let mut reloaded = CostAnalyzer::new();
        reloaded.load(&dest).unwrap();
        assert_eq!(reloaded.combined_sorted_report(), rows);
    }

    #[test]
    fn test_payload_totals() {
        let rows = vec![row("A", "B", "C", 1.1), row("A", "B", "D", 2.2)];
        let payload = CombinedReportPayload::new(&rows);
        assert_eq!(payload.total_records, 2);
        assert_eq!(payload.total_cost, 3.3);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"][0]["MeterCategory"], "A");
        assert_eq!(json["total_records"], 2);
    }

    #[test]
    fn test_limited_payload_keeps_report_totals() {
        let rows = vec![
            row("A", "B", "C", 1.0),
            row("A", "B", "D", 2.0),
            row("A", "B", "E", 4.0),
        ];
        let payload = CombinedReportPayload::new(&rows).limited(Some(1));
        assert_eq!(payload.data.len(), 1);
        assert_eq!(payload.total_records, 3);
        assert_eq!(payload.total_cost, 7.0);

        let payload = CombinedReportPayload::new(&rows).limited(Some(10));
        assert_eq!(payload.data.len(), 3);
        assert_eq!(CombinedReportPayload::new(&rows).limited(None).data.len(), 3);
    }

    #[test]
    fn test_default_excel_path() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = default_excel_path(Path::new("reports"), now);
        assert_eq!(path, PathBuf::from("reports/BillAnalysis_20240309_140507.xlsx"));
    }

    #[test]
    fn test_excel_export_writes_every_sheet() {
        let mut analyzer = CostAnalyzer::new();
        analyzer
            .load_from_reader(
                "MeterCategory,ConsumedService,ResourceName,Cost,ResourceLocation\n\
                 Storage,Microsoft.Storage,disk1,10.00,westeurope\n\
                 Storage,Microsoft.Storage,disk1,5.00,westeurope\n\
                 Storage,Microsoft.Storage,disk2,7.00,northeurope\n\
                 Compute,Microsoft.Compute,vm1,20.00,westeurope\n"
                    .as_bytes(),
                "bill.csv",
            )
            .unwrap();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out").join("analysis.xlsx");

        let written = export_excel(&analyzer, &dest).unwrap();
        assert_eq!(written, dest);
        assert!(!dest.with_extension("xlsx.tmp").exists());

        let mut workbook = open_workbook_auto(&dest).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Summary",
                "By_Service",
                "By_Category",
                "By_Resource",
                "Combined_Sorted",
                "Top_Costs",
                "Raw_Data",
            ]
        );

        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((1, 1)), Some(&Data::Float(4.0)));
        assert_eq!(
            summary.get_value((2, 1)),
            Some(&Data::String("$42.00".to_string()))
        );

        let services = workbook.worksheet_range("By_Service").unwrap();
        assert_eq!(
            services.get_value((1, 0)),
            Some(&Data::String("Microsoft.Storage".to_string()))
        );
        assert_eq!(services.get_value((1, 1)), Some(&Data::Float(22.0)));

        let combined = workbook.worksheet_range("Combined_Sorted").unwrap();
        assert_eq!(combined.height(), 4);
        assert_eq!(
            combined.get_value((1, 2)),
            Some(&Data::String("vm1".to_string()))
        );
        assert_eq!(combined.get_value((2, 3)), Some(&Data::Float(15.0)));

        let top = workbook.worksheet_range("Top_Costs").unwrap();
        assert_eq!(top.height(), 5);

        let raw = workbook.worksheet_range("Raw_Data").unwrap();
        assert_eq!(raw.height(), 5);
        assert_eq!(
            raw.get_value((0, 4)),
            Some(&Data::String("ResourceLocation".to_string()))
        );
        assert_eq!(
            raw.get_value((3, 4)),
            Some(&Data::String("northeurope".to_string()))
        );
    }

    #[test]
    fn test_excel_export_without_data() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("analysis.xlsx");
        let err = export_excel(&CostAnalyzer::new(), &dest).unwrap_err();
        assert!(matches!(err, BillError::EmptyReport));
        assert!(!dest.exists());
    }

    #[test]
    fn test_excel_export_to_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let dest = blocker.join("analysis.xlsx");

        let err = export_excel(&loaded(), &dest).unwrap_err();
        assert!(matches!(err, BillError::Export { .. }));
    }
}
