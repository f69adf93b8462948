//! Terminal tables for every report view.

use billsort_core::formatting::{format_currency, format_number};
use billsort_core::models::{
    CombinedRow, CostSummary, DimensionSummary, GroupDimension, Record, ResourceSummary,
};
use billsort_data::reader::BillFile;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());
    table
}

fn right(value: impl ToString) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

fn share(percentage: f64) -> Cell {
    right(format!("{:.1}%", percentage))
}

/// `title` above `table`, or above `empty` when there is nothing to show.
fn titled(title: &str, table: &Table, is_empty: bool, empty: &str) -> String {
    if is_empty {
        format!("{title}\n{empty}\n")
    } else {
        format!("{title}\n{table}\n")
    }
}

pub fn statistics_table(summary: &CostSummary) -> Table {
    let mut table = new_table(&["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Total Records"),
        right(format_number(summary.total_records as f64, 0)),
    ]);
    table.add_row(vec![Cell::new("Total Cost"), right(format_currency(summary.total_cost))]);
    table.add_row(vec![Cell::new("Average Cost"), right(format_currency(summary.avg_cost))]);
    table.add_row(vec![
        Cell::new("Cost Range"),
        right(format!(
            "{} - {}",
            format_currency(summary.min_cost),
            format_currency(summary.max_cost)
        )),
    ]);
    table.add_row(vec![Cell::new("Unique Services"), right(summary.unique_services)]);
    table.add_row(vec![Cell::new("Unique Categories"), right(summary.unique_categories)]);
    table.add_row(vec![Cell::new("Unique Resources"), right(summary.unique_resources)]);
    table
}

pub fn render_statistics(summary: &CostSummary) -> String {
    titled("BASIC STATISTICS", &statistics_table(summary), false, "")
}

/// By-service or by-category table.
pub fn dimension_table(rows: &[DimensionSummary], dimension: GroupDimension) -> Table {
    let (key_label, related_label) = match dimension {
        GroupDimension::Service => ("Service", "Categories"),
        GroupDimension::Category => ("Category", "Services"),
    };
    let mut table = new_table(&[key_label, "Total", "Share", "Rows", "Resources", related_label]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.key),
            right(format_currency(row.total_cost)),
            share(row.percentage),
            right(row.usage_count),
            right(row.unique_resources),
            Cell::new(row.related_label()),
        ]);
    }
    table
}

pub fn render_dimension(rows: &[DimensionSummary], dimension: GroupDimension) -> String {
    let title = match dimension {
        GroupDimension::Service => "COSTS BY SERVICE",
        GroupDimension::Category => "COSTS BY CATEGORY",
    };
    titled(
        title,
        &dimension_table(rows, dimension),
        rows.is_empty(),
        "No data available",
    )
}

pub fn resources_table(rows: &[ResourceSummary]) -> Table {
    let mut table = new_table(&["Resource", "Total", "Share", "Rows", "Service", "Category"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.resource),
            right(format_currency(row.total_cost)),
            share(row.percentage),
            right(row.usage_count),
            Cell::new(&row.service),
            Cell::new(&row.category),
        ]);
    }
    table
}

pub fn render_resources(rows: &[ResourceSummary]) -> String {
    titled(
        "COSTS BY RESOURCE",
        &resources_table(rows),
        rows.is_empty(),
        "No data available",
    )
}

/// Combined sorted report, numbered, cut to the first `limit` rows.
pub fn combined_table(rows: &[CombinedRow], limit: Option<usize>) -> Table {
    let mut table = new_table(&["#", "Category", "Service", "Resource", "Cost"]);
    let shown = limit.unwrap_or(rows.len());
    for (i, row) in rows.iter().take(shown).enumerate() {
        table.add_row(vec![
            right(i + 1),
            Cell::new(&row.category),
            Cell::new(&row.service),
            Cell::new(&row.resource),
            right(format_currency(row.cost)),
        ]);
    }
    table
}

pub fn render_combined(rows: &[CombinedRow], limit: Option<usize>) -> String {
    let title = "COMBINED SORTED REPORT\n   Sort: MeterCategory\u{2191}, ConsumedService\u{2191}, Cost\u{2193}";
    let mut out = titled(
        title,
        &combined_table(rows, limit),
        rows.is_empty(),
        "No data available for Combined Sorted Report",
    );
    let hidden = rows.len().saturating_sub(limit.unwrap_or(rows.len()));
    if hidden > 0 {
        out.push_str(&format!("... and {hidden} more records\n"));
    }
    out
}

/// Individual billing lines, as returned by top, search and filter.
pub fn records_table(rows: &[Record]) -> Table {
    let mut table = new_table(&["Category", "Service", "Resource", "Cost"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.category),
            Cell::new(&row.service),
            Cell::new(&row.resource),
            right(format_currency(row.cost)),
        ]);
    }
    table
}

pub fn render_records(title: &str, rows: &[Record]) -> String {
    let mut out = titled(title, &records_table(rows), rows.is_empty(), "No matching records");
    if !rows.is_empty() {
        out.push_str(&format!("{} record(s)\n", rows.len()));
    }
    out
}

pub fn bill_files_table(files: &[BillFile]) -> Table {
    let mut table = new_table(&["File", "Size"]);
    for file in files {
        table.add_row(vec![
            Cell::new(file.path.display()),
            right(format!("{} KB", format_number(file.size_kb(), 1))),
        ]);
    }
    table
}

pub fn render_bill_files(files: &[BillFile]) -> String {
    titled(
        "BILL FILES",
        &bill_files_table(files),
        files.is_empty(),
        "No bill files found",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plain(mut table: Table) -> String {
        table.force_no_tty();
        table.to_string()
    }

    fn combined(n: usize) -> Vec<CombinedRow> {
        (0..n)
            .map(|i| CombinedRow {
                category: "Storage".to_string(),
                service: "Microsoft.Storage".to_string(),
                resource: format!("disk{i}"),
                cost: 10.0 - i as f64,
            })
            .collect()
    }

    #[test]
    fn test_combined_limit_reports_remainder() {
        let text = plain(combined_table(&combined(5), Some(2)));
        assert!(text.contains("disk0"));
        assert!(text.contains("disk1"));
        assert!(!text.contains("disk2"));
        assert!(render_combined(&combined(5), Some(2)).contains("... and 3 more records"));
    }

    #[test]
    fn test_combined_without_limit_shows_all() {
        let text = plain(combined_table(&combined(3), None));
        assert!(text.contains("disk2"));
        assert!(!render_combined(&combined(3), None).contains("more records"));
        assert!(!render_combined(&combined(3), Some(10)).contains("more records"));
    }

    #[test]
    fn test_combined_empty() {
        let text = render_combined(&[], Some(15));
        assert!(text.contains("No data available for Combined Sorted Report"));
    }

    #[test]
    fn test_combined_keeps_full_labels() {
        let rows = vec![CombinedRow {
            category: "Virtual Machines Licenses".to_string(),
            service: "Microsoft.Compute".to_string(),
            resource: "東京-ストレージ".to_string(),
            cost: 1.0,
        }];
        let text = plain(combined_table(&rows, None));
        assert!(text.contains("Virtual Machines Licenses"));
        assert!(text.contains("東京-ストレージ"));
        assert!(text.contains("$1.00"));
    }

    #[test]
    fn test_dimension_table() {
        let rows = vec![DimensionSummary {
            key: "Microsoft.Storage".to_string(),
            total_cost: 1234.5,
            avg_cost: 617.25,
            usage_count: 2,
            unique_resources: 1,
            related: vec!["Storage".to_string(), "Bandwidth".to_string()],
            percentage: 61.73,
        }];
        let text = plain(dimension_table(&rows, GroupDimension::Service));
        assert!(text.contains("Categories"));
        assert!(text.contains("$1,234.50"));
        assert!(text.contains("61.7%"));
        assert!(text.contains("Storage, Bandwidth"));
        assert!(render_dimension(&rows, GroupDimension::Service).starts_with("COSTS BY SERVICE"));
        assert!(render_dimension(&[], GroupDimension::Category).contains("No data available"));
    }

    #[test]
    fn test_resources_table() {
        let rows = vec![ResourceSummary {
            resource: "disk1".to_string(),
            total_cost: 15.0,
            avg_cost: 7.5,
            usage_count: 2,
            service: "Microsoft.Storage".to_string(),
            category: "Storage".to_string(),
            percentage: 35.71,
        }];
        let text = plain(resources_table(&rows));
        assert!(text.contains("disk1"));
        assert!(text.contains("$15.00"));
        assert!(text.contains("35.7%"));
    }

    #[test]
    fn test_records_table_counts_rows() {
        let rows = vec![Record::new("Storage", "Microsoft.Storage", "disk1", 10.0)];
        assert!(plain(records_table(&rows)).contains("disk1"));
        assert!(render_records("TOP 1 COSTS", &rows).contains("1 record(s)"));
        assert!(render_records("SEARCH", &[]).contains("No matching records"));
    }

    #[test]
    fn test_statistics_table() {
        let summary = CostSummary {
            total_records: 1200,
            total_cost: 42.0,
            avg_cost: 0.035,
            min_cost: 0.0,
            max_cost: 20.0,
            unique_services: 2,
            unique_categories: 2,
            unique_resources: 3,
            ..CostSummary::default()
        };
        let text = plain(statistics_table(&summary));
        assert!(text.contains("1,200"));
        assert!(text.contains("$0.00 - $20.00"));
        assert!(render_statistics(&summary).starts_with("BASIC STATISTICS"));
    }

    #[test]
    fn test_bill_files_listing() {
        let files = vec![BillFile {
            path: PathBuf::from("bills/march.csv"),
            size_bytes: 2048,
        }];
        let text = plain(bill_files_table(&files));
        assert!(text.contains("bills/march.csv"));
        assert!(text.contains("2.0 KB"));
        assert!(render_bill_files(&[]).contains("No bill files found"));
    }
}
