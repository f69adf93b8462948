mod bootstrap;
mod output;

use std::path::Path;

use anyhow::{Context, Result};
use billsort_core::models::GroupDimension;
use billsort_core::settings::{Command, Settings};
use billsort_data::analysis::CostAnalyzer;
use billsort_data::reader::find_bill_files;
use billsort_data::report::{
    default_excel_path, default_export_path, export_combined_csv, export_excel, render_summary,
    CombinedReportPayload,
};
use serde::Serialize;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("BillSort v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.clear {
        tracing::info!("Saved configuration cleared");
        if settings.command.is_none() {
            return Ok(());
        }
    }

    let command = settings.command.clone().unwrap_or(Command::List);
    run(&settings, &command)
}

fn run(settings: &Settings, command: &Command) -> Result<()> {
    match command {
        Command::Summary { file } => {
            let analyzer = load(settings, file)?;
            if settings.json {
                print_json(&analyzer.summary())?;
            } else {
                println!("{}", render_summary(&analyzer));
            }
        }

        Command::Services { file } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.by_service();
            if settings.json {
                print_json(&rows)?;
            } else {
                print!("{}", output::render_dimension(&rows, GroupDimension::Service));
            }
        }

        Command::Categories { file } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.by_category();
            if settings.json {
                print_json(&rows)?;
            } else {
                print!("{}", output::render_dimension(&rows, GroupDimension::Category));
            }
        }

        Command::Resources { file } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.by_resource();
            if settings.json {
                print_json(&rows)?;
            } else {
                print!("{}", output::render_resources(&rows));
            }
        }

        Command::Combined { file, limit } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.combined_sorted_report();
            if settings.json {
                print_json(&CombinedReportPayload::new(&rows).limited(*limit))?;
            } else {
                print!("{}", output::render_combined(&rows, *limit));
            }
        }

        Command::Top { file, limit } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.top_costs(*limit);
            if settings.json {
                print_json(&rows)?;
            } else {
                let title = format!("TOP {} COSTS", limit);
                print!("{}", output::render_records(&title, &rows));
            }
        }

        Command::Search { file, term } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.search(term);
            if settings.json {
                print_json(&rows)?;
            } else {
                let title = format!("SEARCH RESULTS FOR '{}'", term);
                print!("{}", output::render_records(&title, &rows));
            }
        }

        Command::Filter { file, predicates } => {
            let analyzer = load(settings, file)?;
            let rows = analyzer.filter(&predicates.to_filter());
            if settings.json {
                print_json(&rows)?;
            } else {
                print!("{}", output::render_records("FILTERED RECORDS", &rows));
            }
        }

        Command::Export {
            file,
            output: destination,
            excel,
        } => {
            let analyzer = load(settings, file)?;
            let now = chrono::Local::now();

            let written = if *excel {
                let path = destination
                    .clone()
                    .unwrap_or_else(|| default_excel_path(&settings.reports_dir(), now));
                export_excel(&analyzer, &path)
                    .with_context(|| format!("Failed to export Excel to {}", path.display()))?
            } else {
                let path = destination
                    .clone()
                    .unwrap_or_else(|| default_export_path(&settings.reports_dir(), now));
                export_combined_csv(&analyzer.combined_sorted_report(), &path)
                    .with_context(|| format!("Failed to export CSV to {}", path.display()))?
            };

            if settings.json {
                print_json(&serde_json::json!({
                    "path": written,
                    "format": if *excel { "xlsx" } else { "csv" },
                }))?;
            } else {
                print!("{}", output::render_statistics(&analyzer.summary()));
                println!();
                if *excel {
                    println!("Excel report exported: {}", written.display());
                    println!("   Includes the Combined_Sorted sheet");
                } else {
                    println!("CSV report exported: {}", written.display());
                    println!("   Format: MeterCategory, ConsumedService, ResourceName, Cost");
                }
            }
        }

        Command::List => {
            let dir = settings.bills_dir();
            let files = find_bill_files(&dir);
            if settings.json {
                let listing: Vec<_> = files
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "path": f.path,
                            "size_kb": f.size_kb(),
                        })
                    })
                    .collect();
                print_json(&listing)?;
            } else {
                print!("{}", output::render_bill_files(&files));
            }
        }
    }

    Ok(())
}

fn load(settings: &Settings, file: &Path) -> Result<CostAnalyzer> {
    let path = settings.resolve_bill_path(file);
    let mut analyzer = CostAnalyzer::new();
    analyzer
        .load(&path)
        .with_context(|| format!("Failed to load data from {}", path.display()))?;
    Ok(analyzer)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
