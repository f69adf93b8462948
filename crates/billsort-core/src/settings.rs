use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::CostFilter;

/// Directory searched for bill exports when none is configured.
pub const DEFAULT_BILLS_DIR: &str = "bills";
/// Directory exports are written to when none is configured.
pub const DEFAULT_REPORTS_DIR: &str = "reports";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Cloud billing export analyzer with combined sorted reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "billsort",
    about = "Cloud billing export analyzer with combined sorted reports",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory holding bill exports (remembered between runs)
    #[arg(long, global = true)]
    pub bills_dir: Option<PathBuf>,

    /// Directory exports are written to (remembered between runs)
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Logging level
    #[arg(long, global = true, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long, global = true)]
    pub clear: bool,
}

/// Report to produce.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the text summary report
    Summary {
        /// Billing export (CSV)
        file: PathBuf,
    },

    /// Costs grouped by consumed service
    Services { file: PathBuf },

    /// Costs grouped by meter category
    Categories { file: PathBuf },

    /// Costs grouped by resource name
    Resources { file: PathBuf },

    /// Combined report sorted by category, service, then cost descending
    Combined {
        file: PathBuf,
        /// Only show the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Most expensive individual billing lines
    Top {
        file: PathBuf,
        /// Number of rows
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Case-insensitive search across resource, service and category
    Search { file: PathBuf, term: String },

    /// Rows matching every given predicate
    Filter {
        file: PathBuf,
        #[command(flatten)]
        predicates: FilterArgs,
    },

    /// Write the combined sorted report as BillSort CSV, or the full
    /// analysis as an Excel workbook
    Export {
        file: PathBuf,
        /// Destination path (defaults to a timestamped file in the reports dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write an .xlsx workbook with every view instead of the CSV
        #[arg(long)]
        excel: bool,
    },

    /// List bill exports found in the bills directory
    List,
}

/// Raw filter predicates as typed on the command line.
///
/// Numeric bounds stay strings here so that an unparseable bound disables
/// its predicate instead of failing argument parsing.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct FilterArgs {
    /// Meter category contains
    #[arg(long)]
    pub category: Option<String>,
    /// Consumed service contains
    #[arg(long)]
    pub service: Option<String>,
    /// Resource name contains
    #[arg(long)]
    pub resource: Option<String>,
    /// Minimum cost (inclusive)
    #[arg(long)]
    pub min_cost: Option<String>,
    /// Maximum cost (inclusive)
    #[arg(long)]
    pub max_cost: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> CostFilter {
        CostFilter {
            category: self.category.clone(),
            service: self.service.clone(),
            resource: self.resource.clone(),
            min_cost: CostFilter::parse_bound(self.min_cost.as_deref()),
            max_cost: CostFilter::parse_bound(self.max_cost.as_deref()),
        }
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.billsort/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bills_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<PathBuf>,
}

impl LastUsedParams {
    /// Default location, `~/.billsort/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".billsort").join("last_used.json")
    }

    /// Load persisted params; absent or corrupt files yield `Default`.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Write params via a temp file and rename, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments, merge remembered directories and persist them.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and
    /// config location.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let mut settings = Settings::parse_from(args);

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("Could not clear {}: {}", config_path.display(), e);
            }
            return settings;
        }

        // CLI always wins over remembered values.
        let last = LastUsedParams::load_from(config_path);
        if settings.bills_dir.is_none() {
            settings.bills_dir = last.bills_dir;
        }
        if settings.reports_dir.is_none() {
            settings.reports_dir = last.reports_dir;
        }

        let params = LastUsedParams::from(&settings);
        if params != LastUsedParams::default() {
            let _ = params.save_to(config_path);
        }

        settings
    }

    pub fn bills_dir(&self) -> PathBuf {
        self.bills_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BILLS_DIR))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.reports_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR))
    }

    /// Resolve a bill argument: the path as given when it exists, otherwise
    /// the same relative path under the bills directory when that exists.
    pub fn resolve_bill_path(&self, file: &Path) -> PathBuf {
        if file.exists() || file.is_absolute() {
            return file.to_path_buf();
        }
        let candidate = self.bills_dir().join(file);
        if candidate.exists() {
            candidate
        } else {
            file.to_path_buf()
        }
    }
}

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            bills_dir: s.bills_dir.clone(),
            reports_dir: s.reports_dir.clone(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
