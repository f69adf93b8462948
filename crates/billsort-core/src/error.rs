use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by billsort.
#[derive(Error, Debug)]
pub enum BillError {
    /// The input bill does not exist on disk.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// One or more of the required billing columns is absent from the header.
    #[error("Missing required columns: {}", missing.join(", "))]
    Format {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// The table could not be parsed with any supported delimiter.
    #[error("Failed to parse billing table: {0}")]
    Parse(String),

    /// A report could not be written to its destination.
    #[error("Failed to export report to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An export was requested but the report has no rows.
    #[error("Cannot export: report is empty")]
    EmptyReport,

    /// Low-level CSV reader or writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be produced or parsed.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the billsort crates.
pub type Result<T> = std::result::Result<T, BillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = BillError::NotFound(PathBuf::from("/bills/missing.csv"));
        assert_eq!(err.to_string(), "File not found: /bills/missing.csv");
    }

    #[test]
    fn test_error_display_format_lists_missing() {
        let err = BillError::Format {
            missing: vec!["Cost".to_string(), "ResourceName".to_string()],
            available: vec!["MeterCategory".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required columns: Cost, ResourceName");
    }

    #[test]
    fn test_error_display_export() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = BillError::Export {
            path: PathBuf::from("/readonly/BillSort.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("/readonly/BillSort.csv"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_empty_report() {
        assert_eq!(
            BillError::EmptyReport.to_string(),
            "Cannot export: report is empty"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: BillError = io_err.into();
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: BillError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
