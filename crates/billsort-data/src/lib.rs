//! Data layer for BillSort.
//!
//! Discovers and parses billing-export CSV files, aggregates them into the
//! service, category, resource and combined views, and renders the text
//! summary and CSV export.

pub mod aggregator;
pub mod analysis;
pub mod reader;
pub mod report;

pub use billsort_core as core;
