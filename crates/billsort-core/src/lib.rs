//! Core types for billsort.
//!
//! Holds the typed billing record and dataset, the derived report rows, the
//! error taxonomy, number formatting and the command-line settings shared by
//! the data layer and the binary.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{BillError, Result};
