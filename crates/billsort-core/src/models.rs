use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::formatting::round_cents;

/// Header of the meter category column.
pub const COL_CATEGORY: &str = "MeterCategory";
/// Header of the consumed service column.
pub const COL_SERVICE: &str = "ConsumedService";
/// Header of the resource name column.
pub const COL_RESOURCE: &str = "ResourceName";
/// Header of the cost column.
pub const COL_COST: &str = "Cost";

/// Columns every billing export must carry, in export order.
pub const REQUIRED_COLUMNS: [&str; 4] = [COL_CATEGORY, COL_SERVICE, COL_RESOURCE, COL_COST];

/// A single billing line read from an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Meter category, e.g. `"Storage"`.
    #[serde(rename = "MeterCategory")]
    pub category: String,
    /// Consumed service, e.g. `"Microsoft.Storage"`.
    #[serde(rename = "ConsumedService")]
    pub service: String,
    /// Resource name the charge is attributed to.
    #[serde(rename = "ResourceName")]
    pub resource: String,
    /// Charged amount. Unparseable source values are stored as `0.0`.
    #[serde(rename = "Cost")]
    pub cost: f64,
    /// Usage or billing date, when the export carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Resource location / region, when the export carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Values of the non-required columns, aligned with
    /// [`Dataset::extra_columns`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
}

impl Record {
    /// Build a record with no passthrough fields.
    pub fn new(
        category: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            category: category.into(),
            service: service.into(),
            resource: resource.into(),
            cost,
            date: None,
            region: None,
            extras: Vec::new(),
        }
    }
}

/// An immutable, loaded billing table.
///
/// Built once per load; every derivation borrows it read-only.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    extra_columns: Vec<String>,
    source: String,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Wrap `records` read from `source`, stamping the load time.
    pub fn new(source: impl Into<String>, extra_columns: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            records,
            extra_columns,
            source: source.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Convenience constructor for in-memory tables with no extra columns.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new("<memory>", Vec::new(), records)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Names of the passthrough columns, in header order.
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// File name or label the table was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Grand total of the cost column.
    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }
}

// ── Derived views ─────────────────────────────────────────────────────────────

/// Whole-table statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_records: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub total_cost: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub avg_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub unique_services: usize,
    pub unique_categories: usize,
    pub unique_resources: usize,
    /// When the underlying dataset was loaded; `None` when nothing is loaded.
    pub analysis_date: Option<DateTime<Utc>>,
    /// Source label of the underlying dataset.
    pub source: Option<String>,
}

/// The dimension a grouped view is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupDimension {
    Service,
    Category,
}

impl GroupDimension {
    /// The grouping key of `record` along this dimension.
    pub fn key_of<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            GroupDimension::Service => &record.service,
            GroupDimension::Category => &record.category,
        }
    }

    /// The value of the opposite dimension, listed per group.
    pub fn related_of<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            GroupDimension::Service => &record.category,
            GroupDimension::Category => &record.service,
        }
    }

    /// Source column name of this dimension.
    pub fn column(&self) -> &'static str {
        match self {
            GroupDimension::Service => COL_SERVICE,
            GroupDimension::Category => COL_CATEGORY,
        }
    }
}

/// One row of the by-service or by-category view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSummary {
    /// Service or category name.
    pub key: String,
    #[serde(serialize_with = "serialize_cents")]
    pub total_cost: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub avg_cost: f64,
    pub usage_count: usize,
    pub unique_resources: usize,
    /// Distinct values of the opposite dimension, in first-appearance order.
    pub related: Vec<String>,
    /// Share of the grand total, rounded to two decimals.
    pub percentage: f64,
}

impl DimensionSummary {
    /// The related values joined with `", "`.
    pub fn related_label(&self) -> String {
        self.related.join(", ")
    }
}

/// One row of the by-resource view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub resource: String,
    #[serde(serialize_with = "serialize_cents")]
    pub total_cost: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub avg_cost: f64,
    pub usage_count: usize,
    /// Service of the first row seen for this resource.
    pub service: String,
    /// Category of the first row seen for this resource.
    pub category: String,
    pub percentage: f64,
}

/// One row of the combined sorted report (`BillSort.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRow {
    #[serde(rename = "MeterCategory")]
    pub category: String,
    #[serde(rename = "ConsumedService")]
    pub service: String,
    #[serde(rename = "ResourceName")]
    pub resource: String,
    /// Summed cost for the triple, rounded to two decimals.
    #[serde(rename = "Cost")]
    pub cost: f64,
}

// ── CostFilter ────────────────────────────────────────────────────────────────

/// Composable row predicates, applied as a conjunction.
///
/// Text predicates are case-insensitive substring matches; a blank text
/// predicate is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostFilter {
    pub category: Option<String>,
    pub service: Option<String>,
    pub resource: Option<String>,
    pub min_cost: Option<f64>,
    pub max_cost: Option<f64>,
}

impl CostFilter {
    /// Parse a raw numeric bound. Blank or unparseable input yields `None`,
    /// which disables the predicate.
    ///
    /// ```
    /// use billsort_core::models::CostFilter;
    ///
    /// assert_eq!(CostFilter::parse_bound(Some(" 12.5 ")), Some(12.5));
    /// assert_eq!(CostFilter::parse_bound(Some("abc")), None);
    /// assert_eq!(CostFilter::parse_bound(None), None);
    /// ```
    pub fn parse_bound(raw: Option<&str>) -> Option<f64> {
        raw.and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// `true` when no predicate is active.
    pub fn is_empty(&self) -> bool {
        active_text(&self.category).is_none()
            && active_text(&self.service).is_none()
            && active_text(&self.resource).is_none()
            && self.min_cost.is_none()
            && self.max_cost.is_none()
    }

    /// Whether `record` satisfies every active predicate.
    pub fn matches(&self, record: &Record) -> bool {
        contains_ci(&record.category, &self.category)
            && contains_ci(&record.service, &self.service)
            && contains_ci(&record.resource, &self.resource)
            && self.min_cost.map_or(true, |min| record.cost >= min)
            && self.max_cost.map_or(true, |max| record.cost <= max)
    }
}

/// Emit a cost rounded to cents; the in-memory value stays exact.
fn serialize_cents<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_cents(*value))
}

fn active_text(needle: &Option<String>) -> Option<&str> {
    needle.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match active_text(needle) {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}
