//! Grouped cost views over a loaded [`Dataset`].
//!
//! Every function here is a pure read of the dataset: results are rebuilt on
//! each call and nothing is cached between calls.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use billsort_core::formatting::{percentage, round_cents};
use billsort_core::models::{
    CombinedRow, CostFilter, CostSummary, Dataset, DimensionSummary, GroupDimension, Record,
    ResourceSummary,
};
use tracing::{debug, info};

// ── CostStats ─────────────────────────────────────────────────────────────────

/// Running sum and count of a cost group.
#[derive(Debug, Clone, Copy, Default)]
struct CostStats {
    total: f64,
    count: usize,
}

impl CostStats {
    fn add(&mut self, cost: f64) {
        self.total += cost;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

#[derive(Default)]
struct DimensionGroup<'a> {
    stats: CostStats,
    resources: HashSet<&'a str>,
    related_seen: HashSet<&'a str>,
    related: Vec<&'a str>,
}

struct ResourceGroup<'a> {
    stats: CostStats,
    service: &'a str,
    category: &'a str,
}

// ── CostAggregator ────────────────────────────────────────────────────────────

/// Stateless helper that derives report views from a dataset.
pub struct CostAggregator;

impl CostAggregator {
    /// Whole-table statistics.
    pub fn summary(dataset: &Dataset) -> CostSummary {
        let records = dataset.records();
        let mut stats = CostStats::default();
        let mut min_cost = f64::INFINITY;
        let mut max_cost = f64::NEG_INFINITY;
        let mut services: HashSet<&str> = HashSet::new();
        let mut categories: HashSet<&str> = HashSet::new();
        let mut resources: HashSet<&str> = HashSet::new();

        for r in records {
            stats.add(r.cost);
            min_cost = min_cost.min(r.cost);
            max_cost = max_cost.max(r.cost);
            services.insert(&r.service);
            categories.insert(&r.category);
            resources.insert(&r.resource);
        }

        let (min_cost, max_cost) = if records.is_empty() {
            (0.0, 0.0)
        } else {
            (min_cost, max_cost)
        };

        CostSummary {
            total_records: stats.count,
            total_cost: stats.total,
            avg_cost: stats.mean(),
            min_cost,
            max_cost,
            unique_services: services.len(),
            unique_categories: categories.len(),
            unique_resources: resources.len(),
            analysis_date: Some(dataset.loaded_at()),
            source: Some(dataset.source().to_string()),
        }
    }

    /// Costs grouped by consumed service, most expensive first.
    pub fn by_service(dataset: &Dataset) -> Vec<DimensionSummary> {
        Self::by_dimension(dataset, GroupDimension::Service)
    }

    /// Costs grouped by meter category, most expensive first.
    pub fn by_category(dataset: &Dataset) -> Vec<DimensionSummary> {
        Self::by_dimension(dataset, GroupDimension::Category)
    }

    /// Group by `dimension` and sort by total cost descending.
    ///
    /// Groups start out in ascending key order; the sort is stable, so equal
    /// totals keep that order. Percentages are assigned after sorting.
    pub fn by_dimension(dataset: &Dataset, dimension: GroupDimension) -> Vec<DimensionSummary> {
        let mut groups: BTreeMap<&str, DimensionGroup<'_>> = BTreeMap::new();

        for r in dataset.records() {
            let group = groups.entry(dimension.key_of(r)).or_default();
            group.stats.add(r.cost);
            group.resources.insert(&r.resource);
            let related = dimension.related_of(r);
            if group.related_seen.insert(related) {
                group.related.push(related);
            }
        }

        let mut rows: Vec<DimensionSummary> = groups
            .into_iter()
            .map(|(key, g)| DimensionSummary {
                key: key.to_string(),
                total_cost: g.stats.total,
                avg_cost: g.stats.mean(),
                usage_count: g.stats.count,
                unique_resources: g.resources.len(),
                related: g.related.into_iter().map(String::from).collect(),
                percentage: 0.0,
            })
            .collect();

        rows.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost));

        let grand_total = dataset.total_cost();
        for row in &mut rows {
            row.percentage = percentage(row.total_cost, grand_total, 2);
        }

        debug!("Grouped {} records into {} {:?} rows", dataset.len(), rows.len(), dimension);
        rows
    }

    /// Costs grouped by resource name, most expensive first.
    ///
    /// Each resource reports the service and category of the *first* row it
    /// appears on. A resource billed under several services is therefore
    /// attributed to whichever came first in the export.
    pub fn by_resource(dataset: &Dataset) -> Vec<ResourceSummary> {
        let mut groups: BTreeMap<&str, ResourceGroup<'_>> = BTreeMap::new();

        for r in dataset.records() {
            groups
                .entry(&r.resource)
                .or_insert_with(|| ResourceGroup {
                    stats: CostStats::default(),
                    service: &r.service,
                    category: &r.category,
                })
                .stats
                .add(r.cost);
        }

        let mut rows: Vec<ResourceSummary> = groups
            .into_iter()
            .map(|(resource, g)| ResourceSummary {
                resource: resource.to_string(),
                total_cost: g.stats.total,
                avg_cost: g.stats.mean(),
                usage_count: g.stats.count,
                service: g.service.to_string(),
                category: g.category.to_string(),
                percentage: 0.0,
            })
            .collect();

        rows.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost));

        let grand_total = dataset.total_cost();
        for row in &mut rows {
            row.percentage = percentage(row.total_cost, grand_total, 2);
        }

        rows
    }

    /// Sum costs per (category, service, resource) and order the result by
    /// category ascending, service ascending, cost descending.
    ///
    /// Costs are rounded to cents after summing and sorting.
    pub fn combined_sorted_report(dataset: &Dataset) -> Vec<CombinedRow> {
        let mut groups: BTreeMap<(&str, &str, &str), f64> = BTreeMap::new();
        for r in dataset.records() {
            *groups
                .entry((r.category.as_str(), r.service.as_str(), r.resource.as_str()))
                .or_insert(0.0) += r.cost;
        }

        let mut rows: Vec<CombinedRow> = groups
            .into_iter()
            .map(|((category, service, resource), cost)| CombinedRow {
                category: category.to_string(),
                service: service.to_string(),
                resource: resource.to_string(),
                cost,
            })
            .collect();

        rows.sort_by(compare_combined);

        for row in &mut rows {
            row.cost = round_cents(row.cost);
        }

        info!(
            "Combined Sorted Report generated: {} grouped records from {} individual records",
            rows.len(),
            dataset.len()
        );

        rows
    }

    /// The `n` most expensive individual lines; equal costs keep file order.
    pub fn top_costs(dataset: &Dataset, n: usize) -> Vec<Record> {
        let mut ranked: Vec<&Record> = dataset.records().iter().collect();
        ranked.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        ranked.into_iter().take(n).cloned().collect()
    }

    /// Lines whose resource, service or category contains `term`,
    /// ignoring case. A blank term matches nothing.
    pub fn search(dataset: &Dataset, term: &str) -> Vec<Record> {
        if term.trim().is_empty() {
            return Vec::new();
        }
        let needle = term.to_lowercase();

        dataset
            .records()
            .iter()
            .filter(|r| {
                [&r.resource, &r.service, &r.category]
                    .iter()
                    .any(|field| !field.is_empty() && field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// Lines satisfying every active predicate of `filter`.
    pub fn filter(dataset: &Dataset, filter: &CostFilter) -> Vec<Record> {
        dataset
            .records()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }
}

/// Ordering of the combined sorted report: category ↑, service ↑, cost ↓.
pub fn compare_combined(a: &CombinedRow, b: &CombinedRow) -> Ordering {
    a.category
        .cmp(&b.category)
        .then_with(|| a.service.cmp(&b.service))
        .then_with(|| b.cost.total_cmp(&a.cost))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
