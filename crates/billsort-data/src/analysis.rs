//! The analysis engine handle.
//!
//! A [`CostAnalyzer`] holds at most one loaded [`Dataset`] and answers every
//! report view from it. Loading needs `&mut self` and views need `&self`, so
//! a load can never overlap a derivation. Without a dataset every view is
//! empty.

use std::io::Read;
use std::path::Path;

use billsort_core::error::Result;
use billsort_core::models::{
    CombinedRow, CostFilter, CostSummary, Dataset, DimensionSummary, GroupDimension, Record,
    ResourceSummary,
};
use tracing::error;

use crate::aggregator::CostAggregator;
use crate::reader::{load_dataset, load_dataset_from_reader};

#[derive(Debug, Default)]
pub struct CostAnalyzer {
    dataset: Option<Dataset>,
}

impl CostAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An analyzer already holding `dataset`.
    pub fn with_dataset(dataset: Dataset) -> Self {
        Self {
            dataset: Some(dataset),
        }
    }

    /// Load the export at `path`, replacing any held dataset.
    ///
    /// On failure the analyzer is left empty, never holding the previous
    /// dataset.
    pub fn load(&mut self, path: &Path) -> Result<&Dataset> {
        self.dataset = None;
        let loaded = load_dataset(path);
        self.install(loaded)
    }

    /// Load an export from an in-memory source labelled `source`.
    pub fn load_from_reader<R: Read>(&mut self, reader: R, source: &str) -> Result<&Dataset> {
        self.dataset = None;
        let loaded = load_dataset_from_reader(reader, source);
        self.install(loaded)
    }

    fn install(&mut self, loaded: Result<Dataset>) -> Result<&Dataset> {
        match loaded {
            Ok(dataset) => Ok(self.dataset.insert(dataset)),
            Err(e) => {
                error!("Error loading data: {}", e);
                Err(e)
            }
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn summary(&self) -> CostSummary {
        self.derive(CostAggregator::summary)
    }

    pub fn by_service(&self) -> Vec<DimensionSummary> {
        self.derive(CostAggregator::by_service)
    }

    pub fn by_category(&self) -> Vec<DimensionSummary> {
        self.derive(CostAggregator::by_category)
    }

    pub fn by_dimension(&self, dimension: GroupDimension) -> Vec<DimensionSummary> {
        self.derive(|ds| CostAggregator::by_dimension(ds, dimension))
    }

    pub fn by_resource(&self) -> Vec<ResourceSummary> {
        self.derive(CostAggregator::by_resource)
    }

    pub fn combined_sorted_report(&self) -> Vec<CombinedRow> {
        if self.dataset.is_none() {
            error!("No data loaded. Please load data first.");
        }
        self.derive(CostAggregator::combined_sorted_report)
    }

    pub fn top_costs(&self, n: usize) -> Vec<Record> {
        self.derive(|ds| CostAggregator::top_costs(ds, n))
    }

    pub fn search(&self, term: &str) -> Vec<Record> {
        self.derive(|ds| CostAggregator::search(ds, term))
    }

    pub fn filter(&self, filter: &CostFilter) -> Vec<Record> {
        self.derive(|ds| CostAggregator::filter(ds, filter))
    }

    fn derive<T: Default>(&self, f: impl FnOnce(&Dataset) -> T) -> T {
        self.dataset.as_ref().map(f).unwrap_or_default()
    }
}
