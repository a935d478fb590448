use std::sync::Arc;

use crate::data::model::{VehicleDataset, VehicleRecord};
use crate::data::query::{
    average_price_by_model_year, summary_statistics, top_brands_by_count, BrandSelection, Summary,
};
use crate::data::PipelineError;

// ---------------------------------------------------------------------------
// Per-session filter parameters
// ---------------------------------------------------------------------------

/// The filter widgets' current values. `price_range: None` means the slider
/// covers everything (no constraint).
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub price_range: Option<(f64, f64)>,
    pub brand: BrandSelection,
}

impl FilterParams {
    fn passes(&self, record: &VehicleRecord) -> bool {
        if let Some((low, high)) = self.price_range {
            if !record.price.is_some_and(|p| low <= p && p <= high) {
                return false;
            }
        }
        self.brand.matches(&record.brand)
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One user session's view of the dataset, independent of rendering.
///
/// The dataset itself is an `Arc`: read-only after load, so concurrent
/// sessions share one copy without locking. Each session owns only its
/// filter parameters and the cached indices passing them.
pub struct SessionState {
    dataset: Arc<VehicleDataset>,
    filters: FilterParams,
    /// Indices of records passing the current filters (cached).
    visible: Vec<usize>,
}

impl SessionState {
    /// Start a session over a loaded dataset with no filters active.
    pub fn new(dataset: Arc<VehicleDataset>) -> Self {
        let visible = (0..dataset.len()).collect();
        SessionState {
            dataset,
            filters: FilterParams::default(),
            visible,
        }
    }

    pub fn dataset(&self) -> &VehicleDataset {
        &self.dataset
    }

    pub fn filters(&self) -> &FilterParams {
        &self.filters
    }

    /// Constrain the price slider. Rejects inverted bounds.
    pub fn set_price_range(&mut self, low: f64, high: f64) -> Result<(), PipelineError> {
        if low > high {
            return Err(PipelineError::InvalidRange { low, high });
        }
        self.filters.price_range = Some((low, high));
        self.refilter();
        Ok(())
    }

    /// Drop the price constraint.
    pub fn clear_price_range(&mut self) {
        self.filters.price_range = None;
        self.refilter();
    }

    /// Switch the brand selector.
    pub fn set_brand(&mut self, selection: BrandSelection) {
        self.filters.brand = selection;
        self.refilter();
    }

    /// Recompute `visible` after a filter change. Source row order is
    /// preserved.
    fn refilter(&mut self) {
        self.visible = self
            .dataset
            .records
            .iter()
            .enumerate()
            .filter(|(_, rec)| self.filters.passes(rec))
            .map(|(i, _)| i)
            .collect();
    }

    /// Records passing the current filters, in source order.
    pub fn visible_records(&self) -> impl Iterator<Item = &VehicleRecord> {
        self.visible.iter().map(|&i| &self.dataset.records[i])
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Headline metrics over the visible subset.
    pub fn summary(&self) -> Summary {
        summary_statistics(self.visible_records())
    }

    /// Top brands bar-chart data over the visible subset.
    pub fn top_brands(&self, n: usize) -> Vec<(String, usize)> {
        top_brands_by_count(self.visible_records(), n)
    }

    /// Price-by-year line-chart data over the visible subset.
    pub fn price_by_year(&self, min_year: i64, max_year: i64) -> Vec<(i64, f64)> {
        average_price_by_model_year(self.visible_records(), min_year, max_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn dataset() -> Arc<VehicleDataset> {
        let records = vec![
            VehicleRecord::new(Some(1000.0), Some(1985), None, Some("Ford F-150".into()), BTreeMap::new()),
            VehicleRecord::new(Some(5000.0), Some(1995), None, Some("ford Explorer".into()), BTreeMap::new()),
            VehicleRecord::new(Some(9000.0), Some(1995), None, None, BTreeMap::new()),
            VehicleRecord::new(None, Some(2005), None, Some("toyota camry".into()), BTreeMap::new()),
        ];
        Arc::new(VehicleDataset::from_records(records))
    }

    #[test]
    fn new_session_shows_everything() {
        let session = SessionState::new(dataset());
        assert_eq!(session.visible_count(), 4);
        assert_eq!(session.summary().count, 4);
    }

    #[test]
    fn price_filter_narrows_visible_set() {
        let mut session = SessionState::new(dataset());
        session.set_price_range(2000.0, 9000.0).unwrap();
        assert_eq!(session.visible_count(), 2);

        session.clear_price_range();
        assert_eq!(session.visible_count(), 4);
    }

    #[test]
    fn inverted_bounds_leave_state_untouched() {
        let mut session = SessionState::new(dataset());
        let err = session.set_price_range(10.0, 1.0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRange { .. }));
        assert_eq!(session.visible_count(), 4);
        assert!(session.filters().price_range.is_none());
    }

    #[test]
    fn brand_and_price_filters_combine() {
        let mut session = SessionState::new(dataset());
        session.set_brand(BrandSelection::Only("ford".into()));
        assert_eq!(session.visible_count(), 1);

        session.set_price_range(0.0, 2000.0).unwrap();
        assert_eq!(session.visible_count(), 0);

        session.set_brand(BrandSelection::All);
        assert_eq!(session.visible_count(), 1);
    }

    #[test]
    fn sessions_share_the_dataset_without_interference() {
        let ds = dataset();
        let mut a = SessionState::new(Arc::clone(&ds));
        let b = SessionState::new(Arc::clone(&ds));

        a.set_brand(BrandSelection::Only("toyota".into()));
        assert_eq!(a.visible_count(), 1);
        assert_eq!(b.visible_count(), 4);
        assert_eq!(ds.len(), 4);
    }

    #[test]
    fn chart_queries_run_over_visible_subset() {
        let mut session = SessionState::new(dataset());
        session.set_price_range(0.0, 6000.0).unwrap();

        let top = session.top_brands(10);
        assert_eq!(
            top,
            vec![("Ford".to_string(), 1), ("ford".to_string(), 1)]
        );

        let series = session.price_by_year(1990, 2023);
        assert_eq!(series, vec![(1995, 5000.0)]);
    }
}
