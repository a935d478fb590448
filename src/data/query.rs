use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::error::PipelineError;
use super::model::VehicleRecord;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Brand filter as the presentation layer's selector produces it: either
/// "all brands" or one exact derived-brand value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrandSelection {
    #[default]
    All,
    Only(String),
}

impl BrandSelection {
    /// Whether a record with the given derived brand passes this filter.
    /// Matching is case-sensitive; the loader preserves the model text's
    /// original casing and so does the selector.
    pub fn matches(&self, brand: &str) -> bool {
        match self {
            BrandSelection::All => true,
            BrandSelection::Only(b) => b == brand,
        }
    }
}

/// Records whose `price` lies in the closed interval `[low, high]`.
///
/// Records with a missing price are excluded. `low > high` is rejected with
/// [`PipelineError::InvalidRange`] rather than swapped or clamped.
pub fn filter_by_price_range<'a, I>(
    records: I,
    low: f64,
    high: f64,
) -> Result<Vec<&'a VehicleRecord>, PipelineError>
where
    I: IntoIterator<Item = &'a VehicleRecord>,
{
    if low > high {
        return Err(PipelineError::InvalidRange { low, high });
    }
    Ok(records
        .into_iter()
        .filter(|r| r.price.is_some_and(|p| low <= p && p <= high))
        .collect())
}

/// Records whose derived `brand` passes the selection. `BrandSelection::All`
/// keeps the input unchanged.
pub fn filter_by_brand<'a, I>(records: I, selection: &BrandSelection) -> Vec<&'a VehicleRecord>
where
    I: IntoIterator<Item = &'a VehicleRecord>,
{
    records
        .into_iter()
        .filter(|r| selection.matches(&r.brand))
        .collect()
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Headline metrics for a record collection. Means are computed over
/// non-null values only; an all-null column yields `None` ("no data"),
/// never a numeric zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean_price: Option<f64>,
    pub mean_model_year: Option<f64>,
    pub mean_odometer: Option<f64>,
}

pub fn summary_statistics<'a, I>(records: I) -> Summary
where
    I: IntoIterator<Item = &'a VehicleRecord>,
{
    let mut count = 0usize;
    let mut price = MeanAcc::default();
    let mut year = MeanAcc::default();
    let mut odometer = MeanAcc::default();

    for rec in records {
        count += 1;
        price.add(rec.price);
        year.add(rec.model_year.map(|y| y as f64));
        odometer.add(rec.odometer);
    }

    Summary {
        count,
        mean_price: price.mean(),
        mean_model_year: year.mean(),
        mean_odometer: odometer.mean(),
    }
}

#[derive(Default)]
struct MeanAcc {
    sum: f64,
    n: usize,
}

impl MeanAcc {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.n == 0 {
            None
        } else {
            Some(self.sum / self.n as f64)
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// Top `n` brands by listing count, descending. Ties keep the order in
/// which the brands first appear in the input (the grouping is stable).
pub fn top_brands_by_count<'a, I>(records: I, n: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a VehicleRecord>,
{
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    let mut position: HashMap<&'a str, usize> = HashMap::new();

    for rec in records {
        match position.get(rec.brand.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                position.insert(&rec.brand, counts.len());
                counts.push((&rec.brand, 1));
            }
        }
    }

    // Stable sort: equal counts stay in first-encountered order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts
        .into_iter()
        .map(|(brand, count)| (brand.to_string(), count))
        .collect()
}

/// Mean price per model year over `[min_year, max_year]`, ascending by year.
///
/// Only records with both a year in range and a non-null price contribute;
/// a year with no contributing records does not appear in the output.
pub fn average_price_by_model_year<'a, I>(
    records: I,
    min_year: i64,
    max_year: i64,
) -> Vec<(i64, f64)>
where
    I: IntoIterator<Item = &'a VehicleRecord>,
{
    let mut groups: BTreeMap<i64, (f64, usize)> = BTreeMap::new();

    for rec in records {
        let (Some(year), Some(price)) = (rec.model_year, rec.price) else {
            continue;
        };
        if year < min_year || year > max_year {
            continue;
        }
        let entry = groups.entry(year).or_insert((0.0, 0));
        entry.0 += price;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(year, (sum, n))| (year, sum / n as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rec(price: Option<f64>, year: Option<i64>, model: Option<&str>) -> VehicleRecord {
        VehicleRecord::new(price, year, None, model.map(str::to_string), BTreeMap::new())
    }

    fn sample() -> Vec<VehicleRecord> {
        vec![
            rec(Some(1000.0), Some(1985), Some("Ford F-150")),
            rec(Some(5000.0), Some(1995), Some("ford Explorer")),
            rec(Some(9000.0), Some(1995), None),
            rec(None, Some(2005), Some("")),
        ]
    }

    #[test]
    fn price_range_is_closed_interval() {
        let records = sample();
        let hits = filter_by_price_range(&records, 2000.0, 9000.0).unwrap();
        let prices: Vec<f64> = hits.iter().map(|r| r.price.unwrap()).collect();
        assert_eq!(prices, vec![5000.0, 9000.0]);

        // Full range returns every record with a price.
        let all = filter_by_price_range(&records, 1000.0, 9000.0).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        let records = sample();
        let err = filter_by_price_range(&records, 9000.0, 2000.0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRange { .. }));
    }

    #[test]
    fn brand_filter_is_case_sensitive_exact_match() {
        let records = sample();
        let brands: Vec<&str> = records.iter().map(|r| r.brand.as_str()).collect();
        assert_eq!(brands, vec!["Ford", "ford", "Unknown", "Unknown"]);

        let only_ford = filter_by_brand(&records, &BrandSelection::Only("Ford".into()));
        assert_eq!(only_ford.len(), 1);
        assert_eq!(only_ford[0].price, Some(1000.0));

        let all = filter_by_brand(&records, &BrandSelection::All);
        assert_eq!(all.len(), records.len());
    }

    #[test]
    fn filters_compose_without_mutating_input() {
        let records = sample();
        let in_range = filter_by_price_range(&records, 0.0, 6000.0).unwrap();
        let fords = filter_by_brand(in_range, &BrandSelection::Only("ford".into()));
        assert_eq!(fords.len(), 1);
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn summary_excludes_missing_values() {
        let records = sample();
        let s = summary_statistics(&records);
        assert_eq!(s.count, 4);
        assert_eq!(s.mean_price, Some(5000.0));
        assert_eq!(s.mean_model_year, Some(1995.0));
        assert_eq!(s.mean_odometer, None);
    }

    #[test]
    fn summary_of_nothing_reports_no_data() {
        let records: Vec<VehicleRecord> = Vec::new();
        let s = summary_statistics(&records);
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_price, None);
    }

    #[test]
    fn top_brands_sorted_by_count_then_first_seen() {
        let records = vec![
            rec(None, None, Some("honda civic")),
            rec(None, None, Some("ford focus")),
            rec(None, None, Some("toyota camry")),
            rec(None, None, Some("ford escape")),
            rec(None, None, Some("toyota corolla")),
        ];
        let top = top_brands_by_count(&records, 10);
        // ford and toyota tie at 2; ford appeared first.
        assert_eq!(
            top,
            vec![
                ("ford".to_string(), 2),
                ("toyota".to_string(), 2),
                ("honda".to_string(), 1),
            ]
        );

        let top1 = top_brands_by_count(&records, 1);
        assert_eq!(top1, vec![("ford".to_string(), 2)]);
    }

    #[test]
    fn top_brands_counts_are_non_increasing() {
        let records = sample();
        let top = top_brands_by_count(&records, 10);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(top.len(), 3); // Ford, ford, Unknown
    }

    #[test]
    fn yearly_average_excludes_out_of_range_and_empty_years() {
        let records = vec![
            rec(Some(500.0), Some(1985), Some("a")),
            rec(Some(1000.0), Some(1995), Some("b")),
            rec(Some(3000.0), Some(1995), Some("c")),
            rec(Some(2000.0), Some(2005), Some("d")),
            rec(None, Some(2010), Some("e")), // no price, year must not appear
        ];
        let series = average_price_by_model_year(&records, 1990, 2023);
        assert_eq!(series, vec![(1995, 2000.0), (2005, 2000.0)]);
    }
}
