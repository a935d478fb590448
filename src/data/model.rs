use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Sentinel brand for listings whose `model` field is missing or blank.
pub const UNKNOWN_BRAND: &str = "Unknown";

// ---------------------------------------------------------------------------
// CellValue – a single cell in a passthrough column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value for the columns the pipeline does not
/// examine (`condition`, `fuel`, `transmission`, ...). They are carried
/// through load untouched so a presentation layer can still display them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64` where that makes sense.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Brand derivation
// ---------------------------------------------------------------------------

/// Derive the brand from a raw `model` string.
///
/// The brand is the first whitespace-delimited token of the trimmed text,
/// case preserved. Null, empty, or whitespace-only input maps to
/// [`UNKNOWN_BRAND`]. Pure and deterministic; called exactly once per row
/// at load time.
pub fn derive_brand(model: Option<&str>) -> String {
    model
        .and_then(|m| m.split_whitespace().next())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_BRAND.to_string())
}

// ---------------------------------------------------------------------------
// VehicleRecord – one row of the source spreadsheet
// ---------------------------------------------------------------------------

/// A single vehicle listing (one row of the source file).
///
/// The numeric fields are `Option` because the source data has gaps; every
/// query excludes missing values rather than substituting a default.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleRecord {
    /// Asking price in currency units.
    pub price: Option<f64>,
    /// Model year of the vehicle. May be absent or out of plausible range.
    pub model_year: Option<i64>,
    /// Odometer reading in miles.
    pub odometer: Option<f64>,
    /// Free-form model text, e.g. `"ford f-150"`. May be absent.
    pub model: Option<String>,
    /// Derived at load time from `model`; never empty.
    pub brand: String,
    /// Passthrough columns: column_name → value.
    pub extra: BTreeMap<String, CellValue>,
}

impl VehicleRecord {
    /// Build a record from its source columns, deriving `brand`.
    pub fn new(
        price: Option<f64>,
        model_year: Option<i64>,
        odometer: Option<f64>,
        model: Option<String>,
        extra: BTreeMap<String, CellValue>,
    ) -> Self {
        let brand = derive_brand(model.as_deref());
        VehicleRecord {
            price,
            model_year,
            odometer,
            model,
            brand,
            extra,
        }
    }
}

// ---------------------------------------------------------------------------
// VehicleDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed dataset. Immutable after construction: queries borrow it
/// and return derived views, nothing mutates the records.
#[derive(Debug, Clone)]
pub struct VehicleDataset {
    /// All listings, in source-file row order.
    pub records: Vec<VehicleRecord>,
    /// Ordered names of the passthrough columns (excludes the four required
    /// columns and the derived `brand`).
    pub extra_columns: Vec<String>,
}

impl VehicleDataset {
    /// Build the dataset and its passthrough-column index.
    pub fn from_records(records: Vec<VehicleRecord>) -> Self {
        let mut extra_set: BTreeSet<String> = BTreeSet::new();
        for rec in &records {
            for col in rec.extra.keys() {
                extra_set.insert(col.clone());
            }
        }
        VehicleDataset {
            records,
            extra_columns: extra_set.into_iter().collect(),
        }
    }

    /// Number of listings.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique derived brands, for populating a brand selector.
    pub fn brands(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.brand.as_str()).collect();
        set.into_iter().collect()
    }

    /// (min, max) of the non-null prices, for slider bounds.
    pub fn price_bounds(&self) -> Option<(f64, f64)> {
        numeric_bounds(self.records.iter().filter_map(|r| r.price))
    }

    /// (min, max) of the non-null model years.
    pub fn year_bounds(&self) -> Option<(i64, i64)> {
        let mut years = self.records.iter().filter_map(|r| r.model_year);
        let first = years.next()?;
        Some(years.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y))))
    }
}

fn numeric_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut values = values.filter(|v| !v.is_nan());
    let first = values.next()?;
    Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}
