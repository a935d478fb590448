/// Data layer: core types, loading, and queries.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file, derive `brand` → VehicleDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ VehicleDataset  │  Vec<VehicleRecord>, passthrough column index
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  query    │  filters, summary stats, aggregations → derived views
///   └──────────┘
/// ```
pub mod error;
pub mod loader;
pub mod model;
pub mod query;

pub use error::PipelineError;
pub use loader::{load_file, DatasetCache, REQUIRED_COLUMNS};
pub use model::{derive_brand, CellValue, VehicleDataset, VehicleRecord, UNKNOWN_BRAND};
pub use query::{
    average_price_by_model_year, filter_by_brand, filter_by_price_range, summary_statistics,
    top_brands_by_count, BrandSelection, Summary,
};
