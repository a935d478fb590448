use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::PipelineError;
use super::model::{CellValue, VehicleDataset, VehicleRecord};

/// Columns every source file must carry. Anything else passes through as-is.
pub const REQUIRED_COLUMNS: [&str; 4] = ["price", "model_year", "odometer", "model"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a vehicle-listings dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row naming at least the [`REQUIRED_COLUMNS`]
/// * `.json`    – records-oriented array, `df.to_json(orient='records')`
/// * `.parquet` – flat schema with the required scalar columns
///
/// The derived `brand` column is computed here, once, for every row.
pub fn load_file(path: &Path) -> Result<VehicleDataset, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    debug!("loading {} as .{ext}", path.display());

    let dataset = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(PipelineError::UnsupportedFormat(other.to_string())),
    };

    info!(
        "loaded {} listings ({} passthrough columns) from {}",
        dataset.len(),
        dataset.extra_columns.len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Session-scoped memoization
// ---------------------------------------------------------------------------

/// Memoizes [`load_file`] by canonicalized source path.
///
/// One cache per session; the loaded dataset is handed out as an
/// `Arc<VehicleDataset>` so every consumer shares the same immutable copy
/// and repeated loads of the same source never re-read the file.
#[derive(Default)]
pub struct DatasetCache {
    loaded: HashMap<PathBuf, Arc<VehicleDataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, or return the previously loaded dataset for it.
    pub fn load(&mut self, path: &Path) -> Result<Arc<VehicleDataset>, PipelineError> {
        let key = path
            .canonicalize()
            .map_err(|_| PipelineError::NotFound(path.to_path_buf()))?;

        if let Some(dataset) = self.loaded.get(&key) {
            debug!("cache hit for {}", key.display());
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(load_file(path)?);
        self.loaded.insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names; empty cells (or `NaN`, as
/// pandas writes them) are treated as missing.
fn load_csv(path: &Path) -> Result<VehicleDataset, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut required_idx = [0usize; 4];
    for (slot, col) in required_idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == col)
            .ok_or_else(|| PipelineError::SchemaError {
                column: col.to_string(),
            })?;
    }
    let [price_idx, year_idx, odo_idx, model_idx] = required_idx;

    let mut records = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let row = result?;

        let price = parse_opt_f64(row.get(price_idx).unwrap_or(""), row_no, "price")?;
        let model_year = parse_opt_i64(row.get(year_idx).unwrap_or(""), row_no, "model_year")?;
        let odometer = parse_opt_f64(row.get(odo_idx).unwrap_or(""), row_no, "odometer")?;
        let model = non_empty(row.get(model_idx).unwrap_or(""));

        let mut extra = BTreeMap::new();
        for (col_idx, value) in row.iter().enumerate() {
            if required_idx.contains(&col_idx) {
                continue;
            }
            extra.insert(headers[col_idx].clone(), guess_cell_type(value));
        }

        records.push(VehicleRecord::new(price, model_year, odometer, model, extra));
    }

    Ok(VehicleDataset::from_records(records))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_missing_marker(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null")
}

fn parse_opt_f64(s: &str, row: usize, col: &str) -> Result<Option<f64>, PipelineError> {
    let s = s.trim();
    if is_missing_marker(s) {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| PipelineError::malformed(row, col, format!("'{s}' is not a number")))
}

/// Integer column that pandas may have written as float (`"2011.0"`)
/// because the column contained NaNs.
fn parse_opt_i64(s: &str, row: usize, col: &str) -> Result<Option<i64>, PipelineError> {
    let s = s.trim();
    if is_missing_marker(s) {
        return Ok(None);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Some(i));
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Some(f as i64)),
        _ => Err(PipelineError::malformed(
            row,
            col,
            format!("'{s}' is not an integer"),
        )),
    }
}

fn guess_cell_type(s: &str) -> CellValue {
    if is_missing_marker(s) {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "price": 9000, "model_year": 2011, "odometer": 120000,
///     "model": "ford f-150", "condition": "good" },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<VehicleDataset, PipelineError> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let rows = root
        .as_array()
        .ok_or_else(|| PipelineError::malformed(0, "", "expected top-level JSON array"))?;

    // Schema check against the first row: records-oriented output always
    // repeats the full key set, so one row is enough.
    if let Some(first) = rows.first().and_then(|r| r.as_object()) {
        for col in REQUIRED_COLUMNS {
            if !first.contains_key(col) {
                return Err(PipelineError::SchemaError {
                    column: col.to_string(),
                });
            }
        }
    }

    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .ok_or_else(|| PipelineError::malformed(i, "", "row is not a JSON object"))?;

        let price = json_opt_f64(obj.get("price"), i, "price")?;
        let model_year = json_opt_i64(obj.get("model_year"), i, "model_year")?;
        let odometer = json_opt_f64(obj.get("odometer"), i, "odometer")?;
        let model = obj.get("model").and_then(|v| v.as_str()).and_then(non_empty);

        let mut extra = BTreeMap::new();
        for (key, val) in obj {
            if REQUIRED_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            extra.insert(key.clone(), json_to_cell(val));
        }

        records.push(VehicleRecord::new(price, model_year, odometer, model, extra));
    }

    Ok(VehicleDataset::from_records(records))
}

fn json_opt_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Option<f64>, PipelineError> {
    match val {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| PipelineError::malformed(row, col, format!("'{v}' is not a number"))),
    }
}

fn json_opt_i64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Option<i64>, PipelineError> {
    match val {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => {
            if let Some(i) = v.as_i64() {
                Ok(Some(i))
            } else if let Some(f) = v.as_f64().filter(|f| f.is_finite()) {
                Ok(Some(f as i64))
            } else {
                Err(PipelineError::malformed(
                    row,
                    col,
                    format!("'{v}' is not an integer"),
                ))
            }
        }
    }
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export of the listings spreadsheet.
///
/// Expected schema: flat scalar columns, with `price` and `odometer` as
/// Float64/Int64, `model_year` as Int64 or Float64 (pandas promotes integer
/// columns with NaNs to float), `model` as Utf8. Works with files written
/// by both **Pandas** (`df.to_parquet()`) and **Polars**
/// (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<VehicleDataset, PipelineError> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let mut required_idx = [0usize; 4];
        for (slot, col) in required_idx.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = schema
                .index_of(col)
                .map_err(|_| PipelineError::SchemaError {
                    column: col.to_string(),
                })?;
        }
        let [price_idx, year_idx, odo_idx, model_idx] = required_idx;

        let price_col = batch.column(price_idx);
        let year_col = batch.column(year_idx);
        let odo_col = batch.column(odo_idx);
        let model_col = batch.column(model_idx);

        // Passthrough column indices (everything except the required four).
        let extra_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| !required_idx.contains(i))
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let price = extract_opt_f64(price_col, row, "price")?;
            let model_year = extract_opt_i64(year_col, row, "model_year")?;
            let odometer = extract_opt_f64(odo_col, row, "odometer")?;
            let model = extract_opt_string(model_col, row, "model")?.and_then(|s| non_empty(&s));

            let mut extra = BTreeMap::new();
            for (col_idx, col_name) in &extra_cols {
                extra.insert(col_name.clone(), extract_cell_value(batch.column(*col_idx), row));
            }

            records.push(VehicleRecord::new(price, model_year, odometer, model, extra));
        }
    }

    Ok(VehicleDataset::from_records(records))
}

// -- Parquet / Arrow helpers --

fn extract_opt_f64(
    col: &Arc<dyn Array>,
    row: usize,
    name: &str,
) -> Result<Option<f64>, PipelineError> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Float64 => col.as_any().downcast_ref::<Float64Array>().map(|a| a.value(row)),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| a.value(row) as f64),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| a.value(row) as f64),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| a.value(row) as f64),
        other => {
            return Err(PipelineError::malformed(
                row,
                name,
                format!("expected numeric column, got {other:?}"),
            ))
        }
    };
    // NaN in a float column is pandas' missing marker.
    Ok(value.filter(|v| !v.is_nan()))
}

fn extract_opt_i64(
    col: &Arc<dyn Array>,
    row: usize,
    name: &str,
) -> Result<Option<i64>, PipelineError> {
    Ok(extract_opt_f64(col, row, name)?.map(|v| v as i64))
}

fn extract_opt_string(
    col: &Arc<dyn Array>,
    row: usize,
    name: &str,
) -> Result<Option<String>, PipelineError> {
    if col.is_null(row) {
        return Ok(None);
    }
    match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| PipelineError::malformed(row, name, "expected StringArray"))?;
            Ok(Some(arr.value(row).to_string()))
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            Ok(Some(arr.value(row).to_string()))
        }
        other => Err(PipelineError::malformed(
            row,
            name,
            format!("expected string column, got {other:?}"),
        )),
    }
}

/// Extract a passthrough value from an Arrow column at a given row.
fn extract_cell_value(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                CellValue::String(s.value(row).to_string())
            } else {
                let s = col.as_string::<i64>();
                CellValue::String(s.value(row).to_string())
            }
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().unwrap();
            CellValue::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            CellValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
            CellValue::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().unwrap();
            CellValue::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>().unwrap();
            CellValue::Bool(arr.value(row))
        }
        _ => CellValue::String(format!("{:?}", col.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    const SAMPLE_CSV: &str = "\
price,model_year,odometer,model,condition
9000,2011.0,120000,ford f-150,good
5500,,95000.5,chevrolet malibu,
,2019,NaN,,excellent
";

    #[test]
    fn csv_load_derives_brand_and_handles_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "cars.csv", SAMPLE_CSV);

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.extra_columns, vec!["condition".to_string()]);

        assert_eq!(ds.records[0].brand, "ford");
        assert_eq!(ds.records[0].model_year, Some(2011));
        assert_eq!(ds.records[1].model_year, None);
        assert_eq!(ds.records[1].extra["condition"], CellValue::Null);
        assert_eq!(ds.records[2].price, None);
        assert_eq!(ds.records[2].odometer, None);
        assert_eq!(ds.records[2].brand, "Unknown");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_file(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "bad.csv", "price,model_year,model\n1,2000,a b\n");

        let err = load_file(&path).unwrap_err();
        match err {
            PipelineError::SchemaError { column } => assert_eq!(column, "odometer"),
            other => panic!("expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "cars.xlsx", "binary blob");

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(ref e) if e == "xlsx"));
    }

    #[test]
    fn json_load_matches_csv_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "cars.json",
            r#"[
                {"price": 9000, "model_year": 2011, "odometer": 120000, "model": "ford f-150"},
                {"price": null, "model_year": null, "odometer": null, "model": null, "fuel": "gas"}
            ]"#,
        );

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].brand, "ford");
        assert_eq!(ds.records[1].brand, "Unknown");
        assert_eq!(ds.records[1].extra["fuel"], CellValue::String("gas".into()));
    }

    #[test]
    fn json_missing_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "cars.json",
            r#"[{"price": 9000, "model_year": 2011, "model": "ford f-150"}]"#,
        );

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError { ref column } if column == "odometer"));
    }

    #[test]
    fn cache_returns_same_dataset_without_rereading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "cars.csv", SAMPLE_CSV);

        let mut cache = DatasetCache::new();
        let first = cache.load(&path).unwrap();

        // Change the file on disk; a cache hit must not pick this up.
        write_csv(&dir, "cars.csv", "price,model_year,odometer,model\n1,2000,1,x y\n");
        let second = cache.load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn cache_misses_on_unknown_path() {
        let mut cache = DatasetCache::new();
        let err = cache.load(Path::new("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
