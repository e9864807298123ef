use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use thiserror::Error;

use super::model::{CoreRecord, COLUMNS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A source that cannot be read with the canonical schema. Always fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: cannot open source")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unsupported file extension '.{ext}' (expected .csv, .parquet or .pq)")]
    UnsupportedExtension { path: PathBuf, ext: String },

    #[error("{path}: malformed CSV")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: malformed Parquet")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("{path}: malformed Parquet batch")]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("{path}, record {row}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{path}, record {row}: column '{column}' must be numeric, found '{value}'")]
    NotNumeric {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("{path}: column '{column}' has unsupported type {data_type}")]
    ColumnType {
        path: PathBuf,
        column: &'static str,
        data_type: DataType,
    },
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one core database.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row plus nine positional columns (see [`COLUMNS`])
/// * `.parquet` – nine flat columns in the same positional order
///
/// The header / field names of the source are ignored. Errors number records
/// from 1 in either format, not counting a CSV header.
pub fn load_file(path: &Path) -> Result<Vec<CoreRecord>, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => {
            return Err(LoadError::UnsupportedExtension {
                path: path.to_path_buf(),
                ext: other.to_string(),
            })
        }
    };
    log::debug!("{}: {} records", path.display(), records.len());
    Ok(records)
}

/// Load every source and concatenate in order. No deduplication.
pub fn load_sources<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<CoreRecord>, LoadError> {
    let mut merged = Vec::new();
    for path in paths {
        merged.extend(load_file(path.as_ref())?);
    }
    Ok(merged)
}

/// Parse an isotope value. Anything that is not a number is missing.
pub fn coerce_numeric(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

// ---------------------------------------------------------------------------
// Cell → record
// ---------------------------------------------------------------------------

/// A raw cell before it is typed against the schema.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Null,
}

const NAME: usize = 0;
const LATITUDE: usize = 1;
const LONGITUDE: usize = 2;
const DEPTH: usize = 3;
const DEPTH_IN_CORE: usize = 4;
const AGE: usize = 5;
const SPECIES: usize = 6;
const D18O: usize = 7;
const D13C: usize = 8;

fn record_from_cells(cells: &[Cell], path: &Path, row: usize) -> Result<CoreRecord, LoadError> {
    if cells.len() != COLUMNS.len() {
        return Err(LoadError::ColumnCount {
            path: path.to_path_buf(),
            row,
            expected: COLUMNS.len(),
            found: cells.len(),
        });
    }

    // Empty numeric cells are NaN; they fail every range test downstream.
    let required = |idx: usize| -> Result<f64, LoadError> {
        match &cells[idx] {
            Cell::Number(v) => Ok(*v),
            Cell::Null => Ok(f64::NAN),
            Cell::Text(s) if s.trim().is_empty() => Ok(f64::NAN),
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| LoadError::NotNumeric {
                path: path.to_path_buf(),
                row,
                column: COLUMNS[idx],
                value: s.clone(),
            }),
        }
    };
    let isotope = |idx: usize| match &cells[idx] {
        Cell::Number(v) if !v.is_nan() => Some(*v),
        Cell::Text(s) => coerce_numeric(s),
        _ => None,
    };
    let text = |idx: usize| match &cells[idx] {
        Cell::Text(s) => s.trim().to_string(),
        Cell::Number(v) => v.to_string(),
        Cell::Null => String::new(),
    };

    Ok(CoreRecord {
        name: text(NAME),
        latitude: required(LATITUDE)?,
        longitude: required(LONGITUDE)?,
        depth: required(DEPTH)?,
        depth_in_core: required(DEPTH_IN_CORE)?,
        age: required(AGE)?,
        species: text(SPECIES),
        d18o: isotope(D18O),
        d13c: isotope(D13C),
    })
}

/// Rows without a core name cannot be grouped and are skipped.
fn push_named(records: &mut Vec<CoreRecord>, record: CoreRecord) {
    if record.name.is_empty() {
        log::debug!("skipping record without core name (age {})", record.age);
        return;
    }
    records.push(record);
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<CoreRecord>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = result.map_err(csv_err)?;
        let cells: Vec<Cell> = row.iter().map(|s| Cell::Text(s.to_string())).collect();
        push_named(&mut records, record_from_cells(&cells, path, idx + 1)?);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Column names are ignored; position is
/// what counts, as with the CSV header.
fn load_parquet(path: &Path) -> Result<Vec<CoreRecord>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let pq_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(pq_err)?
        .build()
        .map_err(pq_err)?;

    let mut records = Vec::new();
    let mut row_base = 0;
    for batch_result in reader {
        let batch = batch_result.map_err(|source| LoadError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
        if batch.num_columns() != COLUMNS.len() {
            return Err(LoadError::ColumnCount {
                path: path.to_path_buf(),
                row: row_base + 1,
                expected: COLUMNS.len(),
                found: batch.num_columns(),
            });
        }

        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| extract_cell(col, row, path, COLUMNS[idx]))
                .collect::<Result<Vec<_>, _>>()?;
            push_named(&mut records, record_from_cells(&cells, path, row_base + row + 1)?);
        }
        row_base += batch.num_rows();
    }
    Ok(records)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(
    col: &Arc<dyn Array>,
    row: usize,
    path: &Path,
    column: &'static str,
) -> Result<Cell, LoadError> {
    if col.is_null(row) {
        return Ok(Cell::Null);
    }
    let any = col.as_any();
    let cell = match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| Cell::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| Cell::Text(a.value(row).to_string())),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| Cell::Number(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| Cell::Number(a.value(row) as f64)),
        _ => None,
    };
    cell.ok_or_else(|| LoadError::ColumnType {
        path: path.to_path_buf(),
        column,
        data_type: col.data_type().clone(),
    })
}
