use crate::error::{ProcessingError, Result};
use crate::models::immigration::{ImmigrationRecord, OPTIONAL_COLUMNS, REQUIRED_COLUMNS};
use crate::utils::constants::{DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_SIZE};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Columns holding SAS numeric values; the rest are character columns
const NUMERIC_COLUMNS: &[&str] = &[
    "cicid", "i94yr", "i94mon", "i94cit", "i94res", "arrdate", "i94mode", "depdate", "i94bir",
    "i94visa", "biryear", "admnum",
];

type FieldResult<T> = std::result::Result<T, String>;

/// Loads raw I-94 records from CSV or Parquet exports of the SAS source
pub struct ImmigrationReader {
    batch_size: usize,
}

impl Default for ImmigrationReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmigrationReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Read a CSV file, a Parquet file, or a directory of Parquet part files
    pub fn read(&self, path: &Path) -> Result<Vec<ImmigrationRecord>> {
        if !path.exists() {
            return Err(ProcessingError::source_read(path, "source does not exist"));
        }

        let records = if path.is_dir() {
            let files = parquet_files(path)?;
            if files.is_empty() {
                return Err(ProcessingError::source_read(
                    path,
                    "directory contains no Parquet files",
                ));
            }
            let mut records = Vec::new();
            for file in &files {
                records.extend(self.read_parquet(file)?);
            }
            records
        } else {
            match extension(path).as_deref() {
                Some("csv") => self.read_csv(path)?,
                Some("parquet") => self.read_parquet(path)?,
                Some("sas7bdat") => {
                    return Err(ProcessingError::source_read(
                        path,
                        "SAS7BDAT is not supported; export the dataset to CSV or Parquet",
                    ))
                }
                _ => {
                    return Err(ProcessingError::source_read(
                        path,
                        "unrecognised source format (expected .csv or .parquet)",
                    ))
                }
            }
        };

        info!(
            "Loaded {} immigration records from {}",
            records.len(),
            path.display()
        );
        Ok(records)
    }

    pub fn read_csv(&self, path: &Path) -> Result<Vec<ImmigrationRecord>> {
        let file = File::open(path).map_err(|e| ProcessingError::source_read(path, e.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file));

        let headers = reader
            .headers()
            .map_err(|e| ProcessingError::source_read(path, format!("failed to read header: {e}")))?
            .clone();

        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();
        require_columns(path, |name| positions.contains_key(name))?;

        let mut columns: HashMap<&'static str, usize> = HashMap::new();
        for &name in REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS) {
            if let Some(&position) = positions.get(name) {
                columns.insert(name, position);
            }
        }

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result
                .map_err(|e| ProcessingError::source_read(path, format!("row {}: {e}", row + 1)))?;

            let field = |name: &str| {
                columns
                    .get(name)
                    .and_then(|&i| record.get(i))
                    .filter(|value| !value.is_empty())
            };

            let parsed = assemble(
                |name| field(name).map(parse_whole_number).transpose(),
                |name| field(name).map(str::to_string),
            )
            .map_err(|msg| ProcessingError::source_read(path, format!("row {}: {msg}", row + 1)))?;

            records.push(parsed);
        }

        debug!("Parsed {} CSV rows from {}", records.len(), path.display());
        Ok(records)
    }

    pub fn read_parquet(&self, path: &Path) -> Result<Vec<ImmigrationRecord>> {
        let file = File::open(path).map_err(|e| ProcessingError::source_read(path, e.to_string()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| ProcessingError::source_read(path, e.to_string()))?;

        let schema = builder.schema().clone();
        require_columns(path, |name| schema.column_with_name(name).is_some())?;

        let reader = builder.with_batch_size(self.batch_size).build()?;

        let mut records = Vec::new();
        let mut offset = 0;
        for batch in reader {
            let batch = batch?;
            let columns = SourceColumns::from_batch(&batch)?;

            for i in 0..batch.num_rows() {
                let parsed = assemble(|name| columns.int(name, i), |name| columns.text(name, i))
                    .map_err(|msg| {
                        ProcessingError::source_read(path, format!("row {}: {msg}", offset + i + 1))
                    })?;
                records.push(parsed);
            }
            offset += batch.num_rows();
        }

        debug!("Read {} Parquet rows from {}", records.len(), path.display());
        Ok(records)
    }
}

/// Numeric and character columns of one batch, cast to a uniform representation
struct SourceColumns {
    floats: HashMap<&'static str, Float64Array>,
    ints: HashMap<&'static str, Int64Array>,
    strings: HashMap<&'static str, StringArray>,
}

impl SourceColumns {
    fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let mut columns = Self {
            floats: HashMap::new(),
            ints: HashMap::new(),
            strings: HashMap::new(),
        };

        for &name in REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS) {
            let Some(array) = batch.column_by_name(name) else {
                continue;
            };

            if NUMERIC_COLUMNS.contains(&name) {
                match array.data_type() {
                    DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                        columns.floats.insert(name, downcast(cast(array, &DataType::Float64)?)?);
                    }
                    _ => {
                        columns.ints.insert(name, downcast(cast(array, &DataType::Int64)?)?);
                    }
                }
            } else {
                columns
                    .strings
                    .insert(name, downcast(cast(array, &DataType::Utf8)?)?);
            }
        }

        Ok(columns)
    }

    fn int(&self, name: &str, i: usize) -> FieldResult<Option<i64>> {
        if let Some(array) = self.floats.get(name) {
            if array.is_null(i) {
                return Ok(None);
            }
            return whole_number(array.value(i)).map(Some);
        }
        Ok(self
            .ints
            .get(name)
            .and_then(|array| (!array.is_null(i)).then(|| array.value(i))))
    }

    fn text(&self, name: &str, i: usize) -> Option<String> {
        self.strings
            .get(name)
            .and_then(|array| (!array.is_null(i)).then(|| array.value(i).to_string()))
    }
}

fn downcast<T: Array + Clone + 'static>(array: ArrayRef) -> Result<T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ProcessingError::InvalidFormat("Unexpected array type after cast".to_string()))
}

fn assemble(
    int: impl Fn(&str) -> FieldResult<Option<i64>>,
    text: impl Fn(&str) -> Option<String>,
) -> FieldResult<ImmigrationRecord> {
    let cicid = int("cicid")?.ok_or_else(|| "cicid is missing".to_string())?;

    Ok(ImmigrationRecord {
        cicid,
        i94yr: int("i94yr")?,
        i94mon: int("i94mon")?,
        i94cit: int("i94cit")?,
        i94res: int("i94res")?,
        i94port: text("i94port"),
        arrdate: int("arrdate")?,
        i94mode: int("i94mode")?,
        i94addr: text("i94addr"),
        depdate: int("depdate")?,
        i94bir: int("i94bir")?,
        i94visa: int("i94visa")?,
        matflag: text("matflag"),
        biryear: int("biryear")?,
        gender: text("gender"),
        airline: text("airline"),
        admnum: int("admnum")?,
        visatype: text("visatype"),
    })
}

fn require_columns(path: &Path, has_column: impl Fn(&str) -> bool) -> Result<()> {
    match REQUIRED_COLUMNS.iter().find(|name| !has_column(name)) {
        Some(missing) => Err(ProcessingError::source_read(
            path,
            format!("missing required column '{missing}'"),
        )),
        None => Ok(()),
    }
}

/// Parse a SAS numeric value that must hold a whole number ("20545.0" → 20545)
pub fn parse_whole_number(raw: &str) -> FieldResult<i64> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    whole_number(value)
}

fn whole_number(value: f64) -> FieldResult<i64> {
    if !value.is_finite() || value.fract() != 0.0 || value.abs() >= i64::MAX as f64 {
        return Err(format!("{value} is not a whole number"));
    }
    Ok(value as i64)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Parquet files below `dir`, sorted by path so reads are deterministic
fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.') || name.starts_with('_'));

            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if extension(&path).as_deref() == Some("parquet") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
