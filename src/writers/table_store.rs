use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::table::{ColumnType, TableRecord};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DATA_FILE, DEFAULT_ROW_GROUP_SIZE, MANIFEST_FILE, NULL_PARTITION,
};
use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Column entry of a table manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// Description of a persisted table, stored beside its data files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifest {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub partition_column: Option<String>,
    pub partitions: Vec<String>,
    pub row_count: usize,
}

impl TableManifest {
    /// Logical schema of the table, partition column included
    pub fn schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.column_type.data_type(), c.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }

    fn partition_spec(&self) -> Option<&ColumnSpec> {
        let name = self.partition_column.as_deref()?;
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Parquet tables under one output root, replaced atomically on every write
///
/// Layout per table:
/// ```text
/// <root>/<table>/_manifest.json
/// <root>/<table>/part-00000.parquet                  (unpartitioned)
/// <root>/<table>/<column>=<value>/part-00000.parquet (partitioned)
/// ```
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
    compression: Compression,
    row_group_size: usize,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(&config.output_root).with_compression(&config.compression)
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = parse_compression(compression)?;
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    pub fn exists(&self, table: &str) -> bool {
        self.table_path(table).join(MANIFEST_FILE).is_file()
    }

    /// Replace `table` with `rows`
    ///
    /// The new table is assembled in a scratch directory inside the output root
    /// and renamed into place, so readers never observe a half-written table.
    pub fn write_table<T: TableRecord>(&self, table: &str, rows: &[T]) -> Result<TableManifest> {
        fs::create_dir_all(&self.root)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{table}-"))
            .tempdir_in(&self.root)?;

        let schema = T::schema();
        let batch = T::to_batch(rows)?;

        let partitions = match T::partition_column() {
            Some(column) => self.write_partitions(staging.path(), column, rows, &batch)?,
            None => {
                self.write_file(&staging.path().join(DATA_FILE), &batch)?;
                Vec::new()
            }
        };

        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                Ok(ColumnSpec {
                    name: field.name().clone(),
                    column_type: ColumnType::from_data_type(field.data_type())?,
                    nullable: field.is_nullable(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let manifest = TableManifest {
            table: table.to_string(),
            columns,
            partition_column: T::partition_column().map(str::to_string),
            partitions,
            row_count: rows.len(),
        };
        fs::write(
            staging.path().join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        self.replace(table, staging.into_path())?;

        info!(
            "Wrote table {} ({} rows, {} partitions)",
            table,
            manifest.row_count,
            manifest.partitions.len()
        );
        Ok(manifest)
    }

    /// Split rows by partition value and write one file per partition directory
    fn write_partitions<T: TableRecord>(
        &self,
        dir: &Path,
        column: &str,
        rows: &[T],
        batch: &RecordBatch,
    ) -> Result<Vec<String>> {
        let mut groups: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            let value = row
                .partition_value()
                .unwrap_or_else(|| NULL_PARTITION.to_string());
            groups.entry(value).or_default().push(i as u32);
        }

        let schema = batch.schema();
        let keep: Vec<usize> = (0..schema.fields().len())
            .filter(|&i| schema.field(i).name() != column)
            .collect();

        let mut partitions = Vec::with_capacity(groups.len());
        for (value, indices) in groups {
            let partition_dir = dir.join(format!("{column}={value}"));
            fs::create_dir_all(&partition_dir)?;

            let selected = take_record_batch(batch, &UInt32Array::from(indices))?;
            let data = selected.project(&keep)?;
            self.write_file(&partition_dir.join(DATA_FILE), &data)?;

            partitions.push(value);
        }

        debug!("Split into {} partitions on {}", partitions.len(), column);
        Ok(partitions)
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        Ok(())
    }

    fn replace(&self, table: &str, staged: PathBuf) -> Result<()> {
        let target = self.table_path(table);
        let previous = self.root.join(format!(".{table}.previous"));

        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }
        if target.exists() {
            fs::rename(&target, &previous)?;
        }
        fs::rename(&staged, &target)?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        Ok(())
    }

    pub fn read_manifest(&self, table: &str) -> Result<TableManifest> {
        let path = self.table_path(table).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(ProcessingError::TableNotFound(table.to_string()));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Data files of a table with the partition value each one belongs to
    fn data_files(&self, manifest: &TableManifest) -> Vec<(PathBuf, Option<String>)> {
        let dir = self.table_path(&manifest.table);
        match manifest.partition_column.as_deref() {
            Some(column) => manifest
                .partitions
                .iter()
                .map(|value| {
                    let path = dir.join(format!("{column}={value}")).join(DATA_FILE);
                    let value = (value != NULL_PARTITION).then(|| value.clone());
                    (path, value)
                })
                .collect(),
            None => vec![(dir.join(DATA_FILE), None)],
        }
    }

    /// Every batch of a table, with the partition column restored from directory names
    pub fn read_batches(&self, table: &str) -> Result<Vec<RecordBatch>> {
        let manifest = self.read_manifest(table)?;
        let schema = manifest.schema();
        let partition = manifest.partition_spec();

        let mut batches = Vec::new();
        for (path, value) in self.data_files(&manifest) {
            let file = File::open(&path)?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

            for batch in reader {
                let batch = batch?;
                let columns = manifest
                    .columns
                    .iter()
                    .map(|spec| match partition {
                        Some(p) if p.name == spec.name => p
                            .column_type
                            .partition_array(value.as_deref(), batch.num_rows()),
                        _ => batch.column_by_name(&spec.name).cloned().ok_or_else(|| {
                            ProcessingError::schema_violation(
                                table,
                                format!("data file {} lacks column '{}'", path.display(), spec.name),
                            )
                        }),
                    })
                    .collect::<Result<Vec<ArrayRef>>>()?;

                batches.push(RecordBatch::try_new(schema.clone(), columns)?);
            }
        }

        Ok(batches)
    }

    pub fn read_table<T: TableRecord>(&self, table: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for batch in self.read_batches(table)? {
            rows.extend(T::from_batch(&batch)?);
        }
        debug!("Read {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Schema of the first data file plus the partition column
    ///
    /// Tables without data files (an empty partitioned table) fall back to the manifest.
    pub fn table_schema(&self, table: &str) -> Result<SchemaRef> {
        let manifest = self.read_manifest(table)?;
        let Some((path, _)) = self.data_files(&manifest).into_iter().next() else {
            return Ok(manifest.schema());
        };

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let mut fields: Vec<Field> = builder
            .schema()
            .fields()
            .iter()
            .map(|field| field.as_ref().clone())
            .collect();

        if let Some(partition) = manifest.partition_spec() {
            fields.push(Field::new(
                &partition.name,
                partition.column_type.data_type(),
                partition.nullable,
            ));
        }

        Ok(Arc::new(Schema::new(fields)))
    }

    /// File-level statistics read from Parquet footers
    pub fn file_info(&self, table: &str) -> Result<TableInfo> {
        let manifest = self.read_manifest(table)?;
        let mut files = Vec::new();

        for (path, _) in self.data_files(&manifest) {
            let reader = SerializedFileReader::new(File::open(&path)?)?;
            let metadata = reader.metadata();
            files.push(FileStats {
                rows: metadata.file_metadata().num_rows(),
                row_groups: metadata.num_row_groups(),
                size: fs::metadata(&path)?.len(),
                path,
            });
        }

        Ok(TableInfo {
            manifest,
            files,
            compression: self.compression,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileStats {
    pub path: PathBuf,
    pub rows: i64,
    pub row_groups: usize,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub manifest: TableManifest,
    pub files: Vec<FileStats>,
    pub compression: Compression,
}

impl TableInfo {
    pub fn total_rows(&self) -> i64 {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn summary(&self) -> String {
        let columns: Vec<String> = self
            .manifest
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.column_type))
            .collect();

        format!(
            "Table Summary: {}\n\
            - Total rows: {}\n\
            - Files: {}\n\
            - Partitioned by: {}\n\
            - Size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Columns: {}",
            self.manifest.table,
            self.total_rows(),
            self.files.len(),
            self.manifest.partition_column.as_deref().unwrap_or("-"),
            self.total_size() as f64 / 1_048_576.0,
            self.compression,
            columns.join(", ")
        )
    }
}

pub fn parse_compression(compression: &str) -> Result<Compression> {
    let compression = match compression.to_lowercase().as_str() {
        COMPRESSION_SNAPPY => Compression::SNAPPY,
        COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
        COMPRESSION_LZ4 => Compression::LZ4,
        COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
        COMPRESSION_NONE => Compression::UNCOMPRESSED,
        _ => {
            return Err(ProcessingError::Config(format!(
                "Unsupported compression: {}",
                compression
            )))
        }
    };
    Ok(compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeLabelDim, FactVisit};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn visit(cicid: i64, day: Option<u32>) -> FactVisit {
        FactVisit {
            cicid,
            arrdate: NaiveDate::from_ymd_opt(2016, 4, day.unwrap_or(1)).unwrap(),
            depdate: None,
            stay: None,
            i94port: "NYC".to_string(),
            i94cit: None,
            i94mode: Some(1),
            i94visa: None,
            visatype: None,
            avgtemperature: Some(50.0),
        }
    }

    #[test]
    fn test_unpartitioned_table() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path());
        let rows = vec![CodeLabelDim::new(1, "Air"), CodeLabelDim::new(9, "Not reported")];

        let manifest = store.write_table("dim_travel_modes", &rows)?;
        assert_eq!(manifest.row_count, 2);
        assert!(manifest.partitions.is_empty());
        assert!(dir.path().join("dim_travel_modes").join(DATA_FILE).is_file());

        let restored: Vec<CodeLabelDim> = store.read_table("dim_travel_modes")?;
        assert_eq!(restored, rows);
        Ok(())
    }

    #[test]
    fn test_partitioned_layout_and_reattach() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path());
        let rows = vec![visit(1, Some(2)), visit(2, Some(1)), visit(3, Some(2))];

        let manifest = store.write_table("fact_i94_visits", &rows)?;
        assert_eq!(manifest.partitions, vec!["2016-04-01", "2016-04-02"]);

        let partition = dir
            .path()
            .join("fact_i94_visits")
            .join("arrdate=2016-04-02")
            .join(DATA_FILE);
        assert!(partition.is_file());

        // The data file itself does not carry the partition column
        let schema = store.table_schema("fact_i94_visits")?;
        assert_eq!(schema.fields().last().unwrap().name(), "arrdate");

        let mut restored: Vec<FactVisit> = store.read_table("fact_i94_visits")?;
        restored.sort_by_key(|v| v.cicid);
        assert_eq!(restored, rows);
        Ok(())
    }

    #[test]
    fn test_rewrite_replaces_previous_table() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path());

        store.write_table("fact_i94_visits", &[visit(1, Some(3)), visit(2, Some(4))])?;
        store.write_table("fact_i94_visits", &[visit(5, Some(7))])?;

        let table_dir = dir.path().join("fact_i94_visits");
        assert!(!table_dir.join("arrdate=2016-04-03").exists());
        assert!(table_dir.join("arrdate=2016-04-07").exists());

        let restored: Vec<FactVisit> = store.read_table("fact_i94_visits")?;
        assert_eq!(restored.len(), 1);

        // No scratch directories are left behind
        let leftovers = fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[test]
    fn test_empty_partitioned_table() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path());

        let manifest = store.write_table::<FactVisit>("fact_i94_visits", &[])?;
        assert_eq!(manifest.row_count, 0);
        assert!(store.read_batches("fact_i94_visits")?.is_empty());
        assert_eq!(store.table_schema("fact_i94_visits")?.fields().len(), 10);
        Ok(())
    }

    #[test]
    fn test_missing_table() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        assert!(matches!(
            store.read_manifest("dim_date"),
            Err(ProcessingError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_unsupported_compression() {
        assert!(parse_compression("brotli-ish").is_err());
        assert!(matches!(parse_compression("ZSTD"), Ok(Compression::ZSTD(_))));
    }

    #[test]
    fn test_file_info() -> Result<()> {
        let dir = TempDir::new()?;
        let store = TableStore::new(dir.path()).with_compression("zstd")?;
        store.write_table("fact_i94_visits", &[visit(1, Some(3)), visit(2, Some(4))])?;

        let info = store.file_info("fact_i94_visits")?;
        assert_eq!(info.files.len(), 2);
        assert_eq!(info.total_rows(), 2);
        assert!(info.summary().contains("Partitioned by: arrdate"));
        Ok(())
    }
}
