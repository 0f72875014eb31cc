use crate::error::{ProcessingError, Result};
use crate::utils::dates::{date32_to_date, date_to_date32};
use arrow::array::*;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A typed row of a persisted table
///
/// Implementors own their Arrow schema and the conversion in both directions.
/// Partitioned tables name the column used for the directory layout; that column
/// is part of [`TableRecord::schema`] but is not stored inside the data files.
pub trait TableRecord: Sized {
    fn schema() -> SchemaRef;

    fn partition_column() -> Option<&'static str> {
        None
    }

    /// Directory value of this row's partition; `None` is the null partition
    fn partition_value(&self) -> Option<String> {
        None
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

/// Column types that can appear in persisted tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    Int64,
    UInt32,
    Float64,
    Utf8,
    Date32,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Date32 => DataType::Date32,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Result<Self> {
        match data_type {
            DataType::Int32 => Ok(ColumnType::Int32),
            DataType::Int64 => Ok(ColumnType::Int64),
            DataType::UInt32 => Ok(ColumnType::UInt32),
            DataType::Float64 => Ok(ColumnType::Float64),
            DataType::Utf8 => Ok(ColumnType::Utf8),
            DataType::Date32 => Ok(ColumnType::Date32),
            other => Err(ProcessingError::InvalidFormat(format!(
                "Unsupported column type: {other}"
            ))),
        }
    }

    /// Parse a partition directory value into a single-value array of `len` rows
    pub fn partition_array(&self, value: Option<&str>, len: usize) -> Result<ArrayRef> {
        let invalid = |v: &str| {
            ProcessingError::InvalidFormat(format!("Invalid {self} partition value: '{v}'"))
        };

        let array: ArrayRef = match (self, value) {
            (_, None) => new_null_array(&self.data_type(), len),
            (ColumnType::Int32, Some(v)) => {
                let parsed = v.parse::<i32>().map_err(|_| invalid(v))?;
                Arc::new(Int32Array::from(vec![parsed; len]))
            }
            (ColumnType::Int64, Some(v)) => {
                let parsed = v.parse::<i64>().map_err(|_| invalid(v))?;
                Arc::new(Int64Array::from(vec![parsed; len]))
            }
            (ColumnType::UInt32, Some(v)) => {
                let parsed = v.parse::<u32>().map_err(|_| invalid(v))?;
                Arc::new(UInt32Array::from(vec![parsed; len]))
            }
            (ColumnType::Float64, Some(v)) => {
                let parsed = v.parse::<f64>().map_err(|_| invalid(v))?;
                Arc::new(Float64Array::from(vec![parsed; len]))
            }
            (ColumnType::Utf8, Some(v)) => Arc::new(StringArray::from(vec![v; len])),
            (ColumnType::Date32, Some(v)) => {
                let date = NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| invalid(v))?;
                Arc::new(Date32Array::from(vec![date_to_date32(date); len]))
            }
        };

        Ok(array)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int32 => "int",
            ColumnType::Int64 => "bigint",
            ColumnType::UInt32 => "uint",
            ColumnType::Float64 => "double",
            ColumnType::Utf8 => "string",
            ColumnType::Date32 => "date",
        };
        f.write_str(name)
    }
}

/// Look up a column by name and downcast it to its concrete array type
pub fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Missing column '{name}'")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid {name} column type")))
}

pub fn opt_i64(array: &Int64Array, i: usize) -> Option<i64> {
    (!array.is_null(i)).then(|| array.value(i))
}

pub fn opt_f64(array: &Float64Array, i: usize) -> Option<f64> {
    (!array.is_null(i)).then(|| array.value(i))
}

pub fn opt_string(array: &StringArray, i: usize) -> Option<String> {
    (!array.is_null(i)).then(|| array.value(i).to_string())
}

pub fn required_string(array: &StringArray, i: usize, name: &str) -> Result<String> {
    opt_string(array, i)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Null value in column '{name}'")))
}

pub fn required_i64(array: &Int64Array, i: usize, name: &str) -> Result<i64> {
    opt_i64(array, i)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Null value in column '{name}'")))
}

pub fn opt_date(array: &Date32Array, i: usize) -> Result<Option<NaiveDate>> {
    if array.is_null(i) {
        return Ok(None);
    }
    date32_to_date(array.value(i))
        .map(Some)
        .ok_or_else(|| ProcessingError::InvalidFormat("Invalid date in Parquet file".to_string()))
}

pub fn required_date(array: &Date32Array, i: usize, name: &str) -> Result<NaiveDate> {
    opt_date(array, i)?
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Null value in column '{name}'")))
}
