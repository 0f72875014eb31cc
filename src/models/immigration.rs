use crate::error::Result;
use crate::models::table::{column, opt_i64, opt_string, required_i64, TableRecord};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Columns every immigration source must provide
pub const REQUIRED_COLUMNS: &[&str] = &[
    "cicid", "i94port", "arrdate", "i94mode", "depdate", "i94cit", "i94visa", "matflag",
    "visatype",
];

/// Columns carried through staging when present
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "i94yr", "i94mon", "i94res", "i94addr", "i94bir", "biryear", "gender", "airline", "admnum",
];

/// One I-94 border-crossing event
///
/// Numeric codes are SAS doubles in the source and are held here as whole
/// numbers. `arrdate` and `depdate` are SAS day counts (days since 1960-01-01).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImmigrationRecord {
    pub cicid: i64,
    pub i94yr: Option<i64>,
    pub i94mon: Option<i64>,
    pub i94cit: Option<i64>,
    pub i94res: Option<i64>,
    pub i94port: Option<String>,
    pub arrdate: Option<i64>,
    pub i94mode: Option<i64>,
    pub i94addr: Option<String>,
    pub depdate: Option<i64>,
    pub i94bir: Option<i64>,
    pub i94visa: Option<i64>,
    pub matflag: Option<String>,
    pub biryear: Option<i64>,
    pub gender: Option<String>,
    pub airline: Option<String>,
    pub admnum: Option<i64>,
    pub visatype: Option<String>,
}

impl ImmigrationRecord {
    /// Minimal record with every optional attribute unset
    pub fn new(cicid: i64) -> Self {
        Self {
            cicid,
            i94yr: None,
            i94mon: None,
            i94cit: None,
            i94res: None,
            i94port: None,
            arrdate: None,
            i94mode: None,
            i94addr: None,
            depdate: None,
            i94bir: None,
            i94visa: None,
            matflag: None,
            biryear: None,
            gender: None,
            airline: None,
            admnum: None,
            visatype: None,
        }
    }

    pub fn has_known_port(&self, known_ports: &HashSet<String>) -> bool {
        self.i94port
            .as_ref()
            .is_some_and(|port| known_ports.contains(port))
    }

    /// Departure date, travel mode and match flag are all present
    pub fn is_complete(&self) -> bool {
        self.depdate.is_some() && self.i94mode.is_some() && self.matflag.is_some()
    }
}

impl TableRecord for ImmigrationRecord {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("cicid", DataType::Int64, false),
            Field::new("i94yr", DataType::Int64, true),
            Field::new("i94mon", DataType::Int64, true),
            Field::new("i94cit", DataType::Int64, true),
            Field::new("i94res", DataType::Int64, true),
            Field::new("i94port", DataType::Utf8, true),
            Field::new("arrdate", DataType::Int64, true),
            Field::new("i94mode", DataType::Int64, true),
            Field::new("i94addr", DataType::Utf8, true),
            Field::new("depdate", DataType::Int64, true),
            Field::new("i94bir", DataType::Int64, true),
            Field::new("i94visa", DataType::Int64, true),
            Field::new("matflag", DataType::Utf8, true),
            Field::new("biryear", DataType::Int64, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("airline", DataType::Utf8, true),
            Field::new("admnum", DataType::Int64, true),
            Field::new("visatype", DataType::Utf8, true),
        ]))
    }

    fn partition_column() -> Option<&'static str> {
        Some("arrdate")
    }

    fn partition_value(&self) -> Option<String> {
        self.arrdate.map(|days| days.to_string())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let ints = |f: fn(&Self) -> Option<i64>| -> ArrayRef {
            Arc::new(rows.iter().map(f).collect::<Int64Array>())
        };
        let strings = |f: fn(&Self) -> Option<&str>| -> ArrayRef {
            Arc::new(rows.iter().map(f).collect::<StringArray>())
        };

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.cicid))),
                ints(|r| r.i94yr),
                ints(|r| r.i94mon),
                ints(|r| r.i94cit),
                ints(|r| r.i94res),
                strings(|r| r.i94port.as_deref()),
                ints(|r| r.arrdate),
                ints(|r| r.i94mode),
                strings(|r| r.i94addr.as_deref()),
                ints(|r| r.depdate),
                ints(|r| r.i94bir),
                ints(|r| r.i94visa),
                strings(|r| r.matflag.as_deref()),
                ints(|r| r.biryear),
                strings(|r| r.gender.as_deref()),
                strings(|r| r.airline.as_deref()),
                ints(|r| r.admnum),
                strings(|r| r.visatype.as_deref()),
            ],
        )?;

        Ok(batch)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let cicids = column::<Int64Array>(batch, "cicid")?;
        let i94yrs = column::<Int64Array>(batch, "i94yr")?;
        let i94mons = column::<Int64Array>(batch, "i94mon")?;
        let i94cits = column::<Int64Array>(batch, "i94cit")?;
        let i94ress = column::<Int64Array>(batch, "i94res")?;
        let i94ports = column::<StringArray>(batch, "i94port")?;
        let arrdates = column::<Int64Array>(batch, "arrdate")?;
        let i94modes = column::<Int64Array>(batch, "i94mode")?;
        let i94addrs = column::<StringArray>(batch, "i94addr")?;
        let depdates = column::<Int64Array>(batch, "depdate")?;
        let i94birs = column::<Int64Array>(batch, "i94bir")?;
        let i94visas = column::<Int64Array>(batch, "i94visa")?;
        let matflags = column::<StringArray>(batch, "matflag")?;
        let biryears = column::<Int64Array>(batch, "biryear")?;
        let genders = column::<StringArray>(batch, "gender")?;
        let airlines = column::<StringArray>(batch, "airline")?;
        let admnums = column::<Int64Array>(batch, "admnum")?;
        let visatypes = column::<StringArray>(batch, "visatype")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(ImmigrationRecord {
                    cicid: required_i64(cicids, i, "cicid")?,
                    i94yr: opt_i64(i94yrs, i),
                    i94mon: opt_i64(i94mons, i),
                    i94cit: opt_i64(i94cits, i),
                    i94res: opt_i64(i94ress, i),
                    i94port: opt_string(i94ports, i),
                    arrdate: opt_i64(arrdates, i),
                    i94mode: opt_i64(i94modes, i),
                    i94addr: opt_string(i94addrs, i),
                    depdate: opt_i64(depdates, i),
                    i94bir: opt_i64(i94birs, i),
                    i94visa: opt_i64(i94visas, i),
                    matflag: opt_string(matflags, i),
                    biryear: opt_i64(biryears, i),
                    gender: opt_string(genders, i),
                    airline: opt_string(airlines, i),
                    admnum: opt_i64(admnums, i),
                    visatype: opt_string(visatypes, i),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ImmigrationRecord {
        ImmigrationRecord {
            i94port: Some("NYC".to_string()),
            arrdate: Some(20545),
            depdate: Some(20550),
            i94mode: Some(1),
            matflag: Some("M".to_string()),
            visatype: Some("B2".to_string()),
            ..ImmigrationRecord::new(42)
        }
    }

    #[test]
    fn test_completeness() {
        let record = sample_record();
        assert!(record.is_complete());

        let mut missing_flag = record.clone();
        missing_flag.matflag = None;
        assert!(!missing_flag.is_complete());

        let mut missing_departure = record;
        missing_departure.depdate = None;
        assert!(!missing_departure.is_complete());
    }

    #[test]
    fn test_known_port() {
        let known: HashSet<String> = ["NYC".to_string()].into_iter().collect();
        assert!(sample_record().has_known_port(&known));

        let mut unknown = sample_record();
        unknown.i94port = Some("XXX".to_string());
        assert!(!unknown.has_known_port(&known));

        unknown.i94port = None;
        assert!(!unknown.has_known_port(&known));
    }

    #[test]
    fn test_batch_conversion_preserves_nulls() -> Result<()> {
        let records = vec![sample_record(), ImmigrationRecord::new(43)];
        let batch = ImmigrationRecord::to_batch(&records)?;
        assert_eq!(batch.num_rows(), 2);

        let restored = ImmigrationRecord::from_batch(&batch)?;
        assert_eq!(restored, records);
        Ok(())
    }
}
