use crate::error::Result;
use crate::models::table::{
    column, opt_date, opt_f64, opt_i64, opt_string, required_date, required_i64, required_string,
    TableRecord,
};
use crate::utils::dates::date_to_date32;
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One arrival enriched with the arrival-day temperature at its port city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactVisit {
    pub cicid: i64,
    pub arrdate: NaiveDate,
    pub depdate: Option<NaiveDate>,
    /// Days between arrival and departure
    pub stay: Option<i64>,
    pub i94port: String,
    pub i94cit: Option<i64>,
    pub i94mode: Option<i64>,
    pub i94visa: Option<i64>,
    pub visatype: Option<String>,
    pub avgtemperature: Option<f64>,
}

impl TableRecord for FactVisit {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("cicid", DataType::Int64, false),
            Field::new("arrdate", DataType::Date32, false),
            Field::new("depdate", DataType::Date32, true),
            Field::new("stay", DataType::Int64, true),
            Field::new("i94port", DataType::Utf8, false),
            Field::new("i94cit", DataType::Int64, true),
            Field::new("i94mode", DataType::Int64, true),
            Field::new("i94visa", DataType::Int64, true),
            Field::new("visatype", DataType::Utf8, true),
            Field::new("avgtemperature", DataType::Float64, true),
        ]))
    }

    fn partition_column() -> Option<&'static str> {
        Some("arrdate")
    }

    fn partition_value(&self) -> Option<String> {
        Some(self.arrdate.format("%Y-%m-%d").to_string())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let ints = |f: fn(&Self) -> Option<i64>| -> ArrayRef {
            Arc::new(rows.iter().map(f).collect::<Int64Array>())
        };

        let cicids = Int64Array::from_iter_values(rows.iter().map(|r| r.cicid));
        let arrdates = Date32Array::from_iter_values(rows.iter().map(|r| date_to_date32(r.arrdate)));
        let depdates: Date32Array = rows
            .iter()
            .map(|r| r.depdate.map(date_to_date32))
            .collect();
        let ports = StringArray::from_iter_values(rows.iter().map(|r| r.i94port.as_str()));
        let visatypes: StringArray = rows.iter().map(|r| r.visatype.as_deref()).collect();
        let temperatures: Float64Array = rows.iter().map(|r| r.avgtemperature).collect();

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(cicids),
                Arc::new(arrdates),
                Arc::new(depdates),
                ints(|r| r.stay),
                Arc::new(ports),
                ints(|r| r.i94cit),
                ints(|r| r.i94mode),
                ints(|r| r.i94visa),
                Arc::new(visatypes),
                Arc::new(temperatures),
            ],
        )?;

        Ok(batch)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let cicids = column::<Int64Array>(batch, "cicid")?;
        let arrdates = column::<Date32Array>(batch, "arrdate")?;
        let depdates = column::<Date32Array>(batch, "depdate")?;
        let stays = column::<Int64Array>(batch, "stay")?;
        let ports = column::<StringArray>(batch, "i94port")?;
        let i94cits = column::<Int64Array>(batch, "i94cit")?;
        let i94modes = column::<Int64Array>(batch, "i94mode")?;
        let i94visas = column::<Int64Array>(batch, "i94visa")?;
        let visatypes = column::<StringArray>(batch, "visatype")?;
        let temperatures = column::<Float64Array>(batch, "avgtemperature")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(FactVisit {
                    cicid: required_i64(cicids, i, "cicid")?,
                    arrdate: required_date(arrdates, i, "arrdate")?,
                    depdate: opt_date(depdates, i)?,
                    stay: opt_i64(stays, i),
                    i94port: required_string(ports, i, "i94port")?,
                    i94cit: opt_i64(i94cits, i),
                    i94mode: opt_i64(i94modes, i),
                    i94visa: opt_i64(i94visas, i),
                    visatype: opt_string(visatypes, i),
                    avgtemperature: opt_f64(temperatures, i),
                })
            })
            .collect()
    }
}
