use crate::error::{ProcessingError, Result};
use crate::models::table::{column, opt_f64, opt_string, required_string, TableRecord};
use crate::utils::constants::{REPORTING_MONTH, REPORTING_YEAR, TEMPERATURE_COUNTRY};
use crate::utils::dates::observation_date;
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Columns every temperature source must provide (after lowercasing the header)
pub const REQUIRED_COLUMNS: &[&str] = &[
    "country",
    "state",
    "city",
    "month",
    "day",
    "year",
    "avgtemperature",
];

/// One daily average temperature sample for a city
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureObservation {
    pub region: Option<String>,
    pub country: String,
    pub state: String,
    pub city: String,
    pub month: u32,
    pub day: u32,
    pub year: i32,
    pub avgtemperature: Option<f64>,
}

impl TemperatureObservation {
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
        year: i32,
        month: u32,
        day: u32,
        avgtemperature: Option<f64>,
    ) -> Self {
        Self {
            region: None,
            country: country.into(),
            state: state.into(),
            city: city.into(),
            month,
            day,
            year,
            avgtemperature,
        }
    }

    /// US observation inside the reporting period
    pub fn is_in_scope(&self) -> bool {
        self.country == TEMPERATURE_COUNTRY
            && self.year == REPORTING_YEAR
            && self.month == REPORTING_MONTH
    }

    /// Uppercase the name fields so they line up with the port dimension
    pub fn normalize_names(mut self) -> Self {
        self.state = self.state.to_uppercase();
        self.city = self.city.to_uppercase();
        self
    }

    pub fn date(&self) -> Option<NaiveDate> {
        observation_date(self.year, self.month, self.day)
    }
}

// Row identity compares the temperature bit pattern so exact duplicates collapse
impl PartialEq for TemperatureObservation {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region
            && self.country == other.country
            && self.state == other.state
            && self.city == other.city
            && self.month == other.month
            && self.day == other.day
            && self.year == other.year
            && self.avgtemperature.map(f64::to_bits) == other.avgtemperature.map(f64::to_bits)
    }
}

impl Eq for TemperatureObservation {}

impl Hash for TemperatureObservation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region.hash(state);
        self.country.hash(state);
        self.state.hash(state);
        self.city.hash(state);
        self.month.hash(state);
        self.day.hash(state);
        self.year.hash(state);
        self.avgtemperature.map(f64::to_bits).hash(state);
    }
}

impl TableRecord for TemperatureObservation {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("country", DataType::Utf8, false),
            Field::new("state", DataType::Utf8, false),
            Field::new("city", DataType::Utf8, false),
            Field::new("month", DataType::UInt32, false),
            Field::new("day", DataType::UInt32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("avgtemperature", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let regions: StringArray = rows.iter().map(|r| r.region.as_deref()).collect();
        let countries = StringArray::from_iter_values(rows.iter().map(|r| r.country.as_str()));
        let states = StringArray::from_iter_values(rows.iter().map(|r| r.state.as_str()));
        let cities = StringArray::from_iter_values(rows.iter().map(|r| r.city.as_str()));
        let months = UInt32Array::from_iter_values(rows.iter().map(|r| r.month));
        let days = UInt32Array::from_iter_values(rows.iter().map(|r| r.day));
        let years = Int32Array::from_iter_values(rows.iter().map(|r| r.year));
        let temperatures: Float64Array = rows.iter().map(|r| r.avgtemperature).collect();

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(regions),
                Arc::new(countries),
                Arc::new(states),
                Arc::new(cities),
                Arc::new(months),
                Arc::new(days),
                Arc::new(years),
                Arc::new(temperatures),
            ],
        )?;

        Ok(batch)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let regions = column::<StringArray>(batch, "region")?;
        let countries = column::<StringArray>(batch, "country")?;
        let states = column::<StringArray>(batch, "state")?;
        let cities = column::<StringArray>(batch, "city")?;
        let months = column::<UInt32Array>(batch, "month")?;
        let days = column::<UInt32Array>(batch, "day")?;
        let years = column::<Int32Array>(batch, "year")?;
        let temperatures = column::<Float64Array>(batch, "avgtemperature")?;

        if months.null_count() + days.null_count() + years.null_count() > 0 {
            return Err(ProcessingError::InvalidFormat(
                "Null date part in temperature table".to_string(),
            ));
        }

        (0..batch.num_rows())
            .map(|i| {
                Ok(TemperatureObservation {
                    region: opt_string(regions, i),
                    country: required_string(countries, i, "country")?,
                    state: required_string(states, i, "state")?,
                    city: required_string(cities, i, "city")?,
                    month: months.value(i),
                    day: days.value(i),
                    year: years.value(i),
                    avgtemperature: opt_f64(temperatures, i),
                })
            })
            .collect()
    }
}
