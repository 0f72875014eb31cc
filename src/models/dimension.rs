use crate::error::Result;
use crate::models::table::{column, required_date, required_i64, required_string, TableRecord};
use crate::utils::dates::{date_to_date32, iso_week, weekday_abbrev};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Numeric code with a descriptive label (countries, travel modes, visas)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CodeLabelDim {
    pub code: i64,

    #[validate(length(min = 1))]
    pub name: String,
}

pub type CountryDim = CodeLabelDim;
pub type TravelModeDim = CodeLabelDim;
pub type VisaDim = CodeLabelDim;

impl CodeLabelDim {
    pub fn new(code: i64, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

impl TableRecord for CodeLabelDim {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("code", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let codes = Int64Array::from_iter_values(rows.iter().map(|r| r.code));
        let names = StringArray::from_iter_values(rows.iter().map(|r| r.name.as_str()));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![Arc::new(codes), Arc::new(names)],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let codes = column::<Int64Array>(batch, "code")?;
        let names = column::<StringArray>(batch, "name")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(CodeLabelDim {
                    code: required_i64(codes, i, "code")?,
                    name: required_string(names, i, "name")?,
                })
            })
            .collect()
    }
}

/// US port of entry enriched with its state name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PortDim {
    #[validate(length(min = 1))]
    pub code: String,

    #[validate(length(min = 1))]
    pub city: String,

    #[validate(length(min = 1))]
    pub state: String,

    #[validate(length(min = 1))]
    pub state_name: String,
}

impl PortDim {
    pub fn new(
        code: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        state_name: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            city: city.into(),
            state: state.into(),
            state_name: state_name.into(),
        }
    }
}

impl TableRecord for PortDim {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("code", DataType::Utf8, false),
            Field::new("city", DataType::Utf8, false),
            Field::new("state", DataType::Utf8, false),
            Field::new("state_name", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let strings = |f: fn(&Self) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
        };

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                strings(|r| r.code.as_str()),
                strings(|r| r.city.as_str()),
                strings(|r| r.state.as_str()),
                strings(|r| r.state_name.as_str()),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let codes = column::<StringArray>(batch, "code")?;
        let cities = column::<StringArray>(batch, "city")?;
        let states = column::<StringArray>(batch, "state")?;
        let state_names = column::<StringArray>(batch, "state_name")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(PortDim {
                    code: required_string(codes, i, "code")?,
                    city: required_string(cities, i, "city")?,
                    state: required_string(states, i, "state")?,
                    state_name: required_string(state_names, i, "state_name")?,
                })
            })
            .collect()
    }
}

/// Calendar attributes of one arrival date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DateDim {
    pub arrdate: NaiveDate,

    #[validate(range(min = 1, max = 31))]
    pub day: u32,

    #[validate(length(equal = 3))]
    pub weekday: String,

    #[validate(range(min = 1, max = 53))]
    pub week: u32,

    #[validate(range(min = 1, max = 12))]
    pub month: u32,

    pub year: i32,
}

impl DateDim {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            arrdate: date,
            day: date.day(),
            weekday: weekday_abbrev(date),
            week: iso_week(date),
            month: date.month(),
            year: date.year(),
        }
    }
}

impl TableRecord for DateDim {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("arrdate", DataType::Date32, false),
            Field::new("day", DataType::UInt32, false),
            Field::new("weekday", DataType::Utf8, false),
            Field::new("week", DataType::UInt32, false),
            Field::new("month", DataType::UInt32, false),
            Field::new("year", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let dates = Date32Array::from_iter_values(rows.iter().map(|r| date_to_date32(r.arrdate)));
        let days = UInt32Array::from_iter_values(rows.iter().map(|r| r.day));
        let weekdays = StringArray::from_iter_values(rows.iter().map(|r| r.weekday.as_str()));
        let weeks = UInt32Array::from_iter_values(rows.iter().map(|r| r.week));
        let months = UInt32Array::from_iter_values(rows.iter().map(|r| r.month));
        let years = Int32Array::from_iter_values(rows.iter().map(|r| r.year));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(dates),
                Arc::new(days),
                Arc::new(weekdays),
                Arc::new(weeks),
                Arc::new(months),
                Arc::new(years),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let dates = column::<Date32Array>(batch, "arrdate")?;
        let weekdays = column::<StringArray>(batch, "weekday")?;
        let days = column::<UInt32Array>(batch, "day")?;
        let weeks = column::<UInt32Array>(batch, "week")?;
        let months = column::<UInt32Array>(batch, "month")?;
        let years = column::<Int32Array>(batch, "year")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(DateDim {
                    arrdate: required_date(dates, i, "arrdate")?,
                    day: days.value(i),
                    weekday: required_string(weekdays, i, "weekday")?,
                    week: weeks.value(i),
                    month: months.value(i),
                    year: years.value(i),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_dim_from_date() {
        let date = NaiveDate::from_ymd_opt(2016, 4, 1).unwrap();
        let dim = DateDim::from_date(date);

        assert_eq!(dim.day, 1);
        assert_eq!(dim.weekday, "Fri");
        assert_eq!(dim.week, 13);
        assert_eq!(dim.month, 4);
        assert_eq!(dim.year, 2016);
        assert!(dim.validate().is_ok());
    }

    #[test]
    fn test_port_dim_validation() {
        assert!(PortDim::new("ABC", "ANYTOWN", "NY", "New York")
            .validate()
            .is_ok());
        assert!(PortDim::new("ABC", "", "NY", "New York").validate().is_err());
    }

    #[test]
    fn test_code_label_batch() -> Result<()> {
        let rows = vec![CodeLabelDim::new(1, "Air"), CodeLabelDim::new(2, "Sea")];
        let batch = CodeLabelDim::to_batch(&rows)?;
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(CodeLabelDim::from_batch(&batch)?, rows);
        Ok(())
    }
}
