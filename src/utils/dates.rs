use crate::utils::constants::{REPORTING_MONTH, REPORTING_YEAR, SAS_EPOCH};
use chrono::{Datelike, Duration, NaiveDate};

/// First day of the SAS calendar
pub fn sas_epoch() -> NaiveDate {
    let (year, month, day) = SAS_EPOCH;
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Convert a SAS date value (days since 1960-01-01) to a calendar date
///
/// A missing value, or one that falls outside the representable range, yields `None`.
///
/// # Examples
/// ```
/// use i94_processor::utils::sas_days_to_date;
///
/// let date = sas_days_to_date(Some(20545)).unwrap();
/// assert_eq!(date.to_string(), "2016-04-01");
/// assert!(sas_days_to_date(None).is_none());
/// ```
pub fn sas_days_to_date(days: Option<i64>) -> Option<NaiveDate> {
    let days = days?;
    let offset = Duration::try_days(days)?;
    sas_epoch().checked_add_signed(offset)
}

/// Inverse of [`sas_days_to_date`]
pub fn date_to_sas_days(date: NaiveDate) -> i64 {
    date.signed_duration_since(sas_epoch()).num_days()
}

/// Length of stay in days, computed on the raw SAS values
///
/// `None` when either value is missing or the difference overflows.
pub fn stay_days(arrdate: Option<i64>, depdate: Option<i64>) -> Option<i64> {
    depdate?.checked_sub(arrdate?)
}

/// Calendar date of a temperature observation; invalid parts (e.g. day 0) yield `None`
pub fn observation_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Three-letter English weekday abbreviation ("Mon" .. "Sun")
pub fn weekday_abbrev(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

/// ISO-8601 week number
pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

pub fn in_reporting_period(date: NaiveDate) -> bool {
    date.year() == REPORTING_YEAR && date.month() == REPORTING_MONTH
}

/// Conversion between Arrow Date32 values (days since 1970-01-01) and calendar dates
pub fn date_to_date32(date: NaiveDate) -> i32 {
    date.signed_duration_since(unix_epoch()).num_days() as i32
}

pub fn date32_to_date(days: i32) -> Option<NaiveDate> {
    unix_epoch().checked_add_signed(Duration::try_days(days as i64)?)
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}
