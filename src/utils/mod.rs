pub mod constants;
pub mod dates;
pub mod progress;

pub use constants::*;
pub use dates::{
    in_reporting_period, observation_date, sas_days_to_date, stay_days, weekday_abbrev,
};
pub use progress::ProgressReporter;
