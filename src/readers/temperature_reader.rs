use crate::error::{ProcessingError, Result};
use crate::models::temperature::{TemperatureObservation, REQUIRED_COLUMNS};
use crate::readers::immigration_reader::parse_whole_number;
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

pub struct TemperatureReader {
    use_mmap: bool,
}

impl Default for TemperatureReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    /// Read every observation of a city temperature CSV
    pub fn read_observations(&self, path: &Path) -> Result<Vec<TemperatureObservation>> {
        let file = File::open(path).map_err(|e| ProcessingError::source_read(path, e.to_string()))?;

        let observations = if self.use_mmap {
            let mmap = unsafe { Mmap::map(&file)? };
            self.parse_csv(&mmap[..], path)?
        } else {
            self.parse_csv(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file), path)?
        };

        info!(
            "Loaded {} temperature observations from {}",
            observations.len(),
            path.display()
        );
        Ok(observations)
    }

    fn parse_csv<R: Read>(&self, source: R, path: &Path) -> Result<Vec<TemperatureObservation>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        // Header names are matched case-insensitively
        let positions: HashMap<String, usize> = reader
            .headers()
            .map_err(|e| ProcessingError::source_read(path, format!("failed to read header: {e}")))?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();

        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|&&name| !positions.contains_key(name))
        {
            return Err(ProcessingError::source_read(
                path,
                format!("missing required column '{missing}'"),
            ));
        }

        let position = |name: &str| positions.get(name).copied();
        let region_at = position("region");
        let columns = ColumnPositions {
            country: position("country"),
            state: position("state"),
            city: position("city"),
            month: position("month"),
            day: position("day"),
            year: position("year"),
            avgtemperature: position("avgtemperature"),
        };

        let mut observations = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result
                .map_err(|e| ProcessingError::source_read(path, format!("row {}: {e}", row + 1)))?;

            let field = |at: Option<usize>| at.and_then(|i| record.get(i)).unwrap_or("");
            let parse_error =
                |msg: String| ProcessingError::source_read(path, format!("row {}: {msg}", row + 1));

            let month = parse_whole_number(field(columns.month))
                .and_then(|v| u32::try_from(v).map_err(|_| format!("invalid month {v}")))
                .map_err(parse_error)?;
            let day = parse_whole_number(field(columns.day))
                .and_then(|v| u32::try_from(v).map_err(|_| format!("invalid day {v}")))
                .map_err(parse_error)?;
            let year = parse_whole_number(field(columns.year))
                .and_then(|v| i32::try_from(v).map_err(|_| format!("invalid year {v}")))
                .map_err(parse_error)?;

            let avgtemperature = match field(columns.avgtemperature) {
                "" => None,
                raw => Some(
                    raw.parse::<f64>()
                        .map_err(|_| parse_error(format!("'{raw}' is not a temperature")))?,
                ),
            };

            let region = Some(field(region_at))
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            observations.push(TemperatureObservation {
                region,
                country: field(columns.country).to_string(),
                state: field(columns.state).to_string(),
                city: field(columns.city).to_string(),
                month,
                day,
                year,
                avgtemperature,
            });
        }

        debug!("Parsed {} rows from {}", observations.len(), path.display());
        Ok(observations)
    }
}

struct ColumnPositions {
    country: Option<usize>,
    state: Option<usize>,
    city: Option<usize>,
    month: Option<usize>,
    day: Option<usize>,
    year: Option<usize>,
    avgtemperature: Option<usize>,
}
