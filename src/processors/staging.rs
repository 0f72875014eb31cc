use crate::error::Result;
use crate::models::{ImmigrationRecord, TemperatureObservation};
use crate::readers::{ImmigrationReader, TemperatureReader};
use crate::utils::constants::{STAGE_IMMIGRATION_TABLE, STAGE_TEMPERATURE_TABLE};
use crate::writers::TableStore;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::path::Path;
use tracing::{debug, info};

/// Row counts of one staging pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub table: String,
    pub loaded: usize,
    pub duplicates_removed: usize,
    pub filtered_out: usize,
    pub written: usize,
}

impl fmt::Display for StageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} loaded, {} duplicates removed, {} filtered out, {} written",
            self.table, self.loaded, self.duplicates_removed, self.filtered_out, self.written
        )
    }
}

/// Remove exact duplicate rows, keeping the first occurrence in input order
///
/// Returns the surviving rows and the number removed.
pub fn drop_duplicates<T: Eq + Hash>(rows: Vec<T>) -> (Vec<T>, usize) {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(row)).collect()
    };

    let before = rows.len();
    let unique: Vec<T> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();
    let removed = before - unique.len();

    (unique, removed)
}

/// Deduplicate, then keep records at a known port with departure, mode and match flag present
pub fn clean_immigration(
    records: Vec<ImmigrationRecord>,
    known_ports: &HashSet<String>,
) -> (Vec<ImmigrationRecord>, StageStats) {
    let loaded = records.len();
    let (records, duplicates_removed) = drop_duplicates(records);
    let after_dedup = records.len();

    let cleaned: Vec<ImmigrationRecord> = records
        .into_iter()
        .filter(|r| r.has_known_port(known_ports) && r.is_complete())
        .collect();

    let stats = StageStats {
        table: STAGE_IMMIGRATION_TABLE.to_string(),
        loaded,
        duplicates_removed,
        filtered_out: after_dedup - cleaned.len(),
        written: cleaned.len(),
    };

    (cleaned, stats)
}

/// Deduplicate, keep US observations of the reporting month, uppercase names
pub fn clean_temperatures(
    observations: Vec<TemperatureObservation>,
) -> (Vec<TemperatureObservation>, StageStats) {
    let loaded = observations.len();
    let (observations, duplicates_removed) = drop_duplicates(observations);
    let after_dedup = observations.len();

    let cleaned: Vec<TemperatureObservation> = observations
        .into_iter()
        .filter(TemperatureObservation::is_in_scope)
        .map(TemperatureObservation::normalize_names)
        .collect();

    let stats = StageStats {
        table: STAGE_TEMPERATURE_TABLE.to_string(),
        loaded,
        duplicates_removed,
        filtered_out: after_dedup - cleaned.len(),
        written: cleaned.len(),
    };

    (cleaned, stats)
}

/// Loads raw sources, cleans them and persists the staging tables
pub struct StagingCleanser<'a> {
    store: &'a TableStore,
    use_mmap: bool,
}

impl<'a> StagingCleanser<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self {
            store,
            use_mmap: false,
        }
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn stage_immigration(
        &self,
        source: &Path,
        known_ports: &HashSet<String>,
    ) -> Result<StageStats> {
        let records = ImmigrationReader::new().read(source)?;
        let (cleaned, stats) = clean_immigration(records, known_ports);
        debug!("{}", stats);

        self.store.write_table(STAGE_IMMIGRATION_TABLE, &cleaned)?;
        info!("{}", stats);
        Ok(stats)
    }

    pub fn stage_temperatures(&self, source: &Path) -> Result<StageStats> {
        let observations = TemperatureReader::with_mmap(self.use_mmap).read_observations(source)?;
        let (cleaned, stats) = clean_temperatures(observations);

        self.store.write_table(STAGE_TEMPERATURE_TABLE, &cleaned)?;
        info!("{}", stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(cicid: i64, port: &str) -> ImmigrationRecord {
        ImmigrationRecord {
            i94port: Some(port.to_string()),
            arrdate: Some(20545),
            depdate: Some(20550),
            i94mode: Some(1),
            matflag: Some("M".to_string()),
            ..ImmigrationRecord::new(cicid)
        }
    }

    #[test]
    fn test_drop_duplicates_keeps_first_in_order() {
        let (rows, removed) = drop_duplicates(vec![3, 1, 3, 2, 1]);
        assert_eq!(rows, vec![3, 1, 2]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_clean_immigration() {
        let known: HashSet<String> = ["NYC".to_string(), "ATL".to_string()].into();

        let mut no_flag = complete(3, "ATL");
        no_flag.matflag = None;

        let records = vec![
            complete(1, "NYC"),
            complete(1, "NYC"),
            complete(2, "XXX"),
            no_flag,
            complete(4, "ATL"),
        ];

        let (cleaned, stats) = clean_immigration(records, &known);
        let ids: Vec<i64> = cleaned.iter().map(|r| r.cicid).collect();

        assert_eq!(ids, vec![1, 4]);
        assert_eq!(stats.loaded, 5);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.filtered_out, 2);
        assert_eq!(stats.written, 2);
    }

    #[test]
    fn test_clean_temperatures() {
        let observations = vec![
            TemperatureObservation::new("US", "Texas", "Austin", 2016, 4, 1, Some(70.1)),
            TemperatureObservation::new("US", "Texas", "Austin", 2016, 4, 1, Some(70.1)),
            TemperatureObservation::new("US", "Texas", "Austin", 2016, 5, 1, Some(80.0)),
            TemperatureObservation::new("Mexico", "", "Cancun", 2016, 4, 1, Some(85.0)),
        ];

        let (cleaned, stats) = clean_temperatures(observations);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].state, "TEXAS");
        assert_eq!(cleaned[0].city, "AUSTIN");
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.filtered_out, 2);
    }
}
