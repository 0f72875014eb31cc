use crate::error::{ProcessingError, Result};
use crate::models::{FactVisit, ImmigrationRecord, PortDim, TemperatureObservation};
use crate::utils::constants::{
    DIM_PORTS_TABLE, FACT_VISITS_TABLE, STAGE_IMMIGRATION_TABLE, STAGE_TEMPERATURE_TABLE,
};
use crate::utils::dates::{sas_days_to_date, stay_days};
use crate::writers::TableStore;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Row counts through the two inner joins of fact assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinAttrition {
    pub staged: usize,
    pub after_port_join: usize,
    pub after_temperature_join: usize,
}

impl JoinAttrition {
    pub fn dropped_by_port_join(&self) -> usize {
        self.staged.saturating_sub(self.after_port_join)
    }

    pub fn dropped_by_temperature_join(&self) -> usize {
        self.after_port_join
            .saturating_sub(self.after_temperature_join)
    }
}

impl fmt::Display for JoinAttrition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} staged → {} after port join → {} after temperature join",
            self.staged, self.after_port_join, self.after_temperature_join
        )
    }
}

#[derive(Debug, Clone)]
pub struct FactOutput {
    pub visits: Vec<FactVisit>,
    /// Distinct arrival dates of the persisted visits, input for the date dimension
    pub arrival_dates: BTreeSet<NaiveDate>,
    pub attrition: JoinAttrition,
}

/// Staged record with its derived measures
#[derive(Clone, Copy)]
struct PreparedVisit<'a> {
    record: &'a ImmigrationRecord,
    stay: Option<i64>,
    arrdate: Option<NaiveDate>,
    depdate: Option<NaiveDate>,
}

impl<'a> PreparedVisit<'a> {
    fn new(record: &'a ImmigrationRecord) -> Self {
        // Stay is taken on the raw day counts, before date conversion
        let stay = stay_days(record.arrdate, record.depdate);
        Self {
            record,
            stay,
            arrdate: sas_days_to_date(record.arrdate),
            depdate: sas_days_to_date(record.depdate),
        }
    }

    fn into_fact(self, arrdate: NaiveDate, temperature: &TemperatureObservation) -> FactVisit {
        let record = self.record;
        FactVisit {
            cicid: record.cicid,
            arrdate,
            depdate: self.depdate,
            stay: self.stay,
            i94port: record.i94port.clone().unwrap_or_default(),
            i94cit: record.i94cit,
            i94mode: record.i94mode,
            i94visa: record.i94visa,
            visatype: record.visatype.clone(),
            avgtemperature: temperature.avgtemperature,
        }
    }
}

type TemperatureKey<'a> = (NaiveDate, &'a str, &'a str);

/// Index observations by (date, city, state); observations without a valid date are left out
fn index_temperatures(
    temperatures: &[TemperatureObservation],
) -> HashMap<TemperatureKey<'_>, Vec<&TemperatureObservation>> {
    let mut index: HashMap<TemperatureKey<'_>, Vec<&TemperatureObservation>> = HashMap::new();
    let mut undated = 0;

    for observation in temperatures {
        match observation.date() {
            Some(date) => index
                .entry((date, observation.city.as_str(), observation.state.as_str()))
                .or_default()
                .push(observation),
            None => undated += 1,
        }
    }

    if undated > 0 {
        debug!("{} temperature observations have no valid calendar date", undated);
    }
    index
}

/// Join staged records to ports and arrival-day temperatures
///
/// Both joins are inner joins: records without a port row or a matching
/// temperature observation are dropped, and every matching observation yields
/// its own fact row. Output order follows the staged records.
pub fn assemble_visits(
    records: &[ImmigrationRecord],
    ports: &[PortDim],
    temperatures: &[TemperatureObservation],
    max_workers: usize,
) -> Result<FactOutput> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .build()
        .map_err(|e| ProcessingError::Config(e.to_string()))?;

    let mut ports_by_code: HashMap<&str, Vec<&PortDim>> = HashMap::new();
    for port in ports {
        ports_by_code.entry(port.code.as_str()).or_default().push(port);
    }
    let temperature_index = index_temperatures(temperatures);

    let (visits, after_port_join) = pool.install(|| {
        let port_matches: Vec<(PreparedVisit, &PortDim)> = records
            .par_iter()
            .flat_map_iter(|record| {
                let matches = record
                    .i94port
                    .as_deref()
                    .and_then(|code| ports_by_code.get(code))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                matches
                    .iter()
                    .map(move |&port| (PreparedVisit::new(record), port))
            })
            .collect();

        let after_port_join = port_matches.len();

        let visits: Vec<FactVisit> = port_matches
            .into_par_iter()
            .flat_map_iter(|(prepared, port)| {
                let observations = prepared
                    .arrdate
                    .and_then(|date| {
                        temperature_index.get(&(date, port.city.as_str(), port.state_name.as_str()))
                    })
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                observations
                    .iter()
                    .filter_map(move |&observation| {
                        prepared
                            .arrdate
                            .map(|date| prepared.into_fact(date, observation))
                    })
            })
            .collect();

        (visits, after_port_join)
    });

    let attrition = JoinAttrition {
        staged: records.len(),
        after_port_join,
        after_temperature_join: visits.len(),
    };
    let arrival_dates: BTreeSet<NaiveDate> = visits.iter().map(|v| v.arrdate).collect();

    Ok(FactOutput {
        visits,
        arrival_dates,
        attrition,
    })
}

/// Reads the staging tables and the port dimension, then persists the fact table
pub struct FactAssembler<'a> {
    store: &'a TableStore,
    max_workers: usize,
}

impl<'a> FactAssembler<'a> {
    pub fn new(store: &'a TableStore, max_workers: usize) -> Self {
        Self { store, max_workers }
    }

    pub fn build(&self) -> Result<FactOutput> {
        let records: Vec<ImmigrationRecord> = self.store.read_table(STAGE_IMMIGRATION_TABLE)?;
        let temperatures: Vec<TemperatureObservation> =
            self.store.read_table(STAGE_TEMPERATURE_TABLE)?;
        let ports: Vec<PortDim> = self.store.read_table(DIM_PORTS_TABLE)?;

        debug!(
            "Assembling facts from {} records, {} observations, {} ports",
            records.len(),
            temperatures.len(),
            ports.len()
        );

        let output = assemble_visits(&records, &ports, &temperatures, self.max_workers)?;
        self.store.write_table(FACT_VISITS_TABLE, &output.visits)?;

        let attrition = output.attrition;
        if attrition.dropped_by_port_join() > 0 || attrition.dropped_by_temperature_join() > 0 {
            warn!(
                "Join attrition: {} records without a port row, {} without a temperature match",
                attrition.dropped_by_port_join(),
                attrition.dropped_by_temperature_join()
            );
        }
        info!("Fact assembly: {}", attrition);

        Ok(output)
    }
}
