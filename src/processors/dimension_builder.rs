use crate::error::Result;
use crate::models::{
    CodeLabelDim, DateDim, PortDim, PortTable, ReferenceData, ReferenceTable,
};
use crate::utils::constants::{
    DIM_COUNTRIES_TABLE, DIM_DATE_TABLE, DIM_PORTS_TABLE, DIM_TRAVEL_MODES_TABLE, DIM_VISAS_TABLE,
};
use crate::writers::TableStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};
use validator::Validate;

/// Row counts of the reference dimensions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionStats {
    pub countries: usize,
    pub travel_modes: usize,
    pub visas: usize,
    pub ports: usize,
    /// Ports dropped because their state code has no entry in the states table
    pub ports_unmatched: usize,
}

pub fn code_label_rows(table: &ReferenceTable<i64>) -> Vec<CodeLabelDim> {
    table
        .entries()
        .iter()
        .map(|entry| CodeLabelDim::new(entry.key, entry.label.clone()))
        .collect()
}

/// Inner join of decomposed ports with states on the state code
///
/// Returns the joined rows in port order and the number of ports left out.
pub fn join_ports_with_states(
    ports: &PortTable,
    states: &ReferenceTable<String>,
) -> Result<(Vec<PortDim>, usize)> {
    let state_names = states.to_map();
    let mut rows = Vec::with_capacity(ports.len());

    for port in ports.entries() {
        let Some(state) = port.state_code.as_ref() else {
            continue;
        };
        let Some(state_name) = state_names.get(state) else {
            continue;
        };

        let row = PortDim::new(&port.code, &port.city, state, state_name);
        row.validate()?;
        rows.push(row);
    }

    let unmatched = ports.len() - rows.len();
    Ok((rows, unmatched))
}

/// One calendar row per distinct arrival date, ordered by date
pub fn date_rows(dates: &BTreeSet<NaiveDate>) -> Result<Vec<DateDim>> {
    dates
        .iter()
        .map(|&date| {
            let row = DateDim::from_date(date);
            row.validate()?;
            Ok(row)
        })
        .collect()
}

/// Persists the dimension tables
pub struct DimensionBuilder<'a> {
    store: &'a TableStore,
}

impl<'a> DimensionBuilder<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self { store }
    }

    /// Countries, travel modes, visas and ports
    pub fn build_reference_dimensions(&self, data: &ReferenceData) -> Result<DimensionStats> {
        let countries = code_label_rows(&data.countries);
        let travel_modes = code_label_rows(&data.travel_modes);
        let visas = code_label_rows(&data.visas);
        let (ports, ports_unmatched) = join_ports_with_states(&data.ports, &data.states)?;

        self.store.write_table(DIM_COUNTRIES_TABLE, &countries)?;
        self.store.write_table(DIM_TRAVEL_MODES_TABLE, &travel_modes)?;
        self.store.write_table(DIM_VISAS_TABLE, &visas)?;
        self.store.write_table(DIM_PORTS_TABLE, &ports)?;

        if ports_unmatched > 0 {
            warn!(
                "{} ports have no matching state and were left out of {}",
                ports_unmatched, DIM_PORTS_TABLE
            );
        }

        let stats = DimensionStats {
            countries: countries.len(),
            travel_modes: travel_modes.len(),
            visas: visas.len(),
            ports: ports.len(),
            ports_unmatched,
        };
        info!(?stats, "Reference dimensions written");
        Ok(stats)
    }

    pub fn build_date_dimension(&self, dates: &BTreeSet<NaiveDate>) -> Result<usize> {
        let rows = date_rows(dates)?;
        self.store.write_table(DIM_DATE_TABLE, &rows)?;

        info!("Wrote {} rows to {}", rows.len(), DIM_DATE_TABLE);
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortEntry, ReferenceEntry};

    fn port(code: &str, city: &str, state: Option<&str>) -> PortEntry {
        PortEntry {
            code: code.to_string(),
            city: city.to_string(),
            state_code: state.map(str::to_string),
            placeholder: false,
        }
    }

    fn state(code: &str, name: &str) -> ReferenceEntry<String> {
        ReferenceEntry {
            key: code.to_string(),
            label: name.to_string(),
        }
    }

    #[test]
    fn test_port_state_join() -> Result<()> {
        let ports = PortTable::new(vec![
            port("ABC", "ANYTOWN", Some("NY")),
            port("MEX", "MEXICO CITY", Some("MX")),
            port("ZZZ", "Other US ports", None),
        ]);
        let states = ReferenceTable::new(vec![state("NY", "New York")]);

        let (rows, unmatched) = join_ports_with_states(&ports, &states)?;

        assert_eq!(rows, vec![PortDim::new("ABC", "ANYTOWN", "NY", "New York")]);
        assert_eq!(unmatched, 2);
        Ok(())
    }

    #[test]
    fn test_date_rows_are_ordered() -> Result<()> {
        let dates: BTreeSet<NaiveDate> = [30, 1, 15]
            .into_iter()
            .map(|day| NaiveDate::from_ymd_opt(2016, 4, day).unwrap())
            .collect();

        let rows = date_rows(&dates)?;
        let days: Vec<u32> = rows.iter().map(|r| r.day).collect();
        assert_eq!(days, vec![1, 15, 30]);

        let last = &rows[2];
        assert_eq!(last.weekday, "Sat");
        assert_eq!(last.week, 17);
        Ok(())
    }
}
