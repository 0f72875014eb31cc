use crate::error::Result;
use crate::models::{FactVisit, PortDim};
use crate::utils::constants::{DIM_PORTS_TABLE, FACT_VISITS_TABLE};
use crate::writers::TableStore;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Arrival count and mean temperature of one group of visits
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub key: String,
    /// Mean of the non-null temperatures, rounded to 2 decimals
    pub avg_temperature: Option<f64>,
    pub arrivals: usize,
}

#[derive(Default)]
struct Accumulator {
    arrivals: usize,
    temperature_sum: f64,
    temperature_count: usize,
}

impl Accumulator {
    fn add(&mut self, temperature: Option<f64>) {
        self.arrivals += 1;
        if let Some(t) = temperature {
            self.temperature_sum += t;
            self.temperature_count += 1;
        }
    }

    fn finish(self, key: String) -> GroupStats {
        let avg_temperature = (self.temperature_count > 0)
            .then(|| round2(self.temperature_sum / self.temperature_count as f64));
        GroupStats {
            key,
            avg_temperature,
            arrivals: self.arrivals,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Read-only reports over visits joined to their ports
pub struct VisitAnalyzer {
    visits: Vec<FactVisit>,
    ports: Vec<PortDim>,
}

impl VisitAnalyzer {
    pub fn new(visits: Vec<FactVisit>, ports: Vec<PortDim>) -> Self {
        Self { visits, ports }
    }

    pub fn load(store: &TableStore) -> Result<Self> {
        Ok(Self::new(
            store.read_table(FACT_VISITS_TABLE)?,
            store.read_table(DIM_PORTS_TABLE)?,
        ))
    }

    /// States with the most arrivals
    pub fn top_states_by_arrivals(&self, limit: usize) -> Vec<GroupStats> {
        let mut groups = self.group(|port| Some(port.state_name.as_str()));
        groups.sort_by(by_arrivals);
        groups.truncate(limit);
        groups
    }

    /// States with the highest mean arrival-day temperature
    pub fn warmest_states(&self, limit: usize) -> Vec<GroupStats> {
        let mut groups = self.group(|port| Some(port.state_name.as_str()));
        groups.sort_by(by_temperature);
        groups.truncate(limit);
        groups
    }

    /// Port cities of one state (by state code) with the most arrivals
    pub fn top_cities_in_state(&self, state_code: &str, limit: usize) -> Vec<GroupStats> {
        let mut groups =
            self.group(|port| (port.state == state_code).then_some(port.city.as_str()));
        groups.sort_by(by_arrivals);
        groups.truncate(limit);
        groups
    }

    /// Inner join of visits to ports, grouped by `key`; ports yielding `None` are skipped
    ///
    /// A repeated port code matches every one of its rows.
    fn group<'a>(&'a self, key: impl Fn(&'a PortDim) -> Option<&'a str>) -> Vec<GroupStats> {
        let mut ports: HashMap<&str, Vec<&PortDim>> = HashMap::new();
        for port in &self.ports {
            ports.entry(port.code.as_str()).or_default().push(port);
        }

        let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
        for visit in &self.visits {
            let Some(matches) = ports.get(visit.i94port.as_str()) else {
                continue;
            };
            for &port in matches {
                if let Some(group) = key(port) {
                    groups.entry(group).or_default().add(visit.avgtemperature);
                }
            }
        }

        groups
            .into_iter()
            .map(|(group, acc)| acc.finish(group.to_string()))
            .collect()
    }
}

fn by_arrivals(a: &GroupStats, b: &GroupStats) -> Ordering {
    b.arrivals.cmp(&a.arrivals).then_with(|| a.key.cmp(&b.key))
}

/// Descending temperature with groups lacking a temperature last
fn by_temperature(a: &GroupStats, b: &GroupStats) -> Ordering {
    let temperature = match (a.avg_temperature, b.avg_temperature) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    temperature.then_with(|| a.key.cmp(&b.key))
}

/// Render a report as an aligned text table
pub fn format_report(title: &str, key_header: &str, rows: &[GroupStats]) -> String {
    let width = rows
        .iter()
        .map(|r| r.key.len())
        .chain(std::iter::once(key_header.len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{title}\n");
    out.push_str(&format!(
        "{:<width$}  {:>15}  {:>8}\n",
        key_header, "avg_temperature", "count"
    ));
    for row in rows {
        let temperature = row
            .avg_temperature
            .map(|t| format!("{t:.2}"))
            .unwrap_or_else(|| "null".to_string());
        out.push_str(&format!(
            "{:<width$}  {:>15}  {:>8}\n",
            row.key, temperature, row.arrivals
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn visit(cicid: i64, port: &str, temperature: Option<f64>) -> FactVisit {
        FactVisit {
            cicid,
            arrdate: NaiveDate::from_ymd_opt(2016, 4, 1).unwrap(),
            depdate: None,
            stay: None,
            i94port: port.to_string(),
            i94cit: None,
            i94mode: Some(1),
            i94visa: None,
            visatype: None,
            avgtemperature: temperature,
        }
    }

    fn analyzer() -> VisitAnalyzer {
        let ports = vec![
            PortDim::new("LOS", "LOS ANGELES", "CA", "CALIFORNIA"),
            PortDim::new("SFR", "SAN FRANCISCO", "CA", "CALIFORNIA"),
            PortDim::new("MIA", "MIAMI", "FL", "FLORIDA"),
            PortDim::new("NYC", "NEW YORK", "NY", "NEW YORK"),
        ];
        let visits = vec![
            visit(1, "LOS", Some(65.0)),
            visit(2, "LOS", Some(66.0)),
            visit(3, "SFR", Some(58.333)),
            visit(4, "MIA", Some(80.0)),
            visit(5, "NYC", Some(50.0)),
            visit(6, "NYC", None),
            visit(7, "XXX", Some(99.0)),
        ];
        VisitAnalyzer::new(visits, ports)
    }

    #[test]
    fn test_top_states_by_arrivals() {
        let states = analyzer().top_states_by_arrivals(2);

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].key, "CALIFORNIA");
        assert_eq!(states[0].arrivals, 3);
        assert_eq!(states[0].avg_temperature, Some(63.11));
        assert_eq!(states[1].key, "NEW YORK");
        assert_eq!(states[1].avg_temperature, Some(50.0));
    }

    #[test]
    fn test_warmest_states() {
        let states = analyzer().warmest_states(5);
        let keys: Vec<&str> = states.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["FLORIDA", "CALIFORNIA", "NEW YORK"]);
    }

    #[test]
    fn test_top_cities_in_state() {
        let cities = analyzer().top_cities_in_state("CA", 10);
        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0].key, "LOS ANGELES");
        assert_eq!(cities[0].avg_temperature, Some(65.5));
        assert_eq!(cities[1].key, "SAN FRANCISCO");
        assert_eq!(cities[1].avg_temperature, Some(58.33));

        assert!(analyzer().top_cities_in_state("TX", 10).is_empty());
    }

    #[test]
    fn test_repeated_port_code_counts_every_row() {
        let ports = vec![
            PortDim::new("DUP", "KANSAS CITY", "MO", "MISSOURI"),
            PortDim::new("DUP", "KANSAS CITY", "KS", "KANSAS"),
        ];
        let analyzer = VisitAnalyzer::new(vec![visit(1, "DUP", Some(60.0))], ports);

        let states = analyzer.top_states_by_arrivals(10);
        let keys: Vec<&str> = states.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["KANSAS", "MISSOURI"]);
        assert!(states.iter().all(|s| s.arrivals == 1));

        assert_eq!(analyzer.top_cities_in_state("KS", 10).len(), 1);
    }

    #[test]
    fn test_format_report() {
        let report = format_report("Top states", "state_name", &analyzer().warmest_states(1));
        assert!(report.contains("FLORIDA"));
        assert!(report.contains("80.00"));
    }
}
