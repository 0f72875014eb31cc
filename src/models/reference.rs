use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// One `key = label` entry from a lookup file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry<K> {
    pub key: K,
    pub label: String,
}

/// Ordered key→label lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTable<K> {
    entries: Vec<ReferenceEntry<K>>,
}

impl<K: Eq + Hash + Clone> ReferenceTable<K> {
    pub fn new(entries: Vec<ReferenceEntry<K>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ReferenceEntry<K>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label lookup; the first entry wins when a key repeats
    pub fn to_map(&self) -> HashMap<K, String> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            map.entry(entry.key.clone())
                .or_insert_with(|| entry.label.clone());
        }
        map
    }
}

/// A port entry with its label decomposed into city and state code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub code: String,
    pub city: String,
    pub state_code: Option<String>,
    /// Label was a placeholder ("No PORT Code", "Collapsed") folded into the canonical label
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortTable {
    entries: Vec<PortEntry>,
}

impl PortTable {
    pub fn new(entries: Vec<PortEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PortEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Codes of real ports; placeholder entries are not valid arrival ports
    pub fn known_codes(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.placeholder)
            .map(|entry| entry.code.clone())
            .collect()
    }
}

/// All normalized lookup tables of one run
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub countries: ReferenceTable<i64>,
    pub travel_modes: ReferenceTable<i64>,
    pub visas: ReferenceTable<i64>,
    pub ports: PortTable,
    pub states: ReferenceTable<String>,
}

impl ReferenceData {
    pub fn summary(&self) -> String {
        format!(
            "Reference data: {} countries, {} travel modes, {} visas, {} ports ({} known), {} states",
            self.countries.len(),
            self.travel_modes.len(),
            self.visas.len(),
            self.ports.len(),
            self.ports.known_codes().len(),
            self.states.len()
        )
    }
}

/// Remove quote and tab noise and surrounding whitespace
pub fn clean_field(raw: &str) -> String {
    raw.replace(['\'', '\t'], "").trim().to_string()
}

/// Fold a placeholder label into `sentinel` when it starts with any of `prefixes`
///
/// Returns the resulting label and whether it was folded.
pub fn canonicalize_label(label: String, prefixes: &[&str], sentinel: &str) -> (String, bool) {
    if prefixes.iter().any(|prefix| label.starts_with(prefix)) {
        (sentinel.to_string(), true)
    } else {
        (label, false)
    }
}

/// Split "CITY, ST" on the first comma; a label without a comma has no state code
pub fn split_port_label(label: &str) -> (String, Option<String>) {
    match label.split_once(',') {
        Some((city, state)) => (city.trim().to_string(), Some(state.trim().to_string())),
        None => (label.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{
        COUNTRY_PLACEHOLDER_PREFIXES, OTHER_COUNTRIES_LABEL, OTHER_PORTS_LABEL,
        PORT_PLACEHOLDER_PREFIXES,
    };

    #[test]
    fn test_clean_field() {
        assert_eq!(clean_field("\t'ALCAN, AK             '"), "ALCAN, AK");
        assert_eq!(clean_field("   582 "), "582");
        assert_eq!(clean_field("''"), "");
    }

    #[test]
    fn test_country_canonicalization() {
        for label in [
            "No Country Reported",
            "INVALID: ANTARCTICA",
            "Collapsed Bhutan (should not show)",
        ] {
            let (canonical, folded) = canonicalize_label(
                label.to_string(),
                COUNTRY_PLACEHOLDER_PREFIXES,
                OTHER_COUNTRIES_LABEL,
            );
            assert_eq!(canonical, "Other countries");
            assert!(folded);
        }

        let (canonical, folded) = canonicalize_label(
            "MEXICO".to_string(),
            COUNTRY_PLACEHOLDER_PREFIXES,
            OTHER_COUNTRIES_LABEL,
        );
        assert_eq!(canonical, "MEXICO");
        assert!(!folded);
    }

    #[test]
    fn test_canonicalization_is_case_sensitive_prefix() {
        let (label, folded) = canonicalize_label(
            "invalid entry".to_string(),
            COUNTRY_PLACEHOLDER_PREFIXES,
            OTHER_COUNTRIES_LABEL,
        );
        assert_eq!(label, "invalid entry");
        assert!(!folded);

        let (label, folded) = canonicalize_label(
            "PORT Collapsed".to_string(),
            PORT_PLACEHOLDER_PREFIXES,
            OTHER_PORTS_LABEL,
        );
        assert_eq!(label, "PORT Collapsed");
        assert!(!folded);
    }

    #[test]
    fn test_split_port_label() {
        assert_eq!(
            split_port_label("ANYTOWN, NY"),
            ("ANYTOWN".to_string(), Some("NY".to_string()))
        );
        assert_eq!(
            split_port_label("WASHINGTON DC, DC, USA"),
            ("WASHINGTON DC".to_string(), Some("DC, USA".to_string()))
        );
        assert_eq!(split_port_label("Other US ports"), ("Other US ports".to_string(), None));
    }

    #[test]
    fn test_known_codes_skip_placeholders() {
        let ports = PortTable::new(vec![
            PortEntry {
                code: "ABC".to_string(),
                city: "ANYTOWN".to_string(),
                state_code: Some("NY".to_string()),
                placeholder: false,
            },
            PortEntry {
                code: "ZZZ".to_string(),
                city: "Other US ports".to_string(),
                state_code: None,
                placeholder: true,
            },
        ]);

        let known = ports.known_codes();
        assert!(known.contains("ABC"));
        assert!(!known.contains("ZZZ"));
    }

    #[test]
    fn test_first_key_wins() {
        let table = ReferenceTable::new(vec![
            ReferenceEntry {
                key: "NY".to_string(),
                label: "New York".to_string(),
            },
            ReferenceEntry {
                key: "NY".to_string(),
                label: "Duplicate".to_string(),
            },
        ]);
        assert_eq!(table.to_map().get("NY").map(String::as_str), Some("New York"));
    }
}
