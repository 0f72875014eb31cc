use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::reference::{
    canonicalize_label, clean_field, split_port_label, PortEntry, PortTable, ReferenceData,
    ReferenceEntry, ReferenceTable,
};
use crate::utils::constants::{
    COUNTRY_PLACEHOLDER_PREFIXES, OTHER_COUNTRIES_LABEL, OTHER_PORTS_LABEL,
    PORT_PLACEHOLDER_PREFIXES,
};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reader for the `key = label` lookup files
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceReader;

/// A cleaned `key = label` line with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub line: usize,
    pub key: String,
    pub label: String,
}

impl ReferenceReader {
    pub fn new() -> Self {
        Self
    }

    /// Load all five lookup files concurrently
    pub async fn load_all(config: &PipelineConfig) -> Result<ReferenceData> {
        let countries_path = config.countries_path();
        let modes_path = config.travel_modes_path();
        let visas_path = config.visas_path();
        let ports_path = config.ports_path();
        let states_path = config.states_path();

        let countries = tokio::task::spawn_blocking(move || {
            ReferenceReader::new().read_countries(&countries_path)
        });
        let travel_modes = tokio::task::spawn_blocking(move || {
            ReferenceReader::new().read_numeric_table(&modes_path)
        });
        let visas = tokio::task::spawn_blocking(move || {
            ReferenceReader::new().read_numeric_table(&visas_path)
        });
        let ports =
            tokio::task::spawn_blocking(move || ReferenceReader::new().read_ports(&ports_path));
        let states = tokio::task::spawn_blocking(move || {
            ReferenceReader::new().read_string_table(&states_path)
        });

        let (countries, travel_modes, visas, ports, states) =
            tokio::try_join!(countries, travel_modes, visas, ports, states)?;

        let data = ReferenceData {
            countries: countries?,
            travel_modes: travel_modes?,
            visas: visas?,
            ports: ports?,
            states: states?,
        };

        info!("{}", data.summary());
        Ok(data)
    }

    /// Country table with placeholder labels folded into "Other countries"
    pub fn read_countries(&self, path: &Path) -> Result<ReferenceTable<i64>> {
        let table = self.read_numeric_table(path)?;
        let mut folded = 0;

        let entries = table
            .entries()
            .iter()
            .map(|entry| {
                let (label, was_folded) = canonicalize_label(
                    entry.label.clone(),
                    COUNTRY_PLACEHOLDER_PREFIXES,
                    OTHER_COUNTRIES_LABEL,
                );
                if was_folded {
                    folded += 1;
                }
                ReferenceEntry {
                    key: entry.key,
                    label,
                }
            })
            .collect();

        debug!("Folded {} placeholder countries in {}", folded, path.display());
        Ok(ReferenceTable::new(entries))
    }

    /// Port table with labels decomposed into city and state code
    pub fn read_ports(&self, path: &Path) -> Result<PortTable> {
        let entries = self
            .read_entries(path)?
            .into_iter()
            .map(|raw| {
                let (label, placeholder) =
                    canonicalize_label(raw.label, PORT_PLACEHOLDER_PREFIXES, OTHER_PORTS_LABEL);
                let (city, state_code) = split_port_label(&label);
                PortEntry {
                    code: raw.key,
                    city,
                    state_code,
                    placeholder,
                }
            })
            .collect();

        Ok(PortTable::new(entries))
    }

    pub fn read_numeric_table(&self, path: &Path) -> Result<ReferenceTable<i64>> {
        let entries = self
            .read_entries(path)?
            .into_iter()
            .map(|raw| {
                let key = raw.key.parse::<i64>().map_err(|_| {
                    ProcessingError::ReferenceParse {
                        path: path.to_path_buf(),
                        line: raw.line,
                        content: format!("{} = {}", raw.key, raw.label),
                    }
                })?;
                Ok(ReferenceEntry {
                    key,
                    label: raw.label,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReferenceTable::new(entries))
    }

    pub fn read_string_table(&self, path: &Path) -> Result<ReferenceTable<String>> {
        let entries = self
            .read_entries(path)?
            .into_iter()
            .map(|raw| ReferenceEntry {
                key: raw.key,
                label: raw.label,
            })
            .collect();

        Ok(ReferenceTable::new(entries))
    }

    /// Read and clean every non-blank line of a lookup file
    pub fn read_entries(&self, path: &Path) -> Result<Vec<RawEntry>> {
        let text = read_text(path)?;
        let entries = parse_entries(&text, path)?;

        debug!("Read {} entries from {}", entries.len(), path.display());
        Ok(entries)
    }
}

/// Parse `key = label` lines; blank lines are skipped, anything else malformed is fatal
pub fn parse_entries(text: &str, path: &Path) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let malformed = || ProcessingError::ReferenceParse {
            path: path.to_path_buf(),
            line: index + 1,
            content: line.to_string(),
        };

        let (key, label) = line.split_once('=').ok_or_else(malformed)?;
        let key = clean_field(key);
        let label = clean_field(label);

        if key.is_empty() || label.is_empty() {
            return Err(malformed());
        }

        entries.push(RawEntry {
            line: index + 1,
            key,
            label,
        });
    }

    Ok(entries)
}

/// Decode a file as UTF-8, falling back to Windows-1252 for legacy bytes
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| ProcessingError::source_read(PathBuf::from(path), e.to_string()))?;

    let (text, _, had_errors) = UTF_8.decode(&bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    warn!(
        "{} is not valid UTF-8, decoding as Windows-1252",
        path.display()
    );
    let (text, _, _) = WINDOWS_1252.decode(&bytes);
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_entries_cleans_noise() {
        let text = "   582 =  'MEXICO Air Sea, and Not Reported (I-94, no land arrivals)'\n\n'ALC'\t=\t'ALCAN, AK             '\n";
        let entries = parse_entries(text, Path::new("map.txt")).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "582");
        assert_eq!(
            entries[0].label,
            "MEXICO Air Sea, and Not Reported (I-94, no land arrivals)"
        );
        assert_eq!(entries[1].line, 3);
        assert_eq!(entries[1].key, "ALC");
        assert_eq!(entries[1].label, "ALCAN, AK");
    }

    #[test]
    fn test_label_may_contain_equals() {
        let entries = parse_entries("1 = 'A = B'", Path::new("map.txt")).unwrap();
        assert_eq!(entries[0].label, "A = B");
    }

    #[test]
    fn test_malformed_lines_are_fatal() {
        for text in ["1 = Air\nno separator here", "= 'Orphan'", "7 = ''"] {
            let result = parse_entries(text, Path::new("modes.txt"));
            assert!(
                matches!(result, Err(ProcessingError::ReferenceParse { .. })),
                "expected parse failure for {text:?}"
            );
        }

        match parse_entries("1 = Air\nbroken", Path::new("modes.txt")) {
            Err(ProcessingError::ReferenceParse { line, content, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "broken");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_non_integer_numeric_key() {
        let file = write_file(b"1 = Air\nX = Sea\n");
        let result = ReferenceReader::new().read_numeric_table(file.path());
        assert!(matches!(
            result,
            Err(ProcessingError::ReferenceParse { line: 2, .. })
        ));
    }

    #[test]
    fn test_read_countries_folds_placeholders() -> Result<()> {
        let file = write_file(
            b"582 = 'MEXICO'\n 103 = 'No Country Code (103)'\n 999 = 'INVALID: ANTARCTICA'\n",
        );
        let countries = ReferenceReader::new().read_countries(file.path())?;
        let map = countries.to_map();

        assert_eq!(map[&582], "MEXICO");
        assert_eq!(map[&103], "Other countries");
        assert_eq!(map[&999], "Other countries");
        Ok(())
    }

    #[test]
    fn test_read_ports() -> Result<()> {
        let file = write_file(
            b"'ABC'\t=\t'ANYTOWN, NY'\n'XXX'\t=\t'No PORT Code (XXX)'\n'ZZZ' = 'Collapsed (should not show)'\n",
        );
        let ports = ReferenceReader::new().read_ports(file.path())?;

        assert_eq!(ports.len(), 3);
        let first = &ports.entries()[0];
        assert_eq!(first.code, "ABC");
        assert_eq!(first.city, "ANYTOWN");
        assert_eq!(first.state_code.as_deref(), Some("NY"));

        let second = &ports.entries()[1];
        assert_eq!(second.city, "Other US ports");
        assert!(second.placeholder);
        assert_eq!(second.state_code, None);

        let known = ports.known_codes();
        assert_eq!(known.len(), 1);
        assert!(known.contains("ABC"));
        Ok(())
    }

    #[test]
    fn test_windows_1252_fallback() -> Result<()> {
        // 0xC9 is 'É' in Windows-1252 and invalid as a lone UTF-8 byte
        let file = write_file(b"'QC' = 'QU\xC9BEC'\n");
        let states = ReferenceReader::new().read_string_table(file.path())?;
        assert_eq!(states.entries()[0].label, "QUÉBEC");
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = ReferenceReader::new().read_string_table(Path::new("/nonexistent/states.txt"));
        assert!(matches!(result, Err(ProcessingError::SourceRead { .. })));
    }
}
