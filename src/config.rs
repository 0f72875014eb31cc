use crate::error::{ProcessingError, Result};
use crate::utils::constants::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

/// Default configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "i94.toml";

/// Environment variable prefix, e.g. `I94_OUTPUT_ROOT` or `I94_SOURCES__PORTS`
pub const ENV_PREFIX: &str = "I94";

/// Run configuration, built once at startup and passed to every stage
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_root: PathBuf,

    pub output_root: PathBuf,

    #[validate(length(min = 1))]
    pub compression: String,

    #[validate(range(min = 1))]
    pub max_workers: usize,

    #[validate(nested)]
    pub sources: SourcePaths,
}

/// Raw source locations relative to `input_root`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourcePaths {
    #[validate(length(min = 1))]
    pub immigration: String,
    #[validate(length(min = 1))]
    pub temperature: String,
    #[validate(length(min = 1))]
    pub countries: String,
    #[validate(length(min = 1))]
    pub travel_modes: String,
    #[validate(length(min = 1))]
    pub visas: String,
    #[validate(length(min = 1))]
    pub ports: String,
    #[validate(length(min = 1))]
    pub states: String,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            immigration: DEFAULT_IMMIGRATION_SOURCE.to_string(),
            temperature: DEFAULT_TEMPERATURE_SOURCE.to_string(),
            countries: DEFAULT_COUNTRIES_SOURCE.to_string(),
            travel_modes: DEFAULT_TRAVEL_MODES_SOURCE.to_string(),
            visas: DEFAULT_VISAS_SOURCE.to_string(),
            ports: DEFAULT_PORTS_SOURCE.to_string(),
            states: DEFAULT_STATES_SOURCE.to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("data"),
            output_root: PathBuf::from("output"),
            compression: COMPRESSION_SNAPPY.to_string(),
            max_workers: num_cpus::get(),
            sources: SourcePaths::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            ..Self::default()
        }
    }

    /// Layer defaults, an optional TOML file and `I94_*` environment variables
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file_source = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ProcessingError::Config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                config::File::from(path).required(true)
            }
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PipelineConfig = settings.try_deserialize()?;
        config.validate()?;

        debug!(?config, "Loaded pipeline configuration");
        Ok(config)
    }

    pub fn with_input_root(mut self, input_root: impl Into<PathBuf>) -> Self {
        self.input_root = input_root.into();
        self
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = compression.into();
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn immigration_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.immigration)
    }

    pub fn temperature_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.temperature)
    }

    pub fn countries_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.countries)
    }

    pub fn travel_modes_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.travel_modes)
    }

    pub fn visas_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.visas)
    }

    pub fn ports_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.ports)
    }

    pub fn states_path(&self) -> PathBuf {
        self.input_root.join(&self.sources.states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Loading reads the process environment, so tests that call `load` take turns
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig::new("/data", "/out");
        assert_eq!(
            config.ports_path(),
            PathBuf::from("/data/map/I94-us_ports.txt")
        );
        assert_eq!(
            config.temperature_path(),
            PathBuf::from("/data/city_temperature.csv")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "input_root = \"/srv/raw\"")?;
        writeln!(file, "output_root = \"/srv/lake\"")?;
        writeln!(file, "max_workers = 3")?;
        writeln!(file, "[sources]")?;
        writeln!(file, "immigration = \"i94_apr16_sub.csv\"")?;

        let config = PipelineConfig::load(Some(file.path()))?;

        assert_eq!(config.input_root, PathBuf::from("/srv/raw"));
        assert_eq!(config.output_root, PathBuf::from("/srv/lake"));
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.sources.immigration, "i94_apr16_sub.csv");
        // Untouched keys keep their defaults
        assert_eq!(config.sources.states, DEFAULT_STATES_SOURCE);
        assert_eq!(config.compression, COMPRESSION_SNAPPY);

        Ok(())
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/i94.toml")));
        assert!(matches!(result, Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_load_from_environment() -> Result<()> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("I94_OUTPUT_ROOT", "/env/out");
        std::env::set_var("I94_SOURCES__PORTS", "ports.txt");
        std::env::set_var("I94_MAX_WORKERS", "7");

        let loaded = PipelineConfig::load(None);

        std::env::remove_var("I94_OUTPUT_ROOT");
        std::env::remove_var("I94_SOURCES__PORTS");
        std::env::remove_var("I94_MAX_WORKERS");

        let config = loaded?;
        assert_eq!(config.output_root, PathBuf::from("/env/out"));
        assert_eq!(config.sources.ports, "ports.txt");
        assert_eq!(config.max_workers, 7);
        assert_eq!(config.sources.states, DEFAULT_STATES_SOURCE);
        Ok(())
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = PipelineConfig::default().with_max_workers(0);
        assert!(config.validate().is_err());
    }
}
