/// Reporting period every staged and fact row is scoped to
pub const REPORTING_YEAR: i32 = 2016;
pub const REPORTING_MONTH: u32 = 4;

/// Country kept by the temperature stage
pub const TEMPERATURE_COUNTRY: &str = "US";

/// Epoch of SAS date values (days since 1960-01-01)
pub const SAS_EPOCH: (i32, u32, u32) = (1960, 1, 1);

/// Canonical labels for placeholder reference entries
pub const OTHER_COUNTRIES_LABEL: &str = "Other countries";
pub const OTHER_PORTS_LABEL: &str = "Other US ports";

/// Label prefixes collapsed into the canonical labels (case-sensitive)
pub const COUNTRY_PLACEHOLDER_PREFIXES: &[&str] = &["No Country", "INVALID", "Collapsed"];
pub const PORT_PLACEHOLDER_PREFIXES: &[&str] = &["No PORT Code", "Collapsed"];

/// Default source locations, relative to the input root
pub const DEFAULT_IMMIGRATION_SOURCE: &str = "sas_data";
pub const DEFAULT_TEMPERATURE_SOURCE: &str = "city_temperature.csv";
pub const DEFAULT_COUNTRIES_SOURCE: &str = "map/I94-country-codes.txt";
pub const DEFAULT_TRAVEL_MODES_SOURCE: &str = "map/I94-travel_modes.txt";
pub const DEFAULT_VISAS_SOURCE: &str = "map/I94-us_visas.txt";
pub const DEFAULT_PORTS_SOURCE: &str = "map/I94-us_ports.txt";
pub const DEFAULT_STATES_SOURCE: &str = "map/I94-us_states.txt";

/// Table names under the output root
pub const STAGE_IMMIGRATION_TABLE: &str = "stage_i94_immigration";
pub const STAGE_TEMPERATURE_TABLE: &str = "stage_city_temperatures";
pub const DIM_COUNTRIES_TABLE: &str = "dim_countries";
pub const DIM_TRAVEL_MODES_TABLE: &str = "dim_travel_modes";
pub const DIM_VISAS_TABLE: &str = "dim_us_visas";
pub const DIM_PORTS_TABLE: &str = "dim_us_ports";
pub const DIM_DATE_TABLE: &str = "dim_date";
pub const FACT_VISITS_TABLE: &str = "fact_i94_visits";

/// Persisted layout
pub const MANIFEST_FILE: &str = "_manifest.json";
pub const DATA_FILE: &str = "part-00000.parquet";
pub const NULL_PARTITION: &str = "__NULL__";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
