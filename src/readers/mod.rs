pub mod immigration_reader;
pub mod reference_reader;
pub mod temperature_reader;

pub use immigration_reader::ImmigrationReader;
pub use reference_reader::ReferenceReader;
pub use temperature_reader::TemperatureReader;
