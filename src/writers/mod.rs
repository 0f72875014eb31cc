pub mod table_store;

pub use table_store::{parse_compression, ColumnSpec, TableInfo, TableManifest, TableStore};
