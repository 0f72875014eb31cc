pub mod dimension;
pub mod fact;
pub mod immigration;
pub mod reference;
pub mod table;
pub mod temperature;

pub use dimension::{CodeLabelDim, CountryDim, DateDim, PortDim, TravelModeDim, VisaDim};
pub use fact::FactVisit;
pub use immigration::ImmigrationRecord;
pub use reference::{PortEntry, PortTable, ReferenceData, ReferenceEntry, ReferenceTable};
pub use table::{ColumnType, TableRecord};
pub use temperature::TemperatureObservation;
