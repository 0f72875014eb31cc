pub mod dimension_builder;
pub mod fact_assembler;
pub mod pipeline;
pub mod quality_gate;
pub mod staging;

pub use dimension_builder::{DimensionBuilder, DimensionStats};
pub use fact_assembler::{assemble_visits, FactAssembler, FactOutput, JoinAttrition};
pub use pipeline::{Pipeline, RunSummary};
pub use quality_gate::{QualityCheck, QualityGate, QualityReport};
pub use staging::{drop_duplicates, StageStats, StagingCleanser};
