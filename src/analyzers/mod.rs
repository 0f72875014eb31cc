pub mod visit_analyzer;

pub use visit_analyzer::{format_report, GroupStats, VisitAnalyzer};
