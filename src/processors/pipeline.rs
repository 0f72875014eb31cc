use crate::config::PipelineConfig;
use crate::error::Result;
use crate::processors::dimension_builder::{DimensionBuilder, DimensionStats};
use crate::processors::fact_assembler::{FactAssembler, JoinAttrition};
use crate::processors::quality_gate::{QualityGate, QualityReport};
use crate::processors::staging::{StageStats, StagingCleanser};
use crate::readers::ReferenceReader;
use crate::utils::progress::ProgressReporter;
use crate::writers::TableStore;
use std::time::{Duration, Instant};
use tracing::info;
use validator::Validate;

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reference: String,
    pub immigration: StageStats,
    pub temperature: StageStats,
    pub dimensions: DimensionStats,
    pub attrition: JoinAttrition,
    pub date_rows: usize,
    pub quality: QualityReport,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Pipeline Run Summary ===\n");
        summary.push_str(&format!("{}\n", self.reference));
        summary.push_str(&format!("Staging {}\n", self.immigration));
        summary.push_str(&format!("Staging {}\n", self.temperature));
        summary.push_str(&format!(
            "Dimensions: {} countries, {} travel modes, {} visas, {} ports ({} without state)\n",
            self.dimensions.countries,
            self.dimensions.travel_modes,
            self.dimensions.visas,
            self.dimensions.ports,
            self.dimensions.ports_unmatched
        ));
        summary.push_str(&format!("Fact rows: {}\n", self.attrition.after_temperature_join));
        summary.push_str(&format!(
            "Join attrition: {} dropped at port join, {} dropped at temperature join\n",
            self.attrition.dropped_by_port_join(),
            self.attrition.dropped_by_temperature_join()
        ));
        summary.push_str(&format!("Date dimension rows: {}\n", self.date_rows));
        summary.push_str(&format!("Elapsed: {:.2?}\n", self.elapsed));
        summary.push('\n');
        summary.push_str(&self.quality.generate_summary());

        summary
    }
}

/// Runs every stage in order; each stage persists its tables before the next starts
pub struct Pipeline {
    config: PipelineConfig,
    store: TableStore,
    use_mmap: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let store = TableStore::from_config(&config)?;
        Ok(Self {
            config,
            store,
            use_mmap: false,
        })
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub async fn run(&self, progress: Option<&ProgressReporter>) -> Result<RunSummary> {
        let started = Instant::now();
        let step = |message: &str| {
            info!("{}", message);
            if let Some(p) = progress {
                p.set_message(message);
            }
        };

        step("Loading reference data...");
        let reference = ReferenceReader::load_all(&self.config).await?;
        let known_ports = reference.ports.known_codes();

        step("Staging immigration records...");
        let cleanser = StagingCleanser::new(&self.store).with_mmap(self.use_mmap);
        let immigration = cleanser.stage_immigration(&self.config.immigration_path(), &known_ports)?;

        step("Staging temperature observations...");
        let temperature = cleanser.stage_temperatures(&self.config.temperature_path())?;

        if let Some(p) = progress {
            p.println(&immigration.to_string());
            p.println(&temperature.to_string());
        }

        step("Building reference dimensions...");
        let dimensions = DimensionBuilder::new(&self.store);
        let dimension_stats = dimensions.build_reference_dimensions(&reference)?;

        step("Assembling visit facts...");
        let facts = FactAssembler::new(&self.store, self.config.max_workers).build()?;

        step("Building date dimension...");
        let date_rows = dimensions.build_date_dimension(&facts.arrival_dates)?;

        step("Running quality checks...");
        let quality = self.check()?;

        let summary = RunSummary {
            reference: reference.summary(),
            immigration,
            temperature,
            dimensions: dimension_stats,
            attrition: facts.attrition,
            date_rows,
            quality,
            elapsed: started.elapsed(),
        };

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Pipeline complete: {} fact rows",
                summary.attrition.after_temperature_join
            ));
        }
        Ok(summary)
    }

    /// Run the standard quality checklist against the persisted tables
    pub fn check(&self) -> Result<QualityReport> {
        QualityGate::standard().run(&self.store)
    }
}
