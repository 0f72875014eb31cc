use crate::analyzers::{format_report, VisitAnalyzer};
use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::processors::{Pipeline, QualityGate};
use crate::utils::progress::ProgressReporter;
use crate::writers::TableStore;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, Level};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            compression,
            max_workers,
            mmap,
        } => {
            let mut config = config;
            if let Some(compression) = compression {
                config = config.with_compression(compression);
            }
            if let Some(max_workers) = max_workers {
                config = config.with_max_workers(max_workers);
            }

            println!("Running I-94 pipeline...");
            println!("Input root: {}", config.input_root.display());
            println!("Output root: {}", config.output_root.display());
            println!(
                "Workers: {}, Compression: {}",
                config.max_workers, config.compression
            );

            let progress = ProgressReporter::new_spinner("Starting pipeline...", cli.quiet);
            let pipeline = Pipeline::new(config)?.with_mmap(mmap);
            let summary = pipeline.run(Some(&progress)).await?;

            println!("\n{}", summary.generate_summary());
            println!("Pipeline complete!");
        }

        Commands::Check => {
            println!("Checking tables in {}", config.output_root.display());

            let store = TableStore::from_config(&config)?;
            let report = QualityGate::standard().run(&store)?;

            println!("\n{}", report.generate_summary());
            println!("✅ All quality checks passed");
        }

        Commands::Report { state, limit } => {
            let store = TableStore::from_config(&config)?;
            let analyzer = VisitAnalyzer::load(&store)?;

            println!(
                "\n{}",
                format_report(
                    &format!("Top {limit} states by number of arrivals"),
                    "state_name",
                    &analyzer.top_states_by_arrivals(limit),
                )
            );
            println!(
                "{}",
                format_report(
                    &format!("Top {} warmest states", limit.min(5)),
                    "state_name",
                    &analyzer.warmest_states(limit.min(5)),
                )
            );
            println!(
                "{}",
                format_report(
                    &format!("Top cities in {state} by number of arrivals"),
                    "city",
                    &analyzer.top_cities_in_state(&state, limit),
                )
            );
        }

        Commands::Info { table, sample } => {
            println!("Analyzing table: {}", table);

            let store = TableStore::from_config(&config)?;
            let info = store.file_info(&table)?;
            println!("\n{}", info.summary());

            if sample > 0 {
                println!("\nSample Records (showing up to {} records):", sample);
                match store.read_batches(&table) {
                    Ok(batches) => print_sample(&batches, sample)?,
                    Err(e) => println!("Error reading sample data: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(input_root) = &cli.input_root {
        config = config.with_input_root(input_root);
    }
    if let Some(output_root) = &cli.output_root {
        config = config.with_output_root(output_root);
    }
    Ok(config)
}

/// Install the global tracing subscriber; a log file gets plain text without colors
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| ProcessingError::Config(format!("Failed to initialise logging: {e}")))?;
    info!("Logging initialised at {} level", level);
    Ok(())
}

fn print_sample(batches: &[RecordBatch], limit: usize) -> Result<()> {
    let options = FormatOptions::default().with_null("null");
    let mut printed = 0;

    for batch in batches {
        let schema = batch.schema();
        let formatters = batch
            .columns()
            .iter()
            .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            if printed >= limit {
                return Ok(());
            }
            let fields: Vec<String> = schema
                .fields()
                .iter()
                .zip(&formatters)
                .map(|(field, formatter)| format!("{}={}", field.name(), formatter.value(row)))
                .collect();
            printed += 1;
            println!("{}. {}", printed, fields.join(", "));
        }
    }

    Ok(())
}
