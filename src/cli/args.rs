use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "i94-processor")]
#[command(about = "Star-schema ETL for I-94 arrivals enriched with US city temperatures")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Suppress progress spinners")]
    pub quiet: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: i94.toml if present]"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding the raw sources")]
    pub input_root: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory receiving the Parquet tables")]
    pub output_root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: stage, build dimensions and facts, then check quality
    Run {
        #[arg(long, help = "Parquet compression (snappy, gzip, lz4, zstd, none)")]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, default_value = "false", help = "Memory-map the temperature CSV")]
        mmap: bool,
    },

    /// Run the quality checks against previously written tables
    Check,

    /// Print the sample arrival and temperature reports
    Report {
        #[arg(short, long, default_value = "CA", help = "State code for the city report")]
        state: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Display information about a written table
    Info {
        #[arg(short, long)]
        table: String,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}
