use anyhow::Result;
use chartkit::IndexKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// ENC chart inspection, query and loading tool
#[derive(Parser)]
#[command(name = "chartkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing ENC cells (.000, .000.gz or .zip)
    #[arg(short, long, env = "CHARTKIT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Maximum loaded charts in cache
    #[arg(
        short,
        long,
        env = "CHARTKIT_CACHE_SIZE",
        default_value = "32",
        global = true
    )]
    cache_size: u64,

    /// Spatial index built for each chart (tree or linear)
    #[arg(long, env = "CHARTKIT_INDEX", default_value = "tree", global = true)]
    index: IndexKind,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Geojson,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the records, features and decode errors of a cell
    Inspect {
        /// Path to a .000, .000.gz or .zip cell
        file: PathBuf,

        /// List every decode error and skipped feature
        #[arg(short, long)]
        verbose: bool,

        /// Output the summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Query the features of a cell inside a bounding box
    Query {
        /// Path to a .000, .000.gz or .zip cell
        file: PathBuf,

        /// Northern boundary latitude
        #[arg(long, allow_hyphen_values = true)]
        north: f64,

        /// Southern boundary latitude
        #[arg(long, allow_hyphen_values = true)]
        south: f64,

        /// Eastern boundary longitude
        #[arg(long, allow_hyphen_values = true)]
        east: f64,

        /// Western boundary longitude
        #[arg(long, allow_hyphen_values = true)]
        west: f64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load charts from the data directory through the load queue
    Load {
        /// Chart ids to load; all discovered charts if omitted
        chart_ids: Vec<String>,

        /// Output results as JSON lines
        #[arg(short, long)]
        json: bool,
    },

    /// List ENC cells in the data directory
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            file,
            verbose,
            json,
        } => commands::inspect::run(file, verbose, json),
        Commands::Query {
            file,
            north,
            south,
            east,
            west,
            format,
            output,
        } => commands::query::run(
            file,
            cli.index,
            [north, south, east, west],
            format,
            output,
        ),
        Commands::Load { chart_ids, json } => {
            commands::load::run(cli.data_dir, cli.cache_size, cli.index, chart_ids, json)
        }
        Commands::List => commands::list::run(cli.data_dir),
    }
}
