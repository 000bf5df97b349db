//! scenario-ingest CLI — load financial-crime scenarios into the bank schema
//! and its graph mirror.
//!
//! Usage:
//!   scenario-ingest bootstrap [--db path] [--graph-db path]
//!   scenario-ingest load <files...> [--ground-truth] [--config file] [--env name]
//!   scenario-ingest search <name> [--label Person]
//!   scenario-ingest stats

use clap::{Parser, Subcommand};
use scenario_ingest::graph::NodeLabel;
use scenario_ingest::normalize::lookup;
use scenario_ingest::{IngestConfig, IngestService};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scenario-ingest",
    version,
    about = "Load synthetic financial-crime scenarios into a bank schema and graph mirror"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Environment section of the configuration file
    #[arg(long, global = true)]
    env: Option<String>,
    /// Path to the relational SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to the graph SQLite database
    #[arg(long, global = true)]
    graph_db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the relational schema and graph indexes
    Bootstrap,
    /// Ingest scenario JSON files
    Load {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Populate hidden ground-truth columns
        #[arg(long)]
        ground_truth: bool,
    },
    /// Fuzzy name search in the graph
    Search {
        name: String,
        /// Restrict to one node label (Person, Company, Address, ...)
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Row counts per table
    Stats,
}

/// Default data directory (~/.local/share/scenario-ingest)
fn default_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("scenario-ingest");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn resolve_config(cli: &Cli) -> Result<IngestConfig, String> {
    let mut config = match &cli.config {
        Some(path) => IngestConfig::load(path, cli.env.as_deref())
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => {
            let dir = default_data_dir();
            IngestConfig {
                database: dir.join("bank.db"),
                graph_database: dir.join("graph.db"),
                ..IngestConfig::default()
            }
        }
    };
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    if let Some(graph_db) = &cli.graph_db {
        config.graph_database = graph_db.clone();
    }
    Ok(config)
}

fn open_service(config: IngestConfig) -> Result<IngestService, String> {
    IngestService::open(config).map_err(|e| format!("Failed to open stores: {}", e))
}

fn cmd_bootstrap(service: &IngestService) -> i32 {
    match service.bootstrap() {
        Ok(()) => {
            println!(
                "Bootstrapped {} and {}",
                service.config().database.display(),
                service.config().graph_database.display()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_load(service: &IngestService, files: &[PathBuf]) -> i32 {
    if let Err(e) = service.bootstrap() {
        eprintln!("Error: {}", e);
        return 1;
    }
    let mut code = 0;
    for file in files {
        match service.ingest_path(file) {
            Ok(outcome) => {
                println!("{} ({})", file.display(), outcome.report.scenario_id);
                for batch in &outcome.report.batches {
                    let note = match &batch.aborted {
                        Some(reason) => format!("  rolled back: {}", reason),
                        None => String::new(),
                    };
                    println!(
                        "  {:<16} {:>6} inserted {:>6} skipped {:>6} dropped {:>6} failed{}",
                        batch.category.as_str(),
                        batch.inserted,
                        batch.skipped,
                        batch.dropped.len(),
                        batch.failed.len(),
                        note
                    );
                }
                match &outcome.graph {
                    Ok(graph) => println!("  graph: {} nodes, {} edges", graph.nodes, graph.edges),
                    Err(e) => println!("  graph: projection failed: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Error: {}: {}", file.display(), e);
                code = 1;
            }
        }
    }
    code
}

fn cmd_search(service: &IngestService, name: &str, label: Option<&str>) -> i32 {
    let label = match label {
        Some(raw) => match lookup::<NodeLabel>(raw) {
            Some(label) => Some(label),
            None => {
                eprintln!("Error: unknown label '{}'", raw);
                return 1;
            }
        },
        None => None,
    };
    match service.search(name, label) {
        Ok(nodes) if nodes.is_empty() => {
            println!("No matches.");
            0
        }
        Ok(nodes) => {
            println!("{:<36}  {:<40}  {}", "ID", "NAME", "LABELS");
            println!("{}", "-".repeat(96));
            for node in nodes {
                let labels: Vec<String> = node.labels.iter().map(|l| l.to_string()).collect();
                println!(
                    "{:<36}  {:<40}  {}",
                    node.id,
                    node.name().unwrap_or("-"),
                    labels.join(",")
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_stats(service: &IngestService) -> i32 {
    let tables = match service.statistics() {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("{:<24}  {:>10}", "TABLE", "ROWS");
    println!("{}", "-".repeat(36));
    for (table, rows) in tables {
        println!("{:<24}  {:>10}", table, rows);
    }
    match service.graph().counts() {
        Ok((nodes, edges)) => {
            println!("{:<24}  {:>10}", "graph nodes", nodes);
            println!("{:<24}  {:>10}", "graph edges", edges);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Commands::Load { ground_truth: true, .. } = cli.command {
        config.include_ground_truth = true;
    }
    if let Commands::Search { limit: Some(limit), .. } = cli.command {
        config.graph.search_limit = limit.max(1);
    }

    let service = match open_service(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match &cli.command {
        Commands::Bootstrap => cmd_bootstrap(&service),
        Commands::Load { files, .. } => cmd_load(&service, files),
        Commands::Search { name, label, .. } => cmd_search(&service, name, label.as_deref()),
        Commands::Stats => cmd_stats(&service),
    };
    std::process::exit(code);
}
