mod clear;
mod index;
mod paths;
mod query;
mod stats;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stubdex_core::EngineConfig;

#[derive(Parser)]
#[command(
    name = "stubdex",
    version,
    about = "A structural stub index for source trees",
    long_about = "Stubdex builds a compact structural stub for every source file and keeps \
                  secondary indices (class names, function names, constants) in step with \
                  the stored stubs as files change."
)]
pub struct Cli {
    /// Index directory. Defaults to ~/.stubdex/indices.
    #[arg(long, global = true, value_name = "DIR")]
    pub index_dir: Option<PathBuf>,

    /// JSON engine configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project directory
    #[command(
        long_about = "Walks the project (honoring .gitignore), rebuilds the stub of every supported \
                            file and drops files that disappeared since the last run."
    )]
    Index {
        /// Path to the project root directory to index
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
    },
    /// Look up the files that contribute a value to a domain
    Query {
        /// Index domain, e.g. class.names
        domain: String,
        /// Exact value to look up
        value: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Clear the index and re-stamp builder versions
    Clear,
    /// Show per-domain statistics
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<(EngineConfig, PathBuf), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.index_dir {
        config.index_dir = Some(dir.clone());
    }
    let index_dir = config
        .index_dir
        .get_or_insert_with(EngineConfig::default_index_dir)
        .clone();
    Ok((config, index_dir))
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = stubdex_runtime::init_logging("cli", false);

    let (config, index_dir) = load_config(&cli)?;
    ensure_dir(&index_dir)?;

    match cli.command {
        Commands::Index { path } => index::run(config, &index_dir, path),
        Commands::Query { domain, value, json } => query::run(config, &index_dir, &domain, &value, json),
        Commands::Clear => clear::run(config, &index_dir),
        Commands::Stats { json } => stats::run(config, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_dir_flag_overrides_default() {
        let cli = Cli::parse_from(["stubdex", "--index-dir", "/tmp/idx", "stats", "--json"]);
        let (config, dir) = load_config(&cli).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/idx"));
        assert_eq!(config.index_dir, Some(PathBuf::from("/tmp/idx")));
        assert!(matches!(cli.command, Commands::Stats { json: true }));
    }

    #[test]
    fn test_query_arguments() {
        let cli = Cli::parse_from(["stubdex", "query", "class.names", "Engine"]);
        match cli.command {
            Commands::Query { domain, value, json } => {
                assert_eq!(domain, "class.names");
                assert_eq!(value, "Engine");
                assert!(!json);
            }
            _ => panic!("expected query"),
        }
    }
}
