use crate::paths::PathTable;
use serde::Serialize;
use std::path::Path;
use stubdex_api::IndexDomain;
use stubdex_core::EngineConfig;
use tabled::{Table, Tabled};

/// One file that contributes the queried value.
#[derive(Debug, Serialize, Tabled)]
pub struct QueryRow {
    pub file: u64,
    pub path: String,
    pub occurrences: String,
}

pub fn run(
    config: EngineConfig,
    index_dir: &Path,
    domain: &str,
    value: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = stubdex_runtime::build_default_engine(config)?;
    let table = PathTable::load(index_dir)?;
    let domain = IndexDomain::from(domain);

    let rows: Vec<QueryRow> = runtime
        .engine
        .query(&domain, value)?
        .into_iter()
        .map(|(file, list)| QueryRow {
            file: file.as_u64(),
            path: table
                .get(file)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            occurrences: list
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No files contribute '{}' to {}", value, domain);
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}
