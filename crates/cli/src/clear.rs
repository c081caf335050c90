use crate::paths::PathTable;
use std::path::Path;
use stubdex_core::EngineConfig;
use tracing::info;

pub fn run(config: EngineConfig, index_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = stubdex_runtime::build_default_engine(config)?;
    info!("Clearing index at: {}...", index_dir.display());
    runtime.engine.clear()?;
    runtime.engine.dispose()?;

    let mut table = PathTable::load(index_dir)?;
    table.clear();
    table.save(index_dir)?;

    info!("Index cleared.");
    println!("Cleared index at {}", index_dir.display());
    Ok(())
}
