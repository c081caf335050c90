use crate::paths::PathTable;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use stubdex_api::{FileContent, FileKind};
use stubdex_core::EngineConfig;
use stubdex_runtime::KindMap;
use tracing::{info, warn};

fn collect_files(root: &Path, kinds: &KindMap) -> Vec<(PathBuf, FileKind)> {
    WalkBuilder::new(root)
        .build()
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if !path.is_file() {
                return None;
            }
            let kind = kinds.kind_for(path)?;
            Some((path.to_path_buf(), kind))
        })
        .collect()
}

pub fn run(config: EngineConfig, index_dir: &Path, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let root = path.canonicalize()?;
    let runtime = stubdex_runtime::build_default_engine(config)?;
    let engine = &runtime.engine;

    info!("Indexing project at: {}...", root.display());
    let files = collect_files(&root, &runtime.kinds);
    let mut table = PathTable::load(index_dir)?;

    let present: HashSet<PathBuf> = files.iter().map(|(p, _)| p.clone()).collect();
    let missing = table.missing_under(&root, &present);
    for (id, gone) in &missing {
        match engine.remove(*id) {
            Ok(_) => table.remove(*id),
            Err(e) => warn!("Failed to drop {}: {}", gone.display(), e),
        }
    }

    let mut batch = Vec::with_capacity(files.len());
    for (file_path, kind) in files {
        let id = table.insert(&file_path);
        batch.push((id, file_path, kind));
    }

    let contents: Vec<_> = batch
        .into_par_iter()
        .filter_map(|(id, file_path, kind)| match std::fs::read(&file_path) {
            Ok(bytes) => Some((id, FileContent::new(kind, bytes))),
            Err(e) => {
                warn!("Failed to read {}: {}", file_path.display(), e);
                None
            }
        })
        .collect();

    let total = contents.len();
    let mut with_stub = 0;
    let mut failed = 0;
    for (id, result) in engine.update_many(contents) {
        match result {
            Ok(outcome) if outcome.has_stub => with_stub += 1,
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                let shown = table
                    .get(id)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| id.to_string());
                warn!("Failed to index {}: {}", shown, e);
            }
        }
    }

    table.save(index_dir)?;
    engine.dispose()?;

    info!("Indexing complete!");
    println!(
        "Indexed {} files ({} with stubs, {} failed, {} removed) into {}",
        total,
        with_stub,
        failed,
        missing.len(),
        index_dir.display()
    );
    Ok(())
}
