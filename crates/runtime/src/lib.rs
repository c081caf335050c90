use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use stubdex_api::FileKind;
use stubdex_core::{EngineConfig, StubIndexEngine, StubIndexEngineBuilder};
use stubdex_plugin::StubBuilder;

/// Every stub builder shipped with stubdex.
pub fn default_builders() -> Vec<Arc<dyn StubBuilder>> {
    let mut builders: Vec<Arc<dyn StubBuilder>> = Vec::new();
    match stubdex_outline::OutlineStubBuilder::new() {
        Ok(builder) => builders.push(Arc::new(builder)),
        Err(e) => tracing::error!("Failed to load outline stub builder: {}", e),
    }
    builders
}

/// Maps file extensions to the kind of the builder that claims them.
#[derive(Debug, Default, Clone)]
pub struct KindMap {
    by_extension: HashMap<String, FileKind>,
}

impl KindMap {
    pub fn from_builders(builders: &[Arc<dyn StubBuilder>]) -> Self {
        let mut by_extension = HashMap::new();
        for builder in builders {
            for ext in builder.extensions() {
                by_extension
                    .entry(ext.to_ascii_lowercase())
                    .or_insert_with(|| builder.kind());
            }
        }
        Self { by_extension }
    }

    pub fn kind_for(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

/// An engine together with the extension map of its builders.
pub struct StubRuntime {
    pub engine: StubIndexEngine,
    pub kinds: KindMap,
}

pub fn engine_builder(config: EngineConfig, builders: &[Arc<dyn StubBuilder>]) -> StubIndexEngineBuilder {
    builders
        .iter()
        .cloned()
        .fold(StubIndexEngine::builder(config), |b, builder| b.with_stub_builder(builder))
}

/// Bootstraps an engine with every available stub builder.
pub fn build_default_engine(config: EngineConfig) -> stubdex_core::Result<StubRuntime> {
    let builders = default_builders();
    let kinds = KindMap::from_builders(&builders);
    let engine = engine_builder(config, &builders).build()?;
    Ok(StubRuntime { engine, kinds })
}

/// Initializes logging for a binary under the default log directory.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<impl Drop> {
    stubdex_core::logging::init_logging(component, &EngineConfig::default_log_dir(), to_stderr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubdex_api::{FileContent, FileId, IndexDomain};
    use tempfile::TempDir;

    #[test]
    fn test_kind_map_uses_builder_extensions() {
        let kinds = KindMap::from_builders(&default_builders());
        assert!(!kinds.is_empty());
        assert_eq!(
            kinds.kind_for(Path::new("src/Main.JAVA")),
            Some(stubdex_outline::OUTLINE_KIND)
        );
        assert_eq!(kinds.kind_for(Path::new("README.md")), None);
        assert_eq!(kinds.kind_for(Path::new("Makefile")), None);
    }

    #[test]
    fn test_default_engine_indexes_outline_files() {
        let temp = TempDir::new().unwrap();
        let runtime = build_default_engine(EngineConfig::at(temp.path())).unwrap();
        let path = Path::new("lib.rs");
        let kind = runtime.kinds.kind_for(path).unwrap();
        let content = FileContent::from_text(kind, "pub struct Engine;\nimpl Engine {\n    pub fn start(&self) {}\n}\n");

        runtime.engine.update(FileId::new(1), &content).unwrap();
        let hits = runtime
            .engine
            .query(&IndexDomain::from("fn.names"), "start")
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, FileId::new(1));
    }
}
