#![allow(dead_code)]

use smol_str::SmolStr;
use std::sync::Arc;
use stubdex_api::{FileContent, FileId, FileKind, IndexDomain, StubTree};
use stubdex_core::{EngineConfig, StubIndexEngine};
use stubdex_plugin::{BuildError, StubBuilder};

pub const KEYS_KIND: FileKind = FileKind::from_static("keys");
pub const CLASSES: IndexDomain = IndexDomain::from_static("class.names");
pub const FUNCTIONS: IndexDomain = IndexDomain::from_static("fn.names");
pub const CONSTANTS: IndexDomain = IndexDomain::from_static("const.names");

/// Builds one node per `domain=value` line. A line `!error` makes the build
/// fail; `!skip` as the first line is rejected by `accepts`.
pub struct KeyListBuilder {
    pub version: u32,
}

impl StubBuilder for KeyListBuilder {
    fn kind(&self) -> FileKind {
        KEYS_KIND
    }

    fn stub_version(&self) -> u32 {
        self.version
    }

    fn domains(&self) -> Vec<IndexDomain> {
        vec![CLASSES, FUNCTIONS, CONSTANTS]
    }

    fn accepts(&self, content: &FileContent) -> bool {
        !content.text().unwrap_or_default().starts_with("!skip")
    }

    fn build(&self, content: &FileContent) -> Result<Option<StubTree>, BuildError> {
        let text = content
            .text()
            .ok_or_else(|| BuildError::Malformed("not UTF-8".to_string()))?;
        let mut tree = StubTree::new("keys");
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line == "!error" {
                return Err(BuildError::Malformed("requested failure".to_string()));
            }
            let Some((domain, value)) = line.split_once('=') else {
                continue;
            };
            let id = tree.add_child(tree.root(), "entry", Some(SmolStr::new(value)));
            tree.index(id, IndexDomain::from(domain), value);
        }
        if tree.is_empty() {
            return Ok(None);
        }
        Ok(Some(tree))
    }
}

pub fn keys(text: &str) -> FileContent {
    FileContent::from_text(KEYS_KIND, text)
}

pub fn file(id: u64) -> FileId {
    FileId::new(id)
}

pub fn builder(config: EngineConfig) -> stubdex_core::StubIndexEngineBuilder {
    StubIndexEngine::builder(config).with_stub_builder(Arc::new(KeyListBuilder { version: 1 }))
}

pub fn memory_engine() -> StubIndexEngine {
    builder(EngineConfig::in_memory()).build().unwrap()
}

/// File ids contributing `value` to `domain`.
pub fn files_for(engine: &StubIndexEngine, domain: &IndexDomain, value: &str) -> Vec<u64> {
    engine
        .query(domain, value)
        .unwrap()
        .into_iter()
        .map(|(file, _)| file.as_u64())
        .collect()
}

/// Every (domain, value) pair `file` currently contributes to.
pub fn contributions_of(engine: &StubIndexEngine, target: FileId) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for domain in engine.domains() {
        for value in engine.values(domain).unwrap() {
            let hit = engine
                .query(domain, &value)
                .unwrap()
                .iter()
                .any(|(f, _)| *f == target);
            if hit {
                found.push((domain.to_string(), value.to_string()));
            }
        }
    }
    found
}
