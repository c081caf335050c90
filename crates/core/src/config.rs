use crate::error::{Result, StubIndexError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stubdex_api::IndexDomain;

pub const DEFAULT_INDEX_DIR: &str = ".stubdex/indices";
pub const DEFAULT_LOG_DIR: &str = ".stubdex/logs";
pub const INDEX_DIR_ENV: &str = "STUBDEX_INDEX_DIR";

/// Which domain write locks an update takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// Every domain, in ascending order. Serializes all index writers.
    #[default]
    AllDomains,
    /// Only the domains the old and new stub touch, still in ascending order.
    Affected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where stubs, domain indices, names and version stamps live.
    /// `None` keeps everything in memory.
    pub index_dir: Option<PathBuf>,

    /// Domains known up front, in addition to those declared by stub builders.
    pub domains: Vec<IndexDomain>,

    /// Put an in-memory overlay in front of the primary backend.
    pub overlay: bool,

    /// Initial buffering state of the overlay. Ignored without `overlay`.
    pub buffering: bool,

    pub lock_scope: LockScope,

    /// Clear everything when persisted version stamps disagree with the
    /// registered builders. When false the engine refuses updates instead.
    pub auto_clear_on_version_mismatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            domains: Vec::new(),
            overlay: false,
            buffering: false,
            lock_scope: LockScope::AllDomains,
            auto_clear_on_version_mismatch: true,
        }
    }
}

impl EngineConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn at(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: Some(index_dir.into()),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<IndexDomain>) -> Self {
        self.domains.push(domain.into());
        self
    }

    pub fn with_overlay(mut self, buffering: bool) -> Self {
        self.overlay = true;
        self.buffering = buffering;
        self
    }

    pub fn with_lock_scope(mut self, scope: LockScope) -> Self {
        self.lock_scope = scope;
        self
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| StubIndexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Base index directory, honouring `STUBDEX_INDEX_DIR`.
    pub fn default_index_dir() -> PathBuf {
        if let Ok(env_dir) = std::env::var(INDEX_DIR_ENV) {
            return PathBuf::from(env_dir);
        }
        home_dir().join(DEFAULT_INDEX_DIR)
    }

    pub fn default_log_dir() -> PathBuf {
        home_dir().join(DEFAULT_LOG_DIR)
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.index_dir.is_none());
        assert_eq!(config.lock_scope, LockScope::AllDomains);
        assert!(config.auto_clear_on_version_mismatch);
        assert!(!config.overlay);
    }

    #[test]
    fn test_from_json_file_fills_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stubdex.json");
        std::fs::write(
            &path,
            r#"{ "domains": ["class.names"], "lock_scope": "affected", "overlay": true }"#,
        )
        .unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.domains, vec![IndexDomain::from("class.names")]);
        assert_eq!(config.lock_scope, LockScope::Affected);
        assert!(config.overlay);
        assert!(!config.buffering);
        assert!(config.auto_clear_on_version_mismatch);
    }

    #[test]
    fn test_from_json_file_reports_bad_input() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = EngineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, StubIndexError::Config(_)));
    }
}
