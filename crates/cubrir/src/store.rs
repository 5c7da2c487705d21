//! Source lookup stores for report rendering.
//!
//! Renderers that embed source text resolve file keys through a
//! [`BasePathStore`], a key-rewriting facade over an injected [`KeyStore`]
//! capability. Composition keeps the facade independent of any concrete
//! backing store.

use crate::result::{CubrirError, CubrirResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Abstract key-value store capability
pub trait KeyStore: Send + Sync {
    /// All keys the store knows about
    fn keys(&self) -> Vec<String>;

    /// Fetch the contents stored under a key
    fn get(&self, key: &str) -> CubrirResult<String>;

    /// Whether the key is present
    fn has_key(&self, key: &str) -> bool;

    /// Store contents under a key
    fn set(&mut self, key: &str, contents: String) -> CubrirResult<()>;
}

/// Filesystem-backed lookup store; keys are file paths
#[derive(Debug, Default)]
pub struct FsStore;

impl FsStore {
    /// Create a filesystem lookup store
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl KeyStore for FsStore {
    fn keys(&self) -> Vec<String> {
        // Lookup-only store; it cannot enumerate the filesystem.
        Vec::new()
    }

    fn get(&self, key: &str) -> CubrirResult<String> {
        Ok(std::fs::read_to_string(key)?)
    }

    fn has_key(&self, key: &str) -> bool {
        Path::new(key).is_file()
    }

    fn set(&mut self, _key: &str, _contents: String) -> CubrirResult<()> {
        Err(CubrirError::UnsupportedStore {
            operation: "set on filesystem lookup store".to_string(),
        })
    }
}

/// In-memory store, used in tests and for synthetic sources
#[derive(Debug, Default)]
pub struct MemStore {
    entries: BTreeMap<String, String>,
}

impl MemStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemStore {
    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> CubrirResult<String> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| CubrirError::KeyNotFound {
                key: key.to_string(),
            })
    }

    fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn set(&mut self, key: &str, contents: String) -> CubrirResult<()> {
        let _ = self.entries.insert(key.to_string(), contents);
        Ok(())
    }
}

/// Key-rewriting facade that resolves relative keys against a base path
///
/// Keys beginning with `./` are joined onto the base path before delegation;
/// all other keys pass through unchanged. No caching, no other behavior.
pub struct BasePathStore {
    base_path: PathBuf,
    delegate: Box<dyn KeyStore>,
}

impl std::fmt::Debug for BasePathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasePathStore")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

impl BasePathStore {
    /// Create a facade over the given delegate
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>, delegate: Box<dyn KeyStore>) -> Self {
        Self {
            base_path: base_path.into(),
            delegate,
        }
    }

    /// Rewrite a relative key against the base path
    #[must_use]
    pub fn to_key(&self, key: &str) -> String {
        if let Some(rest) = key.strip_prefix("./") {
            return self.base_path.join(rest).to_string_lossy().into_owned();
        }
        key.to_string()
    }

    /// Keys pass through to the delegate unmodified
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.delegate.keys()
    }

    /// Fetch contents for a (rewritten) key
    pub fn get(&self, key: &str) -> CubrirResult<String> {
        self.delegate.get(&self.to_key(key))
    }

    /// Whether the (rewritten) key is present
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.delegate.has_key(&self.to_key(key))
    }

    /// Store contents under a (rewritten) key
    pub fn set(&mut self, key: &str, contents: String) -> CubrirResult<()> {
        self.delegate.set(&self.to_key(key), contents)
    }
}
