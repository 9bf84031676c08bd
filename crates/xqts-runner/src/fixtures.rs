// crates/xqts-runner/src/fixtures.rs
// ============================================================================
// Module: Fixture Loading
// Description: Directory-backed loader for fixture documents.
// Purpose: Resolve, bound, parse and cache context documents.
// Dependencies: xqts-assert, crate::{config, interfaces, request}
// ============================================================================

//! ## Overview
//! Fixture paths are relative to a root directory. Absolute paths, parent
//! components and oversized paths are rejected before touching the file
//! system. Parsed documents are cached behind [`Arc`] and shared read-only
//! between workers. Every failure is a [`HarnessFault::Fixture`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use xqts_assert::HarnessFault;
use xqts_assert::Node;
use xqts_assert::parse_document;

use crate::config::FixturesConfig;
use crate::config::MAX_PATH_COMPONENT_LENGTH;
use crate::config::MAX_TOTAL_PATH_LENGTH;
use crate::interfaces::FixtureLoader;
use crate::request::DocumentHandle;

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads fixture documents from a directory tree.
#[derive(Debug)]
pub struct DirectoryFixtureLoader {
    /// Root directory.
    root: PathBuf,
    /// Maximum document size in bytes.
    max_document_bytes: usize,
    /// Parsed documents by relative path.
    cache: Mutex<BTreeMap<String, Arc<Node>>>,
}

impl DirectoryFixtureLoader {
    /// Creates a loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, max_document_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_document_bytes,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates a loader from the fixtures section.
    #[must_use]
    pub fn from_config(config: &FixturesConfig) -> Self {
        Self::new(config.root.clone(), config.max_document_bytes)
    }

    /// Number of cached documents.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    /// Resolves a relative fixture path under the root.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, HarnessFault> {
        let fault = |reason: &str| HarnessFault::Fixture {
            path: relative_path.to_string(),
            reason: reason.to_string(),
        };
        if relative_path.trim().is_empty() {
            return Err(fault("path must be non-empty"));
        }
        if relative_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(fault("path exceeds max length"));
        }
        let path = Path::new(relative_path);
        for component in path.components() {
            match component {
                Component::Normal(part) if part.len() > MAX_PATH_COMPONENT_LENGTH => {
                    return Err(fault("path component too long"));
                }
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(fault("parent components are not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(fault("path must be relative"));
                }
            }
        }
        Ok(self.root.join(path))
    }

    /// Reads a file, failing once it exceeds the size limit.
    fn read_bounded(&self, relative_path: &str, path: &Path) -> Result<String, HarnessFault> {
        let fault = |reason: String| HarnessFault::Fixture {
            path: relative_path.to_string(),
            reason,
        };
        let file = File::open(path).map_err(|err| fault(err.to_string()))?;
        let limit = u64::try_from(self.max_document_bytes).unwrap_or(u64::MAX).saturating_add(1);
        let mut bytes = Vec::new();
        file.take(limit).read_to_end(&mut bytes).map_err(|err| fault(err.to_string()))?;
        if bytes.len() > self.max_document_bytes {
            return Err(fault(format!(
                "document exceeds size limit of {} bytes",
                self.max_document_bytes
            )));
        }
        String::from_utf8(bytes).map_err(|_| fault("document must be utf-8".to_string()))
    }
}

impl FixtureLoader for DirectoryFixtureLoader {
    fn load_document(&self, relative_path: &str) -> Result<DocumentHandle, HarnessFault> {
        if let Ok(cache) = self.cache.lock()
            && let Some(root) = cache.get(relative_path)
        {
            return Ok(DocumentHandle {
                uri: relative_path.to_string(),
                root: Arc::clone(root),
            });
        }

        let path = self.resolve(relative_path)?;
        let text = self.read_bounded(relative_path, &path)?;
        let root = Arc::new(parse_document(&text).map_err(|err| HarnessFault::Fixture {
            path: relative_path.to_string(),
            reason: err.to_string(),
        })?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(relative_path.to_string(), Arc::clone(&root));
        }
        Ok(DocumentHandle {
            uri: relative_path.to_string(),
            root,
        })
    }
}
