//! Shared registry persistence with bootstrap fallback.
//!
//! The registry is the cross-class source of truth for which chunks
//! already have an external card. A missing or unreadable backing file
//! must not fail the whole program: first runs bootstrap from an empty
//! registry and the next successful sync writes a fresh one.

use crate::collate;
use crate::store::save_json_atomic;
use crate::types::{normalize_variants, Registry, RegistryEntry};
use crate::Result;
use fs2::FileExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

impl Registry {
    /// Load the registry from a file with shared locking.
    ///
    /// Falls back to the empty registry (version 1, no entries) when
    /// the file is missing, unreadable, unparseable, or structurally
    /// invalid, logging a warning for every fallback path.
    pub fn load_or_bootstrap(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No registry found at {:?}, bootstrapping empty", path);
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open registry {:?}: {}. Bootstrapping empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        // Acquire shared lock for reading
        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock registry {:?}: {}. Bootstrapping empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read registry {:?}: {}. Bootstrapping empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        let mut registry = match serde_json::from_str::<Registry>(&contents) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse registry {:?}: {}. Bootstrapping empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        registry.normalize();
        let problems = registry.validate();
        if !problems.is_empty() {
            tracing::warn!(
                "Registry {:?} failed validation ({}). Bootstrapping empty.",
                path,
                problems.join("; ")
            );
            return Ok(Self::default());
        }

        tracing::debug!(
            "Loaded registry ({} entries) from {:?}",
            registry.entries.len(),
            path
        );
        Ok(registry)
    }

    fn normalize(&mut self) {
        for entry in &mut self.entries {
            entry.chunk = entry.chunk.trim().to_string();
            entry.id = entry.id.trim().to_string();
            entry.variants = normalize_variants(&entry.variants);
        }
    }

    /// Validate structural invariants.
    ///
    /// Returns a list of problems, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen: Vec<&str> = Vec::with_capacity(self.entries.len());
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.chunk.is_empty() {
                problems.push(format!("entry {} has an empty chunk", idx));
                continue;
            }
            if seen.contains(&entry.chunk.as_str()) {
                problems.push(format!("duplicate chunk '{}'", entry.chunk));
            } else {
                seen.push(&entry.chunk);
            }
        }

        problems
    }

    /// Exact-key lookup.
    pub fn entry(&self, chunk: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.chunk == chunk)
    }

    /// Exact-key lookup, mutable.
    pub fn entry_mut(&mut self, chunk: &str) -> Option<&mut RegistryEntry> {
        self.entries.iter_mut().find(|e| e.chunk == chunk)
    }

    /// Append a new entry. The caller guarantees the chunk is not
    /// already present.
    pub fn insert(&mut self, entry: RegistryEntry) {
        self.entries.push(entry);
    }

    /// Sort entries ascending by chunk under the locale-aware
    /// comparator, for stable diffs of the persisted file.
    pub fn sort_entries(&mut self) {
        self.entries
            .sort_by(|a, b| collate::compare(&a.chunk, &b.chunk));
    }

    /// Atomically persist the registry as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json_atomic(path, self, "registry")
    }
}
