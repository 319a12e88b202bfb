//! Class document loading, validation, and persistence.
//!
//! Unlike the shared registry, a malformed class document is fatal:
//! the run stops before any mutation rather than guessing at intent.

use crate::store::save_json_atomic;
use crate::types::{normalize_variants, ClassDocument};
use crate::{Error, Result};
use std::path::Path;

impl ClassDocument {
    /// Load and validate a class document.
    ///
    /// Chunks are trimmed and variant lists normalized as part of
    /// loading. Structural problems (empty class name, empty or
    /// duplicate chunks) surface as [`Error::Validation`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut doc: ClassDocument = serde_json::from_str(&contents)?;
        doc.normalize();

        let problems = doc.validate();
        if !problems.is_empty() {
            return Err(Error::Validation(format!(
                "class document {:?}: {}",
                path,
                problems.join("; ")
            )));
        }

        tracing::debug!(
            "Loaded class document '{}' ({} entries) from {:?}",
            doc.class,
            doc.entries.len(),
            path
        );
        Ok(doc)
    }

    fn normalize(&mut self) {
        self.class = self.class.trim().to_string();
        for unit in &mut self.entries {
            unit.chunk = unit.chunk.trim().to_string();
            unit.id = unit.id.trim().to_string();
            unit.variants = normalize_variants(&unit.variants);
        }
    }

    /// Validate structural invariants.
    ///
    /// Returns a list of problems, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.class.is_empty() {
            problems.push("class identifier is empty".to_string());
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.entries.len());
        for (idx, unit) in self.entries.iter().enumerate() {
            if unit.chunk.is_empty() {
                problems.push(format!("entry {} has an empty chunk", idx));
                continue;
            }
            if seen.contains(&unit.chunk.as_str()) {
                problems.push(format!("duplicate chunk '{}'", unit.chunk));
            } else {
                seen.push(&unit.chunk);
            }
        }

        problems
    }

    /// Atomically persist the document as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_json_atomic(path, self, "class document")
    }
}
