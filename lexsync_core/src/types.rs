//! Core domain types for the lexsync system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Vocabulary units and the per-class documents that hold them
//! - The shared cross-class registry and its entries
//! - Variant-set helpers (normalization and union)
//! - Sync run outcomes

use serde::{Deserialize, Serialize};

// ============================================================================
// Unit and Document Types
// ============================================================================

/// A single vocabulary unit within a class document.
///
/// `chunk` is the normalized text key, unique within its document.
/// An empty `id` means the unit has not been provisioned externally yet;
/// that state never survives a successful run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabUnit {
    pub chunk: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub variants: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs: Option<String>,
}

/// A per-class list of vocabulary units.
///
/// Entry order is authored externally and preserved across runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDocument {
    pub class: String,
    pub entries: Vec<VocabUnit>,
}

// ============================================================================
// Registry Types
// ============================================================================

/// A registry entry: one chunk shared across all classes.
///
/// Same field shape as [`VocabUnit`], keyed by `chunk`. Once `id` is
/// non-empty it is immutable; a differing non-empty id supplied by a
/// class document for the same chunk is a hard conflict.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    pub chunk: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub variants: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs: Option<String>,
}

/// The cross-class registry mapping chunk -> external card id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    pub entries: Vec<RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
        }
    }
}

// ============================================================================
// Outcome Type
// ============================================================================

/// Result of one reconciliation run over a class document.
#[derive(Clone, Debug, Default)]
pub struct SyncOutcome {
    /// Number of units newly provisioned in the external service
    pub created: usize,
    /// Chunks resolved from the registry cache without an external call
    pub skipped: Vec<String>,
}

// ============================================================================
// Variant-Set Helpers
// ============================================================================

/// Normalize a variant list into a deduplicated set.
///
/// Trims entries, drops empties, and keeps the first occurrence of each
/// value so persisted order stays stable.
pub fn normalize_variants(variants: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(variants.len());
    for v in variants {
        let v = v.trim();
        if v.is_empty() {
            continue;
        }
        if !out.iter().any(|existing| existing == v) {
            out.push(v.to_string());
        }
    }
    out
}

/// Union `incoming` variants into `target`, normalizing both sides.
///
/// Commutative and idempotent as a set operation; existing order is
/// preserved and new values append in their incoming order.
pub fn union_variants(target: &mut Vec<String>, incoming: &[String]) {
    let mut merged = normalize_variants(target);
    for v in normalize_variants(incoming) {
        if !merged.iter().any(|existing| *existing == v) {
            merged.push(v);
        }
    }
    *target = merged;
}
