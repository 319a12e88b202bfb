#![forbid(unsafe_code)]

//! Core domain model and business logic for the lexsync system.
//!
//! This crate provides:
//! - Domain types (vocabulary units, class documents, the shared registry)
//! - Store loading, validation, and atomic persistence
//! - The reconciliation engine (cache-hit/miss decisions, conflict
//!   detection, variant union, incremental checkpointing)
//! - Card service collaborators (HTTP client and dry-run simulation)

pub mod backend;
pub mod collate;
pub mod config;
pub mod deck;
pub mod document;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;
mod store;
pub mod types;

// Re-export commonly used types
pub use backend::{Card, CardProvisioner, Deck, DeckResolver, HttpBackend, SimulatedBackend};
pub use config::Config;
pub use deck::class_deck_name;
pub use engine::{reconcile_class, Checkpoint, FileCheckpoint, ReconcileOptions};
pub use error::{Error, Result};
pub use types::*;
