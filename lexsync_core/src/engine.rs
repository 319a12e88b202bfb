//! Reconciliation engine for class documents against the shared registry.
//!
//! For each unit in document order the engine decides cache-hit
//! (backfill the id from the registry, no external call) vs. cache-miss
//! (provision a card, register the id), refuses id conflicts, unions
//! variant sets, and checkpoints both stores after every external
//! creation so an interrupted run resumes from its last committed unit.

use crate::backend::{CardProvisioner, Deck, DeckResolver};
use crate::types::{union_variants, ClassDocument, Registry, RegistryEntry, SyncOutcome};
use crate::{Error, Result};
use std::path::PathBuf;

/// Persistence seam for the engine's crash-recovery checkpoints.
pub trait Checkpoint {
    fn persist(&mut self, class: &ClassDocument, registry: &Registry) -> Result<()>;
}

/// Checkpoint writing both stores to disk.
///
/// The two saves are independent atomic renames; a crash between them
/// can leave one store a single mutation ahead of the other, which the
/// next run resolves through the cache-hit path.
pub struct FileCheckpoint {
    class_path: PathBuf,
    registry_path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(class_path: impl Into<PathBuf>, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            class_path: class_path.into(),
            registry_path: registry_path.into(),
        }
    }
}

impl Checkpoint for FileCheckpoint {
    fn persist(&mut self, class: &ClassDocument, registry: &Registry) -> Result<()> {
        class.save(&self.class_path)?;
        registry.save(&self.registry_path)
    }
}

/// Deck targeting for one reconciliation run.
#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub deck_name: String,
    pub parent_deck_id: Option<String>,
}

/// Reconcile one class document against the registry.
///
/// Units are processed strictly in document order with at most one
/// external creation in flight. The deck is resolved lazily on the
/// first cache miss, so a fully cached run makes no external calls at
/// all. Any conflict or provisioning failure aborts the run; prior
/// checkpoints stand and the rerun skips completed units.
pub fn reconcile_class<B, C>(
    class: &mut ClassDocument,
    registry: &mut Registry,
    backend: &B,
    checkpoint: &mut C,
    opts: &ReconcileOptions,
) -> Result<SyncOutcome>
where
    B: DeckResolver + CardProvisioner,
    C: Checkpoint,
{
    let mut outcome = SyncOutcome::default();
    let mut deck: Option<Deck> = None;

    for idx in 0..class.entries.len() {
        let chunk = class.entries[idx].chunk.clone();

        if let Some(entry) = registry.entry_mut(&chunk) {
            if !entry.id.is_empty() {
                let unit = &mut class.entries[idx];

                // Registry ids are immutable; a differing non-empty id
                // from the class is a hard conflict.
                if !unit.id.is_empty() && unit.id != entry.id {
                    return Err(Error::Conflict {
                        chunk,
                        registry_id: entry.id.clone(),
                        class_id: unit.id.clone(),
                    });
                }

                // Cache hit: backfill and union, no external call.
                unit.id = entry.id.clone();
                union_variants(&mut entry.variants, &unit.variants);
                tracing::debug!("Chunk '{}' already registered as {}", chunk, entry.id);
                outcome.skipped.push(chunk);
                continue;
            }
        }

        // Cache miss. Resolve the target deck on the first miss only.
        let deck_id = if let Some(d) = deck.as_ref() {
            d.id.clone()
        } else {
            let resolved = resolve_or_create_deck(backend, opts)?;
            let id = resolved.id.clone();
            deck = Some(resolved);
            id
        };

        let card = backend.create_card(&deck_id, &class.entries[idx])?;
        class.entries[idx].id = card.id;

        let unit = class.entries[idx].clone();
        let pos = match registry.entries.iter().position(|e| e.chunk == chunk) {
            Some(p) => p,
            None => {
                registry.insert(RegistryEntry {
                    chunk: chunk.clone(),
                    id: String::new(),
                    variants: Vec::new(),
                    meaning: None,
                    obs: None,
                });
                registry.entries.len() - 1
            }
        };
        let entry = &mut registry.entries[pos];
        entry.id = unit.id.clone();
        union_variants(&mut entry.variants, &unit.variants);
        // Latest write wins; absent unit values leave the entry alone.
        if unit.meaning.is_some() {
            entry.meaning = unit.meaning.clone();
        }
        if unit.obs.is_some() {
            entry.obs = unit.obs.clone();
        }

        tracing::info!("Registered chunk '{}' as {}", chunk, unit.id);
        outcome.created += 1;

        // Crash-recovery granularity: both stores after every creation.
        checkpoint.persist(class, registry)?;
    }

    registry.sort_entries();
    checkpoint.persist(class, registry)?;

    tracing::info!(
        "Reconciled class '{}': {} created, {} skipped",
        class.class,
        outcome.created,
        outcome.skipped.len()
    );
    Ok(outcome)
}

fn resolve_or_create_deck<B: DeckResolver>(backend: &B, opts: &ReconcileOptions) -> Result<Deck> {
    if let Some(deck) = backend.resolve(&opts.deck_name)? {
        tracing::debug!("Resolved deck '{}' ({})", deck.name, deck.id);
        return Ok(deck);
    }
    backend.create(&opts.deck_name, opts.parent_deck_id.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Card;
    use crate::types::VocabUnit;
    use std::cell::{Cell, RefCell};

    /// In-memory collaborator pair counting every external call.
    struct FakeBackend {
        resolve_calls: Cell<usize>,
        decks_created: Cell<usize>,
        cards_created: RefCell<Vec<String>>,
        fail_on_chunk: Option<String>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                resolve_calls: Cell::new(0),
                decks_created: Cell::new(0),
                cards_created: RefCell::new(Vec::new()),
                fail_on_chunk: None,
            }
        }

        fn failing_on(chunk: &str) -> Self {
            Self {
                fail_on_chunk: Some(chunk.to_string()),
                ..Self::new()
            }
        }

        fn external_calls(&self) -> usize {
            self.resolve_calls.get()
                + self.decks_created.get()
                + self.cards_created.borrow().len()
        }
    }

    impl DeckResolver for FakeBackend {
        fn resolve(&self, _name: &str) -> Result<Option<Deck>> {
            self.resolve_calls.set(self.resolve_calls.get() + 1);
            Ok(None)
        }

        fn create(&self, name: &str, _parent_id: Option<&str>) -> Result<Deck> {
            self.decks_created.set(self.decks_created.get() + 1);
            Ok(Deck {
                id: "deck-1".into(),
                name: name.into(),
            })
        }
    }

    impl CardProvisioner for FakeBackend {
        fn create_card(&self, _deck_id: &str, unit: &VocabUnit) -> Result<Card> {
            if self.fail_on_chunk.as_deref() == Some(unit.chunk.as_str()) {
                return Err(Error::Provision("service unavailable".into()));
            }
            let mut created = self.cards_created.borrow_mut();
            created.push(unit.chunk.clone());
            Ok(Card {
                id: format!("card-{}", created.len()),
            })
        }
    }

    /// Checkpoint that only counts persist calls.
    #[derive(Default)]
    struct MemoryCheckpoint {
        persists: usize,
    }

    impl Checkpoint for MemoryCheckpoint {
        fn persist(&mut self, _class: &ClassDocument, _registry: &Registry) -> Result<()> {
            self.persists += 1;
            Ok(())
        }
    }

    fn unit(chunk: &str, id: &str, variants: &[&str]) -> VocabUnit {
        VocabUnit {
            chunk: chunk.into(),
            id: id.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            meaning: None,
            obs: None,
        }
    }

    fn doc(entries: Vec<VocabUnit>) -> ClassDocument {
        ClassDocument {
            class: "001".into(),
            entries,
        }
    }

    fn opts() -> ReconcileOptions {
        ReconcileOptions {
            deck_name: "Vocabulary::Class 001".into(),
            parent_deck_id: None,
        }
    }

    #[test]
    fn test_new_chunk_is_provisioned_and_registered() {
        let mut class = doc(vec![unit("casa", "", &["casa"])]);
        let mut registry = Registry::default();
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        let outcome =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap();

        assert_eq!(outcome.created, 1);
        assert!(outcome.skipped.is_empty());
        assert_eq!(class.entries[0].id, "card-1");

        let entry = registry.entry("casa").unwrap();
        assert_eq!(entry.id, "card-1");
        assert_eq!(entry.variants, vec!["casa"]);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut class = doc(vec![unit("casa", "", &["casa"])]);
        let mut registry = Registry::default();
        let mut checkpoint = MemoryCheckpoint::default();

        let first = FakeBackend::new();
        reconcile_class(&mut class, &mut registry, &first, &mut checkpoint, &opts()).unwrap();
        let assigned = class.entries[0].id.clone();

        // Same document again, against the now-populated registry.
        let mut rerun = doc(vec![unit("casa", "", &["casa"])]);
        let second = FakeBackend::new();
        let outcome =
            reconcile_class(&mut rerun, &mut registry, &second, &mut checkpoint, &opts())
                .unwrap();

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped, vec!["casa"]);
        assert_eq!(rerun.entries[0].id, assigned);
        assert_eq!(second.external_calls(), 0);
    }

    #[test]
    fn test_conflicting_ids_abort_before_any_call() {
        let mut class = doc(vec![unit("casa", "X123", &[])]);
        let mut registry = Registry::default();
        registry.insert(RegistryEntry {
            chunk: "casa".into(),
            id: "Y999".into(),
            variants: vec![],
            meaning: None,
            obs: None,
        });
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        let err =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(backend.external_calls(), 0);
        assert_eq!(checkpoint.persists, 0);
        // Registry id is untouched by the refused run.
        assert_eq!(registry.entry("casa").unwrap().id, "Y999");
    }

    #[test]
    fn test_matching_preknown_id_is_a_plain_hit() {
        let mut class = doc(vec![unit("casa", "Y999", &[])]);
        let mut registry = Registry::default();
        registry.insert(RegistryEntry {
            chunk: "casa".into(),
            id: "Y999".into(),
            variants: vec![],
            meaning: None,
            obs: None,
        });
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        let outcome =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap();

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped, vec!["casa"]);
    }

    #[test]
    fn test_variant_union_across_runs() {
        let mut registry = Registry::default();
        let mut checkpoint = MemoryCheckpoint::default();

        let mut first = doc(vec![unit("casa", "", &["casa", "casinha"])]);
        reconcile_class(
            &mut first,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        // A later class supplies a disjoint variant list for the same chunk.
        let mut second = doc(vec![unit("casa", "", &["casarão"])]);
        reconcile_class(
            &mut second,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        let entry = registry.entry("casa").unwrap();
        assert_eq!(entry.variants, vec!["casa", "casinha", "casarão"]);
    }

    #[test]
    fn test_checkpoint_after_each_miss_plus_final() {
        let mut class = doc(vec![
            unit("casa", "", &[]),
            unit("avó", "", &[]),
            unit("zebra", "", &[]),
        ]);
        let mut registry = Registry::default();
        let mut checkpoint = MemoryCheckpoint::default();

        reconcile_class(
            &mut class,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        // One per cache miss, plus the unconditional final persist.
        assert_eq!(checkpoint.persists, 4);
    }

    #[test]
    fn test_all_hit_run_makes_no_external_calls() {
        let mut registry = Registry::default();
        let mut checkpoint = MemoryCheckpoint::default();

        let mut first = doc(vec![unit("casa", "", &[])]);
        reconcile_class(
            &mut first,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        let mut rerun = doc(vec![unit("casa", "", &[])]);
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();
        reconcile_class(&mut rerun, &mut registry, &backend, &mut checkpoint, &opts()).unwrap();

        assert_eq!(backend.external_calls(), 0);
        // Pure skips never checkpoint; only the final persist runs.
        assert_eq!(checkpoint.persists, 1);
    }

    #[test]
    fn test_deck_resolved_once_across_misses() {
        let mut class = doc(vec![unit("casa", "", &[]), unit("avó", "", &[])]);
        let mut registry = Registry::default();
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts()).unwrap();

        assert_eq!(backend.resolve_calls.get(), 1);
        assert_eq!(backend.decks_created.get(), 1);
    }

    #[test]
    fn test_provision_failure_leaves_unit_unassigned() {
        let mut class = doc(vec![unit("casa", "", &[]), unit("avó", "", &[])]);
        let mut registry = Registry::default();
        let backend = FakeBackend::failing_on("avó");
        let mut checkpoint = MemoryCheckpoint::default();

        let err =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap_err();

        assert!(matches!(err, Error::Provision(_)));
        // The earlier unit committed and checkpointed; the failed one
        // stays unassigned and unregistered.
        assert_eq!(class.entries[0].id, "card-1");
        assert_eq!(checkpoint.persists, 1);
        assert!(class.entries[1].id.is_empty());
        assert!(registry.entry("avó").is_none());
    }

    #[test]
    fn test_conflict_aborts_before_later_units() {
        let mut class = doc(vec![
            unit("casa", "", &[]),
            unit("avó", "X123", &[]),
            unit("zebra", "", &[]),
        ]);
        let mut registry = Registry::default();
        registry.insert(RegistryEntry {
            chunk: "avó".into(),
            id: "Y999".into(),
            variants: vec![],
            meaning: None,
            obs: None,
        });
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        let err =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        // The first unit's commit stands; the unit after the conflict
        // was never reached.
        assert_eq!(class.entries[0].id, "card-1");
        assert_eq!(checkpoint.persists, 1);
        assert!(class.entries[2].id.is_empty());
    }

    #[test]
    fn test_unregistered_preknown_id_is_reprovisioned() {
        // The registry is the only proof of external existence; a
        // class-supplied id without a registered id takes the miss path
        // and is overwritten by the returned identifier.
        let mut class = doc(vec![unit("casa", "X123", &[])]);
        let mut registry = Registry::default();
        let backend = FakeBackend::new();
        let mut checkpoint = MemoryCheckpoint::default();

        let outcome =
            reconcile_class(&mut class, &mut registry, &backend, &mut checkpoint, &opts())
                .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(class.entries[0].id, "card-1");
        assert_eq!(registry.entry("casa").unwrap().id, "card-1");
    }

    #[test]
    fn test_miss_refreshes_meaning_latest_write_wins() {
        let mut registry = Registry::default();
        registry.insert(RegistryEntry {
            chunk: "casa".into(),
            id: String::new(),
            variants: vec![],
            meaning: Some("old meaning".into()),
            obs: Some("old obs".into()),
        });

        let mut class = doc(vec![VocabUnit {
            chunk: "casa".into(),
            id: String::new(),
            variants: vec![],
            meaning: Some("new meaning".into()),
            obs: None,
        }]);
        let mut checkpoint = MemoryCheckpoint::default();

        reconcile_class(
            &mut class,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        let entry = registry.entry("casa").unwrap();
        assert_eq!(entry.meaning.as_deref(), Some("new meaning"));
        // Absent unit values leave the registry's value alone.
        assert_eq!(entry.obs.as_deref(), Some("old obs"));
    }

    #[test]
    fn test_registry_sorted_after_run() {
        let mut class = doc(vec![
            unit("zebra", "", &[]),
            unit("água", "", &[]),
            unit("casa", "", &[]),
        ]);
        let mut registry = Registry::default();
        let mut checkpoint = MemoryCheckpoint::default();

        reconcile_class(
            &mut class,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        let chunks: Vec<&str> = registry.entries.iter().map(|e| e.chunk.as_str()).collect();
        assert_eq!(chunks, vec!["água", "casa", "zebra"]);
    }

    #[test]
    fn test_file_checkpoint_persists_both_stores() {
        let temp_dir = tempfile::tempdir().unwrap();
        let class_path = temp_dir.path().join("class_001.json");
        let registry_path = temp_dir.path().join("registry.json");

        let mut class = doc(vec![unit("casa", "", &["casa"])]);
        let mut registry = Registry::default();
        let mut checkpoint = FileCheckpoint::new(&class_path, &registry_path);

        reconcile_class(
            &mut class,
            &mut registry,
            &FakeBackend::new(),
            &mut checkpoint,
            &opts(),
        )
        .unwrap();

        let saved_class = ClassDocument::load(&class_path).unwrap();
        assert_eq!(saved_class.entries[0].id, "card-1");

        let saved_registry = Registry::load_or_bootstrap(&registry_path).unwrap();
        assert_eq!(saved_registry.entry("casa").unwrap().id, "card-1");
    }
}
