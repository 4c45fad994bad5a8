//! Immutable per-catalog message index.
//!
//! Maps the composite key `(context, source, disambiguation)` to messages in
//! O(1) average time. The index shares ownership of its [`Catalog`] behind
//! `Arc` and stores only positions into it, so no text is copied and
//! lookups allocate nothing: the key is hashed with `FxHasher` and hash
//! collisions are disambiguated by exact string comparison against the
//! catalog.
//!
//! # Invariants
//!
//! 1. Construction is O(n) in message count.
//! 2. A duplicate key is never silently overwritten: it either fails the
//!    build ([`DuplicatePolicy::Fail`]) or keeps the first occurrence and
//!    logs a warning ([`DuplicatePolicy::KeepFirst`]).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use tracing::warn;

use lingo_catalog::{Catalog, Location, Message};

/// Hash of the composite lookup key.
pub(crate) fn key_hash(context: &str, source: &str, disambiguation: Option<&str>) -> u64 {
    let mut hasher = FxHasher::default();
    context.hash(&mut hasher);
    source.hash(&mut hasher);
    disambiguation.hash(&mut hasher);
    hasher.finish()
}

/// Position of a message within its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub context: u32,
    pub message: u32,
}

/// What to do when two messages share a key during index construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the build. Recommended for build pipelines, where a duplicate
    /// masks a translator or extraction error.
    Fail,
    /// Keep the first occurrence and log a warning. Recommended for
    /// best-effort runtime loading of third-party catalogs.
    KeepFirst,
}

/// Two messages share `(context, source, disambiguation)` in one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKeyError {
    pub context: String,
    pub source: String,
    pub disambiguation: Option<String>,
    /// Provenance of the occurrence that was indexed first.
    pub first: SmallVec<[Location; 1]>,
    /// Provenance of the conflicting occurrence.
    pub second: SmallVec<[Location; 1]>,
}

impl std::fmt::Display for DuplicateKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "duplicate key in context {:?}, source {:?}",
            self.context, self.source
        )?;
        if let Some(d) = &self.disambiguation {
            write!(f, " ({d})")?;
        }
        for loc in self.first.iter().chain(&self.second) {
            write!(f, " [{loc}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for DuplicateKeyError {}

/// Queryable index over one immutable catalog.
#[derive(Debug)]
pub struct MessageIndex {
    catalog: Arc<Catalog>,
    map: FxHashMap<u64, SmallVec<[Slot; 1]>>,
}

impl MessageIndex {
    /// Build an index over `catalog`.
    ///
    /// # Errors
    ///
    /// With [`DuplicatePolicy::Fail`], returns [`DuplicateKeyError`] naming
    /// the key and both conflicting provenance sets.
    pub fn build(
        catalog: Arc<Catalog>,
        policy: DuplicatePolicy,
    ) -> Result<Self, DuplicateKeyError> {
        let mut map: FxHashMap<u64, SmallVec<[Slot; 1]>> =
            FxHashMap::with_capacity_and_hasher(catalog.message_count(), Default::default());

        for (ci, context) in catalog.contexts.iter().enumerate() {
            for (mi, message) in context.messages.iter().enumerate() {
                let hash = key_hash(
                    &context.name,
                    &message.source,
                    message.disambiguation.as_deref(),
                );
                let slots = map.entry(hash).or_default();
                let existing = slots.iter().find(|slot| {
                    let (c, m) = slot_of(&catalog, **slot);
                    c.name == context.name
                        && m.source == message.source
                        && m.disambiguation == message.disambiguation
                });
                if let Some(&slot) = existing {
                    let (_, first) = slot_of(&catalog, slot);
                    match policy {
                        DuplicatePolicy::Fail => {
                            return Err(DuplicateKeyError {
                                context: context.name.clone(),
                                source: message.source.clone(),
                                disambiguation: message.disambiguation.clone(),
                                first: first.locations.clone(),
                                second: message.locations.clone(),
                            });
                        }
                        DuplicatePolicy::KeepFirst => {
                            warn!(
                                context = %context.name,
                                source = %message.source,
                                "duplicate message key, keeping first occurrence"
                            );
                            continue;
                        }
                    }
                }
                slots.push(Slot {
                    context: ci as u32,
                    message: mi as u32,
                });
            }
        }
        Ok(Self { catalog, map })
    }

    /// Look up a message by its composite key.
    #[must_use]
    pub fn lookup(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<&Message> {
        self.lookup_slot(context, source, disambiguation)
            .map(|slot| slot_of(&self.catalog, slot).1)
    }

    pub(crate) fn lookup_slot(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<Slot> {
        let hash = key_hash(context, source, disambiguation);
        self.map.get(&hash)?.iter().copied().find(|&slot| {
            let (c, m) = slot_of(&self.catalog, slot);
            c.name == context && m.source == source && m.disambiguation.as_deref() == disambiguation
        })
    }

    pub(crate) fn message_at(&self, slot: Slot) -> &Message {
        slot_of(&self.catalog, slot).1
    }

    /// The owning catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.values().map(SmallVec::len).sum()
    }

    /// Whether the index holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all indexed `(context index, message index)` slots.
    pub(crate) fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.map.values().flat_map(|v| v.iter().copied())
    }
}

fn slot_of(catalog: &Catalog, slot: Slot) -> (&lingo_catalog::Context, &Message) {
    let context = &catalog.contexts[slot.context as usize];
    (context, &context.messages[slot.message as usize])
}
