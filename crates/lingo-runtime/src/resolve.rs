//! Locale fallback resolution and the merged lookup view.
//!
//! [`resolve_chain`] computes the ordered fallback chain for a requested
//! locale; [`MergedView`] flattens a chain of per-locale indices into a
//! single query structure. The merge walks the chain **per key**, not per
//! catalog: an unfinished entry in a specific locale never shadows a
//! finished entry in a more general one, so partially translated catalogs
//! degrade gracefully key by key.
//!
//! Merging is eager — it is the dominant CPU cost of a reload — so that
//! steady-state lookups stay O(1) with no chain walk.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug_span;

use lingo_catalog::{LocaleId, Message, PluralRule, TranslationStatus};

use crate::index::{MessageIndex, Slot, key_hash};

/// Compute the fallback chain for `requested`, most specific first.
///
/// Starting from the requested identifier, the most specific subtag is
/// stripped repeatedly (region, then script); every candidate present in
/// `available` joins the chain. The source catalog is the implicit
/// terminator and is not represented here.
#[must_use]
pub fn resolve_chain(requested: &LocaleId, available: &[LocaleId]) -> Vec<LocaleId> {
    let mut chain = Vec::new();
    let mut candidate = Some(requested.clone());
    while let Some(current) = candidate {
        if available.contains(&current) && !chain.contains(&current) {
            chain.push(current.clone());
        }
        candidate = current.parent();
    }
    chain
}

#[derive(Debug, Clone, Copy)]
struct ViewSlot {
    /// Position of the owning index within the chain.
    index: u16,
    slot: Slot,
}

/// Flattened, immutable, query-ready merge of a fallback chain.
///
/// Holds `Arc` handles on the chain's indices (which in turn own their
/// catalogs) plus lightweight positions — no message text is duplicated.
/// A `MergedView` is a snapshot: it is never mutated after construction,
/// which is what makes unsynchronized concurrent `translate()` calls safe.
#[derive(Debug, Default)]
pub struct MergedView {
    indices: Vec<Arc<MessageIndex>>,
    rules: Vec<PluralRule>,
    entries: FxHashMap<u64, SmallVec<[ViewSlot; 1]>>,
}

impl MergedView {
    /// An empty view: every lookup misses (pure source-text fallback).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge a resolved chain of indices, most specific first.
    ///
    /// For each key, the first locale in the chain with a `Finished`
    /// message wins. Unfinished, obsolete, and vanished messages are
    /// excluded entirely.
    #[must_use]
    pub fn merge(indices: Vec<Arc<MessageIndex>>) -> Self {
        let span = debug_span!("merge", chain_len = indices.len());
        let _guard = span.enter();

        let rules = indices
            .iter()
            .map(|index| {
                index
                    .catalog()
                    .locale
                    .as_ref()
                    .map_or(PluralRule::English, PluralRule::for_locale)
            })
            .collect();

        let mut entries: FxHashMap<u64, SmallVec<[ViewSlot; 1]>> = FxHashMap::default();
        for (ii, index) in indices.iter().enumerate() {
            let catalog = index.catalog();
            for slot in index.slots() {
                let message = index.message_at(slot);
                if message.status != TranslationStatus::Finished {
                    continue;
                }
                let context = &catalog.contexts[slot.context as usize];
                let hash = key_hash(
                    &context.name,
                    &message.source,
                    message.disambiguation.as_deref(),
                );
                let slots = entries.entry(hash).or_default();
                let already_won = slots.iter().any(|existing| {
                    let won_catalog = indices[existing.index as usize].catalog();
                    let won_context = &won_catalog.contexts[existing.slot.context as usize];
                    let won = &won_context.messages[existing.slot.message as usize];
                    won_context.name == context.name
                        && won.source == message.source
                        && won.disambiguation == message.disambiguation
                });
                if already_won {
                    continue; // a more specific locale already claimed the key
                }
                slots.push(ViewSlot {
                    index: ii as u16,
                    slot,
                });
            }
        }

        Self {
            indices,
            rules,
            entries,
        }
    }

    /// Look up the winning message and its locale's plural rule.
    #[must_use]
    pub fn lookup(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<(&Message, &PluralRule)> {
        let hash = key_hash(context, source, disambiguation);
        for view_slot in self.entries.get(&hash)? {
            let index = &self.indices[view_slot.index as usize];
            let catalog = index.catalog();
            let ctx = &catalog.contexts[view_slot.slot.context as usize];
            let message = &ctx.messages[view_slot.slot.message as usize];
            if ctx.name == context
                && message.source == source
                && message.disambiguation.as_deref() == disambiguation
            {
                return Some((message, &self.rules[view_slot.index as usize]));
            }
        }
        None
    }

    /// Number of resolvable keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(SmallVec::len).sum()
    }

    /// Whether the view resolves no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DuplicatePolicy;
    use lingo_catalog::parse_str;

    fn locale(tag: &str) -> LocaleId {
        LocaleId::parse(tag).unwrap()
    }

    fn locales(tags: &[&str]) -> Vec<LocaleId> {
        tags.iter().map(|t| locale(t)).collect()
    }

    fn index(doc: &str) -> Arc<MessageIndex> {
        Arc::new(
            MessageIndex::build(Arc::new(parse_str(doc).unwrap()), DuplicatePolicy::Fail)
                .unwrap(),
        )
    }

    #[test]
    fn chain_region_to_language() {
        let chain = resolve_chain(&locale("fr_CA"), &locales(&["fr_CA", "fr", "de"]));
        assert_eq!(chain, locales(&["fr_CA", "fr"]));
    }

    #[test]
    fn chain_skips_unavailable_specific() {
        let chain = resolve_chain(&locale("fr_CA"), &locales(&["fr"]));
        assert_eq!(chain, locales(&["fr"]));
    }

    #[test]
    fn chain_strips_region_then_script() {
        let chain = resolve_chain(
            &locale("sr_Latn_RS"),
            &locales(&["sr_Latn_RS", "sr_Latn", "sr"]),
        );
        assert_eq!(chain, locales(&["sr_Latn_RS", "sr_Latn", "sr"]));
    }

    #[test]
    fn chain_empty_when_nothing_available() {
        assert!(resolve_chain(&locale("fr"), &[]).is_empty());
        assert!(resolve_chain(&locale("fr"), &locales(&["de", "es"])).is_empty());
    }

    #[test]
    fn merge_prefers_specific_finished() {
        let fr_ca = index(
            r#"<TS language="fr_CA"><context><name>C</name>
<message><source>Color</source><translation>Couleur (CA)</translation></message>
</context></TS>"#,
        );
        let fr = index(
            r#"<TS language="fr"><context><name>C</name>
<message><source>Color</source><translation>Couleur</translation></message>
<message><source>Cancel</source><translation>Annuler</translation></message>
</context></TS>"#,
        );
        let view = MergedView::merge(vec![fr_ca, fr]);
        let (msg, _) = view.lookup("C", "Color", None).unwrap();
        assert_eq!(msg.variants.as_slice(), ["Couleur (CA)"]);
        let (msg, _) = view.lookup("C", "Cancel", None).unwrap();
        assert_eq!(msg.variants.as_slice(), ["Annuler"]);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn unfinished_does_not_shadow_finished_parent() {
        let fr_ca = index(
            r#"<TS language="fr_CA"><context><name>C</name>
<message><source>Cancel</source><translation type="unfinished">Brouillon</translation></message>
</context></TS>"#,
        );
        let fr = index(
            r#"<TS language="fr"><context><name>C</name>
<message><source>Cancel</source><translation>Annuler</translation></message>
</context></TS>"#,
        );
        let view = MergedView::merge(vec![fr_ca, fr]);
        let (msg, _) = view.lookup("C", "Cancel", None).unwrap();
        assert_eq!(msg.variants.as_slice(), ["Annuler"]);
    }

    #[test]
    fn retired_messages_excluded_from_view() {
        let fr = index(
            r#"<TS language="fr"><context><name>C</name>
<message><source>Gone</source><translation type="obsolete">Parti</translation></message>
<message><source>Lost</source><translation type="vanished">Perdu</translation></message>
</context></TS>"#,
        );
        let view = MergedView::merge(vec![fr]);
        assert!(view.lookup("C", "Gone", None).is_none());
        assert!(view.lookup("C", "Lost", None).is_none());
        assert!(view.is_empty());
    }

    #[test]
    fn rules_follow_each_locale() {
        let ru = index(
            r#"<TS language="ru"><context><name>F</name>
<message numerus="yes"><source>%n file(s)</source>
<translation><numerusform>%n файл</numerusform><numerusform>%n файла</numerusform>
<numerusform>%n файлов</numerusform></translation></message>
</context></TS>"#,
        );
        let view = MergedView::merge(vec![ru]);
        let (_, rule) = view.lookup("F", "%n file(s)", None).unwrap();
        assert_eq!(rule.category_count(), 3);
    }

    #[test]
    fn empty_view_misses_everything() {
        let view = MergedView::empty();
        assert!(view.lookup("C", "anything", None).is_none());
    }
}
