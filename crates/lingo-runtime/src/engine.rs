//! The translation engine: the public runtime query API.
//!
//! [`Engine`] owns the loaded catalogs (via their indices) and an eagerly
//! merged [`MergedView`] for the active locale. `translate()` is total — it
//! always returns a displayable string — and is a pure read against an
//! immutable snapshot, so unsynchronized concurrent calls are safe.
//!
//! Locale switches and reloads build a complete new snapshot off the hot
//! path and publish it with a single atomic swap: in-flight `translate()`
//! calls observe either the fully-old or fully-new state, never a mixture.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Key missing in every chain locale | Source text, placeholders filled |
//! | Placeholder index beyond `args` | Token left literal, `debug!` logged |
//! | Duplicate keys during reload | First kept, `warn!` logged |
//! | Plural variant count short | Clamped to the last variant |

use std::sync::Arc;

use arc_swap::ArcSwap;
use memchr::memchr;
use tracing::{debug, debug_span};

use lingo_catalog::{Catalog, LocaleId, Message, PluralRule};

use crate::index::{DuplicatePolicy, MessageIndex};
use crate::resolve::{MergedView, resolve_chain};

#[derive(Debug)]
struct EngineState {
    locale: Option<LocaleId>,
    indices: Vec<Arc<MessageIndex>>,
    view: MergedView,
}

impl EngineState {
    fn empty() -> Self {
        Self {
            locale: None,
            indices: Vec::new(),
            view: MergedView::empty(),
        }
    }
}

/// Thread-safe translation engine over immutable catalog snapshots.
///
/// # Example
///
/// ```
/// use lingo_catalog::{LocaleId, parse_str};
/// use lingo_runtime::Engine;
///
/// let fr = parse_str(r#"<TS language="fr"><context><name>Dialog</name>
/// <message><source>Cancel</source><translation>Annuler</translation></message>
/// </context></TS>"#).unwrap();
///
/// let engine = Engine::new();
/// engine.reload(vec![fr]);
/// engine.set_locale(Some(LocaleId::parse("fr_CA").unwrap()));
///
/// assert_eq!(engine.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
/// // Missing keys degrade to the source text, never an empty string.
/// assert_eq!(engine.translate("Dialog", "Help", None, None, &[]), "Help");
/// ```
#[derive(Debug)]
pub struct Engine {
    state: ArcSwap<EngineState>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with no catalogs loaded: every call falls back to source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(EngineState::empty()),
        }
    }

    /// Replace all loaded catalogs.
    ///
    /// Indices are rebuilt with [`DuplicatePolicy::KeepFirst`] so a flawed
    /// third-party catalog degrades (with warnings) instead of failing the
    /// reload. The active locale is retained and its view rebuilt. The new
    /// snapshot is published atomically.
    pub fn reload(&self, catalogs: Vec<Catalog>) {
        let span = debug_span!("reload", catalogs = catalogs.len());
        let _guard = span.enter();

        let indices: Vec<Arc<MessageIndex>> = catalogs
            .into_iter()
            .filter_map(|catalog| {
                match MessageIndex::build(Arc::new(catalog), DuplicatePolicy::KeepFirst) {
                    Ok(index) => Some(Arc::new(index)),
                    Err(err) => {
                        // Recoverable at the granularity of one catalog.
                        tracing::warn!(%err, "skipping unindexable catalog");
                        None
                    }
                }
            })
            .collect();

        let locale = self.state.load().locale.clone();
        self.publish(locale, indices);
    }

    /// Switch the active locale. `None` selects the source (root) locale:
    /// every lookup then falls back to source text.
    pub fn set_locale(&self, locale: Option<LocaleId>) {
        let indices = self.state.load().indices.clone();
        self.publish(locale, indices);
    }

    fn publish(&self, locale: Option<LocaleId>, indices: Vec<Arc<MessageIndex>>) {
        let view = match &locale {
            None => MergedView::empty(),
            Some(requested) => {
                let available: Vec<LocaleId> = indices
                    .iter()
                    .filter_map(|index| index.catalog().locale.clone())
                    .collect();
                let chain = resolve_chain(requested, &available);
                debug!(requested = %requested, ?chain, "resolved fallback chain");
                let chain_indices = chain
                    .iter()
                    .filter_map(|locale| {
                        indices
                            .iter()
                            .find(|index| index.catalog().locale.as_ref() == Some(locale))
                            .cloned()
                    })
                    .collect();
                MergedView::merge(chain_indices)
            }
        };
        self.state.store(Arc::new(EngineState {
            locale,
            indices,
            view,
        }));
    }

    /// The active locale, `None` meaning source.
    #[must_use]
    pub fn locale(&self) -> Option<LocaleId> {
        self.state.load().locale.clone()
    }

    /// Locales with a loaded catalog, in load order.
    #[must_use]
    pub fn available_locales(&self) -> Vec<LocaleId> {
        self.state
            .load()
            .indices
            .iter()
            .filter_map(|index| index.catalog().locale.clone())
            .collect()
    }

    /// Resolve, pluralize, and substitute. Total: always returns a
    /// displayable string.
    ///
    /// Lookup walks the active merged view; a miss falls back to
    /// `source` itself with placeholders substituted, so missing
    /// translations degrade to readable untranslated text.
    #[must_use]
    pub fn translate(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
        plural_count: Option<i64>,
        args: &[&str],
    ) -> String {
        let state = self.state.load();
        if let Some((message, rule)) = state.view.lookup(context, source, disambiguation) {
            if let Some(text) = select_variant(message, rule, plural_count) {
                return substitute(text, args, plural_count);
            }
        } else {
            debug!(context, source, "no finished translation, using source text");
        }
        substitute(source, args, plural_count)
    }
}

/// Pick the variant to display.
///
/// A plural message selects by the locale's rule, clamped to the variants
/// actually present (a short catalog should degrade, not crash). A plural
/// message queried without a count shows its first form.
fn select_variant<'a>(
    message: &'a Message,
    rule: &PluralRule,
    plural_count: Option<i64>,
) -> Option<&'a str> {
    let variants = &message.variants;
    if variants.is_empty() {
        return None;
    }
    if message.plural {
        if let Some(count) = plural_count {
            let idx = rule.variant_index(count).min(variants.len() - 1);
            return Some(&variants[idx]);
        }
    }
    Some(&variants[0])
}

/// Substitute `%1`..`%9` from `args` and `%n` from the plural count.
///
/// Out-of-range indices stay literal; a `%` not followed by a digit or `n`
/// passes through unchanged.
fn substitute(template: &str, args: &[&str], plural_count: Option<i64>) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;
    while let Some(pos) = memchr(b'%', rest.as_bytes()) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.as_bytes().get(1) {
            Some(&digit @ b'1'..=b'9') => {
                let index = usize::from(digit - b'1');
                if let Some(arg) = args.get(index) {
                    out.push_str(arg);
                } else {
                    debug!(
                        token = %&tail[..2],
                        supplied = args.len(),
                        "placeholder index out of range, left literal"
                    );
                    out.push_str(&tail[..2]);
                }
                rest = &tail[2..];
            }
            Some(b'n') => {
                if let Some(count) = plural_count {
                    out.push_str(&count.to_string());
                    rest = &tail[2..];
                } else {
                    out.push('%');
                    rest = &tail[1..];
                }
            }
            _ => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Detect the host locale from `LC_ALL`, then `LANG`.
///
/// Returns `None` (the source locale) for the `C`/`POSIX` locales, empty
/// values, or unparsable tags.
#[must_use]
pub fn detect_system_locale() -> Option<LocaleId> {
    let lc_all = std::env::var("LC_ALL").ok();
    let lang = std::env::var("LANG").ok();
    detect_from(lc_all.as_deref(), lang.as_deref())
}

fn detect_from(lc_all: Option<&str>, lang: Option<&str>) -> Option<LocaleId> {
    let raw = lc_all
        .filter(|v| !v.trim().is_empty())
        .or(lang.filter(|v| !v.trim().is_empty()))?;
    let bare = raw.split(['.', '@']).next().unwrap_or("").trim();
    if bare.eq_ignore_ascii_case("c") || bare.eq_ignore_ascii_case("posix") {
        return None;
    }
    LocaleId::parse(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_catalog::parse_str;
    use proptest::prelude::*;

    fn locale(tag: &str) -> Option<LocaleId> {
        Some(LocaleId::parse(tag).unwrap())
    }

    fn engine(docs: &[&str], tag: &str) -> Engine {
        let engine = Engine::new();
        engine.reload(docs.iter().map(|d| parse_str(d).unwrap()).collect());
        engine.set_locale(locale(tag));
        engine
    }

    const FR: &str = r#"<TS language="fr"><context><name>Dialog</name>
<message><source>Cancel</source><translation>Annuler</translation></message>
<message><source>%1 has %2 items</source><translation>%1 a %2 éléments</translation></message>
<message numerus="yes"><source>%n file(s)</source>
<translation><numerusform>%n fichier</numerusform><numerusform>%n fichiers</numerusform></translation>
</message>
<message><source>Draft</source><translation type="unfinished">Brouillon</translation></message>
</context></TS>"#;

    #[test]
    fn direct_hit() {
        let e = engine(&[FR], "fr");
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
    }

    #[test]
    fn miss_returns_source_text() {
        let e = engine(&[FR], "fr");
        assert_eq!(e.translate("Dialog", "Help", None, None, &[]), "Help");
        assert_eq!(e.translate("Other", "Cancel", None, None, &[]), "Cancel");
    }

    #[test]
    fn empty_engine_is_total() {
        let e = Engine::new();
        assert_eq!(e.translate("X", "Quit", None, None, &[]), "Quit");
        assert_eq!(e.locale(), None);
        assert!(e.available_locales().is_empty());
    }

    #[test]
    fn unfinished_is_treated_as_absent() {
        let e = engine(&[FR], "fr");
        // Draft has non-empty text but status unfinished: status gates it.
        assert_eq!(e.translate("Dialog", "Draft", None, None, &[]), "Draft");
    }

    #[test]
    fn placeholder_substitution() {
        let e = engine(&[FR], "fr");
        assert_eq!(
            e.translate("Dialog", "%1 has %2 items", None, None, &["Alice", "3"]),
            "Alice a 3 éléments"
        );
    }

    #[test]
    fn plural_selection_french() {
        let e = engine(&[FR], "fr");
        let t = |n| e.translate("Dialog", "%n file(s)", None, Some(n), &[]);
        assert_eq!(t(0), "0 fichier");
        assert_eq!(t(1), "1 fichier");
        assert_eq!(t(2), "2 fichiers");
        assert_eq!(t(42), "42 fichiers");
    }

    #[test]
    fn plural_fallback_uses_source_with_count() {
        let e = engine(&[FR], "fr");
        assert_eq!(
            e.translate("Dialog", "%n item(s) selected", None, Some(7), &[]),
            "7 item(s) selected"
        );
    }

    #[test]
    fn regional_locale_falls_back_to_language() {
        let e = engine(&[FR], "fr_CA");
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
    }

    #[test]
    fn set_locale_switches_atomically() {
        let e = engine(&[FR], "fr");
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
        e.set_locale(None);
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Cancel");
        e.set_locale(locale("fr"));
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
    }

    #[test]
    fn reload_retains_locale() {
        let e = engine(&[FR], "fr");
        e.reload(vec![parse_str(FR).unwrap()]);
        assert_eq!(e.locale(), locale("fr"));
        assert_eq!(e.translate("Dialog", "Cancel", None, None, &[]), "Annuler");
    }

    #[test]
    fn concurrent_translate_during_swap() {
        let e = std::sync::Arc::new(engine(&[FR], "fr"));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let e = e.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let s = e.translate("Dialog", "Cancel", None, None, &[]);
                        // Either snapshot is acceptable, never anything else.
                        assert!(s == "Annuler" || s == "Cancel", "{s}");
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            e.set_locale(None);
            e.set_locale(locale("fr"));
        }
        for handle in readers {
            handle.join().unwrap();
        }
    }

    #[test]
    fn substitute_cases() {
        assert_eq!(substitute("%1 has %2 items", &["Alice", "3"], None), "Alice has 3 items");
        assert_eq!(substitute("%2 then %1", &["a", "b"], None), "b then a");
        // Out of range stays literal.
        assert_eq!(substitute("%1 and %3", &["x", "y"], None), "x and %3");
        // Bare percent passes through.
        assert_eq!(substitute("100% done", &[], None), "100% done");
        assert_eq!(substitute("50%", &[], None), "50%");
        // %n without a count stays literal.
        assert_eq!(substitute("%n files", &[], None), "%n files");
        assert_eq!(substitute("%n files", &[], Some(3)), "3 files");
        // Repeated references.
        assert_eq!(substitute("%1%1", &["ab"], None), "abab");
        // %0 is not a placeholder.
        assert_eq!(substitute("%0", &["x"], None), "%0");
    }

    #[test]
    fn detect_locale_prefers_lc_all() {
        let id = detect_from(Some("fr_FR.UTF-8"), Some("en_US.UTF-8")).unwrap();
        assert_eq!(id.to_string(), "fr_FR");
        let id = detect_from(None, Some("en_US.UTF-8")).unwrap();
        assert_eq!(id.to_string(), "en_US");
        assert_eq!(detect_from(Some("C"), None), None);
        assert_eq!(detect_from(Some("POSIX"), Some("fr_FR")), None);
        assert_eq!(detect_from(None, None), None);
        assert_eq!(detect_from(Some(""), None), None);
    }

    proptest! {
        /// translate() is total for arbitrary inputs.
        #[test]
        fn translate_never_panics(
            context in ".*",
            source in ".*",
            args in proptest::collection::vec(".*", 0..4),
            count in proptest::option::of(any::<i64>()),
        ) {
            let e = Engine::new();
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let _ = e.translate(&context, &source, None, count, &arg_refs);
        }

        /// substitution preserves text without placeholders.
        #[test]
        fn substitute_identity_without_percent(text in "[^%]*") {
            prop_assert_eq!(substitute(&text, &["a"], Some(1)), text);
        }
    }
}
