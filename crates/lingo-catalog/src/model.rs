//! In-memory catalog model.
//!
//! A [`Catalog`] is the parsed representation of one locale's translation
//! file. It is immutable by convention once built: the parser produces it,
//! downstream indices hold it behind `Arc`, and reloads replace it wholesale.
//!
//! # Invariants
//!
//! 1. Context order is insertion order (stable for compiler/diff output);
//!    semantic lookup is always by name, never by position.
//! 2. The triple `(context, source, disambiguation)` is unique within one
//!    catalog. The parser does not enforce this; the validator and the
//!    message index do.
//! 3. Provenance ([`Location`]) and unrecognized metadata (`extra`) are
//!    informational only and never participate in lookup.

use smallvec::SmallVec;

use crate::locale::LocaleId;

/// Completion status of a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationStatus {
    /// Translated and approved; eligible for display.
    Finished,
    /// Present in the source but not yet (re)translated.
    Unfinished,
    /// The source string no longer exists in the application.
    Obsolete,
    /// Like obsolete, but the extractor found a probable replacement.
    Vanished,
}

impl TranslationStatus {
    /// Whether the message should be dropped from merged lookup views.
    #[must_use]
    pub fn is_retired(self) -> bool {
        matches!(self, Self::Obsolete | Self::Vanished)
    }

    /// Attribute spelling used by the TS dialect.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Unfinished => "unfinished",
            Self::Obsolete => "obsolete",
            Self::Vanished => "vanished",
        }
    }
}

impl std::fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provenance record: where in the application source the string lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Origin identifier, typically a relative file path.
    pub origin: String,
    /// 1-based line number; 0 when the extractor did not record one.
    pub line: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.origin, self.line)
    }
}

/// One translatable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Canonical untranslated text; part of the lookup key.
    pub source: String,
    /// Free-text comment distinguishing identical sources in one context;
    /// part of the lookup key.
    pub disambiguation: Option<String>,
    /// Translated text. Exactly one entry unless `plural` is set, in which
    /// case one entry per plural category of the catalog locale. Empty when
    /// the translation is absent entirely.
    pub variants: SmallVec<[String; 1]>,
    /// Completion status.
    pub status: TranslationStatus,
    /// Whether this message carries one variant per plural category.
    pub plural: bool,
    /// Provenance records; never used for lookup.
    pub locations: SmallVec<[Location; 1]>,
    /// Unrecognized child elements and attributes, preserved verbatim for
    /// forward compatibility and lossless recompilation.
    pub extra: Vec<(String, String)>,
}

impl Message {
    /// A message with only a source string: unfinished, no variants.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            disambiguation: None,
            variants: SmallVec::new(),
            status: TranslationStatus::Unfinished,
            plural: false,
            locations: SmallVec::new(),
            extra: Vec::new(),
        }
    }

    /// Whether there is any recorded translation text at all.
    ///
    /// Note the distinction from status: an explicitly empty finished
    /// translation has a variant (the empty string) and returns `true`.
    #[must_use]
    pub fn has_translation(&self) -> bool {
        !self.variants.is_empty()
    }
}

/// A named grouping of messages, corresponding to one UI component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    /// Non-empty name, unique within a catalog.
    pub name: String,
    pub messages: Vec<Message>,
}

impl Context {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
        }
    }
}

/// The parsed representation of one locale's translation file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    /// Target locale. `None` marks a source catalog, whose translations
    /// equal their source strings.
    pub locale: Option<LocaleId>,
    /// Contexts in document order.
    pub contexts: Vec<Context>,
    /// Unrecognized root attributes (e.g. future format metadata).
    pub extra: Vec<(String, String)>,
}

impl Catalog {
    /// An empty catalog for the given locale.
    #[must_use]
    pub fn new(locale: Option<LocaleId>) -> Self {
        Self {
            locale,
            contexts: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Whether this is a source (untranslated) catalog.
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.locale.is_none()
    }

    /// Find a context by name.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Total message count across all contexts.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.contexts.iter().map(|c| c.messages.len()).sum()
    }

    /// Iterate `(context, message)` pairs in document order.
    pub fn messages(&self) -> impl Iterator<Item = (&Context, &Message)> {
        self.contexts
            .iter()
            .flat_map(|c| c.messages.iter().map(move |m| (c, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_statuses() {
        assert!(TranslationStatus::Obsolete.is_retired());
        assert!(TranslationStatus::Vanished.is_retired());
        assert!(!TranslationStatus::Finished.is_retired());
        assert!(!TranslationStatus::Unfinished.is_retired());
    }

    #[test]
    fn context_lookup_is_by_name() {
        let mut catalog = Catalog::new(None);
        catalog.contexts.push(Context::new("Dialog"));
        catalog.contexts.push(Context::new("Menu"));
        assert_eq!(catalog.context("Menu").unwrap().name, "Menu");
        assert!(catalog.context("Missing").is_none());
    }

    #[test]
    fn message_count_spans_contexts() {
        let mut catalog = Catalog::new(None);
        let mut a = Context::new("A");
        a.messages.push(Message::new("one"));
        a.messages.push(Message::new("two"));
        let mut b = Context::new("B");
        b.messages.push(Message::new("three"));
        catalog.contexts.push(a);
        catalog.contexts.push(b);
        assert_eq!(catalog.message_count(), 3);
        assert_eq!(catalog.messages().count(), 3);
    }

    #[test]
    fn explicitly_empty_translation_counts_as_present() {
        let mut msg = Message::new("…");
        assert!(!msg.has_translation());
        msg.variants.push(String::new());
        assert!(msg.has_translation());
    }
}
