//! Structural validation of parsed catalogs.
//!
//! Validation never fails: it produces a list of [`Diagnostic`]s for a build
//! pipeline to report. The checks mirror the invariants the runtime relies
//! on: key uniqueness, plural variant counts, non-empty finished variants,
//! and placeholder agreement between source and translation.

use memchr::memchr_iter;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::model::{Catalog, Location, Message, TranslationStatus};
use crate::plural::PluralRule;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Two messages share `(context, source, disambiguation)`.
    DuplicateKey,
    /// A plural message's variant count disagrees with the locale's
    /// plural-category count.
    PluralCountMismatch,
    /// A finished message has an empty variant where text is required.
    EmptyFinishedVariant,
    /// A finished variant references a different set of `%1`..`%9`
    /// placeholders than its source.
    PlaceholderMismatch,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DuplicateKey => "duplicate key",
            Self::PluralCountMismatch => "plural count mismatch",
            Self::EmptyFinishedVariant => "empty finished variant",
            Self::PlaceholderMismatch => "placeholder mismatch",
        };
        f.write_str(name)
    }
}

/// One validation finding, with enough provenance to locate the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub context: String,
    pub source: String,
    pub disambiguation: Option<String>,
    pub locations: SmallVec<[Location; 1]>,
    pub detail: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in context {:?}, source {:?}",
            self.kind, self.context, self.source
        )?;
        if let Some(d) = &self.disambiguation {
            write!(f, " ({d})")?;
        }
        write!(f, ": {}", self.detail)?;
        for loc in &self.locations {
            write!(f, " [{loc}]")?;
        }
        Ok(())
    }
}

/// Bitmask of numbered placeholders used in a string: bit `n-1` set when
/// `%n` occurs, for `n` in 1..=9.
#[must_use]
pub fn placeholder_mask(text: &str) -> u16 {
    let bytes = text.as_bytes();
    let mut mask = 0u16;
    for pos in memchr_iter(b'%', bytes) {
        if let Some(&d @ b'1'..=b'9') = bytes.get(pos + 1) {
            mask |= 1 << (d - b'1');
        }
    }
    mask
}

/// Validate one catalog, producing diagnostics in document order.
///
/// The plural-category count is taken from the catalog's own locale; a
/// source catalog validates plural messages against the two-category root
/// rule.
#[must_use]
pub fn validate(catalog: &Catalog) -> Vec<Diagnostic> {
    let rule = catalog
        .locale
        .as_ref()
        .map_or(PluralRule::English, PluralRule::for_locale);
    let mut diagnostics = Vec::new();

    for context in &catalog.contexts {
        let mut seen: FxHashMap<(&str, Option<&str>), &Message> = FxHashMap::default();
        for message in &context.messages {
            let key = (message.source.as_str(), message.disambiguation.as_deref());
            if let Some(first) = seen.get(&key) {
                let mut locations = first.locations.clone();
                locations.extend(message.locations.iter().cloned());
                diagnostics.push(diagnostic(
                    DiagnosticKind::DuplicateKey,
                    context.name.clone(),
                    message,
                    locations,
                    "the (context, source, disambiguation) triple occurs more than once"
                        .to_string(),
                ));
            } else {
                seen.insert(key, message);
            }

            check_plural_count(&rule, &context.name, message, &mut diagnostics);
            check_finished(&context.name, message, &mut diagnostics);
        }
    }
    diagnostics
}

fn check_plural_count(
    rule: &PluralRule,
    context: &str,
    message: &Message,
    out: &mut Vec<Diagnostic>,
) {
    // Absent translations on unfinished/retired plural messages are fine;
    // a finished plural message must carry the full category set.
    if !message.plural || message.status != TranslationStatus::Finished {
        return;
    }
    let expected = rule.category_count();
    if message.variants.len() != expected {
        out.push(diagnostic(
            DiagnosticKind::PluralCountMismatch,
            context.to_string(),
            message,
            message.locations.clone(),
            format!(
                "expected {expected} plural variant(s), found {}",
                message.variants.len()
            ),
        ));
    }
}

fn check_finished(context: &str, message: &Message, out: &mut Vec<Diagnostic>) {
    if message.status != TranslationStatus::Finished {
        return;
    }
    // Plural messages with an empty variant are incomplete translations.
    // Non-plural messages may be explicitly empty (punctuation-only source
    // strings); only plural variants are required to be non-empty.
    if message.plural && message.variants.iter().any(String::is_empty) {
        out.push(diagnostic(
            DiagnosticKind::EmptyFinishedVariant,
            context.to_string(),
            message,
            message.locations.clone(),
            "finished plural message has an empty variant".to_string(),
        ));
    }
    if !message.plural && message.variants.is_empty() {
        out.push(diagnostic(
            DiagnosticKind::EmptyFinishedVariant,
            context.to_string(),
            message,
            message.locations.clone(),
            "finished message has no translation text".to_string(),
        ));
    }

    let source_mask = placeholder_mask(&message.source);
    for (i, variant) in message.variants.iter().enumerate() {
        if variant.is_empty() {
            continue; // already reported, or explicitly empty
        }
        let mask = placeholder_mask(variant);
        if mask != source_mask {
            out.push(diagnostic(
                DiagnosticKind::PlaceholderMismatch,
                context.to_string(),
                message,
                message.locations.clone(),
                format!(
                    "variant {i} uses placeholders {} but the source uses {}",
                    mask_names(mask),
                    mask_names(source_mask)
                ),
            ));
        }
    }
}

fn diagnostic(
    kind: DiagnosticKind,
    context: String,
    message: &Message,
    locations: SmallVec<[Location; 1]>,
    detail: String,
) -> Diagnostic {
    Diagnostic {
        kind,
        context,
        source: message.source.clone(),
        disambiguation: message.disambiguation.clone(),
        locations,
        detail,
    }
}

fn mask_names(mask: u16) -> String {
    if mask == 0 {
        return "none".to_string();
    }
    let mut names = String::new();
    for n in 1..=9u16 {
        if mask & (1 << (n - 1)) != 0 {
            if !names.is_empty() {
                names.push(' ');
            }
            names.push('%');
            names.push((b'0' + n as u8) as char);
        }
    }
    names
}

/// Per-context completion statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextCoverage {
    pub name: String,
    pub finished: usize,
    pub unfinished: usize,
    pub retired: usize,
}

/// Completion statistics for a whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageReport {
    pub contexts: Vec<ContextCoverage>,
}

impl CoverageReport {
    /// Total number of active (non-retired) messages.
    #[must_use]
    pub fn active_total(&self) -> usize {
        self.contexts
            .iter()
            .map(|c| c.finished + c.unfinished)
            .sum()
    }

    /// Total number of finished messages.
    #[must_use]
    pub fn finished_total(&self) -> usize {
        self.contexts.iter().map(|c| c.finished).sum()
    }
}

/// Summarize completion status per context, in document order.
#[must_use]
pub fn coverage(catalog: &Catalog) -> CoverageReport {
    let contexts = catalog
        .contexts
        .iter()
        .map(|context| {
            let mut cov = ContextCoverage {
                name: context.name.clone(),
                finished: 0,
                unfinished: 0,
                retired: 0,
            };
            for message in &context.messages {
                match message.status {
                    TranslationStatus::Finished => cov.finished += 1,
                    TranslationStatus::Unfinished => cov.unfinished += 1,
                    _ => cov.retired += 1,
                }
            }
            cov
        })
        .collect();
    CoverageReport { contexts }
}
