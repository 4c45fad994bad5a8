#![forbid(unsafe_code)]

//! Catalog layer of the Lingo localization engine.
//!
//! # Role in Lingo
//! `lingo-catalog` is the offline half: it turns serialized translation
//! catalogs (the Qt Linguist TS dialect) into immutable [`Catalog`] values,
//! validates them, and optionally compiles them into a compact binary form
//! for fast loading.
//!
//! # Primary responsibilities
//! - **Model**: [`Catalog`]/[`Context`]/[`Message`] with status, plural
//!   flags, and provenance.
//! - **Parser**: strict TS-dialect decoding with positioned [`ParseError`]s.
//! - **Locales**: [`LocaleId`] parsing and specificity stripping.
//! - **Plural rules**: count → category mapping and variant ordering.
//! - **Validator/compiler**: structural [`Diagnostic`]s and the lossless
//!   binary catalog form.
//!
//! # How it fits in the system
//! `lingo-runtime` indexes catalogs produced here, merges them per locale
//! fallback chain, and serves `translate()` queries. Parsing and compiling
//! are stateless and synchronous, so hosts may run them in parallel across
//! catalog files at startup.

pub mod compile;
pub mod locale;
pub mod model;
pub mod parser;
pub mod plural;
pub mod validate;

pub use compile::{CompileError, compile, decompile};
pub use locale::{LocaleError, LocaleId};
pub use model::{Catalog, Context, Location, Message, TranslationStatus};
pub use parser::{ParseError, parse_bytes, parse_str};
pub use plural::{PluralCategory, PluralRule};
pub use validate::{
    ContextCoverage, CoverageReport, Diagnostic, DiagnosticKind, coverage, placeholder_mask,
    validate,
};
