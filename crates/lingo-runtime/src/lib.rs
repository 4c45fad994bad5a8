#![forbid(unsafe_code)]

//! Runtime layer of the Lingo localization engine.
//!
//! # Role in Lingo
//! `lingo-runtime` serves translation queries. It indexes the immutable
//! [`Catalog`](lingo_catalog::Catalog) values produced by `lingo-catalog`,
//! resolves locale fallback chains, merges them eagerly into a flat
//! [`MergedView`], and answers [`Engine::translate`] calls in O(1) with no
//! locking.
//!
//! # Primary responsibilities
//! - **[`MessageIndex`]**: per-catalog `(context, source, disambiguation)`
//!   lookup with explicit duplicate-key policy.
//! - **[`resolve_chain`]/[`MergedView`]**: fallback computation and the
//!   per-key merge that lets partial catalogs degrade gracefully.
//! - **[`Engine`]**: the total `translate()` API with plural selection,
//!   positional placeholder substitution, and atomic snapshot swaps for
//!   locale switches and hot reloads.

pub mod engine;
pub mod index;
pub mod resolve;

pub use engine::{Engine, detect_system_locale};
pub use index::{DuplicateKeyError, DuplicatePolicy, MessageIndex};
pub use resolve::{MergedView, resolve_chain};
