//! Commit enrichment pipeline.
//!
//! Each ingested commit flows through three deterministic stages before it is
//! persisted: the ignore filter drops uninteresting file paths, the language
//! detector tags the survivors, and the classifier derives the commit-type
//! flags from the message and structure. All three stages are pure with
//! respect to their inputs; the only I/O is the one-time load of the
//! `file_extensions` table at sync start.

pub mod classifier;
pub mod ignore;
pub mod language;

pub use classifier::{CommitEnrichment, classify_commit};
pub use ignore::IgnoreFilter;
pub use language::LanguageDetector;
