//! Top-level module for the language-model ranking engine.
//!
//! This module provides, leaves first:
//! - Token/id mapping (`Vocabulary`)
//! - ARPA text parsing (internal)
//! - The immutable model store (`NGramModel`)
//! - Backoff scoring of token sequences (`Scorer`)
//! - Candidate ordering by marginal score (`Ranker`)

/// Token ↔ id mapping with the reserved `<unk>`, `<s>` and `</s>` symbols.
pub mod vocabulary;

/// ARPA text reader.
///
/// Validates the header and every section, and fans large sections
/// out over worker threads. Not exposed publicly.
mod arpa;

/// Immutable n-gram model (`1 <= n <= MAX_ORDER`).
///
/// Exact lookups by id sequence, text and binary loading, binary cache.
pub mod ngram_model;

/// Log10 probability of token sequences with ARPA backoff.
pub mod scorer;

/// Candidate ranking by marginal score.
pub mod ranker;
