//! N-gram language-model ranking library.
//!
//! This crate scores text with a pretrained n-gram model and orders
//! candidate completions by how likely they are to follow a context:
//! - ARPA model loading with a compact binary cache
//! - Backoff scoring of whitespace-tokenized sequences
//! - Stable ranking of candidates by marginal score
//!
//! A model is loaded once and is immutable afterwards, so it can be
//! shared across threads without locking.

/// Model store, scorer and ranker.
pub mod model;

/// Load and save errors.
pub mod error;

/// I/O utilities (file reading, path helpers).
///
/// Not exposed
pub(crate) mod io;

pub use error::{LoadError, SaveError};
pub use model::ngram_model::{NGramEntry, NGramModel};
pub use model::ranker::{Ranker, RankerConfig, ScoredCandidate};
pub use model::scorer::{ScoreOptions, Scorer, WordScore, tokenize};
pub use model::vocabulary::Vocabulary;

#[cfg(test)]
pub(crate) mod fixtures {
	use crate::model::ngram_model::NGramModel;

	/// Toy trigram model shared by the unit tests.
	pub(crate) const TINY_ARPA: &str = include_str!("../tests/data/tiny.arpa");

	pub(crate) fn tiny_model() -> NGramModel {
		NGramModel::from_arpa_str(TINY_ARPA).unwrap()
	}
}
