use log::debug;
use serde::{Deserialize, Serialize};

use super::ngram_model::NGramModel;
use super::scorer::{ScoreOptions, Scorer, tokenize};

/// Ranking policy options.
///
/// Candidates are always compared by their marginal score: the log10
/// probability of `context + candidate` minus that of `context` alone, both
/// scored without `<s>` since a context is usually a mid-sentence fragment.
/// With an empty context the marginal score is the candidate's own score.
///
/// # Fields
/// - `end_of_sentence`: also score `</s>` at the end of both terms, so that
///   candidates which plausibly end the sentence are favoured. Off by default.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankerConfig {
	#[serde(default)]
	pub end_of_sentence: bool,
}

/// A candidate with its marginal score.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
	pub candidate: String,
	pub score: f64,
}

/// The context of one ranking call, tokenized and scored once.
struct ScoredContext {
	ids: Vec<u32>,
	score: f64,
}

/// Orders candidate continuations of a context by likelihood.
///
/// # Responsibilities
/// - Score the context once per call and each candidate against it
/// - Sort by marginal score, best first
///
/// # Invariants
/// - The sort is stable: equal scores keep their input order
/// - Duplicated candidates are all kept
/// - Ranking never fails, whatever the input
#[derive(Clone, Copy, Debug)]
pub struct Ranker<'m> {
	scorer: Scorer<'m>,
	config: RankerConfig,
}

impl<'m> Ranker<'m> {
	/// Creates a ranker with the default policy.
	pub fn new(model: &'m NGramModel) -> Self {
		Self::with_config(model, RankerConfig::default())
	}

	pub fn with_config(model: &'m NGramModel, config: RankerConfig) -> Self {
		Self { scorer: Scorer::new(model), config }
	}

	pub fn config(&self) -> RankerConfig {
		self.config
	}

	fn options(&self) -> ScoreOptions {
		ScoreOptions { bos: false, eos: self.config.end_of_sentence }
	}

	fn score_context(&self, context: &str) -> ScoredContext {
		let ids = self.scorer.model().vocabulary().ids(&tokenize(context));
		let score = self.scorer.score_ids(&ids, self.options());
		ScoredContext { ids, score }
	}

	fn marginal(&self, context: &ScoredContext, candidate: &str) -> f64 {
		let vocabulary = self.scorer.model().vocabulary();
		let candidate_ids = tokenize(candidate).into_iter().map(|token| vocabulary.id(token));

		if context.ids.is_empty() {
			let ids: Vec<u32> = candidate_ids.collect();
			return self.scorer.score_ids(&ids, self.options());
		}

		let mut ids = context.ids.clone();
		ids.extend(candidate_ids);
		self.scorer.score_ids(&ids, self.options()) - context.score
	}

	/// Marginal score of a single candidate.
	pub fn marginal_score(&self, context: &str, candidate: &str) -> f64 {
		self.marginal(&self.score_context(context), candidate)
	}

	/// Scores every candidate, keeping the input order.
	pub fn score_candidates<S: AsRef<str>>(&self, context: &str, candidates: &[S]) -> Vec<ScoredCandidate> {
		if candidates.is_empty() {
			return Vec::new();
		}

		let context = self.score_context(context);
		candidates
			.iter()
			.map(|candidate| ScoredCandidate {
				candidate: candidate.as_ref().to_owned(),
				score: self.marginal(&context, candidate.as_ref()),
			})
			.collect()
	}

	/// Scores and sorts the candidates, best first.
	pub fn rank_scored<S: AsRef<str>>(&self, context: &str, candidates: &[S]) -> Vec<ScoredCandidate> {
		let mut scored = self.score_candidates(context, candidates);
		// `sort_by` is stable
		scored.sort_by(|a, b| b.score.total_cmp(&a.score));

		debug!(
			"Ranked {} candidates after a {}-token context",
			scored.len(),
			tokenize(context).len()
		);
		scored
	}

	/// Returns the candidates, best first.
	pub fn rank<S: AsRef<str>>(&self, context: &str, candidates: &[S]) -> Vec<String> {
		self.rank_scored(context, candidates)
			.into_iter()
			.map(|scored| scored.candidate)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use rand::rngs::StdRng;
	use rand::seq::SliceRandom;
	use rand::SeedableRng;

	use super::*;
	use crate::fixtures::tiny_model;

	fn assert_close(actual: f64, expected: f64) {
		assert!((actual - expected).abs() < 1e-4, "expected {expected}, got {actual}");
	}

	#[test]
	fn test_frequent_continuation_first_and_unseen_tied() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);

		assert_eq!(ranker.rank("the cat", &["sat", "flew", "jumped"]), vec!["sat", "flew", "jumped"]);
		assert_eq!(ranker.rank("the cat", &["jumped", "flew", "sat"]), vec!["sat", "jumped", "flew"]);

		let scored = ranker.rank_scored("the cat", &["sat", "flew", "jumped"]);
		assert_eq!(scored[1].score, scored[2].score);
	}

	#[test]
	fn test_empty_context_uses_unigrams() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		assert_eq!(ranker.rank("", &["xyzzyunseen", "hello"]), vec!["hello", "xyzzyunseen"]);
		assert_close(ranker.marginal_score("   ", "hello"), -1.1761);
	}

	#[test]
	fn test_marginal_score_isolates_the_candidate() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		assert_close(ranker.marginal_score("the cat", "sat"), -0.0969);
		assert_close(ranker.marginal_score("the cat", "sat on"), -0.0969 - 0.0458);
		assert_eq!(ranker.marginal_score("the cat", ""), 0.0);
	}

	#[test]
	fn test_end_of_sentence_policy() {
		let model = tiny_model();
		let ranker = Ranker::with_config(&model, RankerConfig { end_of_sentence: true });
		// [P(mat | the) + P(</s> | the mat)] - P(</s> | the)
		assert_close(ranker.marginal_score("the", "mat"), (-0.6990 - 0.1) - (-0.3010 - 0.9031));
		assert_close(Ranker::new(&model).marginal_score("the", "mat"), -0.6990);
	}

	#[test]
	fn test_single_and_empty_lists() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		assert_eq!(ranker.rank("the cat", &["anything at all"]), vec!["anything at all"]);
		let empty: [&str; 0] = [];
		assert!(ranker.rank("the cat", &empty).is_empty());
		assert!(ranker.rank("", &empty).is_empty());
	}

	#[test]
	fn test_duplicates_are_kept() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		assert_eq!(ranker.rank("the cat", &["flew", "sat", "flew"]), vec!["sat", "flew", "flew"]);
	}

	#[test]
	fn test_ties_keep_input_order() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		let candidates = ["qux", "foo", "bar", "baz"];
		assert_eq!(ranker.rank("the cat", &candidates), candidates.to_vec());
	}

	#[test]
	fn test_order_independent_of_input_permutation() {
		let model = tiny_model();
		let ranker = Ranker::new(&model);
		let mut candidates = vec!["sat", "on", "mat", "hello", "cat", "the", "xyzzy"];
		let expected = ranker.rank("the cat", &candidates);
		assert_eq!(expected, vec!["sat", "the", "cat", "hello", "on", "mat", "xyzzy"]);

		let mut rng = StdRng::seed_from_u64(42);
		for _ in 0..20 {
			candidates.shuffle(&mut rng);
			assert_eq!(ranker.rank("the cat", &candidates), expected);
		}
	}
}
