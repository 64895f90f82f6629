use serde::{Deserialize, Serialize};

use super::ngram_model::NGramModel;

/// Splits text into tokens on ASCII whitespace, as model files are split.
///
/// No case folding or punctuation handling: tokens must match the
/// tokenization the model was trained on.
pub fn tokenize(text: &str) -> Vec<&str> {
	text.split_ascii_whitespace().collect()
}

/// Sentence-boundary handling for one scoring call.
///
/// - `bos`: condition the first token on `<s>` (the marker itself is not scored)
/// - `eos`: add the probability of `</s>` after the last token
///
/// Context fragments taken from the middle of a sentence must be scored
/// with `bos = false`. Both flags are ignored when the model lacks the marker.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreOptions {
	#[serde(default)]
	pub bos: bool,
	#[serde(default)]
	pub eos: bool,
}

impl ScoreOptions {
	/// A complete sentence: both markers.
	pub const SENTENCE: Self = Self { bos: true, eos: true };
}

/// Per-position breakdown of a scored sequence.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WordScore {
	/// The token as given, or `</s>` for the end-of-sentence position.
	pub token: String,
	/// Log10 probability of the token given its history, backoff included.
	pub log_prob: f64,
	/// Length of the n-gram that finally matched (1 = unigram).
	pub ngram_length: usize,
	/// True when the token mapped to `<unk>`.
	pub oov: bool,
}

/// Computes log10 probabilities of token sequences under a model.
///
/// A `Scorer` is a borrowed view: it holds no state of its own, is `Copy`,
/// and any number of them can read one model concurrently.
#[derive(Clone, Copy, Debug)]
pub struct Scorer<'m> {
	model: &'m NGramModel,
}

impl<'m> Scorer<'m> {
	pub fn new(model: &'m NGramModel) -> Self {
		Self { model }
	}

	pub fn model(&self) -> &'m NGramModel {
		self.model
	}

	/// Log10 P(`word` | `history`).
	///
	/// Only the last `N - 1` ids of `history` are used. The longest history
	/// is tried first; each miss adds the backoff weight of the history
	/// being dropped (0 when it has none) and retries with one token less.
	/// The unigram table always answers, so the loop runs at most `N` times.
	pub fn conditional(&self, history: &[u32], word: u32) -> f64 {
		let mut key = Vec::with_capacity(self.model.order());
		self.backoff_walk(history, word, &mut key).0
	}

	/// Returns the log10 probability and the length of the matching n-gram.
	///
	/// `key` is scratch space for the lookups, reused across positions.
	fn backoff_walk(&self, history: &[u32], word: u32, key: &mut Vec<u32>) -> (f64, usize) {
		let longest = history.len().min(self.model.order().saturating_sub(1));
		let mut penalty = 0.0;

		for length in (0..=longest).rev() {
			let context = &history[history.len() - length..];
			key.clear();
			key.extend_from_slice(context);
			key.push(word);

			if let Some(entry) = self.model.lookup(key.as_slice()) {
				return (penalty + f64::from(entry.log_prob), length + 1);
			}
			if let Some(backoff) = self.model.lookup(context).and_then(|entry| entry.backoff) {
				penalty += f64::from(backoff);
			}
		}

		// Only reachable for an id outside the vocabulary
		(penalty + f64::from(self.model.unknown_log_prob()), 0)
	}

	/// Log10 probability of a sequence of token ids.
	///
	/// An empty sequence scores 0.0 whatever the options.
	pub fn score_ids(&self, ids: &[u32], options: ScoreOptions) -> f64 {
		self.walk(ids, options, |_, _, _| ())
	}

	/// Log10 probability of a token sequence.
	///
	/// Unknown tokens are scored as `<unk>`; this never fails.
	pub fn score_sequence<S: AsRef<str>>(&self, tokens: &[S], options: ScoreOptions) -> f64 {
		let ids = self.model.vocabulary().ids(tokens);
		self.score_ids(&ids, options)
	}

	/// Tokenizes `text` on whitespace, then scores it.
	pub fn score_text(&self, text: &str, options: ScoreOptions) -> f64 {
		self.score_sequence(&tokenize(text), options)
	}

	/// Scores a sequence and reports every position.
	///
	/// The log probabilities of the result add up to `score_sequence`.
	pub fn full_scores<S: AsRef<str>>(&self, tokens: &[S], options: ScoreOptions) -> Vec<WordScore> {
		let vocabulary = self.model.vocabulary();
		let ids = vocabulary.ids(tokens);
		let mut scores = Vec::with_capacity(ids.len() + 1);

		self.walk(&ids, options, |position, log_prob, ngram_length| {
			let (token, oov) = match tokens.get(position) {
				Some(token) => (token.as_ref(), ids[position] == vocabulary.unknown_id()),
				None => (super::vocabulary::SENTENCE_END, false),
			};
			scores.push(WordScore { token: token.to_owned(), log_prob, ngram_length, oov });
		});
		scores
	}

	/// Perplexity of `text` read as one complete sentence.
	///
	/// `10^(-score / (words + 1))`, the `+ 1` being the `</s>` position.
	/// Empty text has perplexity 1.
	pub fn perplexity(&self, text: &str) -> f64 {
		let tokens = tokenize(text);
		if tokens.is_empty() {
			return 1.0;
		}
		let score = self.score_sequence(&tokens, ScoreOptions::SENTENCE);
		10f64.powf(-score / (tokens.len() + 1) as f64)
	}

	/// Walks the sequence once, reporting `(position, log_prob, ngram_length)`
	/// for every scored position, and returns the total.
	///
	/// The `</s>` position, when scored, is reported as `ids.len()`.
	fn walk<F>(&self, ids: &[u32], options: ScoreOptions, mut report: F) -> f64
	where
		F: FnMut(usize, f64, usize),
	{
		if ids.is_empty() {
			return 0.0;
		}

		let vocabulary = self.model.vocabulary();
		let mut history = Vec::with_capacity(ids.len() + 1);
		let mut key = Vec::with_capacity(self.model.order());
		if options.bos {
			history.extend(vocabulary.start_id());
		}

		let mut total = 0.0;
		for (position, &id) in ids.iter().enumerate() {
			let (log_prob, ngram_length) = self.backoff_walk(&history, id, &mut key);
			report(position, log_prob, ngram_length);
			total += log_prob;
			history.push(id);
		}

		if options.eos {
			if let Some(end) = vocabulary.end_id() {
				let (log_prob, ngram_length) = self.backoff_walk(&history, end, &mut key);
				report(ids.len(), log_prob, ngram_length);
				total += log_prob;
			}
		}
		total
	}
}
