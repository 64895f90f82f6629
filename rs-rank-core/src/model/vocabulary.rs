use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reserved unknown-token symbol.
pub const UNKNOWN_TOKEN: &str = "<unk>";

/// Sentence-start marker.
pub const SENTENCE_START: &str = "<s>";

/// Sentence-end marker.
pub const SENTENCE_END: &str = "</s>";

/// Maps tokens to dense integer ids.
///
/// Ids are assigned in insertion order (the order of the unigram section of
/// the model file), so `id_to_token[id]` is the reverse mapping.
///
/// # Invariants
/// - `<unk>` is always present
/// - `token_to_id` and `id_to_token` describe the same bijection
/// - Immutable once the model is built
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Vocabulary {
	token_to_id: HashMap<String, u32>,
	id_to_token: Vec<String>,
	unknown_id: u32,
	start_id: Option<u32>,
	end_id: Option<u32>,
}

impl Vocabulary {
	/// Builds a vocabulary from unique tokens.
	///
	/// Appends `<unk>` when it is missing from `tokens`.
	///
	/// # Errors
	/// Returns the offending token if it appears twice.
	pub(crate) fn from_tokens<I, S>(tokens: I) -> Result<Self, String>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut token_to_id = HashMap::new();
		let mut id_to_token = Vec::new();

		for token in tokens {
			let token = token.into();
			let id = id_to_token.len() as u32;
			if token_to_id.insert(token.clone(), id).is_some() {
				return Err(token);
			}
			id_to_token.push(token);
		}

		let unknown_id = match token_to_id.get(UNKNOWN_TOKEN) {
			Some(&id) => id,
			None => {
				let id = id_to_token.len() as u32;
				token_to_id.insert(UNKNOWN_TOKEN.to_owned(), id);
				id_to_token.push(UNKNOWN_TOKEN.to_owned());
				id
			}
		};

		let start_id = token_to_id.get(SENTENCE_START).copied();
		let end_id = token_to_id.get(SENTENCE_END).copied();

		Ok(Self { token_to_id, id_to_token, unknown_id, start_id, end_id })
	}

	/// Returns the id of `token`, or the `<unk>` id when it is unknown.
	pub fn id(&self, token: &str) -> u32 {
		self.get(token).unwrap_or(self.unknown_id)
	}

	/// Returns the id of `token` only if it is in the vocabulary.
	pub fn get(&self, token: &str) -> Option<u32> {
		self.token_to_id.get(token).copied()
	}

	/// Returns the token of an id.
	pub fn token(&self, id: u32) -> Option<&str> {
		self.id_to_token.get(id as usize).map(String::as_str)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.token_to_id.contains_key(token)
	}

	pub fn unknown_id(&self) -> u32 {
		self.unknown_id
	}

	/// Id of `<s>`, if the model has one.
	pub fn start_id(&self) -> Option<u32> {
		self.start_id
	}

	/// Id of `</s>`, if the model has one.
	pub fn end_id(&self) -> Option<u32> {
		self.end_id
	}

	/// Number of tokens, `<unk>` included.
	pub fn len(&self) -> usize {
		self.id_to_token.len()
	}

	/// Never true in practice: `<unk>` is always present.
	pub fn is_empty(&self) -> bool {
		self.id_to_token.is_empty()
	}

	/// Maps each token to its id, `<unk>` for unknown tokens.
	pub fn ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
		tokens.iter().map(|t| self.id(t.as_ref())).collect()
	}

	/// Checks the bijection after decoding a binary image.
	pub(crate) fn is_consistent(&self) -> bool {
		self.token_to_id.len() == self.id_to_token.len()
			&& self
				.id_to_token
				.iter()
				.enumerate()
				.all(|(id, token)| self.token_to_id.get(token) == Some(&(id as u32)))
			&& self.token(self.unknown_id) == Some(UNKNOWN_TOKEN)
			&& self.start_id.is_none_or(|id| self.token(id) == Some(SENTENCE_START))
			&& self.end_id.is_none_or(|id| self.token(id) == Some(SENTENCE_END))
	}
}
