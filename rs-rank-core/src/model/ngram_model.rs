use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::arpa;
use super::vocabulary::Vocabulary;
use crate::error::{LoadError, LoadResult, SaveError};
use crate::io;

/// Highest n-gram order the engine accepts.
pub const MAX_ORDER: usize = 6;

/// Log10 probability given to `<unk>` when the model file has none.
pub const UNKNOWN_LOG_PROB: f32 = -100.0;

const BINARY_MAGIC: [u8; 4] = *b"RRLM";
const BINARY_VERSION: u32 = 1;

/// One n-gram of the model.
///
/// `log_prob` is the base-10 log of P(last token | preceding tokens).
/// `backoff` is the base-10 backoff weight paid when this n-gram is used as a
/// history that fails to extend; entries of the highest order carry none.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NGramEntry {
	pub log_prob: f32,
	pub backoff: Option<f32>,
}

/// Entries of a single order, keyed by token-id sequence.
pub(crate) type NGramTable = HashMap<Box<[u32]>, NGramEntry>;

/// Immutable n-gram language model.
///
/// Holds one hash table per order (unigrams first) and the vocabulary.
/// Built once, then only read, so a model can be shared between threads
/// (`&NGramModel` or `Arc<NGramModel>`) without any locking.
///
/// # Invariants
/// - `1 <= order <= MAX_ORDER`
/// - `tables.len() == order` and every key of `tables[k]` has length `k + 1`
/// - Every vocabulary id, `<unk>` included, has a unigram entry
///
/// Deserializing checks every invariant, whatever the serde format.
#[derive(Serialize, Deserialize, Debug)]
#[serde(try_from = "RawModel")]
pub struct NGramModel {
	/// Display name, the stem of the file the model was loaded from.
	#[serde(skip)]
	name: String,
	order: usize,
	vocabulary: Vocabulary,
	tables: Vec<NGramTable>,
}

/// Decoded fields of a model, not yet validated.
#[derive(Deserialize)]
struct RawModel {
	order: usize,
	vocabulary: Vocabulary,
	tables: Vec<NGramTable>,
}

impl TryFrom<RawModel> for NGramModel {
	type Error = LoadError;

	fn try_from(raw: RawModel) -> LoadResult<Self> {
		let model = Self {
			name: "model".to_owned(),
			order: raw.order,
			vocabulary: raw.vocabulary,
			tables: raw.tables,
		};
		model.validate()?;
		Ok(model)
	}
}

impl NGramModel {
	/// Assembles a model from parsed parts.
	pub(crate) fn from_parts(vocabulary: Vocabulary, tables: Vec<NGramTable>) -> Self {
		Self { name: "model".to_owned(), order: tables.len(), vocabulary, tables }
	}

	/// Loads a model from disk.
	///
	/// - Files with a `.bin` extension are decoded as a binary image
	///   written by [`NGramModel::save_binary`].
	/// - Anything else is parsed as ARPA text.
	///
	/// # Errors
	/// - `FileNotFound` if the path does not exist
	/// - `MalformedFormat` if the content is truncated or invalid
	/// - `UnsupportedOrder` if the model order is outside `1..=MAX_ORDER`
	pub fn load<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
		let path = path.as_ref();
		let mut model = if io::has_extension(path, "bin") {
			Self::from_binary(&io::read_model_file(path)?)?
		} else {
			Self::from_arpa_str(&io::read_model_text(path)?)?
		};
		model.name = io::get_filename(path);

		info!(
			"Loaded {}-gram model '{}' from {} ({} words, counts {:?})",
			model.order,
			model.name,
			path.display(),
			model.vocabulary.len(),
			model.counts(),
		);
		Ok(model)
	}

	/// Loads a text model through its binary cache.
	///
	/// If `<stem>.bin` exists next to `path` and is not older than it, the
	/// binary image is loaded. Otherwise the text model is parsed and the
	/// binary image is written for the next start. A cache that fails to
	/// load or to write is logged and skipped, never fatal.
	pub fn load_cached<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
		let path = path.as_ref();
		if io::has_extension(path, "bin") {
			return Self::load(path);
		}

		let binary_path = io::build_output_path(path, "bin")
			.map_err(|source| LoadError::Io { path: path.to_owned(), source })?;

		if cache_is_fresh(&binary_path, path) {
			match Self::load(&binary_path) {
				Ok(model) => return Ok(model),
				Err(e) => warn!("Ignoring binary cache {}: {e}", binary_path.display()),
			}
		}

		let model = Self::load(path)?;
		if let Err(e) = model.save_binary(&binary_path) {
			warn!("Could not write binary cache {}: {e}", binary_path.display());
		}
		Ok(model)
	}

	/// Parses an ARPA model held in memory.
	pub fn from_arpa_str(text: &str) -> LoadResult<Self> {
		arpa::parse(text)
	}

	/// Writes the compact binary image of this model.
	///
	/// The write is atomic: the image lands in a temporary file that is then
	/// renamed over `path`.
	pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> {
		let mut bytes = postcard::to_stdvec(&(BINARY_MAGIC, BINARY_VERSION))?;
		bytes.extend(postcard::to_stdvec(self)?);
		io::write_atomic(&path, &bytes)?;

		info!("Wrote binary model {} ({} bytes)", path.as_ref().display(), bytes.len());
		Ok(())
	}

	/// Decodes a binary image and checks every invariant of the model.
	fn from_binary(bytes: &[u8]) -> LoadResult<Self> {
		let ((magic, version), rest): (([u8; 4], u32), &[u8]) = postcard::take_from_bytes(bytes)
			.map_err(|e| LoadError::malformed(0, format!("unreadable binary header ({e})")))?;
		if magic != BINARY_MAGIC {
			return Err(LoadError::malformed(0, "not a binary model image"));
		}
		if version != BINARY_VERSION {
			return Err(LoadError::malformed(
				0,
				format!("binary format version {version}, expected {BINARY_VERSION}"),
			));
		}

		let raw: RawModel = postcard::from_bytes(rest)
			.map_err(|e| LoadError::malformed(0, format!("corrupt binary image ({e})")))?;
		Self::try_from(raw)
	}

	fn validate(&self) -> LoadResult<()> {
		if self.order == 0 || self.order > MAX_ORDER {
			return Err(LoadError::UnsupportedOrder { order: self.order, max: MAX_ORDER });
		}
		if self.tables.len() != self.order {
			return Err(LoadError::malformed(0, "table count does not match the model order"));
		}
		if !self.vocabulary.is_consistent() {
			return Err(LoadError::malformed(0, "inconsistent vocabulary"));
		}

		let vocabulary_size = self.vocabulary.len() as u32;
		for (index, table) in self.tables.iter().enumerate() {
			let well_formed = table
				.keys()
				.all(|key| key.len() == index + 1 && key.iter().all(|&id| id < vocabulary_size));
			if !well_formed {
				return Err(LoadError::malformed(0, format!("invalid {}-gram key", index + 1)));
			}
		}

		if (0..vocabulary_size).any(|id| self.lookup(&[id]).is_none()) {
			return Err(LoadError::malformed(0, "vocabulary word without unigram entry"));
		}
		Ok(())
	}

	/// Returns the entry for exactly this id sequence.
	///
	/// No backoff happens here: a missing n-gram is `None`, as is an empty
	/// sequence or one longer than the model order.
	pub fn lookup(&self, ids: &[u32]) -> Option<NGramEntry> {
		if ids.is_empty() {
			return None;
		}
		self.tables.get(ids.len() - 1)?.get(ids).copied()
	}

	/// Maximum n-gram order `N`.
	pub fn order(&self) -> usize {
		self.order
	}

	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	/// Number of entries per order, unigrams first.
	pub fn counts(&self) -> Vec<usize> {
		self.tables.iter().map(HashMap::len).collect()
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Unigram log10 probability of `<unk>`.
	pub fn unknown_log_prob(&self) -> f32 {
		self.lookup(&[self.vocabulary.unknown_id()])
			.map(|entry| entry.log_prob)
			.unwrap_or(UNKNOWN_LOG_PROB)
	}
}

/// A cache is usable when it exists and is at least as recent as its source.
fn cache_is_fresh(binary: &Path, source: &Path) -> bool {
	let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
	match (modified(binary), modified(source)) {
		(Some(binary), Some(source)) => binary >= source,
		// Source gone: the cache is all there is
		(Some(_), None) => true,
		_ => false,
	}
}
