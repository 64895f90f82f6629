use std::path::PathBuf;

use thiserror::Error;

/// Failure to build a model from disk or memory.
///
/// Every variant is fatal: a caller must not serve ranking requests
/// without a fully loaded model.
#[derive(Error, Debug)]
pub enum LoadError {
	#[error("Model file not found: {}", .path.display())]
	FileNotFound { path: PathBuf },

	#[error("Malformed model (line {line}): {reason}")]
	MalformedFormat { line: usize, reason: String },

	#[error("Unsupported n-gram order {order} (supported: 1..={max})")]
	UnsupportedOrder { order: usize, max: usize },

	#[error("IO error on {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl LoadError {
	/// Shorthand for a `MalformedFormat` error.
	///
	/// `line` is 1-based; 0 means the problem is not tied to a line
	/// (e.g. a corrupt binary image or a premature end of file).
	pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
		Self::MalformedFormat { line, reason: reason.into() }
	}
}

/// Failure to write a binary model image.
#[derive(Error, Debug)]
pub enum SaveError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Encoding error: {0}")]
	Encode(#[from] postcard::Error),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
