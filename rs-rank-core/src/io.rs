use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{LoadError, LoadResult};

/// Reads a whole model file into memory.
///
/// - A missing file maps to `LoadError::FileNotFound`
/// - Any other I/O failure maps to `LoadError::Io`
pub(crate) fn read_model_file<P: AsRef<Path>>(path: P) -> LoadResult<Vec<u8>> {
	let path = path.as_ref();
	fs::read(path).map_err(|source| match source.kind() {
		io::ErrorKind::NotFound => LoadError::FileNotFound { path: path.to_owned() },
		_ => LoadError::Io { path: path.to_owned(), source },
	})
}

/// Reads a text model file, rejecting content that is not UTF-8.
pub(crate) fn read_model_text<P: AsRef<Path>>(path: P) -> LoadResult<String> {
	let bytes = read_model_file(path)?;
	String::from_utf8(bytes).map_err(|e| {
		LoadError::malformed(0, format!("model file is not valid UTF-8 ({e})"))
	})
}

/// Writes `bytes` to `path` through a temporary file in the same directory,
/// so readers never observe a half-written file.
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
	let path = path.as_ref();
	let parent = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	fs::create_dir_all(parent)?;

	let mut temp_file = NamedTempFile::new_in(parent)?;
	temp_file.write_all(bytes)?;
	temp_file.flush()?;
	temp_file.persist(path).map_err(|e| e.error)?;
	Ok(())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/wiki.arpa` + `"bin"` → `data/wiki.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/wiki.arpa"` → `"wiki"`
/// - `"wiki.bin"` → `"wiki"`
/// - `""` → `"model"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> String {
	input_path
		.as_ref()
		.file_stem()
		.map(|stem| stem.to_string_lossy().to_string())
		.unwrap_or_else(|| "model".to_owned())
}

/// Returns true when the path carries the given extension (case-insensitive).
pub(crate) fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
	path.as_ref()
		.extension()
		.map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
		.unwrap_or(false)
}
