use std::fs;
use std::path::PathBuf;

use rs_rank_core::{LoadError, NGramModel, ScoreOptions, Scorer};

fn fixture(name: &str) -> PathBuf {
	PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

#[test]
fn test_load_arpa_file() {
	let model = NGramModel::load(fixture("tiny.arpa")).unwrap();
	assert_eq!(model.name(), "tiny");
	assert_eq!(model.order(), 3);
	assert_eq!(model.counts(), vec![9, 9, 5]);
	assert_eq!(model.vocabulary().len(), 9);
}

#[test]
fn test_missing_file_is_reported() {
	match NGramModel::load(fixture("missing.arpa")) {
		Err(LoadError::FileNotFound { path }) => assert!(path.ends_with("missing.arpa")),
		other => panic!("unexpected result {other:?}"),
	}
}

#[test]
fn test_truncated_file_is_malformed() {
	let text = fs::read_to_string(fixture("tiny.arpa")).unwrap();
	let cut = text.find("\\3-grams:").unwrap() + "\\3-grams:\n".len();

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("cut.arpa");
	fs::write(&path, &text[..cut]).unwrap();

	let err = NGramModel::load(&path).unwrap_err();
	assert!(matches!(err, LoadError::MalformedFormat { .. }), "got {err:?}");
}

#[test]
fn test_unsupported_order_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("deep.arpa");
	let header: String = (1..=9).map(|n| format!("ngram {n}=1\n")).collect();
	fs::write(&path, format!("\\data\\\n{header}")).unwrap();

	let err = NGramModel::load(&path).unwrap_err();
	assert!(matches!(err, LoadError::UnsupportedOrder { order: 7, .. }), "got {err:?}");
}

#[test]
fn test_binary_cache_scores_like_text() {
	let dir = tempfile::tempdir().unwrap();
	let text_path = dir.path().join("tiny.arpa");
	fs::copy(fixture("tiny.arpa"), &text_path).unwrap();

	let text_model = NGramModel::load(&text_path).unwrap();
	let cached_model = NGramModel::load_cached(&text_path).unwrap();
	let binary_model = NGramModel::load(dir.path().join("tiny.bin")).unwrap();

	for sentence in ["the cat sat on the mat", "hello", "the dog flew away"] {
		let expected = Scorer::new(&text_model).score_text(sentence, ScoreOptions::SENTENCE);
		assert_eq!(Scorer::new(&cached_model).score_text(sentence, ScoreOptions::SENTENCE), expected);
		assert_eq!(Scorer::new(&binary_model).score_text(sentence, ScoreOptions::SENTENCE), expected);
	}
}
