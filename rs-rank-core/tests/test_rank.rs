use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use rs_rank_core::{NGramModel, Ranker, RankerConfig, ScoreOptions, Scorer};

fn tiny_model() -> NGramModel {
	let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/tiny.arpa");
	NGramModel::load(path).unwrap()
}

#[test]
fn test_cat_scenario() {
	let model = tiny_model();
	let ranker = Ranker::new(&model);
	assert_eq!(ranker.rank("the cat", &["sat", "flew", "jumped"]), vec!["sat", "flew", "jumped"]);
}

#[test]
fn test_empty_context_scenario() {
	let model = tiny_model();
	let ranker = Ranker::new(&model);
	assert_eq!(ranker.rank("", &["hello", "xyzzyunseen"]), vec!["hello", "xyzzyunseen"]);
	assert_eq!(ranker.rank("", &["xyzzyunseen", "hello"]), vec!["hello", "xyzzyunseen"]);
}

#[test]
fn test_candidates_can_be_owned_strings() {
	let model = tiny_model();
	let ranker = Ranker::new(&model);
	let candidates: Vec<String> = vec!["on the mat".to_owned(), "sat on the mat".to_owned()];
	assert_eq!(ranker.rank("the cat", &candidates), vec!["sat on the mat", "on the mat"]);
}

#[test]
fn test_scores_are_always_finite() {
	let model = tiny_model();
	let ranker = Ranker::with_config(&model, RankerConfig { end_of_sentence: true });
	let candidates = ["", "   ", "xyzzy", "<unk>", "<s>", "</s>", "the the the the the the"];
	for context in ["", "the cat", "plugh xyzzy", "</s> <s>"] {
		for scored in ranker.rank_scored(context, &candidates) {
			assert!(scored.score.is_finite(), "{context:?} + {:?} gave {}", scored.candidate, scored.score);
		}
	}
}

#[test]
fn test_shared_model_across_threads() {
	let model = Arc::new(tiny_model());
	let candidates = ["mat", "sat", "hello", "flew", "on"];
	let expected = Ranker::new(&model).rank("the cat", &candidates);

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let model = Arc::clone(&model);
			thread::spawn(move || {
				let ranker = Ranker::new(&model);
				(0..50).map(|_| ranker.rank("the cat", &candidates)).collect::<Vec<_>>()
			})
		})
		.collect();

	for handle in handles {
		for ranked in handle.join().unwrap() {
			assert_eq!(ranked, expected);
		}
	}
}

#[test]
fn test_two_models_in_one_process() {
	let tiny = tiny_model();
	let flat = NGramModel::from_arpa_str("\\data\\\nngram 1=3\n\\1-grams:\n-0.5\tflew\n-0.6\tsat\n-3.0\t<unk>\n\\end\\\n")
		.unwrap();

	assert_eq!(Ranker::new(&tiny).rank("the cat", &["flew", "sat"]), vec!["sat", "flew"]);
	assert_eq!(Ranker::new(&flat).rank("the cat", &["flew", "sat"]), vec!["flew", "sat"]);
	assert!(Scorer::new(&flat).score_text("the cat", ScoreOptions::default()) < -5.0);
}
