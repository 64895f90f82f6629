//! Command-line front end for the n-gram ranking engine.
//!
//! Loads one model at start-up, then ranks candidates, scores sentences
//! or compiles a text model into its binary image.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use serde::Deserialize;

use rs_rank_core::{NGramModel, Ranker, RankerConfig, ScoreOptions, ScoredCandidate, Scorer, tokenize};

#[derive(Parser, Debug)]
#[command(name = "rs-rank", about = "Rank text completions with an n-gram language model")]
struct Cli {
	/// Path to the model (ARPA text, or `.bin` image)
	#[arg(short, long)]
	model: PathBuf,

	/// Load through the binary cache next to a text model, creating it if needed
	#[arg(long)]
	cache: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Order candidate continuations of a context, best first
	Rank {
		/// Preceding text (may be empty)
		#[arg(short, long, default_value = "")]
		context: String,

		/// Print the marginal score of every candidate
		#[arg(short, long)]
		scores: bool,

		/// Score the end-of-sentence marker after context and candidate
		#[arg(long)]
		eos: bool,

		/// Read `{"context", "candidates", "end_of_sentence"}` from stdin and answer in JSON
		#[arg(long)]
		json: bool,

		/// Candidate continuations
		candidates: Vec<String>,
	},

	/// Score a sentence and show the per-word breakdown
	Score {
		/// Do not condition the first word on the sentence-start marker
		#[arg(long)]
		no_bos: bool,

		/// Do not score the end-of-sentence marker
		#[arg(long)]
		no_eos: bool,

		/// Sentence to score
		text: String,
	},

	/// Write the binary image of the model
	Compile {
		/// Output path (default: model path with a `.bin` extension)
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
}

/// Ranking request read from stdin with `rank --json`.
///
/// Every field is optional; missing ones fall back to the command-line values.
#[derive(Deserialize, Debug)]
struct RankRequest {
	context: Option<String>,
	candidates: Option<Vec<String>>,
	end_of_sentence: Option<bool>,
}

/// What `rank` works on once stdin and the command line are merged.
#[derive(Debug, PartialEq)]
struct RankJob {
	context: String,
	candidates: Vec<String>,
	config: RankerConfig,
}

impl RankJob {
	/// Fields present in `request` replace the command-line values.
	fn merge(mut self, request: RankRequest) -> Self {
		if let Some(context) = request.context {
			self.context = context;
		}
		if let Some(candidates) = request.candidates {
			self.candidates = candidates;
		}
		if let Some(eos) = request.end_of_sentence {
			self.config.end_of_sentence = eos;
		}
		self
	}
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let cli = Cli::parse();

	// A model that fails to load is fatal: nothing is ranked without one
	let loaded = if cli.cache {
		NGramModel::load_cached(&cli.model)
	} else {
		NGramModel::load(&cli.model)
	};
	let model = loaded.with_context(|| format!("Failed to load model {}", cli.model.display()))?;

	match cli.command {
		Command::Rank { context, scores, eos, json, candidates } => {
			let job = RankJob { context, candidates, config: RankerConfig { end_of_sentence: eos } };
			rank(&model, job, scores, json)
		}
		Command::Score { no_bos, no_eos, text } => {
			score(&model, &text, ScoreOptions { bos: !no_bos, eos: !no_eos });
			Ok(())
		}
		Command::Compile { output } => {
			let output = match output {
				Some(path) => path,
				None => cli.model.with_extension("bin"),
			};
			if output == cli.model {
				bail!("Refusing to overwrite the input model {}", output.display());
			}
			model
				.save_binary(&output)
				.with_context(|| format!("Failed to write {}", output.display()))?;
			info!("Compiled {} into {}", cli.model.display(), output.display());
			Ok(())
		}
	}
}

fn rank(model: &NGramModel, mut job: RankJob, scores: bool, json: bool) -> anyhow::Result<()> {
	if json {
		let mut input = String::new();
		io::stdin().read_to_string(&mut input).context("Failed to read the request from stdin")?;
		let request: RankRequest = serde_json::from_str(&input).context("Invalid JSON request")?;
		job = job.merge(request);
	}

	let ranker = Ranker::with_config(model, job.config);
	let ranked = ranker.rank_scored(&job.context, &job.candidates);
	print!("{}", render_ranking(&ranked, scores, json)?);
	Ok(())
}

/// Formats a ranking, best first.
///
/// - JSON: one line, either the candidate names or `{candidate, score}` objects
/// - Text: one candidate per line, prefixed by its score when `scores` is set
fn render_ranking(ranked: &[ScoredCandidate], scores: bool, json: bool) -> anyhow::Result<String> {
	if json {
		let body = if scores {
			serde_json::to_string(ranked)?
		} else {
			let names: Vec<&str> = ranked.iter().map(|scored| scored.candidate.as_str()).collect();
			serde_json::to_string(&names)?
		};
		return Ok(format!("{body}\n"));
	}

	let mut out = String::new();
	for scored in ranked {
		if scores {
			out.push_str(&format!("{:>10.4}\t{}\n", scored.score, scored.candidate));
		} else {
			out.push_str(&format!("{}\n", scored.candidate));
		}
	}
	Ok(out)
}

fn score(model: &NGramModel, text: &str, options: ScoreOptions) {
	let scorer = Scorer::new(model);
	let tokens = tokenize(text);

	for word in scorer.full_scores(&tokens, options) {
		let marker = if word.oov { " (oov)" } else { "" };
		println!("{:>10.4}\t{}-gram\t{}{}", word.log_prob, word.ngram_length, word.token, marker);
	}

	println!("Total: {:.4}", scorer.score_sequence(&tokens, options));
	if options == ScoreOptions::SENTENCE {
		println!("Perplexity: {:.4}", scorer.perplexity(text));
	}
}
