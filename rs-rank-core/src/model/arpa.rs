use std::iter::Peekable;
use std::sync::mpsc;
use std::thread;

use log::{debug, warn};

use super::ngram_model::{MAX_ORDER, NGramEntry, NGramModel, NGramTable, UNKNOWN_LOG_PROB};
use super::vocabulary::{UNKNOWN_TOKEN, Vocabulary};
use crate::error::{LoadError, LoadResult};

/// Sections with fewer entries are parsed on the calling thread.
const PARALLEL_THRESHOLD: usize = 16_384;

/// Replacement for `-inf`, the value ARPA writers use for impossible events.
const IMPOSSIBLE_LOG_PROB: f32 = -99.0;

/// A non-blank, trimmed line with its 1-based line number.
type Line<'a> = (usize, &'a str);

/// Parses an ARPA model.
///
/// Layout:
/// ```text
/// \data\
/// ngram 1=<count>
/// ngram 2=<count>
///
/// \1-grams:
/// <log10 prob> <w1> [<log10 backoff>]
///
/// \2-grams:
/// <log10 prob> <w1> <w2> [<log10 backoff>]
///
/// \end\
/// ```
///
/// Anything before `\data\` is ignored. Blank lines are ignored everywhere.
pub(crate) fn parse(text: &str) -> LoadResult<NGramModel> {
	let mut lines = text
		.lines()
		.enumerate()
		.map(|(index, line)| (index + 1, line.trim_ascii()))
		.filter(|(_, line)| !line.is_empty())
		.peekable();

	// Skip the preamble
	loop {
		match lines.next() {
			Some((_, "\\data\\")) => break,
			Some(_) => continue,
			None => return Err(LoadError::malformed(0, "missing \\data\\ header")),
		}
	}

	let counts = parse_header(&mut lines)?;
	let sections = split_sections(&mut lines, &counts)?;

	match lines.next() {
		Some((_, "\\end\\")) => (),
		Some((line_no, line)) => {
			return Err(LoadError::malformed(line_no, format!("expected \\end\\, found '{line}'")));
		}
		None => return Err(LoadError::malformed(0, "missing \\end\\ marker")),
	}

	let (vocabulary, unigrams) = parse_unigrams(&sections[0])?;
	let mut tables = Vec::with_capacity(counts.len());
	tables.push(unigrams);
	for (index, section) in sections.iter().enumerate().skip(1) {
		let n = index + 1;
		let table = parse_section(section, n, &vocabulary)?;
		debug!("Parsed {} {}-grams", table.len(), n);
		tables.push(table);
	}

	Ok(NGramModel::from_parts(vocabulary, tables))
}

/// Reads the `ngram <order>=<count>` lines following `\data\`.
///
/// Returns the declared counts, unigrams first.
fn parse_header<'a, I>(lines: &mut Peekable<I>) -> LoadResult<Vec<usize>>
where
	I: Iterator<Item = Line<'a>>,
{
	let mut counts = Vec::new();

	while let Some(&(line_no, line)) = lines.peek() {
		let Some(declaration) = line.strip_prefix("ngram ") else {
			break;
		};
		lines.next();

		let (order, count) = declaration
			.split_once('=')
			.ok_or_else(|| LoadError::malformed(line_no, "expected 'ngram <order>=<count>'"))?;
		let order: usize = order
			.trim()
			.parse()
			.map_err(|_| LoadError::malformed(line_no, format!("invalid order '{}'", order.trim())))?;
		let count: usize = count
			.trim()
			.parse()
			.map_err(|_| LoadError::malformed(line_no, format!("invalid count '{}'", count.trim())))?;

		if order == 0 || order > MAX_ORDER {
			return Err(LoadError::UnsupportedOrder { order, max: MAX_ORDER });
		}
		if order != counts.len() + 1 {
			return Err(LoadError::malformed(
				line_no,
				format!("expected declaration of order {}, found {order}", counts.len() + 1),
			));
		}
		counts.push(count);
	}

	if counts.is_empty() {
		return Err(LoadError::UnsupportedOrder { order: 0, max: MAX_ORDER });
	}
	Ok(counts)
}

/// Collects the entry lines of every `\n-grams:` section.
///
/// Each section must hold exactly the declared number of entries.
fn split_sections<'a, I>(lines: &mut Peekable<I>, counts: &[usize]) -> LoadResult<Vec<Vec<Line<'a>>>>
where
	I: Iterator<Item = Line<'a>>,
{
	let mut sections = Vec::with_capacity(counts.len());

	for (index, &count) in counts.iter().enumerate() {
		let n = index + 1;
		let section_header = format!("\\{n}-grams:");
		match lines.next() {
			Some((_, line)) if line == section_header => (),
			Some((line_no, line)) => {
				return Err(LoadError::malformed(
					line_no,
					format!("expected {section_header} section, found '{line}'"),
				));
			}
			None => return Err(LoadError::malformed(0, format!("missing {section_header} section"))),
		}

		// The declared count is untrusted until the entries are actually there
		let mut section = Vec::with_capacity(count.min(PARALLEL_THRESHOLD));
		while section.len() < count {
			match lines.peek() {
				Some(&(line_no, line)) if line.starts_with('\\') => {
					return Err(LoadError::malformed(
						line_no,
						format!("{n}-grams section holds {} entries, header declares {count}", section.len()),
					));
				}
				Some(&entry) => {
					section.push(entry);
					lines.next();
				}
				None => {
					return Err(LoadError::malformed(
						0,
						format!("file ends inside the {n}-grams section"),
					));
				}
			}
		}
		sections.push(section);
	}

	Ok(sections)
}

/// Builds the vocabulary and the unigram table.
///
/// Synthesizes `<unk>` when the section lacks it.
fn parse_unigrams(section: &[Line]) -> LoadResult<(Vocabulary, NGramTable)> {
	let mut tokens = Vec::with_capacity(section.len());
	let mut entries = Vec::with_capacity(section.len());
	for &(line_no, line) in section {
		let (entry, words) = parse_entry(line_no, line, 1)?;
		tokens.push(words[0]);
		entries.push(entry);
	}

	let vocabulary = Vocabulary::from_tokens(tokens.iter().copied()).map_err(|token| {
		let line_no = section
			.iter()
			.zip(&tokens)
			.filter(|(_, t)| **t == token)
			.nth(1)
			.map(|((line_no, _), _)| *line_no)
			.unwrap_or(0);
		LoadError::malformed(line_no, format!("duplicate unigram '{token}'"))
	})?;

	let mut table = NGramTable::with_capacity(vocabulary.len());
	for (id, entry) in entries.into_iter().enumerate() {
		table.insert(Box::new([id as u32]), entry);
	}

	if vocabulary.len() > tokens.len() {
		warn!("Model has no {UNKNOWN_TOKEN} unigram, using log10 probability {UNKNOWN_LOG_PROB}");
		table.insert(
			Box::new([vocabulary.unknown_id()]),
			NGramEntry { log_prob: UNKNOWN_LOG_PROB, backoff: None },
		);
	}

	Ok((vocabulary, table))
}

/// Parses the entries of order `n > 1`.
///
/// Large sections are split into one chunk per CPU, parsed on scoped
/// threads and merged back in chunk order, so the reported error (if any)
/// is always the first one in the file.
fn parse_section(section: &[Line], n: usize, vocabulary: &Vocabulary) -> LoadResult<NGramTable> {
	if section.len() < PARALLEL_THRESHOLD {
		return Ok(parse_chunk(section, n, vocabulary)?.into_iter().collect());
	}

	let workers = num_cpus::get().max(1);
	let chunk_size = section.len().div_ceil(workers);

	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for (index, chunk) in section.chunks(chunk_size).enumerate() {
			let tx = tx.clone();
			scope.spawn(move || {
				// The receiver outlives the scope
				let _ = tx.send((index, parse_chunk(chunk, n, vocabulary)));
			});
		}
	});
	drop(tx);

	let mut partials: Vec<_> = rx.iter().collect();
	partials.sort_by_key(|(index, _)| *index);

	let mut table = NGramTable::with_capacity(section.len());
	for (_, partial) in partials {
		table.extend(partial?);
	}
	Ok(table)
}

fn parse_chunk(chunk: &[Line], n: usize, vocabulary: &Vocabulary) -> LoadResult<Vec<(Box<[u32]>, NGramEntry)>> {
	chunk
		.iter()
		.map(|&(line_no, line)| {
			let (entry, words) = parse_entry(line_no, line, n)?;
			let ids = words
				.iter()
				.map(|word| {
					vocabulary.get(word).ok_or_else(|| {
						LoadError::malformed(line_no, format!("token '{word}' has no unigram entry"))
					})
				})
				.collect::<LoadResult<Box<[u32]>>>()?;
			Ok((ids, entry))
		})
		.collect()
}

/// Splits one entry line into its values and its `n` tokens.
///
/// Fields are separated by ASCII whitespace only, so tokens may contain
/// other Unicode spaces.
fn parse_entry(line_no: usize, line: &str, n: usize) -> LoadResult<(NGramEntry, Vec<&str>)> {
	let mut fields: Vec<&str> = line.split_ascii_whitespace().collect();

	let backoff = if fields.len() == n + 2 {
		fields.pop().map(|weight| parse_weight(line_no, weight, "backoff weight")).transpose()?
	} else if fields.len() == n + 1 {
		None
	} else {
		return Err(LoadError::malformed(
			line_no,
			format!("expected {n} tokens and an optional backoff weight, found {} fields", fields.len()),
		));
	};

	let log_prob = parse_weight(line_no, fields[0], "probability")?;
	if log_prob > 0.0 {
		return Err(LoadError::malformed(line_no, format!("positive log probability {log_prob}")));
	}

	fields.remove(0);
	Ok((NGramEntry { log_prob, backoff }, fields))
}

/// Parses a log10 value; `-inf` becomes `IMPOSSIBLE_LOG_PROB`.
fn parse_weight(line_no: usize, field: &str, what: &str) -> LoadResult<f32> {
	let value: f32 = field
		.parse()
		.map_err(|_| LoadError::malformed(line_no, format!("invalid {what} '{field}'")))?;

	if value == f32::NEG_INFINITY {
		warn!("Line {line_no}: {what} is -inf, using {IMPOSSIBLE_LOG_PROB}");
		return Ok(IMPOSSIBLE_LOG_PROB);
	}
	if !value.is_finite() {
		return Err(LoadError::malformed(line_no, format!("non-finite {what} '{field}'")));
	}
	Ok(value)
}
