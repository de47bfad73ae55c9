// src/similarity.rs

//! String similarity scores used by the fuzzy title search.
//!
//! Every algorithm yields a score in `[0, 1]`, where `1` means identical.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const SHINGLE_SIZE: usize = 2;
const WINKLER_THRESHOLD: f64 = 0.7;
const WINKLER_SCALING: f64 = 0.1;
const WINKLER_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
	Levenshtein,
	DamerauLevenshtein,
	OsaDamerauLevenshtein,
	Lcs,
	#[default]
	Jaro,
	JaroWinkler,
	Cosine,
	Jaccard,
	SorensenDice,
	Qgram,
}

impl Algorithm {
	pub const NAMES: [&'static str; 11] = [
		"",
		"Levenshtein",
		"DamerauLevenshtein",
		"OSADamerauLevenshtein",
		"Lcs",
		"Jaro",
		"JaroWinkler",
		"Cosine",
		"Jaccard",
		"SorensenDice",
		"Qgram",
	];

	pub fn name(&self) -> &'static str {
		match self {
			Algorithm::Levenshtein => "Levenshtein",
			Algorithm::DamerauLevenshtein => "DamerauLevenshtein",
			Algorithm::OsaDamerauLevenshtein => "OSADamerauLevenshtein",
			Algorithm::Lcs => "Lcs",
			Algorithm::Jaro => "Jaro",
			Algorithm::JaroWinkler => "JaroWinkler",
			Algorithm::Cosine => "Cosine",
			Algorithm::Jaccard => "Jaccard",
			Algorithm::SorensenDice => "SorensenDice",
			Algorithm::Qgram => "Qgram",
		}
	}

	pub fn similarity(&self, a: &str, b: &str) -> f64 {
		let a: Vec<char> = a.chars().collect();
		let b: Vec<char> = b.chars().collect();
		if a.is_empty() && b.is_empty() {
			return 1.0;
		}
		if a.is_empty() || b.is_empty() {
			return 0.0;
		}
		match self {
			Algorithm::Levenshtein => distance_ratio(levenshtein(&a, &b), &a, &b),
			Algorithm::DamerauLevenshtein => distance_ratio(damerau_levenshtein(&a, &b), &a, &b),
			Algorithm::OsaDamerauLevenshtein => distance_ratio(osa_distance(&a, &b), &a, &b),
			Algorithm::Lcs => lcs_len(&a, &b) as f64 / a.len().max(b.len()) as f64,
			Algorithm::Jaro => jaro(&a, &b),
			Algorithm::JaroWinkler => jaro_winkler(&a, &b),
			Algorithm::Cosine => cosine(&shingles(&a), &shingles(&b)),
			Algorithm::Jaccard => jaccard(&shingles(&a), &shingles(&b)),
			Algorithm::SorensenDice => sorensen_dice(&shingles(&a), &shingles(&b)),
			Algorithm::Qgram => qgram(&shingles(&a), &shingles(&b)),
		}
	}
}

impl fmt::Display for Algorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Algorithm {
	type Err = String;

	/// The empty name selects the default.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" => Ok(Algorithm::default()),
			"Levenshtein" => Ok(Algorithm::Levenshtein),
			"DamerauLevenshtein" => Ok(Algorithm::DamerauLevenshtein),
			"OSADamerauLevenshtein" => Ok(Algorithm::OsaDamerauLevenshtein),
			"Lcs" => Ok(Algorithm::Lcs),
			"Jaro" => Ok(Algorithm::Jaro),
			"JaroWinkler" => Ok(Algorithm::JaroWinkler),
			"Cosine" => Ok(Algorithm::Cosine),
			"Jaccard" => Ok(Algorithm::Jaccard),
			"SorensenDice" => Ok(Algorithm::SorensenDice),
			"Qgram" => Ok(Algorithm::Qgram),
			other => Err(other.to_string()),
		}
	}
}

/// Returns up to `n` candidates ranked by similarity to `query`.
///
/// Comparison is case-insensitive; equal scores are ordered by candidate.
pub fn fuzzy_search<'a, I>(query: &str, candidates: I, n: usize, algorithm: Algorithm) -> Vec<String>
where
	I: IntoIterator<Item = &'a str>,
{
	if query.is_empty() || n == 0 {
		return Vec::new();
	}
	let query = query.to_lowercase();
	let mut scored: Vec<(f64, &str)> = candidates
		.into_iter()
		.map(|c| (algorithm.similarity(&query, &c.to_lowercase()), c))
		.collect();
	scored.sort_by(|(sa, ca), (sb, cb)| {
		sb.partial_cmp(sa).unwrap_or(Ordering::Equal).then_with(|| ca.cmp(cb))
	});
	scored.dedup_by(|(_, a), (_, b)| a == b);
	scored.into_iter().take(n).map(|(_, c)| c.to_string()).collect()
}

fn distance_ratio(distance: usize, a: &[char], b: &[char]) -> f64 {
	1.0 - distance as f64 / a.len().max(b.len()) as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut curr = vec![0; b.len() + 1];
	for (i, ca) in a.iter().enumerate() {
		curr[0] = i + 1;
		for (j, cb) in b.iter().enumerate() {
			let cost = usize::from(ca != cb);
			curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
		}
		std::mem::swap(&mut prev, &mut curr);
	}
	prev[b.len()]
}

// Optimal string alignment: adjacent transpositions, no substring edited twice.
fn osa_distance(a: &[char], b: &[char]) -> usize {
	let (n, m) = (a.len(), b.len());
	let mut d = vec![vec![0usize; m + 1]; n + 1];
	for (i, row) in d.iter_mut().enumerate() {
		row[0] = i;
	}
	for j in 0..=m {
		d[0][j] = j;
	}
	for i in 1..=n {
		for j in 1..=m {
			let cost = usize::from(a[i - 1] != b[j - 1]);
			d[i][j] = (d[i - 1][j] + 1).min(d[i][j - 1] + 1).min(d[i - 1][j - 1] + cost);
			if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
				d[i][j] = d[i][j].min(d[i - 2][j - 2] + 1);
			}
		}
	}
	d[n][m]
}

fn damerau_levenshtein(a: &[char], b: &[char]) -> usize {
	let (n, m) = (a.len(), b.len());
	let max = n + m;
	let mut last_row: HashMap<char, usize> = HashMap::new();
	let mut d = vec![vec![0usize; m + 2]; n + 2];
	d[0][0] = max;
	for i in 0..=n {
		d[i + 1][0] = max;
		d[i + 1][1] = i;
	}
	for j in 0..=m {
		d[0][j + 1] = max;
		d[1][j + 1] = j;
	}
	for i in 1..=n {
		let mut last_match_col = 0;
		for j in 1..=m {
			let i1 = *last_row.get(&b[j - 1]).unwrap_or(&0);
			let j1 = last_match_col;
			let cost = if a[i - 1] == b[j - 1] {
				last_match_col = j;
				0
			} else {
				1
			};
			d[i + 1][j + 1] = (d[i][j] + cost)
				.min(d[i + 1][j] + 1)
				.min(d[i][j + 1] + 1)
				.min(d[i1][j1] + (i - i1 - 1) + 1 + (j - j1 - 1));
		}
		last_row.insert(a[i - 1], i);
	}
	d[n + 1][m + 1]
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
	let mut prev = vec![0usize; b.len() + 1];
	let mut curr = vec![0usize; b.len() + 1];
	for ca in a {
		for (j, cb) in b.iter().enumerate() {
			curr[j + 1] = if ca == cb {
				prev[j] + 1
			} else {
				prev[j + 1].max(curr[j])
			};
		}
		std::mem::swap(&mut prev, &mut curr);
	}
	prev[b.len()]
}

fn jaro(a: &[char], b: &[char]) -> f64 {
	let window = (a.len().max(b.len()) / 2).saturating_sub(1);
	let mut a_matched = vec![false; a.len()];
	let mut b_matched = vec![false; b.len()];
	let mut matches = 0usize;

	for (i, ca) in a.iter().enumerate() {
		let lo = i.saturating_sub(window);
		let hi = (i + window + 1).min(b.len());
		for j in lo..hi {
			if !b_matched[j] && *ca == b[j] {
				a_matched[i] = true;
				b_matched[j] = true;
				matches += 1;
				break;
			}
		}
	}
	if matches == 0 {
		return 0.0;
	}

	let mut half_transpositions = 0usize;
	let mut k = 0;
	for (i, ca) in a.iter().enumerate() {
		if !a_matched[i] {
			continue;
		}
		while !b_matched[k] {
			k += 1;
		}
		if *ca != b[k] {
			half_transpositions += 1;
		}
		k += 1;
	}

	let m = matches as f64;
	let t = half_transpositions as f64 / 2.0;
	(m / a.len() as f64 + m / b.len() as f64 + (m - t) / m) / 3.0
}

fn jaro_winkler(a: &[char], b: &[char]) -> f64 {
	let score = jaro(a, b);
	if score <= WINKLER_THRESHOLD {
		return score;
	}
	let prefix = a
		.iter()
		.zip(b.iter())
		.take(WINKLER_PREFIX)
		.take_while(|(x, y)| x == y)
		.count();
	score + prefix as f64 * WINKLER_SCALING * (1.0 - score)
}

fn shingles(s: &[char]) -> HashMap<String, usize> {
	let mut out = HashMap::new();
	if s.len() < SHINGLE_SIZE {
		out.insert(s.iter().collect(), 1);
		return out;
	}
	for window in s.windows(SHINGLE_SIZE) {
		*out.entry(window.iter().collect()).or_insert(0) += 1;
	}
	out
}

fn cosine(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
	let dot: usize = a.iter().filter_map(|(k, ca)| b.get(k).map(|cb| ca * cb)).sum();
	let norm = |m: &HashMap<String, usize>| (m.values().map(|c| (c * c) as f64).sum::<f64>()).sqrt();
	let denom = norm(a) * norm(b);
	if denom == 0.0 {
		0.0
	} else {
		dot as f64 / denom
	}
}

fn jaccard(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
	let common = a.keys().filter(|k| b.contains_key(*k)).count();
	let union = a.len() + b.len() - common;
	common as f64 / union as f64
}

fn sorensen_dice(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
	let common = a.keys().filter(|k| b.contains_key(*k)).count();
	2.0 * common as f64 / (a.len() + b.len()) as f64
}

fn qgram(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
	let mut diff = 0usize;
	for (k, ca) in a {
		diff += ca.abs_diff(*b.get(k).unwrap_or(&0));
	}
	for (k, cb) in b {
		if !a.contains_key(k) {
			diff += cb;
		}
	}
	let total: usize = a.values().sum::<usize>() + b.values().sum::<usize>();
	1.0 - diff as f64 / total as f64
}

#[cfg(test)]
mod tests {
	use super::*;

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-3
	}

	#[test]
	fn algorithm_names() {
		assert_eq!("".parse::<Algorithm>().unwrap(), Algorithm::Jaro);
		assert_eq!(
			"OSADamerauLevenshtein".parse::<Algorithm>().unwrap(),
			Algorithm::OsaDamerauLevenshtein
		);
		assert!("jaro".parse::<Algorithm>().is_err());
		for name in Algorithm::NAMES.iter().skip(1) {
			assert_eq!(name.parse::<Algorithm>().unwrap().name(), *name);
		}
	}

	#[test]
	fn edit_distances() {
		let k: Vec<char> = "kitten".chars().collect();
		let s: Vec<char> = "sitting".chars().collect();
		assert_eq!(levenshtein(&k, &s), 3);

		let ca: Vec<char> = "ca".chars().collect();
		let abc: Vec<char> = "abc".chars().collect();
		assert_eq!(osa_distance(&ca, &abc), 3);
		assert_eq!(damerau_levenshtein(&ca, &abc), 2);

		let ab: Vec<char> = "ab".chars().collect();
		let ba: Vec<char> = "ba".chars().collect();
		assert_eq!(osa_distance(&ab, &ba), 1);
		assert_eq!(lcs_len(&k, &s), 4);
	}

	#[test]
	fn jaro_family() {
		assert!(close(Algorithm::Jaro.similarity("martha", "marhta"), 0.944));
		assert!(close(Algorithm::JaroWinkler.similarity("martha", "marhta"), 0.961));
		assert_eq!(Algorithm::Jaro.similarity("abc", "xyz"), 0.0);
	}

	#[test]
	fn shingle_based_scores() {
		assert!(close(Algorithm::Jaccard.similarity("night", "nacht"), 1.0 / 7.0));
		assert!(close(Algorithm::SorensenDice.similarity("night", "nacht"), 0.25));
		assert!(close(Algorithm::Cosine.similarity("abab", "abab"), 1.0));
		assert!(close(Algorithm::Qgram.similarity("abc", "abc"), 1.0));
	}

	#[test]
	fn fuzzy_search_ranks_and_bounds() {
		let titles = ["MongoDB C# driver 1.10.0", "vendorName1 productName1-1 1.1", "ntp 4.2.8"];
		let hits = fuzzy_search("mongodb", titles.iter().copied(), 1, Algorithm::Jaro);
		assert_eq!(hits, vec!["MongoDB C# driver 1.10.0".to_string()]);

		let all = fuzzy_search("mongodb", titles.iter().copied(), 10, Algorithm::Jaro);
		assert_eq!(all.len(), 3);
		assert!(fuzzy_search("", titles.iter().copied(), 3, Algorithm::Jaro).is_empty());
		assert!(fuzzy_search("mongodb", titles.iter().copied(), 0, Algorithm::Jaro).is_empty());
	}
}
