// src/fetcher/nvd.rs

//! NVD dictionary fetcher.
//!
//! Reads two gzip-compressed tar archives of JSON documents: the CPE
//! dictionary itself and the CPE match criteria. Match criteria missing
//! from the dictionary are added with a title built from their attributes.

use flate2::read::GzDecoder;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use tar::Archive;
use tokio::task;

use super::harness::{run_bounded, HarnessOptions};
use super::http::HttpClient;
use super::Fetcher;
use crate::error::FetchError;
use crate::models::{FetchType, FetchedCpe, FetchedCpes};
use crate::wfn::{unbind_fs, Attribute, Value, Wfn};

pub const DEFAULT_DICTIONARY_URL: &str =
	"https://github.com/vulsio/vuls-data-raw-nvd-api-cpe/archive/refs/heads/main.tar.gz";
pub const DEFAULT_MATCH_URL: &str =
	"https://github.com/vulsio/vuls-data-raw-nvd-api-cpematch/archive/refs/heads/main.tar.gz";

const TITLE_ATTRIBUTES: [Attribute; 10] = [
	Attribute::Vendor,
	Attribute::Product,
	Attribute::Version,
	Attribute::Update,
	Attribute::Edition,
	Attribute::Language,
	Attribute::SwEdition,
	Attribute::TargetSw,
	Attribute::TargetHw,
	Attribute::Other,
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DictionaryItem {
	#[serde(default)]
	deprecated: bool,
	cpe_name: String,
	#[serde(default)]
	titles: Vec<ItemTitle>,
}

#[derive(Debug, Deserialize)]
struct ItemTitle {
	title: String,
	lang: String,
}

impl DictionaryItem {
	/// English title when present, otherwise the last one listed.
	fn title(&self) -> String {
		self.titles
			.iter()
			.find(|t| t.lang == "en")
			.or_else(|| self.titles.last())
			.map(|t| t.title.clone())
			.unwrap_or_default()
	}
}

#[derive(Debug, Deserialize)]
struct MatchItem {
	criteria: String,
}

pub struct NvdFetcher {
	client: HttpClient,
	harness: HarnessOptions,
	dictionary_url: String,
	match_url: String,
}

impl NvdFetcher {
	pub fn new(
		client: HttpClient,
		harness: HarnessOptions,
		dictionary_url: impl Into<String>,
		match_url: impl Into<String>,
	) -> Self {
		Self {
			client,
			harness,
			dictionary_url: dictionary_url.into(),
			match_url: match_url.into(),
		}
	}
}

impl Fetcher for NvdFetcher {
	fn fetch_type(&self) -> FetchType {
		FetchType::Nvd
	}

	async fn fetch(&self) -> Result<FetchedCpes, FetchError> {
		info!("Fetching NVD CPE dictionary and match criteria");
		let tasks = [self.dictionary_url.clone(), self.match_url.clone()]
			.into_iter()
			.enumerate()
			.map(|(index, url)| {
				let client = self.client.clone();
				async move {
					let body = client.get_bytes(&url).await?;
					Ok::<_, FetchError>((index, body))
				}
			})
			.collect();

		let mut archives = run_bounded(self.harness, tasks).await.into_result()?;
		archives.sort_by_key(|(index, _)| *index);
		let mut bodies = archives.into_iter().map(|(_, body)| body);
		let (Some(dictionary), Some(matches)) = (bodies.next(), bodies.next()) else {
			return Err(FetchError::TaskAborted {
				index: 1,
				reason: "archive download missing".to_string(),
			});
		};

		task::spawn_blocking(move || build_dictionary(&dictionary, &matches))
			.await
			.map_err(|err| FetchError::TaskAborted {
				index: 0,
				reason: err.to_string(),
			})?
	}
}

fn build_dictionary(dictionary: &[u8], matches: &[u8]) -> Result<FetchedCpes, FetchError> {
	let mut active = BTreeMap::new();
	let mut deprecated = BTreeMap::new();

	for_each_json_entry(dictionary, "NVD CPE dictionary archive", |path, body| {
		let item: DictionaryItem = match serde_json::from_slice(body) {
			Ok(item) => item,
			Err(err) => {
				warn!("Skipping dictionary entry {}: {}", path, err);
				return;
			}
		};
		if let Err(err) = unbind_fs(&item.cpe_name) {
			warn!("Skipping invalid CPE name {:?}: {}", item.cpe_name, err);
			return;
		}
		let title = item.title();
		if item.deprecated {
			deprecated.insert(item.cpe_name, title);
		} else {
			active.insert(item.cpe_name, title);
		}
	})?;

	let mut synthesized = 0usize;
	for_each_json_entry(matches, "NVD CPE match archive", |path, body| {
		let item: MatchItem = match serde_json::from_slice(body) {
			Ok(item) => item,
			Err(err) => {
				warn!("Skipping match entry {}: {}", path, err);
				return;
			}
		};
		if active.contains_key(&item.criteria) || deprecated.contains_key(&item.criteria) {
			return;
		}
		match unbind_fs(&item.criteria) {
			Ok(wfn) => {
				active.insert(item.criteria, synthesize_title(&wfn));
				synthesized += 1;
			}
			Err(err) => warn!("Skipping invalid match criteria {:?}: {}", item.criteria, err),
		}
	})?;

	info!(
		"NVD: {} active, {} deprecated, {} from match criteria",
		active.len(),
		deprecated.len(),
		synthesized
	);

	Ok(FetchedCpes {
		cpes: into_fetched(active),
		deprecated: into_fetched(deprecated),
	})
}

fn into_fetched(entries: BTreeMap<String, String>) -> Vec<FetchedCpe> {
	entries
		.into_iter()
		.map(|(name, title)| FetchedCpe::new(title, vec![name]))
		.collect()
}

/// Space-joined non-ANY attributes, vendor first.
fn synthesize_title(wfn: &Wfn) -> String {
	TITLE_ATTRIBUTES
		.iter()
		.filter(|attr| !matches!(wfn.get(**attr), Value::Any))
		.map(|attr| wfn.get_string(*attr))
		.collect::<Vec<_>>()
		.join(" ")
}

/// Calls `visit` with the path and raw body of every `.json` file in a tar.gz archive.
/// Only archive-level damage is an error; body decoding is left to the visitor.
fn for_each_json_entry<F>(archive: &[u8], what: &str, mut visit: F) -> Result<(), FetchError>
where
	F: FnMut(&str, &[u8]),
{
	let malformed = |err: std::io::Error| FetchError::MalformedEnvelope {
		what: what.to_string(),
		reason: err.to_string(),
	};

	let mut archive = Archive::new(GzDecoder::new(archive));
	for entry in archive.entries().map_err(malformed)? {
		let mut entry = entry.map_err(malformed)?;
		if !entry.header().entry_type().is_file() {
			continue;
		}
		let path = entry.path().map_err(malformed)?.to_string_lossy().into_owned();
		if !path.ends_with(".json") {
			continue;
		}
		let mut body = Vec::with_capacity(entry.size() as usize);
		entry.read_to_end(&mut body).map_err(malformed)?;
		visit(&path, &body);
	}
	Ok(())
}
