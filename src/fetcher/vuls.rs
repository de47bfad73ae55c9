// src/fetcher/vuls.rs

use log::info;
use std::collections::{HashMap, HashSet};

use super::http::HttpClient;
use super::Fetcher;
use crate::error::FetchError;
use crate::models::{FetchType, FetchedCpe, FetchedCpes};

pub const DEFAULT_ANNOTATION_URL: &str =
	"https://raw.githubusercontent.com/vulsio/go-cpe-dictionary/master/annotation/vuls.json";

/// Fetches the curated annotation list, a JSON array of `{title, cpes}`.
pub struct VulsFetcher {
	client: HttpClient,
	url: String,
}

impl VulsFetcher {
	pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
		Self {
			client,
			url: url.into(),
		}
	}
}

impl Fetcher for VulsFetcher {
	fn fetch_type(&self) -> FetchType {
		FetchType::Vuls
	}

	async fn fetch(&self) -> Result<FetchedCpes, FetchError> {
		let body = self.client.get_bytes(&self.url).await?;
		let fetched = parse_annotations(&body)?;
		info!("Vuls: {} titles, {} CPEs", fetched.cpes.len(), fetched.identifier_count());
		Ok(fetched)
	}
}

/// Groups entries by title in first-seen order and drops repeated identifiers.
fn parse_annotations(body: &[u8]) -> Result<FetchedCpes, FetchError> {
	let entries: Vec<FetchedCpe> =
		serde_json::from_slice(body).map_err(|err| FetchError::MalformedEnvelope {
			what: "Vuls annotation list".to_string(),
			reason: err.to_string(),
		})?;

	let mut positions: HashMap<String, usize> = HashMap::new();
	// Duplicates are dropped within a title; the same URI may sit under several titles.
	let mut seen: Vec<HashSet<String>> = Vec::new();
	let mut cpes: Vec<FetchedCpe> = Vec::new();

	for entry in entries {
		let slot = *positions.entry(entry.title.clone()).or_insert_with(|| {
			cpes.push(FetchedCpe::new(entry.title.clone(), Vec::new()));
			seen.push(HashSet::new());
			cpes.len() - 1
		});
		for cpe in entry.cpes {
			if seen[slot].insert(cpe.clone()) {
				cpes[slot].cpes.push(cpe);
			}
		}
	}

	cpes.retain(|entry| !entry.cpes.is_empty());
	Ok(FetchedCpes {
		cpes,
		deprecated: Vec::new(),
	})
}
