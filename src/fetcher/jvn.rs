// src/fetcher/jvn.rs

//! JVN fetcher: scrapes CPE elements from the yearly and rolling RDF feeds.

use chrono::{Datelike, Utc};
use log::{info, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;

use super::harness::{run_bounded, HarnessOptions};
use super::http::HttpClient;
use super::Fetcher;
use crate::error::FetchError;
use crate::models::{FetchType, FetchedCpe, FetchedCpes};
use crate::wfn::unbind_uri;

pub const DEFAULT_FEED_BASE_URL: &str = "https://jvndb.jvn.jp/ja/rss";
pub const FIRST_FEED_YEAR: i32 = 2002;

/// One `<cpe vendor=".." product="..">uri</cpe>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FeedCpe {
	vendor: String,
	product: String,
	uri: String,
}

impl FeedCpe {
	fn title(&self) -> String {
		format!("{} {}", self.vendor, self.product)
	}
}

pub struct JvnFetcher {
	client: HttpClient,
	harness: HarnessOptions,
	base_url: String,
}

impl JvnFetcher {
	pub fn new(client: HttpClient, harness: HarnessOptions, base_url: impl Into<String>) -> Self {
		Self {
			client,
			harness,
			base_url: base_url.into(),
		}
	}

	/// Yearly feeds from the first year through `current_year`, then the rolling feeds.
	pub fn feed_urls(&self, current_year: i32) -> Vec<String> {
		let base = self.base_url.trim_end_matches('/');
		let mut urls: Vec<String> = (FIRST_FEED_YEAR..=current_year)
			.map(|year| format!("{base}/years/jvndb_{year}.rdf"))
			.collect();
		urls.push(format!("{base}/jvndb_new.rdf"));
		urls.push(format!("{base}/jvndb.rdf"));
		urls
	}
}

impl Fetcher for JvnFetcher {
	fn fetch_type(&self) -> FetchType {
		FetchType::Jvn
	}

	async fn fetch(&self) -> Result<FetchedCpes, FetchError> {
		let urls = self.feed_urls(Utc::now().year());
		info!("Fetching {} JVN feeds", urls.len());

		let tasks = urls
			.into_iter()
			.enumerate()
			.map(|(index, url)| {
				let client = self.client.clone();
				async move {
					let body = client.get_bytes(&url).await?;
					let cpes = parse_feed(&body, &url)?;
					Ok::<_, FetchError>((index, cpes))
				}
			})
			.collect();

		let mut feeds = run_bounded(self.harness, tasks).await.into_result()?;
		// Completion order is arbitrary; merge in feed order so the first title is stable.
		feeds.sort_by_key(|(index, _)| *index);

		let fetched = merge_feeds(feeds.into_iter().map(|(_, cpes)| cpes));
		info!("JVN: {} distinct CPEs", fetched.cpes.len());
		Ok(fetched)
	}
}

fn merge_feeds(feeds: impl IntoIterator<Item = Vec<FeedCpe>>) -> FetchedCpes {
	let mut seen = HashSet::new();
	let mut cpes = Vec::new();
	for cpe in feeds.into_iter().flatten() {
		if let Err(err) = unbind_uri(&cpe.uri) {
			warn!("Skipping invalid JVN CPE {:?}: {}", cpe.uri, err);
			continue;
		}
		if seen.insert(cpe.uri.clone()) {
			cpes.push(FetchedCpe::new(cpe.title(), vec![cpe.uri]));
		}
	}
	FetchedCpes {
		cpes,
		deprecated: Vec::new(),
	}
}

fn parse_feed(body: &[u8], url: &str) -> Result<Vec<FeedCpe>, FetchError> {
	let malformed = |reason: String| FetchError::MalformedEnvelope {
		what: format!("JVN feed {url}"),
		reason,
	};

	let mut reader = Reader::from_reader(body);
	reader.config_mut().trim_text(true);

	let mut buf = Vec::new();
	let mut cpes = Vec::new();
	let mut current: Option<FeedCpe> = None;

	loop {
		match reader.read_event_into(&mut buf) {
			Ok(Event::Start(e)) if e.local_name().as_ref() == b"cpe" => {
				let mut cpe = FeedCpe {
					vendor: String::new(),
					product: String::new(),
					uri: String::new(),
				};
				for attr in e.attributes().flatten() {
					let value = attr
						.unescape_value()
						.map_err(|err| malformed(err.to_string()))?
						.into_owned();
					match attr.key.local_name().as_ref() {
						b"vendor" => cpe.vendor = value,
						b"product" => cpe.product = value,
						_ => {}
					}
				}
				current = Some(cpe);
			}
			Ok(Event::Text(e)) => {
				if let Some(cpe) = current.as_mut() {
					let text = e.unescape().map_err(|err| malformed(err.to_string()))?;
					cpe.uri.push_str(&text);
				}
			}
			Ok(Event::End(e)) if e.local_name().as_ref() == b"cpe" => {
				if let Some(mut cpe) = current.take() {
					cpe.uri = cpe.uri.trim().to_string();
					if !cpe.uri.is_empty() {
						cpes.push(cpe);
					}
				}
			}
			Ok(Event::Eof) => break,
			Err(err) => {
				return Err(malformed(format!(
					"at byte {}: {}",
					reader.buffer_position(),
					err
				)))
			}
			_ => {}
		}
		buf.clear();
	}

	Ok(cpes)
}
