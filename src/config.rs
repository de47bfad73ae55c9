// src/config.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::db::{IngestOptions, StoreKind, DEFAULT_BATCH_SIZE};
use crate::error::{ConfigError, FetchError};
use crate::fetcher::harness::DEFAULT_BATCH_TIMEOUT;
use crate::fetcher::{jvn, nvd, vuls, HarnessOptions, HttpClient, RetryPolicy};

const APP_DIR: &str = "cpe-dictionary";

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
	pub store: StoreConfig,
	pub fetch: FetchConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
	pub kind: StoreKind,
	pub path: PathBuf,
}

impl StoreConfig {
	pub fn new(kind: StoreKind, path: Option<PathBuf>) -> Self {
		Self {
			kind,
			path: path.unwrap_or_else(|| default_db_path(kind)),
		}
	}
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
	pub threads: usize,
	pub wait: Duration,
	pub batch_size: usize,
	pub http_proxy: Option<String>,
	pub batch_timeout: Duration,
	pub retry: RetryPolicy,
	pub sources: SourceUrls,
}

impl Default for FetchConfig {
	fn default() -> Self {
		Self {
			threads: std::thread::available_parallelism().map_or(4, |n| n.get()),
			wait: Duration::ZERO,
			batch_size: DEFAULT_BATCH_SIZE,
			http_proxy: None,
			batch_timeout: DEFAULT_BATCH_TIMEOUT,
			retry: RetryPolicy::default(),
			sources: SourceUrls::default(),
		}
	}
}

impl FetchConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.threads == 0 {
			return Err(ConfigError::NoThreads);
		}
		if self.batch_size == 0 {
			return Err(ConfigError::NoBatchSize);
		}
		if let Some(proxy) = self.http_proxy.as_deref().filter(|p| !p.is_empty()) {
			if reqwest::Url::parse(proxy).is_err() {
				return Err(ConfigError::InvalidProxy(proxy.to_string()));
			}
		}
		Ok(())
	}

	pub fn harness_options(&self) -> HarnessOptions {
		HarnessOptions {
			concurrency: self.threads,
			wait: self.wait,
			timeout: self.batch_timeout,
		}
	}

	pub fn ingest_options(&self) -> IngestOptions {
		IngestOptions {
			batch_size: self.batch_size,
		}
	}

	pub fn http_client(&self) -> Result<HttpClient, FetchError> {
		HttpClient::new(self.http_proxy.as_deref(), self.retry)
	}
}

/// Upstream locations for every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
	pub nvd_dictionary: String,
	pub nvd_match: String,
	pub jvn_feed_base: String,
	pub vuls_annotation: String,
}

impl Default for SourceUrls {
	fn default() -> Self {
		Self {
			nvd_dictionary: nvd::DEFAULT_DICTIONARY_URL.to_string(),
			nvd_match: nvd::DEFAULT_MATCH_URL.to_string(),
			jvn_feed_base: jvn::DEFAULT_FEED_BASE_URL.to_string(),
			vuls_annotation: vuls::DEFAULT_ANNOTATION_URL.to_string(),
		}
	}
}

/// `<data dir>/cpe-dictionary/cpe.<backend>`, falling back to the working directory.
pub fn default_db_path(kind: StoreKind) -> PathBuf {
	let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
	base.join(APP_DIR).join(format!("cpe.{}", kind.as_str()))
}
