// src/fetcher/http.rs

//! HTTP GET with proxy support and exponential backoff.

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::error::FetchError;

const CLIENT_USER_AGENT: &str = concat!("cpe-dictionary/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub multiplier: f64,
	pub max_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 20,
			initial_delay: Duration::from_millis(500),
			multiplier: 1.5,
			max_delay: Duration::from_secs(60),
		}
	}
}

impl RetryPolicy {
	/// Delay to sleep after the given (1-based) failed attempt.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(64) as i32;
		let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
		if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
			self.max_delay
		} else {
			Duration::from_secs_f64(secs)
		}
	}
}

/// Runs `op` until it succeeds or `policy.max_attempts` attempts have failed.
pub async fn retry_with_backoff<T, F, Fut>(
	policy: &RetryPolicy,
	label: &str,
	mut op: F,
) -> Result<T, FetchError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, FetchError>>,
{
	let mut attempt = 0;
	loop {
		attempt += 1;
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if attempt >= policy.max_attempts.max(1) => {
				return Err(FetchError::RetriesExhausted {
					url: label.to_string(),
					attempts: attempt,
					last: Box::new(err),
				});
			}
			Err(err) => {
				let delay = policy.delay_for(attempt);
				warn!("Attempt {} for {} failed: {}. Retrying in {:?}", attempt, label, err, delay);
				sleep(delay).await;
			}
		}
	}
}

#[derive(Clone)]
pub struct HttpClient {
	client: reqwest::Client,
	retry: RetryPolicy,
}

impl HttpClient {
	pub fn new(proxy: Option<&str>, retry: RetryPolicy) -> Result<Self, FetchError> {
		let mut headers = HeaderMap::new();
		headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

		let mut builder = reqwest::Client::builder()
			.default_headers(headers)
			.timeout(REQUEST_TIMEOUT);

		if let Some(url) = proxy.filter(|url| !url.is_empty()) {
			let proxy = reqwest::Proxy::all(url).map_err(|source| FetchError::Proxy {
				url: url.to_string(),
				source,
			})?;
			builder = builder.proxy(proxy);
		}

		let client = builder.build().map_err(FetchError::Client)?;
		Ok(Self { client, retry })
	}

	/// Fetches the body at `url`, retrying transport failures and non-2xx statuses.
	pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
		retry_with_backoff(&self.retry, url, || self.get_once(url)).await
	}

	async fn get_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
		debug!("GET {}", url);
		let transport = |source| FetchError::Transport {
			url: url.to_string(),
			source,
		};

		let response = self.client.get(url).send().await.map_err(transport)?;

		if !response.status().is_success() {
			return Err(FetchError::Status {
				url: url.to_string(),
				status: response.status().as_u16(),
			});
		}

		let body = response.bytes().await.map_err(transport)?;
		Ok(body.to_vec())
	}
}
