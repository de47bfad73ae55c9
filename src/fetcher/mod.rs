// src/fetcher/mod.rs

//! Source fetchers producing raw title/identifier batches.

pub mod harness;
pub mod http;
pub mod jvn;
pub mod nvd;
pub mod vuls;

use std::future::Future;

use crate::error::FetchError;
use crate::models::{FetchType, FetchedCpes};

pub use harness::{run_bounded, BatchOutcome, HarnessOptions};
pub use http::{retry_with_backoff, HttpClient, RetryPolicy};
pub use jvn::JvnFetcher;
pub use nvd::NvdFetcher;
pub use vuls::VulsFetcher;

pub trait Fetcher: Send + Sync {
	fn fetch_type(&self) -> FetchType;

	/// Downloads and parses one full snapshot of the source.
	fn fetch(&self) -> impl Future<Output = Result<FetchedCpes, FetchError>> + Send;
}
