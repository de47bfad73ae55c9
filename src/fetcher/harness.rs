// src/fetcher/harness.rs

//! Bounded-concurrency runner for batches of fetch tasks.
//!
//! At most `concurrency` tasks run at once, admissions are paced by `wait`,
//! and the whole batch is abandoned once `timeout` elapses. Results arrive
//! in completion order.

use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{sleep, timeout_at, Duration, Instant};

use crate::error::FetchError;

pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarnessOptions {
	pub concurrency: usize,
	pub wait: Duration,
	pub timeout: Duration,
}

impl Default for HarnessOptions {
	fn default() -> Self {
		Self {
			concurrency: 5,
			wait: Duration::ZERO,
			timeout: DEFAULT_BATCH_TIMEOUT,
		}
	}
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
	pub results: Vec<T>,
	pub errors: Vec<FetchError>,
	/// Set when the batch deadline passed before every task reported.
	pub timed_out: Option<Duration>,
}

impl<T> BatchOutcome<T> {
	pub fn into_result(self) -> Result<Vec<T>, FetchError> {
		if let Some(limit) = self.timed_out {
			return Err(FetchError::Timeout(limit));
		}
		if !self.errors.is_empty() {
			return Err(FetchError::Aggregated(self.errors));
		}
		Ok(self.results)
	}
}

pub async fn run_bounded<T, Fut>(options: HarnessOptions, tasks: Vec<Fut>) -> BatchOutcome<T>
where
	T: Send + 'static,
	Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
	let total = tasks.len();
	let deadline = Instant::now() + options.timeout;
	let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
	let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<T, FetchError>)>();

	let wait = options.wait;
	let submitter = tokio::spawn(async move {
		for (index, task) in tasks.into_iter().enumerate() {
			let Ok(permit) = semaphore.clone().acquire_owned().await else {
				break;
			};
			let tx = tx.clone();
			tokio::spawn(async move {
				let result = task.await;
				drop(permit);
				// Receiver may be gone after a timeout.
				let _ = tx.send((index, result));
			});
			if index + 1 < total && !wait.is_zero() {
				sleep(wait).await;
			}
		}
	});

	let mut outcome = BatchOutcome {
		results: Vec::with_capacity(total),
		errors: Vec::new(),
		timed_out: None,
	};
	let mut reported = vec![false; total];

	loop {
		match timeout_at(deadline, rx.recv()).await {
			Ok(Some((index, result))) => {
				reported[index] = true;
				match result {
					Ok(value) => outcome.results.push(value),
					Err(err) => {
						debug!("Task {} failed: {}", index, err);
						outcome.errors.push(err);
					}
				}
			}
			Ok(None) => break,
			Err(_) => {
				warn!(
					"Batch timed out after {:?} with {} of {} tasks reported",
					options.timeout,
					reported.iter().filter(|done| **done).count(),
					total
				);
				submitter.abort();
				outcome.timed_out = Some(options.timeout);
				return outcome;
			}
		}
	}

	for (index, done) in reported.iter().enumerate() {
		if !done {
			outcome.errors.push(FetchError::TaskAborted {
				index,
				reason: "task panicked or was cancelled".to_string(),
			});
		}
	}
	outcome
}
