// src/refresh.rs

//! One refresh of one source: gate, fetch, ingest, stamp.

use chrono::{DateTime, Utc};
use log::info;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::task;

use crate::db::{CpeStore, IngestOptions};
use crate::error::RefreshError;
use crate::fetcher::Fetcher;
use crate::models::{CanonicalCpe, FetchType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
	pub fetch_type: FetchType,
	pub active_entries: usize,
	pub deprecated_entries: usize,
	pub inserted: usize,
	pub fetched_at: DateTime<Utc>,
}

/// Replaces the store's copy of `fetcher`'s source with a fresh download.
///
/// The schema gate runs before anything is downloaded, and `last_fetched_at`
/// only moves after the ingestion commits.
pub async fn refresh<F: Fetcher>(
	store: Arc<dyn CpeStore>,
	fetcher: &F,
	options: IngestOptions,
) -> Result<RefreshReport, RefreshError> {
	let fetch_type = fetcher.fetch_type();

	let gate = store.clone();
	task::spawn_blocking(move || gate.check_schema_version()).await??;
	options.validate()?;

	info!("Fetching {} CPEs", fetch_type);
	let fetched = fetcher.fetch().await?;
	let active_entries = fetched.cpes.len();
	let deprecated_entries = fetched.deprecated.len();
	info!(
		"Fetched {} active and {} deprecated {} entries ({} identifiers)",
		active_entries,
		deprecated_entries,
		fetch_type,
		fetched.identifier_count()
	);

	let (inserted, fetched_at) = task::spawn_blocking(move || {
		let inserted = store.insert_cpes(fetch_type, &fetched, &options)?;
		let now = Utc::now();
		let meta = store.get_fetch_meta()?.touched(now);
		store.upsert_fetch_meta(&meta)?;
		Ok::<_, RefreshError>((inserted, now))
	})
	.await??;

	info!("Stored {} {} records", inserted, fetch_type);
	Ok(RefreshReport {
		fetch_type,
		active_entries,
		deprecated_entries,
		inserted,
		fetched_at,
	})
}

/// Writes one tab-separated line per record: source, URI, FS, deprecated flag, title.
pub fn write_records<W: Write>(out: &mut W, records: &[CanonicalCpe]) -> io::Result<()> {
	for record in records {
		writeln!(
			out,
			"{}\t{}\t{}\t{}\t{}",
			record.fetch_type, record.cpe_uri, record.cpe_fs, record.deprecated, record.title
		)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::{open_store, StoreKind};
	use crate::error::{FetchError, StoreError};
	use crate::models::{FetchMeta, FetchedCpe, FetchedCpes};
	use crate::normalize::normalize;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tempfile::tempdir;

	struct StaticFetcher {
		calls: AtomicUsize,
		result: fn() -> Result<FetchedCpes, FetchError>,
	}

	impl StaticFetcher {
		fn new(result: fn() -> Result<FetchedCpes, FetchError>) -> Self {
			Self {
				calls: AtomicUsize::new(0),
				result,
			}
		}
	}

	impl Fetcher for StaticFetcher {
		fn fetch_type(&self) -> FetchType {
			FetchType::Vuls
		}

		async fn fetch(&self) -> Result<FetchedCpes, FetchError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			(self.result)()
		}
	}

	fn sample() -> Result<FetchedCpes, FetchError> {
		Ok(FetchedCpes {
			cpes: vec![FetchedCpe::new(
				"NTP",
				vec!["cpe:/a:ntp:ntp:4.2.8".to_string(), "cpe:/a:ntp:ntp:4.2.7".to_string()],
			)],
			deprecated: vec![FetchedCpe::new("Old NTP", vec!["cpe:/a:ntp:ntp:3.0".to_string()])],
		})
	}

	fn unreachable_source() -> Result<FetchedCpes, FetchError> {
		Err(FetchError::Status {
			url: "http://example".into(),
			status: 503,
		})
	}

	#[tokio::test]
	async fn refresh_ingests_and_stamps_meta() {
		let dir = tempdir().unwrap();
		let store = open_store(StoreKind::Sqlite3, &dir.path().join("cpe.sqlite3")).unwrap();
		let fetcher = StaticFetcher::new(sample);

		let report = refresh(store.clone(), &fetcher, IngestOptions::default()).await.unwrap();
		assert_eq!(report.active_entries, 1);
		assert_eq!(report.deprecated_entries, 1);
		assert_eq!(report.inserted, 3);

		let meta = store.get_fetch_meta().unwrap();
		assert_eq!(meta.last_fetched_at, report.fetched_at);
		assert!(store.is_deprecated("cpe:/a:ntp:ntp:3.0").unwrap());
	}

	#[tokio::test]
	async fn failed_fetch_leaves_meta_untouched() {
		let dir = tempdir().unwrap();
		let store = open_store(StoreKind::Redb, &dir.path().join("cpe.redb")).unwrap();
		let fetcher = StaticFetcher::new(unreachable_source);

		let err = refresh(store.clone(), &fetcher, IngestOptions::default()).await.unwrap_err();
		assert!(matches!(err, RefreshError::Fetch(FetchError::Status { status: 503, .. })));
		assert_eq!(store.get_fetch_meta().unwrap().last_fetched_at.timestamp(), 0);
	}

	#[tokio::test]
	async fn outdated_schema_stops_before_download() {
		let dir = tempdir().unwrap();
		let store = open_store(StoreKind::Sqlite3, &dir.path().join("cpe.sqlite3")).unwrap();
		store
			.upsert_fetch_meta(&FetchMeta {
				schema_version: 1,
				..FetchMeta::default()
			})
			.unwrap();
		let fetcher = StaticFetcher::new(sample);

		let err = refresh(store, &fetcher, IngestOptions::default()).await.unwrap_err();
		assert!(matches!(
			err,
			RefreshError::Store(StoreError::SchemaVersionMismatch { found: 1, .. })
		));
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn dump_is_tab_separated() {
		let records = normalize(FetchType::Vuls, &sample().unwrap());
		let mut out = Vec::new();
		write_records(&mut out, &records).unwrap();
		let text = String::from_utf8(out).unwrap();
		let lines: Vec<_> = text.lines().collect();
		assert_eq!(lines.len(), 3);
		assert_eq!(
			lines[0],
			"vuls\tcpe:/a:ntp:ntp:4.2.8\tcpe:2.3:a:ntp:ntp:4.2.8:*:*:*:*:*:*:*\tfalse\tNTP"
		);
		assert!(lines[2].contains("\ttrue\tOld NTP"));
	}
}
