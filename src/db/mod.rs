// src/db/mod.rs

pub mod connection;
pub mod kv;
pub mod rdb;
pub mod schema;

#[cfg(test)]
mod contract_tests;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::{FetchMeta, FetchType, FetchedCpe, FetchedCpes, VendorProduct, LATEST_SCHEMA_VERSION};
use crate::similarity::Algorithm;

pub use kv::KvStore;
pub use rdb::RdbStore;

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Ingest-side options passed explicitly into every `insert_cpes` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
	pub batch_size: usize,
}

impl Default for IngestOptions {
	fn default() -> Self {
		Self { batch_size: DEFAULT_BATCH_SIZE }
	}
}

impl IngestOptions {
	pub fn validate(&self) -> Result<(), StoreError> {
		if self.batch_size < 1 {
			return Err(StoreError::InvalidBatchSize(self.batch_size));
		}
		Ok(())
	}
}

/// Storage contract shared by the relational and key-value backends.
///
/// Calls are blocking; async callers should run them on a blocking thread.
pub trait CpeStore: Send + Sync {
	fn name(&self) -> &'static str;

	fn get_fetch_meta(&self) -> Result<FetchMeta, StoreError>;

	fn upsert_fetch_meta(&self, meta: &FetchMeta) -> Result<(), StoreError>;

	/// Replaces everything previously ingested for `fetch_type` with `cpes`.
	///
	/// Returns the number of canonical records written.
	fn insert_cpes(
		&self,
		fetch_type: FetchType,
		cpes: &FetchedCpes,
		options: &IngestOptions,
	) -> Result<usize, StoreError>;

	/// Active pairs, then pairs referenced only by deprecated records.
	fn get_vendor_products(&self) -> Result<(Vec<VendorProduct>, Vec<VendorProduct>), StoreError>;

	/// Active URIs, then deprecated URIs, for one vendor/product pair.
	fn get_cpes_by_vendor_product(
		&self,
		vendor: &str,
		product: &str,
	) -> Result<(Vec<String>, Vec<String>), StoreError>;

	fn get_similar_cpes_by_title(
		&self,
		query: &str,
		n: usize,
		algorithm: Algorithm,
	) -> Result<Vec<FetchedCpe>, StoreError>;

	/// Like `get_similar_cpes_by_title`, ranked over the "vendor product" search keys.
	fn get_similar_cpes_by_search_title(
		&self,
		query: &str,
		n: usize,
		algorithm: Algorithm,
	) -> Result<Vec<FetchedCpe>, StoreError>;

	fn is_deprecated(&self, cpe_uri: &str) -> Result<bool, StoreError>;

	/// Refuses to continue unless the store was built by this schema version.
	fn check_schema_version(&self) -> Result<(), StoreError> {
		let meta = self.get_fetch_meta()?;
		if meta.is_outdated() {
			return Err(StoreError::SchemaVersionMismatch {
				found: meta.schema_version,
				expected: LATEST_SCHEMA_VERSION,
			});
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
	#[default]
	Sqlite3,
	Redb,
}

impl StoreKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			StoreKind::Sqlite3 => "sqlite3",
			StoreKind::Redb => "redb",
		}
	}
}

impl fmt::Display for StoreKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StoreKind {
	type Err = StoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"sqlite3" => Ok(StoreKind::Sqlite3),
			"redb" => Ok(StoreKind::Redb),
			other => Err(StoreError::UnknownBackend(other.to_string())),
		}
	}
}

/// Opens (creating and migrating if needed) the store at `path`.
pub fn open_store(kind: StoreKind, path: &Path) -> Result<Arc<dyn CpeStore>, StoreError> {
	let store: Arc<dyn CpeStore> = match kind {
		StoreKind::Sqlite3 => Arc::new(RdbStore::open(path)?),
		StoreKind::Redb => Arc::new(KvStore::open(path)?),
	};
	Ok(store)
}
