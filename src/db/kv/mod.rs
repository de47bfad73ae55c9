// src/db/kv/mod.rs

//! Key-value backend on a single redb file.
//!
//! Index families are materialized as sets. Each ingestion is reconciled
//! against the manifest of what the same source added last time, so members
//! still contributed by another source are never removed.

pub mod manifest;
pub mod tables;

use chrono::{DateTime, Utc};
use log::{debug, info};
use redb::{Database, ReadableTable, WriteTransaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use self::manifest::{index_entries, IndexEntry, IndexFamily, Manifest};
use self::tables::*;
use super::{CpeStore, IngestOptions};
use crate::error::StoreError;
use crate::models::{FetchMeta, FetchType, FetchedCpe, FetchedCpes, VendorProduct};
use crate::normalize::normalize;
use crate::similarity::{fuzzy_search, Algorithm};

const REVISION_FIELD: &str = "Revision";
const SCHEMA_VERSION_FIELD: &str = "SchemaVersion";
const LAST_FETCHED_AT_FIELD: &str = "LastFetchedAt";

pub struct KvStore {
	db: Database,
	path: PathBuf,
}

impl KvStore {
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		info!("redb database will be located at: {:?}", path);
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
				path: path.display().to_string(),
				reason: format!("failed to create database directory: {e}"),
			})?;
		}

		let db = Database::create(path)?;
		let store = Self {
			db,
			path: path.to_path_buf(),
		};
		store.migrate()?;
		Ok(store)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn migrate(&self) -> Result<(), StoreError> {
		let txn = self.db.begin_write()?;
		let missing = {
			txn.open_table(SETS)?;
			let hashes = txn.open_table(HASHES)?;
			let missing = hashes.get((FETCH_META_KEY, SCHEMA_VERSION_FIELD))?.is_none();
			missing
		};
		if missing {
			info!("Initialized fetch meta in {:?}", self.path);
			write_fetch_meta(&txn, &FetchMeta::default())?;
		}
		txn.commit()?;
		Ok(())
	}

	fn load_manifest(&self, fetch_type: FetchType) -> Result<Manifest, StoreError> {
		let txn = self.db.begin_read()?;
		let hashes = txn.open_table(HASHES)?;
		let Some(raw) = hashes.get((MANIFEST_KEY, fetch_type.as_str()))? else {
			return Ok(Manifest::default());
		};
		serde_json::from_str(raw.value()).map_err(|e| StoreError::Decode {
			key: format!("{MANIFEST_KEY}/{fetch_type}"),
			reason: e.to_string(),
		})
	}

	fn store_manifest(&self, fetch_type: FetchType, manifest: &Manifest) -> Result<(), StoreError> {
		let json = serde_json::to_string(manifest).map_err(|e| StoreError::Decode {
			key: format!("{MANIFEST_KEY}/{fetch_type}"),
			reason: e.to_string(),
		})?;
		let txn = self.db.begin_write()?;
		{
			let mut hashes = txn.open_table(HASHES)?;
			hashes.insert((MANIFEST_KEY, fetch_type.as_str()), json.as_str())?;
		}
		txn.commit()?;
		Ok(())
	}

	fn members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
		let txn = self.db.begin_read()?;
		let sets = txn.open_table(SETS)?;
		let mut out = Vec::new();
		for item in sets.range((set_key, "")..)? {
			let (key, _) = item?;
			let (set, member) = key.value();
			if set != set_key {
				break;
			}
			out.push(member.to_string());
		}
		Ok(out)
	}

	fn contains(&self, set_key: &str, member: &str) -> Result<bool, StoreError> {
		let txn = self.db.begin_read()?;
		let sets = txn.open_table(SETS)?;
		Ok(sets.get((set_key, member))?.is_some())
	}

	/// Distinct group names of every set whose key starts with `prefix`.
	fn groups(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
		let txn = self.db.begin_read()?;
		let sets = txn.open_table(SETS)?;
		let mut out = BTreeSet::new();
		for item in sets.range((prefix, "")..)? {
			let (key, _) = item?;
			let (set, _) = key.value();
			let Some(group) = set.strip_prefix(prefix) else {
				break;
			};
			out.insert(group.to_string());
		}
		Ok(out)
	}

	fn similar(&self, prefix: &str, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		if query.is_empty() || n == 0 {
			return Ok(Vec::new());
		}
		let candidates = self.groups(prefix)?;
		fuzzy_search(query, candidates.iter().map(String::as_str), n, algorithm)
			.into_iter()
			.map(|title| {
				let cpes = self.members(&format!("{prefix}{title}"))?;
				Ok(FetchedCpe { title, cpes })
			})
			.collect()
	}

	fn apply(&self, entries: &[(IndexFamily, IndexEntry)], add: bool) -> Result<(), StoreError> {
		let txn = self.db.begin_write()?;
		{
			let mut sets = txn.open_table(SETS)?;
			for (family, entry) in entries {
				let key = family.set_key(&entry.group);
				if add {
					sets.insert((key.as_str(), entry.member.as_str()), ())?;
				} else {
					sets.remove((key.as_str(), entry.member.as_str()))?;
				}
			}
		}
		txn.commit()?;
		Ok(())
	}
}

fn write_fetch_meta(txn: &WriteTransaction, meta: &FetchMeta) -> Result<(), StoreError> {
	let mut hashes = txn.open_table(HASHES)?;
	let schema_version = meta.schema_version.to_string();
	let last_fetched_at = meta.last_fetched_at.to_rfc3339();
	hashes.insert((FETCH_META_KEY, REVISION_FIELD), meta.revision.as_str())?;
	hashes.insert((FETCH_META_KEY, SCHEMA_VERSION_FIELD), schema_version.as_str())?;
	hashes.insert((FETCH_META_KEY, LAST_FETCHED_AT_FIELD), last_fetched_at.as_str())?;
	Ok(())
}

fn decode_error(field: &str, reason: impl ToString) -> StoreError {
	StoreError::Decode {
		key: format!("{FETCH_META_KEY}/{field}"),
		reason: reason.to_string(),
	}
}

impl CpeStore for KvStore {
	fn name(&self) -> &'static str {
		"redb"
	}

	fn get_fetch_meta(&self) -> Result<FetchMeta, StoreError> {
		let txn = self.db.begin_read()?;
		let hashes = txn.open_table(HASHES)?;
		let field = |name: &str| -> Result<Option<String>, StoreError> {
			Ok(hashes
				.get((FETCH_META_KEY, name))?
				.map(|v| v.value().to_string()))
		};

		let Some(schema_version) = field(SCHEMA_VERSION_FIELD)? else {
			return Ok(FetchMeta::default());
		};
		let schema_version = schema_version
			.parse::<u32>()
			.map_err(|e| decode_error(SCHEMA_VERSION_FIELD, e))?;
		let revision = field(REVISION_FIELD)?.unwrap_or_default();
		let last_fetched_at = match field(LAST_FETCHED_AT_FIELD)? {
			Some(raw) => DateTime::parse_from_rfc3339(&raw)
				.map_err(|e| decode_error(LAST_FETCHED_AT_FIELD, e))?
				.with_timezone(&Utc),
			None => DateTime::<Utc>::default(),
		};

		Ok(FetchMeta {
			revision,
			schema_version,
			last_fetched_at,
		})
	}

	fn upsert_fetch_meta(&self, meta: &FetchMeta) -> Result<(), StoreError> {
		let txn = self.db.begin_write()?;
		write_fetch_meta(&txn, meta)?;
		txn.commit()?;
		Ok(())
	}

	fn insert_cpes(&self, fetch_type: FetchType, cpes: &FetchedCpes, options: &IngestOptions) -> Result<usize, StoreError> {
		self.check_schema_version()?;
		options.validate()?;

		let records = normalize(fetch_type, cpes);

		let mut stale = self.load_manifest(fetch_type)?;
		let mut shared = Manifest::default();
		for sibling in fetch_type.siblings() {
			shared.merge(&self.load_manifest(sibling)?);
		}

		info!("Inserting {} {} records", records.len(), fetch_type);
		let mut fresh = Manifest::default();
		let mut written = 0;
		for chunk in records.chunks(options.batch_size) {
			let entries: Vec<(IndexFamily, IndexEntry)> = chunk.iter().flat_map(index_entries).collect();
			self.apply(&entries, true)?;
			for (family, entry) in entries {
				stale.remove(family, &entry);
				fresh.insert(family, entry);
			}
			written += chunk.len();
			debug!("Indexed {}/{} {} records", written, records.len(), fetch_type);
		}

		let removable: Vec<(IndexFamily, IndexEntry)> = stale
			.difference(&shared)
			.iter()
			.map(|(family, entry)| (family, entry.clone()))
			.collect();
		info!("Removing {} stale {} index entries", removable.len(), fetch_type);
		for chunk in removable.chunks(options.batch_size) {
			self.apply(chunk, false)?;
		}

		self.store_manifest(fetch_type, &fresh)?;
		Ok(records.len())
	}

	fn get_vendor_products(&self) -> Result<(Vec<VendorProduct>, Vec<VendorProduct>), StoreError> {
		let to_pairs = |members: Vec<String>| -> BTreeSet<VendorProduct> {
			members
				.iter()
				.filter_map(|m| split_vendor_product(m))
				.map(|(vendor, product)| VendorProduct::new(vendor, product))
				.collect()
		};
		let active = to_pairs(self.members(VENDOR_PRODUCTS_KEY)?);
		let deprecated = to_pairs(self.members(DEPRECATED_VENDOR_PRODUCTS_KEY)?)
			.into_iter()
			.filter(|vp| !active.contains(vp))
			.collect();
		Ok((active.into_iter().collect(), deprecated))
	}

	fn get_cpes_by_vendor_product(&self, vendor: &str, product: &str) -> Result<(Vec<String>, Vec<String>), StoreError> {
		if vendor.is_empty() || product.is_empty() {
			return Ok((Vec::new(), Vec::new()));
		}
		let key = IndexFamily::CpesByVendorProduct.set_key(&vendor_product_member(vendor, product));
		let uris = self.members(&key)?;

		let txn = self.db.begin_read()?;
		let sets = txn.open_table(SETS)?;
		let mut active = Vec::new();
		let mut deprecated = Vec::new();
		// A URI any source still carries as active is never reported deprecated.
		for uri in uris {
			let carried = sets.get((ACTIVE_CPES_KEY, uri.as_str()))?.is_some();
			if !carried && sets.get((DEPRECATED_CPES_KEY, uri.as_str()))?.is_some() {
				deprecated.push(uri);
			} else {
				active.push(uri);
			}
		}
		Ok((active, deprecated))
	}

	fn get_similar_cpes_by_title(&self, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		self.similar(TITLE_PREFIX, query, n, algorithm)
	}

	fn get_similar_cpes_by_search_title(&self, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		self.similar(SEARCH_TITLE_PREFIX, query, n, algorithm)
	}

	fn is_deprecated(&self, cpe_uri: &str) -> Result<bool, StoreError> {
		Ok(self.contains(DEPRECATED_CPES_KEY, cpe_uri)? && !self.contains(ACTIVE_CPES_KEY, cpe_uri)?)
	}
}
