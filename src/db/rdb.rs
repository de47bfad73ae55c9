// src/db/rdb.rs

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::connection::{establish_pool, SqlitePool};
use super::schema;
use super::{CpeStore, IngestOptions};
use crate::error::StoreError;
use crate::models::{FetchMeta, FetchType, FetchedCpe, FetchedCpes, VendorProduct};
use crate::normalize::normalize;
use crate::similarity::{fuzzy_search, Algorithm};

/// Relational backend on a single SQLite file.
///
/// Index families are not materialized; they are derived from
/// `canonical_cpes` with `DISTINCT` queries.
pub struct RdbStore {
	pool: Arc<SqlitePool>,
	path: PathBuf,
}

impl RdbStore {
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		let pool = Arc::new(establish_pool(path)?);
		{
			let conn = pool.get()?;
			schema::create_tables(&conn)?;
			if schema::ensure_fetch_meta(&conn)? {
				info!("Initialized fetch meta in {:?}", path);
			}
		}
		Ok(Self {
			pool,
			path: path.to_path_buf(),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn similar(&self, column: &str, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		if query.is_empty() || n == 0 {
			return Ok(Vec::new());
		}
		let conn = self.pool.get()?;
		let candidates: Vec<String> = query_strings(
			&conn,
			&format!("SELECT DISTINCT {column} FROM canonical_cpes"),
			[],
		)?;

		let sql = format!("SELECT DISTINCT cpe_uri FROM canonical_cpes WHERE {column} = ?1 ORDER BY cpe_uri");
		fuzzy_search(query, candidates.iter().map(String::as_str), n, algorithm)
			.into_iter()
			.map(|title| {
				let cpes = query_strings(&conn, &sql, [&title])?;
				Ok(FetchedCpe { title, cpes })
			})
			.collect()
	}
}

fn query_strings<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>, StoreError> {
	let mut stmt = conn.prepare(sql)?;
	let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
	let values = rows.collect::<Result<Vec<_>, _>>()?;
	Ok(values)
}

fn query_vendor_products(conn: &Connection, sql: &str) -> Result<Vec<VendorProduct>, StoreError> {
	let mut stmt = conn.prepare(sql)?;
	let rows = stmt.query_map([], |row| {
		Ok(VendorProduct {
			vendor: row.get(0)?,
			product: row.get(1)?,
		})
	})?;
	let values = rows.collect::<Result<Vec<_>, _>>()?;
	Ok(values)
}

impl CpeStore for RdbStore {
	fn name(&self) -> &'static str {
		"sqlite3"
	}

	fn get_fetch_meta(&self) -> Result<FetchMeta, StoreError> {
		let conn = self.pool.get()?;
		let row: Option<(String, u32, String)> = conn
			.query_row(
				"SELECT revision, schema_version, last_fetched_at FROM fetch_meta WHERE id = 1",
				[],
				|row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
			)
			.optional()?;

		let Some((revision, schema_version, last_fetched_at)) = row else {
			return Ok(FetchMeta::default());
		};
		let last_fetched_at = DateTime::parse_from_rfc3339(&last_fetched_at)
			.map_err(|e| StoreError::Decode {
				key: "fetch_meta.last_fetched_at".to_string(),
				reason: e.to_string(),
			})?
			.with_timezone(&Utc);

		Ok(FetchMeta {
			revision,
			schema_version,
			last_fetched_at,
		})
	}

	fn upsert_fetch_meta(&self, meta: &FetchMeta) -> Result<(), StoreError> {
		let conn = self.pool.get()?;
		conn.execute(
			"INSERT INTO fetch_meta (id, revision, schema_version, last_fetched_at)
			 VALUES (1, ?1, ?2, ?3)
			 ON CONFLICT(id) DO UPDATE SET
				revision = excluded.revision,
				schema_version = excluded.schema_version,
				last_fetched_at = excluded.last_fetched_at",
			params![meta.revision, meta.schema_version, meta.last_fetched_at.to_rfc3339()],
		)?;
		Ok(())
	}

	fn insert_cpes(&self, fetch_type: FetchType, cpes: &FetchedCpes, options: &IngestOptions) -> Result<usize, StoreError> {
		self.check_schema_version()?;
		options.validate()?;

		let records = normalize(fetch_type, cpes);
		let mut conn = self.pool.get()?;
		let tx = conn.transaction()?;

		let old_ids: Vec<i64> = {
			let mut stmt = tx.prepare("SELECT id FROM canonical_cpes WHERE fetch_type = ?1")?;
			let rows = stmt.query_map([fetch_type.as_str()], |row| row.get(0))?;
			rows.collect::<Result<_, _>>()?
		};

		info!("Deleting {} old {} records", old_ids.len(), fetch_type);
		for chunk in old_ids.chunks(options.batch_size) {
			let placeholders = vec!["?"; chunk.len()].join(",");
			tx.execute(
				&format!("DELETE FROM canonical_cpes WHERE id IN ({placeholders})"),
				params_from_iter(chunk.iter()),
			)?;
		}

		info!("Inserting {} new {} records", records.len(), fetch_type);
		{
			let mut stmt = tx.prepare(
				"INSERT INTO canonical_cpes (
					fetch_type, title, search_title, cpe_uri, cpe_fs, part, vendor, product,
					version, \"update\", edition, language, software_edition,
					target_software, target_hardware, other, deprecated
				) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
			)?;
			let mut written = 0;
			for chunk in records.chunks(options.batch_size) {
				for c in chunk {
					stmt.execute(params![
						c.fetch_type.as_str(),
						c.title,
						c.search_title,
						c.cpe_uri,
						c.cpe_fs,
						c.part,
						c.vendor,
						c.product,
						c.version,
						c.update,
						c.edition,
						c.language,
						c.software_edition,
						c.target_software,
						c.target_hardware,
						c.other,
						c.deprecated,
					])?;
				}
				written += chunk.len();
				debug!("Inserted {}/{} {} records", written, records.len(), fetch_type);
			}
		}

		tx.commit()?;
		Ok(records.len())
	}

	fn get_vendor_products(&self) -> Result<(Vec<VendorProduct>, Vec<VendorProduct>), StoreError> {
		let conn = self.pool.get()?;
		let active = query_vendor_products(
			&conn,
			"SELECT DISTINCT vendor, product FROM canonical_cpes
			 WHERE deprecated = 0
			 ORDER BY vendor, product",
		)?;
		let deprecated = query_vendor_products(
			&conn,
			"SELECT DISTINCT d.vendor, d.product FROM canonical_cpes d
			 WHERE d.deprecated = 1
			 AND NOT EXISTS (
				SELECT 1 FROM canonical_cpes a
				WHERE a.deprecated = 0 AND a.vendor = d.vendor AND a.product = d.product
			 )
			 ORDER BY d.vendor, d.product",
		)?;
		Ok((active, deprecated))
	}

	fn get_cpes_by_vendor_product(&self, vendor: &str, product: &str) -> Result<(Vec<String>, Vec<String>), StoreError> {
		if vendor.is_empty() || product.is_empty() {
			return Ok((Vec::new(), Vec::new()));
		}
		let conn = self.pool.get()?;
		let active = query_strings(
			&conn,
			"SELECT DISTINCT cpe_uri FROM canonical_cpes
			 WHERE vendor LIKE ?1 AND product LIKE ?2 AND deprecated = 0
			 ORDER BY cpe_uri",
			params![vendor, product],
		)?;
		// A URI any source still carries as active is never reported deprecated.
		let deprecated = query_strings(
			&conn,
			"SELECT DISTINCT d.cpe_uri FROM canonical_cpes d
			 WHERE d.vendor LIKE ?1 AND d.product LIKE ?2 AND d.deprecated = 1
			 AND NOT EXISTS (
				SELECT 1 FROM canonical_cpes a
				WHERE a.deprecated = 0 AND a.cpe_uri = d.cpe_uri
			 )
			 ORDER BY d.cpe_uri",
			params![vendor, product],
		)?;
		Ok((active, deprecated))
	}

	fn get_similar_cpes_by_title(&self, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		self.similar("title", query, n, algorithm)
	}

	fn get_similar_cpes_by_search_title(&self, query: &str, n: usize, algorithm: Algorithm) -> Result<Vec<FetchedCpe>, StoreError> {
		self.similar("search_title", query, n, algorithm)
	}

	fn is_deprecated(&self, cpe_uri: &str) -> Result<bool, StoreError> {
		let conn = self.pool.get()?;
		let deprecated = conn.query_row(
			"SELECT EXISTS(SELECT 1 FROM canonical_cpes WHERE cpe_uri = ?1 AND deprecated = 1)
			 AND NOT EXISTS(SELECT 1 FROM canonical_cpes WHERE cpe_uri = ?1 AND deprecated = 0)",
			[cpe_uri],
			|row| row.get(0),
		)?;
		Ok(deprecated)
	}
}
