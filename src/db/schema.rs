// src/db/schema.rs

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::models::FetchMeta;

pub fn create_tables(conn: &Connection) -> Result<(), StoreError> {
	conn.execute_batch(
		"
		CREATE TABLE IF NOT EXISTS fetch_meta (
			id INTEGER PRIMARY KEY CHECK (id = 1),
			revision TEXT NOT NULL,
			schema_version INTEGER NOT NULL,
			last_fetched_at TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS canonical_cpes (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			fetch_type TEXT NOT NULL,
			title TEXT NOT NULL,
			search_title TEXT NOT NULL,
			cpe_uri TEXT NOT NULL,
			cpe_fs TEXT NOT NULL,
			part TEXT NOT NULL,
			vendor TEXT NOT NULL,
			product TEXT NOT NULL,
			version TEXT NOT NULL,
			\"update\" TEXT NOT NULL,
			edition TEXT NOT NULL,
			language TEXT NOT NULL,
			software_edition TEXT NOT NULL,
			target_software TEXT NOT NULL,
			target_hardware TEXT NOT NULL,
			other TEXT NOT NULL,
			deprecated INTEGER NOT NULL DEFAULT 0
		);

		CREATE UNIQUE INDEX IF NOT EXISTS idx_canonical_cpes_fetch_type_uri
		ON canonical_cpes(fetch_type, cpe_uri);

		CREATE INDEX IF NOT EXISTS idx_canonical_cpes_vendor_product
		ON canonical_cpes(vendor, product, deprecated);

		CREATE INDEX IF NOT EXISTS idx_canonical_cpes_title
		ON canonical_cpes(title);

		CREATE INDEX IF NOT EXISTS idx_canonical_cpes_search_title
		ON canonical_cpes(search_title);

		CREATE INDEX IF NOT EXISTS idx_canonical_cpes_cpe_uri
		ON canonical_cpes(cpe_uri, deprecated);
		",
	)?;

	Ok(())
}

/// Inserts the singleton fetch meta row unless one already exists.
pub fn ensure_fetch_meta(conn: &Connection) -> Result<bool, StoreError> {
	let existing: Option<i64> = conn
		.query_row("SELECT id FROM fetch_meta WHERE id = 1", [], |row| row.get(0))
		.optional()?;
	if existing.is_some() {
		return Ok(false);
	}

	let meta = FetchMeta::default();
	conn.execute(
		"INSERT INTO fetch_meta (id, revision, schema_version, last_fetched_at)
		 VALUES (1, ?1, ?2, ?3)",
		params![meta.revision, meta.schema_version, meta.last_fetched_at.to_rfc3339()],
	)?;
	Ok(true)
}
