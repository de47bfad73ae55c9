// src/db/connection.rs

use log::info;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use crate::error::StoreError;

pub type SqlitePool = Pool<SqliteConnectionManager>;

const MAX_POOL_SIZE: u32 = 15;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Establishes a connection pool for the database file at `path`.
pub fn establish_pool(path: &Path) -> Result<SqlitePool, StoreError> {
	info!("SQLite database will be located at: {:?}", path);

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
			path: path.display().to_string(),
			reason: format!("failed to create database directory: {e}"),
		})?;
	}

	let manager = SqliteConnectionManager::file(path).with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));

	let pool = Pool::builder()
		.max_size(MAX_POOL_SIZE)
		.build(manager)
		.map_err(|e| StoreError::Open {
			path: path.display().to_string(),
			reason: e.to_string(),
		})?;

	info!("SQLite connection pool established successfully");
	Ok(pool)
}
