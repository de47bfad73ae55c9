// src/models/fetch_meta.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever the record shape or the index layout changes.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Crate version stamped into every store this build touches.
pub const REVISION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMeta {
	pub revision: String,
	pub schema_version: u32,
	pub last_fetched_at: DateTime<Utc>,
}

impl Default for FetchMeta {
	fn default() -> Self {
		Self {
			revision: REVISION.to_string(),
			schema_version: LATEST_SCHEMA_VERSION,
			last_fetched_at: DateTime::<Utc>::default(),
		}
	}
}

impl FetchMeta {
	pub fn is_outdated(&self) -> bool {
		self.schema_version != LATEST_SCHEMA_VERSION
	}

	/// Copy of this meta stamped with the current revision and fetch time.
	pub fn touched(&self, now: DateTime<Utc>) -> Self {
		Self {
			revision: REVISION.to_string(),
			schema_version: self.schema_version,
			last_fetched_at: now,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_meta_is_current_and_never_fetched() {
		let meta = FetchMeta::default();
		assert!(!meta.is_outdated());
		assert_eq!(meta.last_fetched_at.timestamp(), 0);
	}

	#[test]
	fn touched_keeps_schema_version() {
		let old = FetchMeta { schema_version: 1, ..FetchMeta::default() };
		let now = Utc::now();
		let touched = old.touched(now);
		assert_eq!(touched.schema_version, 1);
		assert_eq!(touched.last_fetched_at, now);
		assert!(touched.is_outdated());
	}
}
