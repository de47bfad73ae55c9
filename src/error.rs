// src/error.rs

use thiserror::Error;

/// Errors raised while binding or unbinding CPE names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WfnError {
	#[error("invalid CPE prefix in {input:?}")]
	InvalidPrefix { input: String },

	#[error("expected {expected} components, found {found} in {input:?}")]
	ComponentCount {
		input: String,
		expected: usize,
		found: usize,
	},

	#[error("empty {attribute} component")]
	EmptyComponent { attribute: &'static str },

	#[error("invalid character {ch:?} in {value:?}")]
	InvalidCharacter { value: String, ch: char },

	#[error("invalid percent-encoding in {value:?}")]
	InvalidPercentEncoding { value: String },

	#[error("embedded wildcard in {value:?}")]
	EmbeddedWildcard { value: String },

	#[error("dangling escape at end of {value:?}")]
	DanglingEscape { value: String },

	#[error("invalid packed edition {value:?}")]
	InvalidPackedEdition { value: String },

	#[error("invalid part {value:?}")]
	InvalidPart { value: String },

	#[error("invalid language tag {value:?}")]
	InvalidLanguage { value: String },
}

/// Errors raised by the fetch pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("failed to build HTTP client: {0}")]
	Client(#[source] reqwest::Error),

	#[error("invalid proxy URL {url:?}: {source}")]
	Proxy {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("request to {url} failed: {source}")]
	Transport {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("request to {url} returned status {status}")]
	Status { url: String, status: u16 },

	#[error("giving up on {url} after {attempts} attempts")]
	RetriesExhausted {
		url: String,
		attempts: u32,
		#[source]
		last: Box<FetchError>,
	},

	#[error("malformed {what}: {reason}")]
	MalformedEnvelope { what: String, reason: String },

	#[error("batch timed out after {0:?}")]
	Timeout(std::time::Duration),

	#[error("task {index} did not complete: {reason}")]
	TaskAborted { index: usize, reason: String },

	#[error("{} fetch task(s) failed: {}", .0.len(), join_errors(.0))]
	Aggregated(Vec<FetchError>),
}

fn join_errors(errors: &[FetchError]) -> String {
	errors
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}

/// Errors raised by the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database is locked; close other connections and retry")]
	Locked,

	#[error("failed to open {path}: {reason}")]
	Open { path: String, reason: String },

	#[error("schema version mismatch: store has {found}, expected {expected}; rebuild the database")]
	SchemaVersionMismatch { found: u32, expected: u32 },

	#[error("batch size must be at least 1, got {0}")]
	InvalidBatchSize(usize),

	#[error("unknown database type {0:?}")]
	UnknownBackend(String),

	#[error("sqlite error: {0}")]
	Sqlite(rusqlite::Error),

	#[error("connection pool error: {0}")]
	Pool(#[from] r2d2::Error),

	#[error("key-value store error: {0}")]
	Kv(#[from] redb::Error),

	#[error("corrupt stored value for {key}: {reason}")]
	Decode { key: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
	fn from(err: rusqlite::Error) -> Self {
		match err.sqlite_error_code() {
			Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
				StoreError::Locked
			}
			_ => StoreError::Sqlite(err),
		}
	}
}

macro_rules! kv_error_from {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<$ty> for StoreError {
				fn from(err: $ty) -> Self {
					StoreError::Kv(redb::Error::from(err))
				}
			}
		)*
	};
}

kv_error_from!(
	redb::TransactionError,
	redb::TableError,
	redb::StorageError,
	redb::CommitError,
);

impl From<redb::DatabaseError> for StoreError {
	fn from(err: redb::DatabaseError) -> Self {
		match err {
			redb::DatabaseError::DatabaseAlreadyOpen => StoreError::Locked,
			other => StoreError::Kv(redb::Error::from(other)),
		}
	}
}

/// Errors surfaced through the query surface.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("unknown fuzzy search algorithm {0:?}")]
	UnknownAlgorithm(String),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("blocking task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Errors raised by one refresh of one source.
#[derive(Debug, Error)]
pub enum RefreshError {
	#[error("fetch failed: {0}")]
	Fetch(#[from] FetchError),

	#[error("ingestion failed: {0}")]
	Store(#[from] StoreError),

	#[error("blocking task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("threads must be at least 1")]
	NoThreads,

	#[error("batch size must be at least 1")]
	NoBatchSize,

	#[error("invalid HTTP proxy URL {0:?}")]
	InvalidProxy(String),
}
