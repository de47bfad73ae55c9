// src/lib.rs

//! CPE dictionary ingestion and indexed storage.
//!
//! Fetchers pull raw title/identifier batches from NVD, JVN and the Vuls
//! annotation list; the normalizer turns them into canonical records; a
//! relational (SQLite) or key-value (redb) store replaces each source's
//! snapshot atomically and answers vendor/product and fuzzy title queries.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod refresh;
pub mod similarity;
pub mod utils;
pub mod wfn;
