// src/models/mod.rs

pub mod cpe;
pub mod fetch_meta;

pub use cpe::{CanonicalCpe, FetchType, FetchedCpe, FetchedCpes, VendorProduct};
pub use fetch_meta::{FetchMeta, LATEST_SCHEMA_VERSION};
