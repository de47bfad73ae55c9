// src/api.rs

//! Async query surface over a `CpeStore`, with the response shapes callers
//! serialize to JSON.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;

use crate::db::CpeStore;
use crate::error::ApiError;
use crate::models::{FetchedCpe, VendorProduct};
use crate::similarity::Algorithm;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProductsResponse {
	pub vendor_products: Vec<VendorProduct>,
	pub deprecated: Vec<VendorProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpeUrisResponse {
	#[serde(rename = "cpeURIs")]
	pub cpe_uris: Vec<String>,
	pub deprecated: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzySearchRequest {
	pub query: String,
	pub n: usize,
	/// Algorithm name; empty selects the default.
	#[serde(default)]
	pub algorithm: String,
}

#[derive(Clone)]
pub struct CpeApi {
	store: Arc<dyn CpeStore>,
}

impl CpeApi {
	pub fn new(store: Arc<dyn CpeStore>) -> Self {
		Self { store }
	}

	pub async fn vendor_products(&self) -> Result<VendorProductsResponse, ApiError> {
		let store = self.store.clone();
		let (vendor_products, deprecated) =
			task::spawn_blocking(move || store.get_vendor_products()).await??;
		Ok(VendorProductsResponse {
			vendor_products,
			deprecated,
		})
	}

	pub async fn cpes_by_vendor_product(
		&self,
		vendor: &str,
		product: &str,
	) -> Result<CpeUrisResponse, ApiError> {
		let store = self.store.clone();
		let (vendor, product) = (vendor.to_string(), product.to_string());
		let (cpe_uris, deprecated) =
			task::spawn_blocking(move || store.get_cpes_by_vendor_product(&vendor, &product)).await??;
		Ok(CpeUrisResponse {
			cpe_uris,
			deprecated,
		})
	}

	pub async fn similar_by_title(&self, request: FuzzySearchRequest) -> Result<Vec<FetchedCpe>, ApiError> {
		let algorithm = parse_algorithm(&request.algorithm)?;
		let store = self.store.clone();
		let found = task::spawn_blocking(move || {
			store.get_similar_cpes_by_title(&request.query, request.n, algorithm)
		})
		.await??;
		Ok(found)
	}

	pub async fn similar_by_product(&self, request: FuzzySearchRequest) -> Result<Vec<FetchedCpe>, ApiError> {
		let algorithm = parse_algorithm(&request.algorithm)?;
		let store = self.store.clone();
		let found = task::spawn_blocking(move || {
			store.get_similar_cpes_by_search_title(&request.query, request.n, algorithm)
		})
		.await??;
		Ok(found)
	}

	pub async fn is_deprecated(&self, cpe_uri: &str) -> Result<bool, ApiError> {
		let store = self.store.clone();
		let cpe_uri = cpe_uri.to_string();
		Ok(task::spawn_blocking(move || store.is_deprecated(&cpe_uri)).await??)
	}
}

fn parse_algorithm(name: &str) -> Result<Algorithm, ApiError> {
	name.parse::<Algorithm>()
		.map_err(|_| ApiError::UnknownAlgorithm(name.to_string()))
}
