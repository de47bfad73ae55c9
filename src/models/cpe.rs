// src/models/cpe.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream source a record was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchType {
	Nvd,
	Jvn,
	Vuls,
}

impl FetchType {
	pub const ALL: [FetchType; 3] = [FetchType::Nvd, FetchType::Jvn, FetchType::Vuls];

	pub fn as_str(&self) -> &'static str {
		match self {
			FetchType::Nvd => "nvd",
			FetchType::Jvn => "jvn",
			FetchType::Vuls => "vuls",
		}
	}

	/// Every source other than this one.
	pub fn siblings(self) -> impl Iterator<Item = FetchType> {
		Self::ALL.into_iter().filter(move |ft| *ft != self)
	}
}

impl fmt::Display for FetchType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for FetchType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"nvd" => Ok(FetchType::Nvd),
			"jvn" => Ok(FetchType::Jvn),
			"vuls" => Ok(FetchType::Vuls),
			other => Err(format!("unknown fetch type: {other}")),
		}
	}
}

/// One title and the raw identifiers that denote it, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedCpe {
	#[serde(alias = "Title")]
	pub title: String,
	#[serde(alias = "CPEs", default)]
	pub cpes: Vec<String>,
}

impl FetchedCpe {
	pub fn new(title: impl Into<String>, cpes: Vec<String>) -> Self {
		Self { title: title.into(), cpes }
	}
}

/// Full batch produced by one fetcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedCpes {
	pub cpes: Vec<FetchedCpe>,
	pub deprecated: Vec<FetchedCpe>,
}

impl FetchedCpes {
	pub fn identifier_count(&self) -> usize {
		self.cpes
			.iter()
			.chain(self.deprecated.iter())
			.map(|c| c.cpes.len())
			.sum()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorProduct {
	pub vendor: String,
	pub product: String,
}

impl VendorProduct {
	pub fn new(vendor: impl Into<String>, product: impl Into<String>) -> Self {
		Self {
			vendor: vendor.into(),
			product: product.into(),
		}
	}
}

/// Normalized record as persisted by every backend.
///
/// Attribute fields hold the WFN string form: `ANY`, `NA`, or the quoted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCpe {
	pub fetch_type: FetchType,
	pub title: String,
	pub search_title: String,
	pub cpe_uri: String,
	pub cpe_fs: String,
	pub part: String,
	pub vendor: String,
	pub product: String,
	pub version: String,
	pub update: String,
	pub edition: String,
	pub language: String,
	pub software_edition: String,
	pub target_software: String,
	pub target_hardware: String,
	pub other: String,
	pub deprecated: bool,
}

impl CanonicalCpe {
	pub fn vendor_product(&self) -> VendorProduct {
		VendorProduct::new(self.vendor.clone(), self.product.clone())
	}
}
