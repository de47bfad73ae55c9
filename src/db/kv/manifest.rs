// src/db/kv/manifest.rs

//! Per-source record of which index members the last ingestion added.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::tables::{
	vendor_product_member, ACTIVE_CPES_KEY, DEPRECATED_CPES_KEY, DEPRECATED_VENDOR_PRODUCTS_KEY,
	SEARCH_TITLE_PREFIX, TITLE_PREFIX, VENDOR_PRODUCTS_KEY, VENDOR_PRODUCT_PREFIX,
};
use crate::models::CanonicalCpe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexFamily {
	VendorProducts,
	DeprecatedVendorProducts,
	CpesByVendorProduct,
	CpesByTitle,
	CpesBySearchTitle,
	DeprecatedCpes,
	ActiveCpes,
}

impl IndexFamily {
	/// Physical set key holding members of this family for `group`.
	pub fn set_key(&self, group: &str) -> String {
		match self {
			IndexFamily::VendorProducts => VENDOR_PRODUCTS_KEY.to_string(),
			IndexFamily::DeprecatedVendorProducts => DEPRECATED_VENDOR_PRODUCTS_KEY.to_string(),
			IndexFamily::DeprecatedCpes => DEPRECATED_CPES_KEY.to_string(),
			IndexFamily::ActiveCpes => ACTIVE_CPES_KEY.to_string(),
			IndexFamily::CpesByVendorProduct => format!("{VENDOR_PRODUCT_PREFIX}{group}"),
			IndexFamily::CpesByTitle => format!("{TITLE_PREFIX}{group}"),
			IndexFamily::CpesBySearchTitle => format!("{SEARCH_TITLE_PREFIX}{group}"),
		}
	}
}

/// One set member. `group` is empty for families backed by a single set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub group: String,
	pub member: String,
}

impl IndexEntry {
	pub fn flat(member: impl Into<String>) -> Self {
		Self {
			group: String::new(),
			member: member.into(),
		}
	}

	pub fn grouped(group: impl Into<String>, member: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			member: member.into(),
		}
	}
}

/// Index entries a record contributes.
pub fn index_entries(record: &CanonicalCpe) -> Vec<(IndexFamily, IndexEntry)> {
	let vp = vendor_product_member(&record.vendor, &record.product);
	let mut entries = Vec::with_capacity(5);
	if record.deprecated {
		entries.push((IndexFamily::DeprecatedCpes, IndexEntry::flat(record.cpe_uri.clone())));
		entries.push((IndexFamily::DeprecatedVendorProducts, IndexEntry::flat(vp.clone())));
	} else {
		entries.push((IndexFamily::ActiveCpes, IndexEntry::flat(record.cpe_uri.clone())));
		entries.push((IndexFamily::VendorProducts, IndexEntry::flat(vp.clone())));
	}
	entries.push((IndexFamily::CpesByVendorProduct, IndexEntry::grouped(vp, record.cpe_uri.clone())));
	entries.push((
		IndexFamily::CpesByTitle,
		IndexEntry::grouped(record.title.clone(), record.cpe_uri.clone()),
	));
	entries.push((
		IndexFamily::CpesBySearchTitle,
		IndexEntry::grouped(record.search_title.clone(), record.cpe_uri.clone()),
	));
	entries
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
	families: BTreeMap<IndexFamily, BTreeSet<IndexEntry>>,
}

impl Manifest {
	/// Returns false if the entry was already present.
	pub fn insert(&mut self, family: IndexFamily, entry: IndexEntry) -> bool {
		self.families.entry(family).or_default().insert(entry)
	}

	pub fn remove(&mut self, family: IndexFamily, entry: &IndexEntry) -> bool {
		let Some(set) = self.families.get_mut(&family) else {
			return false;
		};
		let removed = set.remove(entry);
		if set.is_empty() {
			self.families.remove(&family);
		}
		removed
	}

	pub fn contains(&self, family: IndexFamily, entry: &IndexEntry) -> bool {
		self.families.get(&family).map_or(false, |set| set.contains(entry))
	}

	pub fn merge(&mut self, other: &Manifest) {
		for (family, entry) in other.iter() {
			self.insert(family, entry.clone());
		}
	}

	/// Entries of `self` not present in `other`.
	pub fn difference(&self, other: &Manifest) -> Manifest {
		let mut out = Manifest::default();
		for (family, entry) in self.iter() {
			if !other.contains(family, entry) {
				out.insert(family, entry.clone());
			}
		}
		out
	}

	pub fn iter(&self) -> impl Iterator<Item = (IndexFamily, &IndexEntry)> {
		self.families
			.iter()
			.flat_map(|(family, set)| set.iter().map(move |entry| (*family, entry)))
	}

	pub fn len(&self) -> usize {
		self.families.values().map(BTreeSet::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.families.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(group: &str, member: &str) -> IndexEntry {
		IndexEntry::grouped(group, member)
	}

	#[test]
	fn duplicate_entries_coalesce() {
		let mut manifest = Manifest::default();
		assert!(manifest.insert(IndexFamily::CpesByTitle, entry("t", "cpe:/a:x:y")));
		assert!(!manifest.insert(IndexFamily::CpesByTitle, entry("t", "cpe:/a:x:y")));
		assert_eq!(manifest.len(), 1);

		assert!(manifest.remove(IndexFamily::CpesByTitle, &entry("t", "cpe:/a:x:y")));
		assert!(!manifest.remove(IndexFamily::CpesByTitle, &entry("t", "cpe:/a:x:y")));
		assert!(manifest.is_empty());
	}

	#[test]
	fn difference_is_family_scoped() {
		let mut stale = Manifest::default();
		stale.insert(IndexFamily::VendorProducts, IndexEntry::flat("a##b"));
		stale.insert(IndexFamily::CpesByTitle, entry("t", "cpe:/a:a:b"));

		let mut shared = Manifest::default();
		shared.insert(IndexFamily::DeprecatedVendorProducts, IndexEntry::flat("a##b"));
		shared.insert(IndexFamily::CpesByTitle, entry("t", "cpe:/a:a:b"));

		let removable = stale.difference(&shared);
		assert_eq!(removable.len(), 1);
		assert!(removable.contains(IndexFamily::VendorProducts, &IndexEntry::flat("a##b")));
	}

	#[test]
	fn serializes_as_typed_map() {
		let mut manifest = Manifest::default();
		manifest.insert(IndexFamily::DeprecatedCpes, IndexEntry::flat("cpe:/a:x:y"));
		let json = serde_json::to_string(&manifest).unwrap();
		assert_eq!(json, r#"{"DeprecatedCpes":[{"member":"cpe:/a:x:y"}]}"#);
		let back: Manifest = serde_json::from_str(&json).unwrap();
		assert_eq!(back, manifest);
	}
}
