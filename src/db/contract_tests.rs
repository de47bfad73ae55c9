// src/db/contract_tests.rs

//! Behaviour every `CpeStore` backend must share.

use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use super::{open_store, CpeStore, IngestOptions, StoreKind};
use crate::error::StoreError;
use crate::models::{FetchMeta, FetchType, FetchedCpe, FetchedCpes, VendorProduct, LATEST_SCHEMA_VERSION};
use crate::similarity::Algorithm;

fn entry(title: &str, cpe: &str) -> FetchedCpe {
	FetchedCpe::new(title, vec![cpe.to_string()])
}

fn fixture() -> FetchedCpes {
	FetchedCpes {
		cpes: vec![
			entry("NTP NTP 4.2.5p48", "cpe:2.3:a:ntp:ntp:4.2.5p48:*:*:*:*:*:*:*"),
			entry("NTP NTP 4.2.8 p1-beta1", "cpe:2.3:a:ntp:ntp:4.2.8:p1-beta1:*:*:*:*:*:*"),
			entry(
				"responsive_coming_soon_page_project responsive_coming_soon_page 1.1.18 wordpress",
				"cpe:2.3:a:responsive_coming_soon_page_project:responsive_coming_soon_page:1.1.18:*:*:*:*:wordpress:*:*",
			),
			entry(
				"vendorName1 productName1-1 1.1 targetSoftware1 targetHardware1",
				"cpe:2.3:a:vendorName1:productName1-1:1.1:*:*:*:*:targetSoftware1:targetHardware1:*",
			),
			entry(
				"vendorName1 productName1-2 1.2 targetSoftware1 targetHardware1",
				"cpe:2.3:a:vendorName1:productName1-2:1.2:*:*:*:*:targetSoftware1:targetHardware1:*",
			),
			entry(
				"vendorName2 productName2 2.0 targetSoftware2 targetHardware2",
				"cpe:2.3:a:vendorName2:productName2:2.0:*:*:*:*:targetSoftware2:targetHardware2:*",
			),
			entry(
				"vendorName6 productName6 6.0 targetSoftware6 targetHardware6",
				"cpe:2.3:a:vendorName6:productName6:6.0:*:*:*:*:targetSoftware6:targetHardware6:*",
			),
			entry(
				"MongoDB C# driver 1.10.0",
				r"cpe:2.3:a:mongodb:c\#_driver:1.10.0:-:*:*:*:mongodb:*:*",
			),
		],
		deprecated: vec![
			entry(
				"vendorName6 productName6 6.1 targetSoftware6 targetHardware6",
				"cpe:2.3:a:vendorName6:productName6:6.1:*:*:*:*:targetSoftware6:targetHardware6:*",
			),
			entry(
				"vendorName7 productName7 7.0",
				"cpe:2.3:a:vendorName7:productName7:7.0:*:*:*:*:*:*:*",
			),
		],
	}
}

fn open(kind: StoreKind, dir: &Path) -> Arc<dyn CpeStore> {
	let file = match kind {
		StoreKind::Sqlite3 => "cpe.sqlite3",
		StoreKind::Redb => "cpe.redb",
	};
	open_store(kind, &dir.join(file)).unwrap()
}

fn ingest(store: &dyn CpeStore, fetch_type: FetchType, cpes: &FetchedCpes) {
	store
		.insert_cpes(fetch_type, cpes, &IngestOptions { batch_size: 3 })
		.unwrap();
}

fn vp(vendor: &str, product: &str) -> VendorProduct {
	VendorProduct::new(vendor, product)
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| v.to_string()).collect()
}

fn fresh_store_has_current_meta(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	let meta = store.get_fetch_meta().unwrap();
	assert_eq!(meta.schema_version, LATEST_SCHEMA_VERSION);
	assert_eq!(meta.last_fetched_at.timestamp(), 0);
	assert!(store.check_schema_version().is_ok());
}

fn vendor_products_partition(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	let (active, deprecated) = store.get_vendor_products().unwrap();
	assert_eq!(
		active,
		vec![
			vp("mongodb", r"c\#_driver"),
			vp("ntp", "ntp"),
			vp("responsive_coming_soon_page_project", "responsive_coming_soon_page"),
			vp("vendorName1", r"productName1\-1"),
			vp("vendorName1", r"productName1\-2"),
			vp("vendorName2", "productName2"),
			vp("vendorName6", "productName6"),
		]
	);
	assert_eq!(deprecated, vec![vp("vendorName7", "productName7")]);
}

fn cpes_by_vendor_product(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	let (active, deprecated) = store
		.get_cpes_by_vendor_product("vendorName1", r"productName1\-1")
		.unwrap();
	assert_eq!(
		active,
		strings(&["cpe:/a:vendorName1:productName1-1:1.1::~~~targetSoftware1~targetHardware1~"])
	);
	assert!(deprecated.is_empty());

	let (active, deprecated) = store.get_cpes_by_vendor_product("ntp", "ntp").unwrap();
	assert_eq!(
		active,
		strings(&["cpe:/a:ntp:ntp:4.2.5p48", "cpe:/a:ntp:ntp:4.2.8:p1-beta1"])
	);
	assert!(deprecated.is_empty());

	let (active, deprecated) = store
		.get_cpes_by_vendor_product("vendorName6", "productName6")
		.unwrap();
	assert_eq!(
		active,
		strings(&["cpe:/a:vendorName6:productName6:6.0::~~~targetSoftware6~targetHardware6~"])
	);
	assert_eq!(
		deprecated,
		strings(&["cpe:/a:vendorName6:productName6:6.1::~~~targetSoftware6~targetHardware6~"])
	);

	let (active, deprecated) = store.get_cpes_by_vendor_product("", "ntp").unwrap();
	assert!(active.is_empty() && deprecated.is_empty());
}

fn deprecated_membership(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	assert!(store
		.is_deprecated("cpe:/a:vendorName6:productName6:6.1::~~~targetSoftware6~targetHardware6~")
		.unwrap());
	assert!(!store
		.is_deprecated("cpe:/a:vendorName6:productName6:6.0::~~~targetSoftware6~targetHardware6~")
		.unwrap());
	assert!(!store.is_deprecated("cpe:/a:unknown:unknown").unwrap());
}

fn fuzzy_title_search(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	let hits = store.get_similar_cpes_by_title("mongodb", 1, Algorithm::Jaro).unwrap();
	assert_eq!(
		hits,
		vec![FetchedCpe::new(
			"MongoDB C# driver 1.10.0",
			strings(&["cpe:/a:mongodb:c%23_driver:1.10.0:-:~~~mongodb~~"])
		)]
	);

	let all = store.get_similar_cpes_by_title("ntp", 100, Algorithm::Levenshtein).unwrap();
	assert_eq!(all.len(), 10);
	assert!(store.get_similar_cpes_by_title("", 5, Algorithm::Jaro).unwrap().is_empty());
	assert!(store.get_similar_cpes_by_title("ntp", 0, Algorithm::Jaro).unwrap().is_empty());

	let by_product = store
		.get_similar_cpes_by_search_title("ntp ntp", 1, Algorithm::Jaro)
		.unwrap();
	assert_eq!(
		by_product,
		vec![FetchedCpe::new(
			"ntp ntp",
			strings(&["cpe:/a:ntp:ntp:4.2.5p48", "cpe:/a:ntp:ntp:4.2.8:p1-beta1"])
		)]
	);
}

fn insert_is_idempotent(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());
	let products_once = store.get_vendor_products().unwrap();
	let lookup_once = store.get_cpes_by_vendor_product("vendorName6", "productName6").unwrap();

	ingest(store.as_ref(), FetchType::Nvd, &fixture());
	assert_eq!(store.get_vendor_products().unwrap(), products_once);
	assert_eq!(
		store.get_cpes_by_vendor_product("vendorName6", "productName6").unwrap(),
		lookup_once
	);
	assert!(store
		.is_deprecated("cpe:/a:vendorName6:productName6:6.1::~~~targetSoftware6~targetHardware6~")
		.unwrap());
}

fn sources_are_isolated(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	let jvn = FetchedCpes {
		cpes: vec![
			entry("ntp ntp", "cpe:/a:ntp:ntp:4.2.5p48"),
			entry("mysql mysql", "cpe:/a:mysql:mysql:5.0"),
		],
		deprecated: Vec::new(),
	};
	ingest(store.as_ref(), FetchType::Jvn, &jvn);
	ingest(store.as_ref(), FetchType::Jvn, &FetchedCpes::default());

	let (active, _) = store.get_cpes_by_vendor_product("ntp", "ntp").unwrap();
	assert_eq!(
		active,
		strings(&["cpe:/a:ntp:ntp:4.2.5p48", "cpe:/a:ntp:ntp:4.2.8:p1-beta1"])
	);
	let (products, _) = store.get_vendor_products().unwrap();
	assert!(products.contains(&vp("ntp", "ntp")));
	assert!(!products.contains(&vp("mysql", "mysql")));

	let hits = store.get_similar_cpes_by_title("NTP NTP 4.2.5p48", 1, Algorithm::Jaro).unwrap();
	assert_eq!(hits[0].title, "NTP NTP 4.2.5p48");
	assert_eq!(hits[0].cpes, strings(&["cpe:/a:ntp:ntp:4.2.5p48"]));
}

fn refresh_drops_omitted_records(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());

	let mut shrunk = fixture();
	shrunk
		.cpes
		.retain(|c| !c.title.starts_with("vendorName2") && !c.title.starts_with("NTP NTP 4.2.8"));
	shrunk.deprecated.clear();
	ingest(store.as_ref(), FetchType::Nvd, &shrunk);

	let (active, deprecated) = store.get_vendor_products().unwrap();
	assert!(!active.contains(&vp("vendorName2", "productName2")));
	assert!(deprecated.is_empty());

	let (active, _) = store.get_cpes_by_vendor_product("ntp", "ntp").unwrap();
	assert_eq!(active, strings(&["cpe:/a:ntp:ntp:4.2.5p48"]));
	let (active, deprecated) = store.get_cpes_by_vendor_product("vendorName2", "productName2").unwrap();
	assert!(active.is_empty() && deprecated.is_empty());
	assert!(!store
		.is_deprecated("cpe:/a:vendorName6:productName6:6.1::~~~targetSoftware6~targetHardware6~")
		.unwrap());

	let hits = store.get_similar_cpes_by_title("vendorName2", 100, Algorithm::Jaro).unwrap();
	assert!(hits.iter().all(|h| !h.title.starts_with("vendorName2")));
}

fn refresh_keeps_pair_owned_by_sibling(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	ingest(store.as_ref(), FetchType::Nvd, &fixture());
	ingest(
		store.as_ref(),
		FetchType::Vuls,
		&FetchedCpes {
			cpes: vec![entry("Vendor Two", "cpe:2.3:a:vendorName2:productName2:2.1:*:*:*:*:*:*:*")],
			deprecated: Vec::new(),
		},
	);

	let mut shrunk = fixture();
	shrunk.cpes.retain(|c| !c.title.starts_with("vendorName2"));
	ingest(store.as_ref(), FetchType::Nvd, &shrunk);

	let (active, _) = store.get_vendor_products().unwrap();
	assert!(active.contains(&vp("vendorName2", "productName2")));
	let (uris, _) = store.get_cpes_by_vendor_product("vendorName2", "productName2").unwrap();
	assert_eq!(uris, strings(&["cpe:/a:vendorName2:productName2:2.1"]));
}

fn uri_active_in_any_source_is_not_deprecated(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	let uri = "cpe:/a:acme:tool:1.0";
	ingest(
		store.as_ref(),
		FetchType::Nvd,
		&FetchedCpes {
			cpes: Vec::new(),
			deprecated: vec![entry("Acme Tool 1.0", "cpe:2.3:a:acme:tool:1.0:*:*:*:*:*:*:*")],
		},
	);
	ingest(
		store.as_ref(),
		FetchType::Vuls,
		&FetchedCpes {
			cpes: vec![entry("Acme Tool", "cpe:2.3:a:acme:tool:1.0:*:*:*:*:*:*:*")],
			deprecated: Vec::new(),
		},
	);

	let (uris, deprecated) = store.get_cpes_by_vendor_product("acme", "tool").unwrap();
	assert_eq!(uris, strings(&[uri]));
	assert!(deprecated.is_empty());
	assert!(!store.is_deprecated(uri).unwrap());
	let (active_vps, deprecated_vps) = store.get_vendor_products().unwrap();
	assert!(active_vps.contains(&vp("acme", "tool")));
	assert!(!deprecated_vps.contains(&vp("acme", "tool")));

	ingest(store.as_ref(), FetchType::Vuls, &FetchedCpes::default());

	let (uris, deprecated) = store.get_cpes_by_vendor_product("acme", "tool").unwrap();
	assert!(uris.is_empty());
	assert_eq!(deprecated, strings(&[uri]));
	assert!(store.is_deprecated(uri).unwrap());
}

fn outdated_schema_blocks_ingestion(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	store
		.upsert_fetch_meta(&FetchMeta {
			schema_version: LATEST_SCHEMA_VERSION - 1,
			..FetchMeta::default()
		})
		.unwrap();

	let err = store
		.insert_cpes(FetchType::Nvd, &fixture(), &IngestOptions::default())
		.unwrap_err();
	assert!(matches!(
		err,
		StoreError::SchemaVersionMismatch { expected, .. } if expected == LATEST_SCHEMA_VERSION
	));
	let (active, deprecated) = store.get_vendor_products().unwrap();
	assert!(active.is_empty() && deprecated.is_empty());
}

fn zero_batch_size_is_refused(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	let err = store
		.insert_cpes(FetchType::Nvd, &fixture(), &IngestOptions { batch_size: 0 })
		.unwrap_err();
	assert!(matches!(err, StoreError::InvalidBatchSize(0)));
	assert!(store.get_vendor_products().unwrap().0.is_empty());
}

fn fetch_meta_round_trips(kind: StoreKind) {
	let dir = tempdir().unwrap();
	let store = open(kind, dir.path());
	let stamped = store.get_fetch_meta().unwrap().touched(chrono::Utc::now());
	store.upsert_fetch_meta(&stamped).unwrap();
	let read = store.get_fetch_meta().unwrap();
	assert_eq!(read.revision, stamped.revision);
	assert_eq!(read.last_fetched_at.timestamp(), stamped.last_fetched_at.timestamp());
}

macro_rules! contract_suite {
	($module:ident, $kind:expr) => {
		mod $module {
			use super::*;

			#[test]
			fn fresh_store_has_current_meta() {
				super::fresh_store_has_current_meta($kind);
			}

			#[test]
			fn vendor_products_partition() {
				super::vendor_products_partition($kind);
			}

			#[test]
			fn cpes_by_vendor_product() {
				super::cpes_by_vendor_product($kind);
			}

			#[test]
			fn deprecated_membership() {
				super::deprecated_membership($kind);
			}

			#[test]
			fn fuzzy_title_search() {
				super::fuzzy_title_search($kind);
			}

			#[test]
			fn insert_is_idempotent() {
				super::insert_is_idempotent($kind);
			}

			#[test]
			fn sources_are_isolated() {
				super::sources_are_isolated($kind);
			}

			#[test]
			fn refresh_drops_omitted_records() {
				super::refresh_drops_omitted_records($kind);
			}

			#[test]
			fn refresh_keeps_pair_owned_by_sibling() {
				super::refresh_keeps_pair_owned_by_sibling($kind);
			}

			#[test]
			fn uri_active_in_any_source_is_not_deprecated() {
				super::uri_active_in_any_source_is_not_deprecated($kind);
			}

			#[test]
			fn outdated_schema_blocks_ingestion() {
				super::outdated_schema_blocks_ingestion($kind);
			}

			#[test]
			fn zero_batch_size_is_refused() {
				super::zero_batch_size_is_refused($kind);
			}

			#[test]
			fn fetch_meta_round_trips() {
				super::fetch_meta_round_trips($kind);
			}
		}
	};
}

contract_suite!(sqlite_backend, StoreKind::Sqlite3);
contract_suite!(redb_backend, StoreKind::Redb);

#[test]
fn second_redb_open_reports_locked() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("cpe.redb");
	let _first = open_store(StoreKind::Redb, &path).unwrap();
	assert!(matches!(
		open_store(StoreKind::Redb, &path),
		Err(StoreError::Locked)
	));
}
