// src/db/kv/tables.rs

//! redb table definitions and key layout for the key-value backend.
//!
//! Sets are stored as `(set key, member)` rows with no value. Hashes are
//! stored as `(hash key, field)` rows holding a string value.

use redb::TableDefinition;

pub const SETS: TableDefinition<(&str, &str), ()> = TableDefinition::new("CPE#Sets");

pub const HASHES: TableDefinition<(&str, &str), &str> = TableDefinition::new("CPE#Hashes");

pub const VENDOR_PRODUCTS_KEY: &str = "CPE#VendorProducts";
pub const DEPRECATED_VENDOR_PRODUCTS_KEY: &str = "CPE#DeprecatedVendorProducts";
pub const DEPRECATED_CPES_KEY: &str = "CPE#DeprecatedCPEs";
pub const ACTIVE_CPES_KEY: &str = "CPE#ActiveCPEs";
pub const VENDOR_PRODUCT_PREFIX: &str = "CPE#VP#";
pub const TITLE_PREFIX: &str = "CPE#Title#";
pub const SEARCH_TITLE_PREFIX: &str = "CPE#SearchTitle#";

pub const FETCH_META_KEY: &str = "CPE#FETCHMETA";
pub const MANIFEST_KEY: &str = "CPE#DEP";

pub const VENDOR_PRODUCT_SEPARATOR: &str = "##";

pub fn vendor_product_member(vendor: &str, product: &str) -> String {
	format!("{vendor}{VENDOR_PRODUCT_SEPARATOR}{product}")
}

/// Splits a `vendor##product` member at the first separator not inside an escape.
pub fn split_vendor_product(member: &str) -> Option<(&str, &str)> {
	let bytes = member.as_bytes();
	let mut idx = 0;
	while idx < bytes.len() {
		match bytes[idx] {
			b'\\' => idx += 2,
			b'#' if bytes.get(idx + 1) == Some(&b'#') => {
				return Some((&member[..idx], &member[idx + 2..]));
			}
			_ => idx += 1,
		}
	}
	None
}
