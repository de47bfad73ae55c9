// src/normalize.rs

use log::warn;
use std::collections::HashSet;

use crate::error::WfnError;
use crate::models::{CanonicalCpe, FetchType, FetchedCpe, FetchedCpes};
use crate::wfn::{self, Attribute, Wfn};

/// Converts a fetched batch into canonical records.
///
/// Active entries are converted before deprecated ones and the first record
/// seen for a given URI wins. Identifiers that fail to unbind are dropped.
pub fn normalize(fetch_type: FetchType, fetched: &FetchedCpes) -> Vec<CanonicalCpe> {
	let mut seen = HashSet::new();
	let mut records = Vec::with_capacity(fetched.identifier_count());
	for (entries, deprecated) in [(&fetched.cpes, false), (&fetched.deprecated, true)] {
		for record in convert(fetch_type, entries, deprecated) {
			if seen.insert(record.cpe_uri.clone()) {
				records.push(record);
			}
		}
	}
	records
}

/// Converts one slice of fetched entries, preserving input order.
pub fn convert(fetch_type: FetchType, entries: &[FetchedCpe], deprecated: bool) -> Vec<CanonicalCpe> {
	entries
		.iter()
		.flat_map(|entry| entry.cpes.iter().map(move |raw| (entry.title.as_str(), raw.as_str())))
		.filter_map(|(title, raw)| match to_canonical(fetch_type, title, raw, deprecated) {
			Ok(record) => Some(record),
			Err(e) => {
				warn!("Skipping {}: failed to unbind: {}", raw, e);
				None
			}
		})
		.collect()
}

pub fn to_canonical(
	fetch_type: FetchType,
	title: &str,
	raw: &str,
	deprecated: bool,
) -> Result<CanonicalCpe, WfnError> {
	let name = wfn::unbind(raw)?;
	Ok(CanonicalCpe {
		fetch_type,
		title: title.to_string(),
		search_title: search_title(&name),
		cpe_uri: wfn::bind_to_uri(&name),
		cpe_fs: wfn::bind_to_fs(&name),
		part: name.get_string(Attribute::Part),
		vendor: name.get_string(Attribute::Vendor),
		product: name.get_string(Attribute::Product),
		version: name.get_string(Attribute::Version),
		update: name.get_string(Attribute::Update),
		edition: name.get_string(Attribute::Edition),
		language: name.get_string(Attribute::Language),
		software_edition: name.get_string(Attribute::SwEdition),
		target_software: name.get_string(Attribute::TargetSw),
		target_hardware: name.get_string(Attribute::TargetHw),
		other: name.get_string(Attribute::Other),
		deprecated,
	})
}

/// Lower-cased "vendor product" key with underscores read as spaces.
pub fn search_title(name: &Wfn) -> String {
	let joined = format!(
		"{} {}",
		name.unquoted(Attribute::Vendor),
		name.unquoted(Attribute::Product)
	);
	joined.replace('_', " ").trim().to_lowercase()
}
