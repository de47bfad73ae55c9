// src/wfn/uri.rs

use super::{strip_prefix_ignore_case, Attribute, Value, Wfn};
use crate::error::WfnError;

pub(super) const URI_PREFIX: &str = "cpe:/";

const URI_ATTRIBUTES: [Attribute; 7] = [
	Attribute::Part,
	Attribute::Vendor,
	Attribute::Product,
	Attribute::Version,
	Attribute::Update,
	Attribute::Edition,
	Attribute::Language,
];

const PACKED_ATTRIBUTES: [Attribute; 5] = [
	Attribute::Edition,
	Attribute::SwEdition,
	Attribute::TargetSw,
	Attribute::TargetHw,
	Attribute::Other,
];

/// Parses a CPE 2.2 URI. Values are lower-cased.
pub fn unbind_uri(uri: &str) -> Result<Wfn, WfnError> {
	let rest = strip_prefix_ignore_case(uri, URI_PREFIX)?;
	let components: Vec<&str> = rest.split(':').collect();
	if components.len() > URI_ATTRIBUTES.len() {
		return Err(WfnError::ComponentCount {
			input: uri.to_string(),
			expected: URI_ATTRIBUTES.len(),
			found: components.len(),
		});
	}

	let mut wfn = Wfn::default();
	for (idx, attr) in URI_ATTRIBUTES.into_iter().enumerate() {
		let component = components.get(idx).copied().unwrap_or("");
		if attr == Attribute::Edition && component.starts_with('~') {
			unpack_edition(component, &mut wfn)?;
			continue;
		}
		wfn.set(attr, decode(component)?)?;
	}
	Ok(wfn)
}

/// Renders a CPE 2.2 URI, packing the extended attributes into the edition.
pub fn bind_to_uri(wfn: &Wfn) -> String {
	let components: Vec<String> = URI_ATTRIBUTES
		.into_iter()
		.map(|attr| {
			if attr == Attribute::Edition {
				pack_edition(wfn)
			} else {
				bind_value(wfn.get(attr))
			}
		})
		.collect();
	let uri = format!("{}{}", URI_PREFIX, components.join(":"));
	uri.trim_end_matches(':').to_string()
}

fn unpack_edition(packed: &str, wfn: &mut Wfn) -> Result<(), WfnError> {
	let parts: Vec<&str> = packed[1..].split('~').collect();
	if parts.len() != PACKED_ATTRIBUTES.len() {
		return Err(WfnError::InvalidPackedEdition { value: packed.to_string() });
	}
	for (attr, part) in PACKED_ATTRIBUTES.into_iter().zip(parts) {
		wfn.set(attr, decode(part)?)?;
	}
	Ok(())
}

fn pack_edition(wfn: &Wfn) -> String {
	let extended_unset = PACKED_ATTRIBUTES[1..]
		.iter()
		.all(|attr| *wfn.get(*attr) == Value::Any);
	if extended_unset {
		return bind_value(wfn.get(Attribute::Edition));
	}
	let bound: Vec<String> = PACKED_ATTRIBUTES
		.into_iter()
		.map(|attr| bind_value(wfn.get(attr)))
		.collect();
	format!("~{}", bound.join("~"))
}

fn bind_value(value: &Value) -> String {
	match value {
		Value::Any => String::new(),
		Value::Na => "-".to_string(),
		Value::Text(s) => transform_for_uri(s),
	}
}

fn transform_for_uri(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				if let Some(next) = chars.next() {
					out.push_str(&pct_encode(next));
				}
			}
			'?' => out.push_str("%01"),
			'*' => out.push_str("%02"),
			_ => out.push(c),
		}
	}
	out
}

fn pct_encode(c: char) -> String {
	match c {
		'-' | '.' => c.to_string(),
		c if c.is_ascii() => format!("%{:02x}", c as u32),
		c => c.to_string(),
	}
}

fn decode(s: &str) -> Result<Value, WfnError> {
	match s {
		"" => return Ok(Value::Any),
		"-" => return Ok(Value::Na),
		_ => {}
	}

	let lowered = s.to_lowercase();
	let chars: Vec<char> = lowered.chars().collect();
	let len = chars.len();
	let mut out = String::with_capacity(len);
	let mut embedded = false;
	let mut idx = 0;

	while idx < len {
		let c = chars[idx];
		match c {
			'.' | '-' | '~' => {
				out.push('\\');
				out.push(c);
				embedded = true;
				idx += 1;
			}
			'%' => {
				let code: String = chars
					.get(idx + 1..idx + 3)
					.ok_or_else(|| WfnError::InvalidPercentEncoding { value: s.to_string() })?
					.iter()
					.collect();
				match code.as_str() {
					"01" => {
						let at_edge = idx == 0 || idx + 3 == len;
						let leading_run = !embedded && idx >= 3 && chars[idx - 3..idx] == ['%', '0', '1'];
						let trailing_run =
							embedded && chars.get(idx + 3..idx + 6) == Some(&['%', '0', '1'][..]);
						if !(at_edge || leading_run || trailing_run) {
							return Err(WfnError::EmbeddedWildcard { value: s.to_string() });
						}
						out.push('?');
					}
					"02" => {
						if idx != 0 && idx + 3 != len {
							return Err(WfnError::EmbeddedWildcard { value: s.to_string() });
						}
						out.push('*');
					}
					_ => {
						let decoded = u8::from_str_radix(&code, 16)
							.ok()
							.map(char::from)
							.filter(char::is_ascii_punctuation)
							.ok_or_else(|| WfnError::InvalidPercentEncoding { value: s.to_string() })?;
						out.push('\\');
						out.push(decoded);
						embedded = true;
					}
				}
				idx += 3;
			}
			c if c.is_ascii_alphanumeric() || c == '_' => {
				out.push(c);
				embedded = true;
				idx += 1;
			}
			other => {
				return Err(WfnError::InvalidCharacter {
					value: s.to_string(),
					ch: other,
				})
			}
		}
	}
	Ok(Value::Text(out))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wfn::unbind_fs;

	fn fs_to_uri(fs: &str) -> String {
		bind_to_uri(&unbind_fs(fs).unwrap())
	}

	#[test]
	fn binds_formatted_strings_to_uris() {
		assert_eq!(
			fs_to_uri("cpe:2.3:a:vendorName1:productName1-1:1.1:*:*:*:*:targetSoftware1:targetHardware1:*"),
			"cpe:/a:vendorName1:productName1-1:1.1::~~~targetSoftware1~targetHardware1~"
		);
		assert_eq!(
			fs_to_uri(r"cpe:2.3:a:mongodb:c\#_driver:1.10.0:-:*:*:*:mongodb:*:*"),
			"cpe:/a:mongodb:c%23_driver:1.10.0:-:~~~mongodb~~"
		);
		assert_eq!(
			fs_to_uri("cpe:2.3:a:ntp:ntp:4.2.8:p1-beta1:*:*:*:*:*:*"),
			"cpe:/a:ntp:ntp:4.2.8:p1-beta1"
		);
		assert_eq!(
			fs_to_uri("cpe:2.3:a:ntp:ntp:4.2.5p48:*:*:*:*:*:*:*"),
			"cpe:/a:ntp:ntp:4.2.5p48"
		);
	}

	#[test]
	fn unbinds_lowercased_and_quoted() {
		let wfn = unbind_uri("cpe:/a:MySQL:MySQL:5.1.2").unwrap();
		assert_eq!(wfn.get_string(Attribute::Vendor), "mysql");
		assert_eq!(wfn.get_string(Attribute::Version), r"5\.1\.2");
		assert_eq!(wfn.get(Attribute::Update), &Value::Any);
	}

	#[test]
	fn unpacks_edition() {
		let wfn = unbind_uri("cpe:/a:mongodb:c%23_driver:1.10.0:-:~~~mongodb~~").unwrap();
		assert_eq!(wfn.get_string(Attribute::Product), r"c\#_driver");
		assert_eq!(wfn.get(Attribute::Update), &Value::Na);
		assert_eq!(wfn.get(Attribute::Edition), &Value::Any);
		assert_eq!(wfn.get_string(Attribute::TargetSw), "mongodb");
		assert_eq!(wfn.get(Attribute::Other), &Value::Any);

		assert!(matches!(
			unbind_uri("cpe:/a:mongodb:driver:1.0::~a~b"),
			Err(WfnError::InvalidPackedEdition { .. })
		));
	}

	#[test]
	fn decodes_wildcard_escapes() {
		let wfn = unbind_uri("cpe:/a:foo:bar:%021.0%01%01").unwrap();
		assert_eq!(wfn.get_string(Attribute::Version), r"*1\.0??");
		assert!(matches!(
			unbind_uri("cpe:/a:foo:bar:1%020"),
			Err(WfnError::EmbeddedWildcard { .. })
		));
	}

	#[test]
	fn rejects_bad_input() {
		assert!(matches!(
			unbind_uri("cpe:/a:foo:bar:1:2:3:4:5"),
			Err(WfnError::ComponentCount { found: 8, .. })
		));
		assert!(matches!(
			unbind_uri("cpe:/a:foo bar:baz"),
			Err(WfnError::InvalidCharacter { ch: ' ', .. })
		));
		assert!(matches!(
			unbind_uri("cpe:/a:foo:bar%zz"),
			Err(WfnError::InvalidPercentEncoding { .. })
		));
	}
}
