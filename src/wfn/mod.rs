// src/wfn/mod.rs

//! Well-formed CPE names (NISTIR 7695) and their URI / formatted-string bindings.
//!
//! Attribute values are kept in their quoted WFN form: every non-alphanumeric
//! character other than `_` is preceded by a backslash, while unquoted `*` and
//! `?` are wildcards.

mod fs;
mod uri;

pub use fs::{bind_to_fs, unbind_fs};
pub use uri::{bind_to_uri, unbind_uri};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::WfnError;

lazy_static! {
	static ref LANGUAGE_TAG: Regex =
		Regex::new(r"^[A-Za-z]{2,3}(\\-([A-Za-z]{2}|[0-9]{3}))?$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
	Part,
	Vendor,
	Product,
	Version,
	Update,
	Edition,
	Language,
	SwEdition,
	TargetSw,
	TargetHw,
	Other,
}

impl Attribute {
	pub const ALL: [Attribute; 11] = [
		Attribute::Part,
		Attribute::Vendor,
		Attribute::Product,
		Attribute::Version,
		Attribute::Update,
		Attribute::Edition,
		Attribute::Language,
		Attribute::SwEdition,
		Attribute::TargetSw,
		Attribute::TargetHw,
		Attribute::Other,
	];

	pub fn name(self) -> &'static str {
		match self {
			Attribute::Part => "part",
			Attribute::Vendor => "vendor",
			Attribute::Product => "product",
			Attribute::Version => "version",
			Attribute::Update => "update",
			Attribute::Edition => "edition",
			Attribute::Language => "language",
			Attribute::SwEdition => "sw_edition",
			Attribute::TargetSw => "target_sw",
			Attribute::TargetHw => "target_hw",
			Attribute::Other => "other",
		}
	}

	fn index(self) -> usize {
		self as usize
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
	#[default]
	Any,
	Na,
	/// Quoted string value.
	Text(String),
}

impl Value {
	/// `ANY`, `NA`, or the quoted string.
	pub fn as_wfn_str(&self) -> &str {
		match self {
			Value::Any => "ANY",
			Value::Na => "NA",
			Value::Text(s) => s,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wfn {
	values: [Value; 11],
}

impl Wfn {
	pub fn get(&self, attr: Attribute) -> &Value {
		&self.values[attr.index()]
	}

	pub fn get_string(&self, attr: Attribute) -> String {
		self.get(attr).as_wfn_str().to_string()
	}

	/// Value with quoting removed, or an empty string for `ANY`/`NA`.
	pub fn unquoted(&self, attr: Attribute) -> String {
		match self.get(attr) {
			Value::Text(s) => unquote(s),
			_ => String::new(),
		}
	}

	pub fn set(&mut self, attr: Attribute, value: Value) -> Result<(), WfnError> {
		if let Value::Text(s) = &value {
			validate(attr, s)?;
		}
		self.values[attr.index()] = value;
		Ok(())
	}
}

fn validate(attr: Attribute, s: &str) -> Result<(), WfnError> {
	if s.is_empty() {
		return Err(WfnError::EmptyComponent { attribute: attr.name() });
	}
	match attr {
		Attribute::Part if !matches!(s, "a" | "o" | "h") => {
			Err(WfnError::InvalidPart { value: s.to_string() })
		}
		Attribute::Language if !has_unquoted_wildcard(s) && !LANGUAGE_TAG.is_match(s) => {
			Err(WfnError::InvalidLanguage { value: s.to_string() })
		}
		_ => Ok(()),
	}
}

fn has_unquoted_wildcard(s: &str) -> bool {
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				chars.next();
			}
			'*' | '?' => return true,
			_ => {}
		}
	}
	false
}

/// Strips escaping backslashes from a quoted value.
pub fn unquote(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		if c == '\\' {
			if let Some(next) = chars.next() {
				out.push(next);
			}
		} else {
			out.push(c);
		}
	}
	out
}

/// Unbinds either textual form, picked by prefix.
pub fn unbind(name: &str) -> Result<Wfn, WfnError> {
	if has_prefix_ignore_case(name, fs::FS_PREFIX) {
		unbind_fs(name)
	} else if has_prefix_ignore_case(name, uri::URI_PREFIX) {
		unbind_uri(name)
	} else {
		Err(WfnError::InvalidPrefix { input: name.to_string() })
	}
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
	s.get(..prefix.len())
		.map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Result<&'a str, WfnError> {
	if has_prefix_ignore_case(s, prefix) {
		Ok(&s[prefix.len()..])
	} else {
		Err(WfnError::InvalidPrefix { input: s.to_string() })
	}
}
