// src/wfn/fs.rs

use super::{strip_prefix_ignore_case, Attribute, Value, Wfn};
use crate::error::WfnError;

pub(super) const FS_PREFIX: &str = "cpe:2.3:";

/// Parses a CPE 2.3 formatted string.
pub fn unbind_fs(fs: &str) -> Result<Wfn, WfnError> {
	let rest = strip_prefix_ignore_case(fs, FS_PREFIX)?;
	let components = split_unescaped(rest);
	if components.len() != Attribute::ALL.len() {
		return Err(WfnError::ComponentCount {
			input: fs.to_string(),
			expected: Attribute::ALL.len(),
			found: components.len(),
		});
	}

	let mut wfn = Wfn::default();
	for (attr, component) in Attribute::ALL.into_iter().zip(components) {
		let value = match component.as_str() {
			"*" => Value::Any,
			"-" => Value::Na,
			_ => Value::Text(add_quoting(&component)?),
		};
		wfn.set(attr, value)?;
	}
	Ok(wfn)
}

/// Renders all eleven attributes as a CPE 2.3 formatted string.
pub fn bind_to_fs(wfn: &Wfn) -> String {
	let components: Vec<String> = Attribute::ALL
		.into_iter()
		.map(|attr| match wfn.get(attr) {
			Value::Any => "*".to_string(),
			Value::Na => "-".to_string(),
			Value::Text(s) => process_quoted_chars(s),
		})
		.collect();
	format!("{}{}", FS_PREFIX, components.join(":"))
}

fn split_unescaped(s: &str) -> Vec<String> {
	let mut parts = Vec::new();
	let mut current = String::new();
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				current.push(c);
				if let Some(next) = chars.next() {
					current.push(next);
				}
			}
			':' => parts.push(std::mem::take(&mut current)),
			_ => current.push(c),
		}
	}
	parts.push(current);
	parts
}

fn add_quoting(s: &str) -> Result<String, WfnError> {
	let chars: Vec<char> = s.chars().collect();
	let last = chars.len().saturating_sub(1);
	let mut out = String::with_capacity(s.len() + 4);
	let mut embedded = false;
	let mut idx = 0;

	while idx < chars.len() {
		let c = chars[idx];
		if c.is_ascii_alphanumeric() || c == '_' {
			out.push(c);
			embedded = true;
			idx += 1;
			continue;
		}
		match c {
			'\\' => {
				let next = chars.get(idx + 1).ok_or_else(|| WfnError::DanglingEscape {
					value: s.to_string(),
				})?;
				out.push('\\');
				out.push(*next);
				embedded = true;
				idx += 2;
				continue;
			}
			'*' => {
				if idx != 0 && idx != last {
					return Err(WfnError::EmbeddedWildcard { value: s.to_string() });
				}
				out.push('*');
			}
			'?' => {
				let at_edge = idx == 0 || idx == last;
				let leading_run = !embedded && idx > 0 && chars[idx - 1] == '?';
				let trailing_run = embedded && chars.get(idx + 1) == Some(&'?');
				if !(at_edge || leading_run || trailing_run) {
					return Err(WfnError::EmbeddedWildcard { value: s.to_string() });
				}
				out.push('?');
			}
			_ => {
				out.push('\\');
				out.push(c);
				embedded = true;
			}
		}
		idx += 1;
	}
	Ok(out)
}

// `.`, `-` and `_` are left bare in formatted strings.
fn process_quoted_chars(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut chars = s.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some(next @ ('.' | '-' | '_')) => out.push(next),
			Some(next) => {
				out.push('\\');
				out.push(next);
			}
			None => {}
		}
	}
	out
}
