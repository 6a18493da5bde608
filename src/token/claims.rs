use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim set of a decoded token, addressed by claim name.
///
/// Any claim can be read; the typed accessors return `None` when the claim
/// is absent or has another JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimMap(Map<String, Value>);

impl ClaimMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name)?.as_str()
	}

	/// Reads a boolean claim, also accepting the strings `"true"` and
	/// `"false"`.
	pub fn get_bool(&self, name: &str) -> Option<bool> {
		match self.get(name)? {
			Value::Bool(b) => Some(*b),
			Value::String(s) => parse_bool(s),
			_ => None,
		}
	}

	pub fn get_i64(&self, name: &str) -> Option<i64> {
		self.get(name)?.as_i64()
	}

	/// Returns `true` if the claim is a string equal to `value`, or an array
	/// containing such a string.
	pub fn has_value(&self, name: &str, value: &str) -> bool {
		match self.get(name) {
			Some(Value::String(s)) => s == value,
			Some(Value::Array(values)) => values.iter().any(|v| v.as_str() == Some(value)),
			_ => false,
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(name.into(), value.into())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

impl From<Map<String, Value>> for ClaimMap {
	fn from(value: Map<String, Value>) -> Self {
		Self(value)
	}
}

/// Parses the plain `true`/`false` text format, ignoring surrounding
/// whitespace and case.
pub fn parse_bool(text: &str) -> Option<bool> {
	let text = text.trim();
	if text.eq_ignore_ascii_case("true") {
		Some(true)
	} else if text.eq_ignore_ascii_case("false") {
		Some(false)
	} else {
		None
	}
}
