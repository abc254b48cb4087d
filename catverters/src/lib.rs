//! Shared runtime support for types generated by `catverters_derive::Stringoid`.
//!
//! A "stringoid" is an enum whose wire representation is a single string,
//! discriminated by a fixed prefix per variant (`ware:`, `mount:ro:`,
//! `pipe:`, ...). The derive macro only generates `Display`/`FromStr`; the
//! error type parsing can fail with lives here so every generated impl
//! shares one.

use std::fmt;

#[derive(Debug, Clone, thiserror::Error)]
pub struct StringoidParseError {
	pub type_name: &'static str,
	pub input: String,
}

impl fmt::Display for StringoidParseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"'{}' is not a valid {}: no variant prefix matched",
			self.input, self.type_name
		)
	}
}
