//! Content-addressing primitives: [`WareID`], [`Packtype`], [`WarehouseAddr`].
//!
//! These are opaque to everything except equality/parsing: the core never
//! interprets a hash or a warehouse address, it only compares and threads
//! them through.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// Codec tag for a [`WareID`] (`tar`, `git`, ...). Opaque beyond its text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromStr, Display)]
pub struct Packtype(pub String);

/// A content-addressed filesystem artifact's identifier: `packtype:hash`.
///
/// Immutable, comparable by value, usable as a map key. Both fields must be
/// non-empty: this is enforced at parse time (unlike the newtype charset
/// invariants, which are only checked post-parse by the executor), since an
/// empty packtype or hash can never be a meaningful WareID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WareID {
	pub packtype: Packtype,
	pub hash: String,
}

impl WareID {
	pub fn new(packtype: impl Into<String>, hash: impl Into<String>) -> Self {
		WareID {
			packtype: Packtype(packtype.into()),
			hash: hash.into(),
		}
	}
}

impl fmt::Display for WareID {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.packtype, self.hash)
	}
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid WareID: {0:?}")]
pub struct WareIdParseError(pub String);

impl FromStr for WareID {
	type Err = WareIdParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let Some((packtype, hash)) = s.split_once(':') else {
			return Err(WareIdParseError(s.to_owned()));
		};
		if packtype.is_empty() || hash.is_empty() {
			return Err(WareIdParseError(s.to_owned()));
		}
		Ok(WareID {
			packtype: Packtype(packtype.to_owned()),
			hash: hash.to_owned(),
		})
	}
}

impl TryFrom<String> for WareID {
	type Error = WareIdParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<WareID> for String {
	fn from(value: WareID) -> Self {
		value.to_string()
	}
}

/// An opaque location a Ware's bytes can be fetched from, e.g.
/// `ca+file:///path/`. Never parsed by the core.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromStr, Display)]
pub struct WarehouseAddr(pub String);

impl Borrow<String> for WarehouseAddr {
	fn borrow(&self) -> &String {
		&self.0
	}
}
