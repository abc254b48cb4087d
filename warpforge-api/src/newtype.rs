//! Bare string newtypes with the charset invariant spec places on every one
//! of them: no `:`, whitespace, or unprintable characters. Parsing itself
//! stays permissive — the wire format doesn't reject these at decode time —
//! the executor's validation pass checks post-parse (see spec.md §6).

use std::borrow::Borrow;

use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid token {0:?}: must not contain ':', whitespace, or control characters")]
pub struct InvalidTokenError(pub String);

pub fn validate_token_charset(s: &str) -> Result<(), InvalidTokenError> {
	if s.contains(':') || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(InvalidTokenError(s.to_owned()));
	}
	Ok(())
}

macro_rules! string_newtype {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromStr, Display)]
		pub struct $name(pub String);

		impl $name {
			pub fn validate(&self) -> Result<(), InvalidTokenError> {
				validate_token_charset(&self.0)
			}
		}

		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}

		impl Borrow<String> for $name {
			fn borrow(&self) -> &String {
				&self.0
			}
		}
	};
}

string_newtype!(
	/// Name of a catalog module, e.g. `warpsys.org/busybox`.
	ModuleName
);
string_newtype!(
	/// Name of a release within a catalog module, e.g. `v1.35.0`.
	ReleaseName
);
string_newtype!(
	/// Name of an item within a catalog release, e.g. `amd64-static`.
	ItemLabel
);
string_newtype!(
	/// Name assigned to a Step within a Plot.
	StepName
);
string_newtype!(
	/// Label referencing data within a Plot: a Plot input, or a hoisted
	/// step/sub-Plot output.
	LocalLabel
);
string_newtype!(
	/// Name of a result produced by a Formula/Protoformula. Freely coerces
	/// to [`LocalLabel`] when a step's results are hoisted into a Plot's
	/// pipe context.
	OutputName
);

impl From<OutputName> for LocalLabel {
	fn from(value: OutputName) -> Self {
		LocalLabel(value.0)
	}
}

impl From<LocalLabel> for OutputName {
	fn from(value: LocalLabel) -> Self {
		OutputName(value.0)
	}
}
