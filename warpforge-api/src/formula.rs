use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::content::{Packtype, WareID, WarehouseAddr};
use crate::newtype::{validate_token_charset, InvalidTokenError, OutputName};

// FUTURE: Could be represented as an enum, discriminating on the first char being '/' or '$'.
#[derive(
	Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::FromStr, derive_more::Display,
)]
pub struct SandboxPort(pub String);

impl std::borrow::Borrow<String> for SandboxPort {
	fn borrow(&self) -> &String {
		&self.0
	}
}

impl SandboxPort {
	/// `true` when this port addresses an environment variable (`$NAME`)
	/// rather than a mount point (`/path`).
	pub fn is_env_var(&self) -> bool {
		self.0.starts_with('$')
	}

	/// Same charset invariant as the other newtypes in spec.md §3, checked
	/// on the bare port name (the leading `/` or `$` discriminant is not a
	/// `:`, whitespace, or control character, so it passes through
	/// unmodified).
	pub fn validate(&self) -> Result<(), InvalidTokenError> {
		validate_token_charset(&self.0)
	}
}

/// Passed through to the sandbox driver verbatim; its internal shape is
/// opaque to the core beyond these three forms.
#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, catverters_derive::Stringoid)]
pub enum Mount {
	#[discriminant = "ro"]
	ReadOnly(String),

	#[discriminant = "rw"]
	ReadWrite(String),

	#[discriminant = "overlay"]
	Overlay(String),
}

/// An opaque set of driver-interpreted filters, forwarded verbatim. The
/// core must not attempt to validate or normalize its contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterMap(pub serde_json::Map<String, serde_json::Value>);

#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, catverters_derive::Stringoid)]
pub enum FormulaInputSimple {
	#[discriminant = "ware"]
	Ware(WareID),

	#[discriminant = "mount"]
	Mount(Mount),

	#[discriminant = "literal"]
	Literal(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormulaInputComplex {
	pub basis: FormulaInputSimple,
	pub filters: FilterMap,
}

/// Mirrors [`crate::plot::PlotInput`] but only variants the sandbox driver
/// understands: `Ware`, `Mount`, `Literal`. It is what a Protoformula's
/// inputs become once plot-level references (pipes, catalog refs, ingests)
/// have been resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormulaInput {
	Simple(FormulaInputSimple),
	Complex(FormulaInputComplex),
}

impl FormulaInput {
	pub fn basis(&self) -> &FormulaInputSimple {
		match self {
			FormulaInput::Simple(simple) => simple,
			FormulaInput::Complex(complex) => &complex.basis,
		}
	}

	pub fn with_filters(basis: FormulaInputSimple, filters: Option<FilterMap>) -> Self {
		match filters {
			Some(filters) => FormulaInput::Complex(FormulaInputComplex { basis, filters }),
			None => FormulaInput::Simple(basis),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatherDirective {
	pub from: SandboxPort,
	pub packtype: Option<Packtype>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Action {
	#[serde(rename = "echo")]
	Echo,
	#[serde(rename = "exec")]
	Execute(ActionExecute),
	#[serde(rename = "script")]
	Script(ActionScript),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionExecute {
	pub command: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub network: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionScript {
	pub interpreter: String,
	pub contents: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub network: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FormulaCapsule {
	#[serde(rename = "formula.v1")]
	V1(Formula),
}

/// A fully-resolved hermetic execution specification: every input has been
/// reduced to something the sandbox driver understands directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Formula {
	pub inputs: IndexMap<SandboxPort, FormulaInput>,
	pub action: Action,
	pub outputs: IndexMap<OutputName, GatherDirective>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FormulaContextCapsule {
	#[serde(rename = "context.v1")]
	V1(FormulaContext),
}

/// The set of fetch locations the driver may consult for inputs used by one
/// Formula. At most one address is retained per WareID: a later insert for
/// the same key overwrites the earlier one, which is what gives
/// nearest-workspace-wins semantics during catalog resolution (see
/// `warpforge-executors::catalog`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FormulaContext {
	pub warehouses: IndexMap<WareID, WarehouseAddr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormulaAndContext {
	pub formula: FormulaCapsule,
	pub context: FormulaContextCapsule,
}

/// The sandbox driver's report of a Formula's realized output WareIDs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
	pub results: IndexMap<OutputName, FormulaInputSimple>,
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::test_common::assert_eq_json_roundtrip;
	use expect_test::expect;

	#[test]
	fn test_formula_roundtrip() {
		let expect = expect![[r#"
{
  "formula": {
    "formula.v1": {
      "inputs": {
        "/": "ware:tar:4z9DCTxoKkStqXQRwtf9nimpfQQ36dbndDsAPCQgECfbXt3edanUrsVKCjE9TkX2v9",
        "/some/ro/path": "mount:ro:/host/readonly/path",
        "/some/rw/path": "mount:rw:/host/readwrite/path",
        "/some/overlay/path": "mount:overlay:/host/overlay/path"
      },
      "action": {
        "exec": {
          "command": [
            "/bin/sh",
            "-c",
            "echo hello from warpforge!"
          ]
        }
      },
      "outputs": {}
    }
  },
  "context": {
    "context.v1": {
      "warehouses": {
        "tar:4z9DCTxoKkStqXQRwtf9nimpfQQ36dbndDsAPCQgECfbXt3edanUrsVKCjE9TkX2v9": "https://warpsys.s3.amazonaws.com/warehouse/4z9/DCT/4z9DCTxoKkStqXQRwtf9nimpfQQ36dbndDsAPCQgECfbXt3edanUrsVKCjE9TkX2v9"
      }
    }
  }
}"#]];
		assert_eq_json_roundtrip::<FormulaAndContext>(&expect);
	}

	#[test]
	fn test_formula_input_complex_roundtrip() {
		let json = serde_json::json!({
			"basis": "literal:some-value",
			"filters": {"uid": 0}
		});
		let parsed: FormulaInputComplex = serde_json::from_value(json.clone()).unwrap();
		assert!(matches!(parsed.basis, FormulaInputSimple::Literal(_)));
		let reencoded = serde_json::to_value(&parsed).unwrap();
		assert_eq!(json, reencoded);
	}
}
