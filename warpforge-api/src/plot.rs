use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::content::WareID;
use crate::formula::{Action, FilterMap, GatherDirective, Mount, SandboxPort};
use crate::newtype::{ItemLabel, LocalLabel, ModuleName, ReleaseName, StepName};

/// `(ModuleName, ReleaseName, ItemLabel)`. Wire representation (and its
/// representation nested inside a [`PlotInputSimple`]) is the bare
/// colon-join `module:release:item`; the `catalog:` discriminant prefix is
/// added by the enclosing union, not by `CatalogRef` itself — matching how
/// the Go original's IPLD schema keeps the struct's own
/// `StringRepresentationStringjoin` prefix-free and only adds `catalog:` at
/// the union-discriminant layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogRef {
	pub module_name: ModuleName,
	pub release_name: ReleaseName,
	pub item_name: ItemLabel,
}

impl CatalogRef {
	/// The `catalog:module:release:item` form used in human-facing error
	/// details (spec.md §8, "Missing catalog" scenario).
	pub fn to_ref_string(&self) -> String {
		format!("catalog:{self}")
	}
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid CatalogRef: {0:?}")]
pub struct CatalogRefParseError(pub String);

impl std::fmt::Display for CatalogRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}:{}", self.module_name, self.release_name, self.item_name)
	}
}

impl std::str::FromStr for CatalogRef {
	type Err = CatalogRefParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parts = s.splitn(3, ':');
		let (Some(module), Some(release), Some(item)) = (parts.next(), parts.next(), parts.next())
		else {
			return Err(CatalogRefParseError(s.to_owned()));
		};
		if parts.next().is_some() {
			return Err(CatalogRefParseError(s.to_owned()));
		}
		Ok(CatalogRef {
			module_name: ModuleName(module.to_owned()),
			release_name: ReleaseName(release.to_owned()),
			item_name: ItemLabel(item.to_owned()),
		})
	}
}

impl TryFrom<String> for CatalogRef {
	type Error = CatalogRefParseError;
	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<CatalogRef> for String {
	fn from(value: CatalogRef) -> Self {
		value.to_string()
	}
}

/// A typed edge from `(step, label)` to an input consumer. Stringform
/// `S:L`; an empty `S` denotes a plot-level input (`pipe::L` once the
/// `pipe:` discriminant is added by the enclosing union).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pipe {
	pub step_name: StepName,
	pub label: LocalLabel,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid Pipe: {0:?}")]
pub struct PipeParseError(pub String);

impl std::fmt::Display for Pipe {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.step_name, self.label)
	}
}

impl std::str::FromStr for Pipe {
	type Err = PipeParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let Some((step, label)) = s.split_once(':') else {
			return Err(PipeParseError(s.to_owned()));
		};
		Ok(Pipe {
			step_name: StepName(step.to_owned()),
			label: LocalLabel(label.to_owned()),
		})
	}
}

impl TryFrom<String> for Pipe {
	type Error = PipeParseError;
	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<Pipe> for String {
	fn from(value: Pipe) -> Self {
		value.to_string()
	}
}

impl Pipe {
	pub fn plot_level(label: LocalLabel) -> Self {
		Pipe {
			step_name: StepName(String::new()),
			label,
		}
	}

	pub fn is_plot_level(&self) -> bool {
		self.step_name.0.is_empty()
	}
}

/// A local git working copy to be materialized as a ware of packtype `git`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIngest {
	pub host_path: String,
	#[serde(rename = "ref")]
	pub ref_: String,
}

#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, catverters_derive::Stringoid)]
pub enum Ingest {
	#[discriminant = "git"]
	GitIngest(GitIngest),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid git ingest: {0:?}")]
pub struct GitIngestParseError(pub String);

impl std::fmt::Display for GitIngest {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.host_path, self.ref_)
	}
}

impl std::str::FromStr for GitIngest {
	type Err = GitIngestParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		// `ref` never contains ':' (it's a git refname or object id); the
		// host path may, so split from the right.
		let Some((host_path, ref_)) = s.rsplit_once(':') else {
			return Err(GitIngestParseError(s.to_owned()));
		};
		Ok(GitIngest {
			host_path: host_path.to_owned(),
			ref_: ref_.to_owned(),
		})
	}
}

/// The union of everything a PlotInput may resolve from: a concrete ware, a
/// host mount, a literal value, a pipe to an earlier step's output, a
/// catalog reference, or an ingest.
#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, catverters_derive::Stringoid)]
pub enum PlotInputSimple {
	#[discriminant = "ware"]
	Ware(WareID),

	#[discriminant = "mount"]
	Mount(Mount),

	#[discriminant = "literal"]
	Literal(String),

	#[discriminant = "pipe"]
	Pipe(Pipe),

	#[discriminant = "catalog"]
	CatalogRef(CatalogRef),

	#[discriminant = "ingest"]
	Ingest(Ingest),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlotInputComplex {
	pub basis: PlotInputSimple,
	pub filters: FilterMap,
}

/// `PlotInputSimple` alone, or a complex form carrying a `FilterMap`
/// alongside the basis. Kinded on the JSON shape: a string is a
/// `PlotInputSimple`, a map is a `PlotInputComplex`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlotInput {
	Simple(PlotInputSimple),
	Complex(PlotInputComplex),
}

impl PlotInput {
	pub fn basis(&self) -> &PlotInputSimple {
		match self {
			PlotInput::Simple(simple) => simple,
			PlotInput::Complex(complex) => &complex.basis,
		}
	}

	pub fn filters(&self) -> Option<&FilterMap> {
		match self {
			PlotInput::Simple(_) => None,
			PlotInput::Complex(complex) => Some(&complex.filters),
		}
	}
}

/// `PlotOutput` is currently always a [`Pipe`] reference.
#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, catverters_derive::Stringoid)]
pub enum PlotOutput {
	#[discriminant = "pipe"]
	Pipe(Pipe),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Protoformula {
	pub inputs: IndexMap<SandboxPort, PlotInput>,
	pub action: Action,
	pub outputs: IndexMap<LocalLabel, GatherDirective>,
}

/// A node in a Plot: either a Protoformula, or a nested Plot to recurse
/// into. Keyed representation: a JSON map with a single key, `"plot"` or
/// `"protoformula"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Step {
	#[serde(rename = "plot")]
	Plot(Plot),
	#[serde(rename = "protoformula")]
	Protoformula(Protoformula),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plot {
	pub inputs: IndexMap<LocalLabel, PlotInput>,
	pub steps: IndexMap<StepName, Step>,
	pub outputs: IndexMap<LocalLabel, PlotOutput>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PlotCapsule {
	#[serde(rename = "plot.v1")]
	V1(Plot),
}

/// `LocalLabel -> WareID`, the final mapping an executed Plot produces.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlotResults(pub IndexMap<LocalLabel, WareID>);
