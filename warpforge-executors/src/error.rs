//! Error taxonomy (spec.md §7). One variant per *kind*, not per call site;
//! each carries the structured detail fields spec.md's propagation policy
//! calls out, grounded line-for-line on `wfapi/error.go`'s `Error*`
//! constructors (code name, message template, detail keys).

use warpforge_api::content::WareID;
use warpforge_api::newtype::StepName;

pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid argument: {msg}")]
	Argument { msg: String },

	#[error("already exists: {path}")]
	AlreadyExists { path: String },

	#[error("invalid catalog file {path:?}: {reason}")]
	CatalogInvalid { path: String, reason: String },

	#[error("missing catalog entry {catalog_ref:?}")]
	CatalogMissingEntry { catalog_ref: String },

	#[error("catalog name {name:?} is invalid: {reason}")]
	CatalogName { name: String, reason: String },

	#[error("parsing of catalog file {path:?} failed")]
	CatalogParse { path: String, #[source] cause: Cause },

	#[error("while {context}, encountered data from an unknown version")]
	DataTooNew { context: String, #[source] cause: Cause },

	#[error("the {engine_name:?} engine reported error")]
	ExecutorFailed { engine_name: String, #[source] cause: Option<Cause> },

	#[error("invalid formula: {reason}")]
	FormulaInvalid { reason: String },

	#[error("invalid plot: {reason}")]
	PlotInvalid { reason: String },

	#[error("plot step {step_name:?} failed")]
	PlotStepFailed {
		step_name: StepName,
		#[source]
		cause: Box<Error>,
	},

	#[error("git operation failed: {context}")]
	Git { context: String, #[source] cause: Option<Cause> },

	#[error("invalid WareID: {ware_id:?}")]
	WareIdInvalid { ware_id: String },

	#[error("unable to pack ware at path {path:?}")]
	WarePack { path: String, #[source] cause: Cause },

	#[error("unable to unpack ware {ware_id}")]
	WareUnpack {
		ware_id: WareID,
		#[source]
		cause: Cause,
	},

	#[error("file missing at path: {path:?}")]
	Missing { path: String },

	#[error("io error: {context}")]
	Io {
		context: String,
		#[source]
		cause: std::io::Error,
	},

	#[error("error while searching filesystem for {searching_for}")]
	SearchingFilesystem {
		searching_for: String,
		#[source]
		cause: Cause,
	},

	#[error("error handling workspace at {path:?}")]
	Workspace { path: String, #[source] cause: Cause },

	#[error("internal invariant violation: {msg}")]
	Internal { msg: String },
}

impl Error {
	/// Wraps a step failure exactly once at the boundary where it is first
	/// observed, per spec.md §7's propagation policy. Calling this on a
	/// cause that is already a `PlotStepFailed` for the same step is a
	/// caller bug, not handled specially here — the executor only calls
	/// this at the single point a step's execution result is received.
	pub fn plot_step_failed(step_name: StepName, cause: Error) -> Error {
		Error::PlotStepFailed {
			step_name,
			cause: Box::new(cause),
		}
	}
}
