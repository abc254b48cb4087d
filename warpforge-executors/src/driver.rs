//! Sandbox driver boundary (spec.md §4.7). The concrete container runtime
//! is explicitly out of scope; this module only fixes the interface the
//! executor drives it through.

use async_trait::async_trait;
use warpforge_api::formula::{FormulaAndContext, RunRecord};

use crate::workspace::Workspace;
use crate::Result;

/// A pluggable backend that turns a fully-resolved Formula into a
/// `RunRecord`. The only operation the core depends on: `execute`.
#[async_trait]
pub trait SandboxDriver: Send + Sync {
	async fn execute(
		&self,
		home_workspace: &Workspace,
		formula_and_context: &FormulaAndContext,
	) -> Result<RunRecord>;
}
