//! PlotInput resolver (spec.md §4.2): reduces a `PlotInput` to a concrete
//! `FormulaInput` plus an optional `WarehouseAddr`, given a workspace stack
//! and the pipe context accumulated so far. Grounded on
//! `original_source/pkg/plotexec/plot_exec.go`'s
//! `plotInputToFormulaInput`/`plotInputToFormulaInputSimple`.

use warpforge_api::content::WarehouseAddr;
use warpforge_api::formula::{FormulaInput, FormulaInputSimple};
use warpforge_api::plot::{Ingest, PlotInput, PlotInputSimple};

use crate::ingest::ingest_git;
use crate::pipe::PipeContext;
use crate::workspace::{Workspace, WorkspaceSet};
use crate::{Error, Result};

/// Resolves `plot_input`'s basis to a `FormulaInputSimple`, then re-wraps it
/// in the same Simple/Complex shell the input arrived in (spec.md §4.2
/// preserves the complex form's filters verbatim).
pub async fn resolve_plot_input(
	workspaces: &WorkspaceSet,
	home: &Workspace,
	plot_input: &PlotInput,
	pipe_ctx: &PipeContext,
) -> Result<(FormulaInput, Option<WarehouseAddr>)> {
	let (basis, addr) = resolve_basis(workspaces, home, plot_input.basis(), pipe_ctx).await?;
	let resolved = FormulaInput::with_filters(basis, plot_input.filters().cloned());
	Ok((resolved, addr))
}

async fn resolve_basis(
	workspaces: &WorkspaceSet,
	home: &Workspace,
	basis: &PlotInputSimple,
	pipe_ctx: &PipeContext,
) -> Result<(FormulaInputSimple, Option<WarehouseAddr>)> {
	match basis {
		PlotInputSimple::Ware(ware_id) => Ok((FormulaInputSimple::Ware(ware_id.clone()), None)),

		PlotInputSimple::Mount(mount) => Ok((FormulaInputSimple::Mount(mount.clone()), None)),

		PlotInputSimple::Literal(value) => Ok((FormulaInputSimple::Literal(value.clone()), None)),

		PlotInputSimple::Pipe(pipe) => {
			let input = pipe_ctx.lookup(&pipe.step_name, &pipe.label)?;
			Ok((input.basis().clone(), None))
		}

		PlotInputSimple::CatalogRef(catalog_ref) => {
			let (ware_id, addr) = workspaces.resolve_catalog_ref(catalog_ref)?;
			Ok((FormulaInputSimple::Ware(ware_id), addr))
		}

		PlotInputSimple::Ingest(Ingest::GitIngest(git_ingest)) => {
			let ware_id = ingest_git(home, &git_ingest.host_path, &git_ingest.ref_).await?;
			Ok((FormulaInputSimple::Ware(ware_id), None))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warpforge_api::content::WareID;
	use warpforge_api::newtype::{LocalLabel, StepName};
	use warpforge_api::plot::Pipe;

	fn empty_workspaces() -> WorkspaceSet {
		WorkspaceSet::new(vec![Workspace::new("/tmp/ws-home", true)])
	}

	#[tokio::test]
	async fn resolves_ware_passthrough() {
		let workspaces = empty_workspaces();
		let home = Workspace::new("/tmp/ws-home", true);
		let pipe_ctx = PipeContext::new();

		let input = PlotInput::Simple(PlotInputSimple::Ware(WareID::new("tar", "abc")));
		let (resolved, addr) = resolve_plot_input(&workspaces, &home, &input, &pipe_ctx)
			.await
			.unwrap();
		assert!(addr.is_none());
		assert!(matches!(
			resolved,
			FormulaInput::Simple(FormulaInputSimple::Ware(_))
		));
	}

	#[tokio::test]
	async fn resolves_pipe_through_context() {
		let workspaces = empty_workspaces();
		let home = Workspace::new("/tmp/ws-home", true);
		let mut pipe_ctx = PipeContext::new();
		pipe_ctx.record_plot_level(
			LocalLabel("src".into()),
			FormulaInput::Simple(FormulaInputSimple::Literal("hi".into())),
		);

		let input = PlotInput::Simple(PlotInputSimple::Pipe(Pipe::plot_level(LocalLabel(
			"src".into(),
		))));
		let (resolved, _) = resolve_plot_input(&workspaces, &home, &input, &pipe_ctx)
			.await
			.unwrap();
		assert!(matches!(
			resolved,
			FormulaInput::Simple(FormulaInputSimple::Literal(_))
		));
	}

	#[tokio::test]
	async fn missing_pipe_step_errors() {
		let workspaces = empty_workspaces();
		let home = Workspace::new("/tmp/ws-home", true);
		let pipe_ctx = PipeContext::new();

		let input = PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
			step_name: StepName("nope".into()),
			label: LocalLabel("x".into()),
		}));
		let err = resolve_plot_input(&workspaces, &home, &input, &pipe_ctx)
			.await
			.unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));
	}
}
