//! Post-parse Plot validation (spec.md §6): "The executor does not own
//! parsing; it consumes the parsed graph. It must, however, reject
//! post-parse violations (empty packtype, empty hash, colon in newtype
//! strings)." `WareID` already enforces the packtype/hash half at parse
//! time (see `warpforge_api::content`); this module covers the newtype
//! charset half, which the wire format's `FromStr` impls deliberately leave
//! permissive (see `warpforge_api::newtype`'s module doc).

use warpforge_api::plot::{Plot, PlotInput, PlotInputSimple, Step};

use crate::{Error, Result};

fn invalid(reason: impl Into<String>) -> Error {
	Error::PlotInvalid { reason: reason.into() }
}

/// Walks every newtype-carrying field of `plot` (recursing into sub-Plot
/// steps) and fails *plot-invalid* at the first charset violation.
pub fn validate_plot(plot: &Plot) -> Result<()> {
	for label in plot.inputs.keys() {
		label.validate().map_err(|cause| invalid(format!("plot input label {cause}")))?;
	}
	for input in plot.inputs.values() {
		validate_plot_input(input)?;
	}
	for (step_name, step) in &plot.steps {
		step_name
			.validate()
			.map_err(|cause| invalid(format!("step name {cause}")))?;
		validate_step(step)?;
	}
	for (label, output) in &plot.outputs {
		label.validate().map_err(|cause| invalid(format!("plot output label {cause}")))?;
		output
			.0
			.step_name
			.validate()
			.map_err(|cause| invalid(format!("plot output pipe {cause}")))?;
		output
			.0
			.label
			.validate()
			.map_err(|cause| invalid(format!("plot output pipe {cause}")))?;
	}
	Ok(())
}

fn validate_step(step: &Step) -> Result<()> {
	match step {
		Step::Plot(sub_plot) => validate_plot(sub_plot),
		Step::Protoformula(protoformula) => {
			for (port, input) in &protoformula.inputs {
				port.validate().map_err(|cause| invalid(format!("sandbox port {cause}")))?;
				validate_plot_input(input)?;
			}
			for label in protoformula.outputs.keys() {
				label
					.validate()
					.map_err(|cause| invalid(format!("protoformula output label {cause}")))?;
			}
			Ok(())
		}
	}
}

fn validate_plot_input(input: &PlotInput) -> Result<()> {
	match input.basis() {
		PlotInputSimple::Pipe(pipe) => {
			pipe.step_name
				.validate()
				.map_err(|cause| invalid(format!("pipe {cause}")))?;
			pipe.label.validate().map_err(|cause| invalid(format!("pipe {cause}")))
		}
		PlotInputSimple::CatalogRef(catalog_ref) => {
			catalog_ref
				.module_name
				.validate()
				.map_err(|cause| invalid(format!("catalog ref {cause}")))?;
			catalog_ref
				.release_name
				.validate()
				.map_err(|cause| invalid(format!("catalog ref {cause}")))?;
			catalog_ref
				.item_name
				.validate()
				.map_err(|cause| invalid(format!("catalog ref {cause}")))
		}
		PlotInputSimple::Ware(_) | PlotInputSimple::Mount(_) | PlotInputSimple::Literal(_) | PlotInputSimple::Ingest(_) => {
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use indexmap::IndexMap;
	use warpforge_api::formula::{Action, ActionExecute, SandboxPort};
	use warpforge_api::newtype::{LocalLabel, StepName};
	use warpforge_api::plot::{Pipe, PlotOutput, Protoformula};

	use super::*;

	fn empty_plot() -> Plot {
		Plot {
			inputs: IndexMap::new(),
			steps: IndexMap::new(),
			outputs: IndexMap::new(),
		}
	}

	#[test]
	fn accepts_an_empty_plot() {
		validate_plot(&empty_plot()).unwrap();
	}

	#[test]
	fn rejects_a_step_name_containing_a_colon() {
		let mut plot = empty_plot();
		plot.steps.insert(
			StepName("bad:name".into()),
			Step::Protoformula(Protoformula {
				inputs: IndexMap::new(),
				action: Action::Execute(ActionExecute {
					command: vec!["/bin/true".into()],
					network: None,
				}),
				outputs: IndexMap::new(),
			}),
		);
		let err = validate_plot(&plot).unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));
	}

	#[test]
	fn rejects_a_plot_output_label_with_whitespace() {
		let mut plot = empty_plot();
		plot.outputs.insert(
			LocalLabel("has space".into()),
			PlotOutput::Pipe(Pipe::plot_level(LocalLabel("x".into()))),
		);
		let err = validate_plot(&plot).unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));
	}

	#[test]
	fn rejects_a_sandbox_port_containing_a_colon() {
		let mut inputs = IndexMap::new();
		inputs.insert(
			SandboxPort("/bad:port".into()),
			PlotInput::Simple(PlotInputSimple::Literal("x".into())),
		);
		let mut plot = empty_plot();
		plot.steps.insert(
			StepName("s".into()),
			Step::Protoformula(Protoformula {
				inputs,
				action: Action::Execute(ActionExecute {
					command: vec!["/bin/true".into()],
					network: None,
				}),
				outputs: IndexMap::new(),
			}),
		);
		let err = validate_plot(&plot).unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));
	}
}
