//! Two-level pipe context (spec.md §4.4): `StepName -> LocalLabel ->
//! FormulaInput`, with the empty `StepName` reserved for plot-level inputs.
//! Grounded on `original_source/pkg/plotexec/plot_exec.go`'s `pipeMap`.

use indexmap::IndexMap;
use warpforge_api::formula::FormulaInput;
use warpforge_api::newtype::{LocalLabel, StepName};

use crate::{Error, Result};

#[derive(Default)]
pub struct PipeContext {
	steps: IndexMap<StepName, IndexMap<LocalLabel, FormulaInput>>,
}

impl PipeContext {
	pub fn new() -> Self {
		let mut steps = IndexMap::new();
		steps.insert(StepName(String::new()), IndexMap::new());
		PipeContext { steps }
	}

	/// Records the outputs hoisted from a completed step (or sub-Plot) under
	/// `step_name`, replacing whatever was there before.
	pub fn record(&mut self, step_name: StepName, outputs: IndexMap<LocalLabel, FormulaInput>) {
		self.steps.insert(step_name, outputs);
	}

	pub fn record_plot_level(&mut self, label: LocalLabel, input: FormulaInput) {
		self.steps
			.entry(StepName(String::new()))
			.or_default()
			.insert(label, input);
	}

	/// Looks up `(step_name, label)`, distinguishing "no such step" from
	/// "step exists but has no such label" in the error detail, matching
	/// `pipeMap.lookup`'s two distinct messages.
	pub fn lookup(&self, step_name: &StepName, label: &LocalLabel) -> Result<&FormulaInput> {
		let Some(outputs) = self.steps.get(step_name) else {
			return Err(Error::PlotInvalid {
				reason: format!("no step '{step_name}'"),
			});
		};
		outputs.get(label).ok_or_else(|| {
			let reason = if step_name.0.is_empty() {
				format!("no label '{label}' in plot inputs (pipe::{label} not defined)")
			} else {
				format!("no label '{label}' for step '{step_name}' (pipe:{step_name}:{label} not defined)")
			};
			Error::PlotInvalid { reason }
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warpforge_api::formula::FormulaInputSimple;

	#[test]
	fn plot_level_lookup() {
		let mut ctx = PipeContext::new();
		ctx.record_plot_level(
			LocalLabel("src".into()),
			FormulaInput::Simple(FormulaInputSimple::Literal("hello".into())),
		);
		let found = ctx
			.lookup(&StepName(String::new()), &LocalLabel("src".into()))
			.unwrap();
		assert!(matches!(found, FormulaInput::Simple(FormulaInputSimple::Literal(_))));
	}

	#[test]
	fn missing_step_vs_missing_label() {
		let mut ctx = PipeContext::new();
		ctx.record(StepName("build".into()), IndexMap::new());

		let err = ctx.lookup(&StepName("nope".into()), &LocalLabel("x".into())).unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));

		let err = ctx.lookup(&StepName("build".into()), &LocalLabel("x".into())).unwrap_err();
		assert!(matches!(err, Error::PlotInvalid { .. }));
	}
}
