//! Plot execution (spec.md §4.5 step ordering, §4.6 `exec`). Generalizes the
//! teacher's `PlotGraph`/`PlotExecutor` pair: the graph and its Kahn's-
//! algorithm ordering are kept near-verbatim, while the executor itself is
//! rewritten around `resolve.rs`/`pipe.rs`/`driver.rs` to dispatch through a
//! [`SandboxDriver`] and to support real sub-Plot recursion, matching
//! `original_source/pkg/plotexec/plot_exec.go`'s `Exec`.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use warpforge_api::content::WarehouseAddr;
use warpforge_api::formula::{
	Formula, FormulaAndContext, FormulaCapsule, FormulaContext, FormulaContextCapsule,
	FormulaInput, FormulaInputSimple,
};
use warpforge_api::newtype::{LocalLabel, StepName};
use warpforge_api::plot::{Plot, PlotInputSimple, PlotOutput, PlotResults, Step};
use warpforge_terminal::{logln, set_upper, set_upper_max, set_upper_position};

use crate::driver::SandboxDriver;
use crate::pipe::PipeContext;
use crate::resolve::resolve_plot_input;
use crate::validate::validate_plot;
use crate::workspace::WorkspaceSet;
use crate::{Error, Result};

/// Evaluates `plot` against `workspaces`, dispatching Protoformula steps
/// through `driver` and recursing into sub-Plot steps, returning the
/// `LocalLabel -> WareID` mapping named by the plot's own outputs.
pub async fn exec(workspaces: &WorkspaceSet, driver: &dyn SandboxDriver, plot: &Plot) -> Result<PlotResults> {
	validate_plot(plot)?;

	let home = workspaces.home()?;
	let mut pipe_ctx = PipeContext::new();
	let mut context = FormulaContext::default();

	for (label, plot_input) in &plot.inputs {
		let (resolved, addr) = resolve_plot_input(workspaces, home, plot_input, &pipe_ctx).await?;
		record_warehouse(&mut context, &resolved, addr);
		pipe_ctx.record_plot_level(label.clone(), resolved);
	}

	let graph = PlotGraph::new(plot);
	let order = graph.topological_order()?;

	set_upper("plot");
	set_upper_max(order.len() as u64);

	for (position, step_name) in order.iter().enumerate() {
		set_upper_position(position as u64);
		let step = &plot.steps[*step_name];
		let outputs = run_step(workspaces, driver, step_name, step, &context, &pipe_ctx)
			.await
			.map_err(|err| Error::plot_step_failed(StepName((*step_name).to_owned()), err))?;
		pipe_ctx.record(StepName((*step_name).to_owned()), outputs);
	}

	let mut results = IndexMap::new();
	for (label, PlotOutput::Pipe(pipe)) in &plot.outputs {
		let input = pipe_ctx.lookup(&pipe.step_name, &pipe.label)?;
		let FormulaInputSimple::Ware(ware_id) = input.basis() else {
			return Err(Error::PlotInvalid {
				reason: format!("plot output '{label}' does not resolve to a ware"),
			});
		};
		results.insert(label.clone(), ware_id.clone());
	}
	Ok(PlotResults(results))
}

fn record_warehouse(context: &mut FormulaContext, input: &FormulaInput, addr: Option<WarehouseAddr>) {
	if let (FormulaInputSimple::Ware(ware_id), Some(addr)) = (input.basis(), addr) {
		context.warehouses.insert(ware_id.clone(), addr);
	}
}

async fn run_step(
	workspaces: &WorkspaceSet,
	driver: &dyn SandboxDriver,
	step_name: &str,
	step: &Step,
	plot_context: &FormulaContext,
	pipe_ctx: &PipeContext,
) -> Result<IndexMap<LocalLabel, FormulaInput>> {
	match step {
		Step::Protoformula(protoformula) => {
			let home = workspaces.home()?;
			let mut context = plot_context.clone();
			let mut inputs = IndexMap::new();
			for (port, plot_input) in &protoformula.inputs {
				let (resolved, addr) = resolve_plot_input(workspaces, home, plot_input, pipe_ctx).await?;
				record_warehouse(&mut context, &resolved, addr);
				inputs.insert(port.clone(), resolved);
			}

			let formula = Formula {
				inputs,
				action: protoformula.action.clone(),
				outputs: protoformula
					.outputs
					.iter()
					.map(|(label, directive)| (label.clone().into(), directive.clone()))
					.collect(),
			};
			let formula_and_context = FormulaAndContext {
				formula: FormulaCapsule::V1(formula),
				context: FormulaContextCapsule::V1(context),
			};

			let run_record = driver.execute(home, &formula_and_context).await?;
			logln!("step '{step_name}' complete");

			Ok(run_record
				.results
				.into_iter()
				.map(|(output_name, simple)| {
					(
						LocalLabel::from(output_name),
						FormulaInput::Simple(simple),
					)
				})
				.collect())
		}
		Step::Plot(sub_plot) => {
			// Sub-Plots do not inherit the parent's pipe context: they
			// resolve only against their own declared `inputs` and the same
			// workspace stack, exactly as `Exec` recurses in the original.
			let sub_results = Box::pin(exec(workspaces, driver, sub_plot)).await?;
			Ok(sub_results
				.0
				.into_iter()
				.map(|(label, ware_id)| {
					(label, FormulaInput::Simple(FormulaInputSimple::Ware(ware_id)))
				})
				.collect())
		}
	}
}

#[derive(Debug)]
pub(crate) struct PlotGraph<'a> {
	nodes: IndexMap<&'a str, &'a Step>,
	parents: IndexMap<&'a str, IndexSet<&'a str>>,
	children: IndexMap<&'a str, IndexSet<&'a str>>,
}

impl<'a> PlotGraph<'a> {
	pub(crate) fn new(plot: &'a Plot) -> Self {
		let mut parents = IndexMap::new();
		let mut children = IndexMap::new();
		let mut nodes = IndexMap::new();

		for (StepName(name), step) in &plot.steps {
			nodes.insert(name.as_str(), step);

			// A sub-Plot step does not see the parent's pipe context, so its
			// own declared inputs never create a dependency edge here; it
			// may still be the *target* of an edge from a later sibling's
			// pipe reference, handled below regardless of step kind.
			let Step::Protoformula(protoformula) = step else {
				continue;
			};
			for input in protoformula.inputs.values() {
				let PlotInputSimple::Pipe(pipe) = input.basis() else {
					continue;
				};
				if pipe.is_plot_level() {
					continue;
				}

				parents
					.entry(name.as_str())
					.or_insert_with(IndexSet::new)
					.insert(pipe.step_name.as_str());
				children
					.entry(pipe.step_name.as_str())
					.or_insert_with(IndexSet::new)
					.insert(name.as_str());
			}
		}

		Self {
			nodes,
			parents,
			children,
		}
	}

	/// Kahn's algorithm: returns a linearization honoring every pipe
	/// dependency edge, or *plot-invalid* if a step references an unknown
	/// step or the graph contains a cycle. Steps with no dependency relation
	/// between them keep the declaration order of `plot.steps.keys` (spec.md
	/// §4.5 Tie-break, §4.6 Ordering guarantees): the worklist is drained
	/// FIFO, and newly-unblocked children are appended in the order their
	/// last blocking parent is processed.
	pub(crate) fn topological_order(&self) -> Result<Vec<&'a str>> {
		self.validate_dependencies_exist()?;

		let mut order = Vec::with_capacity(self.nodes.len());
		let mut parents = self.parents.clone();
		let mut no_parents = (self.nodes.keys().cloned())
			.filter(|name| match parents.get(name) {
				Some(node_parents) => node_parents.is_empty(),
				None => true,
			})
			.collect::<VecDeque<_>>();

		while order.len() < self.nodes.len() {
			let Some(node) = no_parents.pop_front() else {
				let cycles = (parents.iter())
					.filter(|(_, child_parents)| !child_parents.is_empty())
					.map(|(&child_name, _)| child_name)
					.collect::<Vec<_>>()
					.join("', '");
				return Err(Error::PlotInvalid {
					reason: format!("the step(s) '{cycles}' contain(s) cycle(s)"),
				});
			};

			order.push(node);

			let Some(children) = self.children.get(node) else {
				continue;
			};
			for &child in children {
				let child_parents = &mut parents[child];
				let removed = child_parents.remove(node);
				if removed && child_parents.is_empty() {
					parents.remove(child);
					no_parents.push_back(child);
				}
			}
		}
		Ok(order)
	}

	fn validate_dependencies_exist(&self) -> Result<()> {
		for &name in self.children.keys() {
			if !self.nodes.contains_key(name) {
				let origin = self.children[name]
					.iter()
					.cloned()
					.collect::<Vec<_>>()
					.join("', '");
				return Err(Error::PlotInvalid {
					reason: format!("step(s) '{origin}' reference(s) unknown step '{name}'"),
				});
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use indexmap::IndexMap as Map;
	use warpforge_api::formula::{Action, ActionExecute, SandboxPort};
	use warpforge_api::plot::{Pipe, PlotInput, Protoformula};

	fn protoformula_step(inputs: Map<SandboxPort, PlotInput>) -> Step {
		Step::Protoformula(Protoformula {
			inputs,
			action: Action::Execute(ActionExecute {
				command: vec!["/bin/true".into()],
				network: None,
			}),
			outputs: Map::new(),
		})
	}

	#[test]
	fn independent_steps_preserve_declaration_order() {
		let mut steps = Map::new();
		steps.insert(StepName("c".into()), protoformula_step(Map::new()));
		steps.insert(StepName("a".into()), protoformula_step(Map::new()));
		steps.insert(StepName("b".into()), protoformula_step(Map::new()));

		let plot = Plot {
			inputs: Map::new(),
			steps,
			outputs: Map::new(),
		};
		let graph = PlotGraph::new(&plot);
		let order = graph.topological_order().unwrap();
		assert_eq!(order, vec!["c", "a", "b"]);
	}

	#[test]
	fn orders_dependent_steps() {
		let mut steps = Map::new();
		steps.insert(StepName("a".into()), protoformula_step(Map::new()));

		let mut b_inputs = Map::new();
		b_inputs.insert(
			SandboxPort("/in".into()),
			PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
				step_name: StepName("a".into()),
				label: LocalLabel("out".into()),
			})),
		);
		steps.insert(StepName("b".into()), protoformula_step(b_inputs));

		let plot = Plot {
			inputs: Map::new(),
			steps,
			outputs: Map::new(),
		};
		let graph = PlotGraph::new(&plot);
		let order = graph.topological_order().unwrap();
		let a_pos = order.iter().position(|&n| n == "a").unwrap();
		let b_pos = order.iter().position(|&n| n == "b").unwrap();
		assert!(a_pos < b_pos);
	}

	#[test]
	fn detects_cycle() {
		let mut a_inputs = Map::new();
		a_inputs.insert(
			SandboxPort("/in".into()),
			PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
				step_name: StepName("b".into()),
				label: LocalLabel("out".into()),
			})),
		);
		let mut b_inputs = Map::new();
		b_inputs.insert(
			SandboxPort("/in".into()),
			PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
				step_name: StepName("a".into()),
				label: LocalLabel("out".into()),
			})),
		);

		let mut steps = Map::new();
		steps.insert(StepName("a".into()), protoformula_step(a_inputs));
		steps.insert(StepName("b".into()), protoformula_step(b_inputs));

		let plot = Plot {
			inputs: Map::new(),
			steps,
			outputs: Map::new(),
		};
		let graph = PlotGraph::new(&plot);
		assert!(matches!(graph.topological_order(), Err(Error::PlotInvalid { .. })));
	}

	#[test]
	fn detects_unknown_step_reference() {
		let mut inputs = Map::new();
		inputs.insert(
			SandboxPort("/in".into()),
			PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
				step_name: StepName("ghost".into()),
				label: LocalLabel("out".into()),
			})),
		);
		let mut steps = Map::new();
		steps.insert(StepName("a".into()), protoformula_step(inputs));

		let plot = Plot {
			inputs: Map::new(),
			steps,
			outputs: Map::new(),
		};
		let graph = PlotGraph::new(&plot);
		assert!(matches!(graph.topological_order(), Err(Error::PlotInvalid { .. })));
	}

	/// End-to-end `exec()` scenarios, covering spec.md §8's concrete examples
	/// against a fake [`SandboxDriver`] that records every Formula it was
	/// asked to run and fabricates a `RunRecord` from the declared outputs
	/// (one `ware:tar:<label>` per `GatherDirective`, since no real sandbox
	/// runs here).
	mod exec_scenarios {
		use std::sync::Mutex;

		use async_trait::async_trait;
		use warpforge_api::content::WareID;
		use warpforge_api::formula::{GatherDirective, Packtype, RunRecord};
		use warpforge_api::plot::CatalogRef;

		use super::*;
		use crate::driver::SandboxDriver;
		use crate::workspace::{Workspace, WorkspaceSet};

		#[derive(Default)]
		struct RecordingDriver {
			seen: Mutex<Vec<Formula>>,
		}

		#[async_trait]
		impl SandboxDriver for RecordingDriver {
			async fn execute(&self, _home: &Workspace, fac: &FormulaAndContext) -> Result<RunRecord> {
				let FormulaCapsule::V1(formula) = &fac.formula;
				self.seen.lock().unwrap().push(formula.clone());
				let results = formula
					.outputs
					.keys()
					.map(|label| {
						(
							label.clone(),
							FormulaInputSimple::Ware(WareID::new("tar", format!("out-{label}"))),
						)
					})
					.collect();
				Ok(RunRecord { results })
			}
		}

		fn echo_step(inputs: Map<SandboxPort, PlotInput>, outputs: Map<LocalLabel, GatherDirective>) -> Step {
			Step::Protoformula(Protoformula {
				inputs,
				action: Action::Execute(ActionExecute {
					command: vec!["/bin/true".into()],
					network: None,
				}),
				outputs,
			})
		}

		fn workspaces() -> WorkspaceSet {
			WorkspaceSet::new(vec![Workspace::new("/tmp/ws-home", true)])
		}

		#[tokio::test]
		async fn plot_level_pipe_reaches_the_driver_unchanged() {
			let mut inputs = Map::new();
			inputs.insert(
				LocalLabel("x".into()),
				PlotInput::Simple(PlotInputSimple::Ware(WareID::new("tar", "abc"))),
			);

			let mut step_inputs = Map::new();
			step_inputs.insert(
				SandboxPort("/".into()),
				PlotInput::Simple(PlotInputSimple::Pipe(Pipe::plot_level(LocalLabel("x".into())))),
			);
			let mut steps = Map::new();
			steps.insert(StepName("only".into()), echo_step(step_inputs, Map::new()));

			let plot = Plot {
				inputs,
				steps,
				outputs: Map::new(),
			};

			let driver = RecordingDriver::default();
			exec(&workspaces(), &driver, &plot).await.unwrap();

			let seen = driver.seen.lock().unwrap();
			let root_input = &seen[0].inputs[&SandboxPort("/".into())];
			assert!(matches!(
				root_input.basis(),
				FormulaInputSimple::Ware(w) if w.hash == "abc"
			));
		}

		#[tokio::test]
		async fn missing_catalog_entry_surfaces_the_ref_string() {
			let mut inputs = Map::new();
			inputs.insert(
				LocalLabel("x".into()),
				PlotInput::Simple(PlotInputSimple::CatalogRef(CatalogRef {
					module_name: "no/such".parse().unwrap(),
					release_name: "0".parse().unwrap(),
					item_name: "x".parse().unwrap(),
				})),
			);
			let plot = Plot {
				inputs,
				steps: Map::new(),
				outputs: Map::new(),
			};

			let driver = RecordingDriver::default();
			let err = exec(&workspaces(), &driver, &plot).await.unwrap_err();
			match err {
				Error::CatalogMissingEntry { catalog_ref } => {
					assert_eq!(catalog_ref, "catalog:no/such:0:x");
				}
				other => panic!("expected CatalogMissingEntry, got {other:?}"),
			}
		}

		#[tokio::test]
		async fn two_step_pipe_threads_upstream_run_record_into_downstream_input() {
			let mut a_outputs = Map::new();
			a_outputs.insert(
				LocalLabel("out".into()),
				GatherDirective {
					from: SandboxPort("/output".into()),
					packtype: Some(Packtype("tar".into())),
				},
			);
			let mut steps = Map::new();
			steps.insert(StepName("a".into()), echo_step(Map::new(), a_outputs));

			let mut b_inputs = Map::new();
			b_inputs.insert(
				SandboxPort("/".into()),
				PlotInput::Simple(PlotInputSimple::Pipe(Pipe {
					step_name: StepName("a".into()),
					label: LocalLabel("out".into()),
				})),
			);
			steps.insert(StepName("b".into()), echo_step(b_inputs, Map::new()));

			let mut outputs = Map::new();
			outputs.insert(
				LocalLabel("final".into()),
				PlotOutput::Pipe(Pipe {
					step_name: StepName("a".into()),
					label: LocalLabel("out".into()),
				}),
			);

			let plot = Plot {
				inputs: Map::new(),
				steps,
				outputs,
			};

			let driver = RecordingDriver::default();
			let results = exec(&workspaces(), &driver, &plot).await.unwrap();

			assert_eq!(results.0[&LocalLabel("final".into())], WareID::new("tar", "out-out"));

			let seen = driver.seen.lock().unwrap();
			assert_eq!(seen.len(), 2);
			let b_root = &seen[1].inputs[&SandboxPort("/".into())];
			assert!(matches!(
				b_root.basis(),
				FormulaInputSimple::Ware(w) if w.hash == "out-out"
			));
		}

		#[tokio::test]
		async fn sub_plot_output_is_promoted_into_the_parent_pipe_context() {
			let mut inner_outputs = Map::new();
			inner_outputs.insert(
				LocalLabel("inner".into()),
				GatherDirective {
					from: SandboxPort("/output".into()),
					packtype: Some(Packtype("tar".into())),
				},
			);
			let mut inner_steps = Map::new();
			inner_steps.insert(StepName("innerstep".into()), echo_step(Map::new(), inner_outputs));
			let mut inner_plot_outputs = Map::new();
			inner_plot_outputs.insert(
				LocalLabel("inner".into()),
				PlotOutput::Pipe(Pipe {
					step_name: StepName("innerstep".into()),
					label: LocalLabel("inner".into()),
				}),
			);
			let inner_plot = Plot {
				inputs: Map::new(),
				steps: inner_steps,
				outputs: inner_plot_outputs,
			};

			let mut steps = Map::new();
			steps.insert(StepName("nested".into()), Step::Plot(inner_plot));

			let mut outputs = Map::new();
			outputs.insert(
				LocalLabel("result".into()),
				PlotOutput::Pipe(Pipe {
					step_name: StepName("nested".into()),
					label: LocalLabel("inner".into()),
				}),
			);

			let plot = Plot {
				inputs: Map::new(),
				steps,
				outputs,
			};

			let driver = RecordingDriver::default();
			let results = exec(&workspaces(), &driver, &plot).await.unwrap();
			assert_eq!(
				results.0[&LocalLabel("result".into())],
				WareID::new("tar", "out-inner")
			);
		}
	}
}
