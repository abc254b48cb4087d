//! Minimal front-end: parses a Plot document and drives it through the
//! evaluation engine. The CLI surface itself is explicitly out of scope
//! (spec.md §1) -- this only exists so the workspace builds and runs
//! end-to-end, using the same `clap` the teacher's own front-end used.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use warpforge_api::plot::PlotCapsule;
use warpforge_executors::formula::LocalSandboxDriver;
use warpforge_executors::plot::exec;
use warpforge_executors::workspace::{Workspace, WorkspaceSet};

/// Evaluates a Plot document and prints its resulting WareIDs as JSON.
#[derive(Parser, Debug)]
#[command(name = "warpforge")]
struct Cli {
	/// Path to a Plot document (the `{"plot.v1": {...}}` capsule).
	plot: PathBuf,

	/// Workspace root used as the home workspace (ware cache, catalogs).
	#[arg(long, default_value = ".")]
	workspace: PathBuf,
}

/// Exit codes mediated by the CLI (spec.md §6): success 0, invalid user
/// input 1, execution failure 2.
#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let source = match std::fs::read_to_string(&cli.plot) {
		Ok(source) => source,
		Err(err) => {
			eprintln!("error: reading {:?}: {err}", cli.plot);
			return ExitCode::from(1);
		}
	};

	let validated = match warpforge_validate::validate_plot(&source) {
		Ok(validated) => validated,
		Err(warpforge_validate::Error::Invalid { errors }) => {
			eprintln!("error: {:?} is not a valid Plot:", cli.plot);
			for error in &errors {
				eprintln!("  {error}");
			}
			return ExitCode::from(1);
		}
	};
	let PlotCapsule::V1(plot) = validated.plot;

	let home = Workspace::new(cli.workspace, true);
	let workspaces = WorkspaceSet::new(vec![home]);
	// WARPFORGE_PATH (spec.md §6), if set, is read here via RuntimeConfig
	// and prepended to the driver's subprocess PATH.
	let driver = LocalSandboxDriver::new();

	match exec(&workspaces, &driver, &plot).await {
		Ok(results) => {
			let json = serde_json::to_string_pretty(&results).expect("PlotResults serializes");
			println!("{json}");
			ExitCode::from(0)
		}
		Err(err) => {
			eprintln!("error: plot execution failed: {err}");
			ExitCode::from(2)
		}
	}
}
