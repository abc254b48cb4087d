//! `LocalSandboxDriver`: a concrete [`SandboxDriver`] that executes a
//! Formula as a plain host subprocess via `tokio::process`. The concrete
//! container runtime is out of scope for the core; this driver is the
//! "proof that the trait is drivable" reference implementation, adapted
//! from the teacher's own `Formula::run`/`setup_script` but stripped of the
//! undocumented `execute`/`events`/`context`/`pack` submodules it used to
//! depend on in favor of spawning directly.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;
use oci_client::secrets::RegistryAuth;
use rand::distributions::{Alphanumeric, DistString};
use tokio::process::Command;
use warpforge_api::formula::{
	Action, ActionScript, FormulaAndContext, FormulaCapsule, FormulaInput, FormulaInputSimple,
	Mount, RunRecord, SandboxPort,
};
use warpforge_api::newtype::OutputName;
use warpforge_terminal::logln;

use crate::config::RuntimeConfig;
use crate::driver::SandboxDriver;
use crate::workspace::Workspace;
use crate::{Error, Result};

#[derive(Default)]
pub struct LocalSandboxDriver {
	config: RuntimeConfig,
}

const CONTAINER_SCRIPT_DIR: &str = "script";

impl LocalSandboxDriver {
	/// Builds a driver whose subprocess `PATH` honors `WARPFORGE_PATH`
	/// (spec.md §6), read once at construction.
	pub fn new() -> Self {
		Self {
			config: RuntimeConfig::from_env(),
		}
	}

	fn setup_script(&self, ersatz_dir: &std::path::Path, script: &ActionScript) -> Result<Vec<String>> {
		let script_dir = ersatz_dir.join(CONTAINER_SCRIPT_DIR);
		fs::create_dir_all(&script_dir).map_err(|cause| Error::Io {
			context: "creating script directory".into(),
			cause,
		})?;

		let run_path = script_dir.join("run");
		let mut lines = Vec::with_capacity(script.contents.len());
		for (n, entry) in script.contents.iter().enumerate() {
			let entry_path = script_dir.join(format!("entry-{n}"));
			fs::write(&entry_path, format!("{entry}\n")).map_err(|cause| Error::Io {
				context: format!("writing script entry {n}"),
				cause,
			})?;
			lines.push(format!(". {}", entry_path.display()));
		}
		fs::write(&run_path, lines.join("\n")).map_err(|cause| Error::Io {
			context: "writing script runner".into(),
			cause,
		})?;

		Ok(vec![
			script.interpreter.clone(),
			run_path.to_string_lossy().into_owned(),
		])
	}

	/// Materializes whatever Ware is mounted at the root SandboxPort (`/`)
	/// as a rootfs the subprocess runs alongside (the core has no
	/// namespace/container boundary --- that remains the external
	/// collaborator's job; this driver only proves the trait is drivable).
	/// `tar` packtypes are unpacked from the home workspace's cache
	/// directly; `oci` packtypes go through `oci-unpack`.
	async fn materialize_rootfs(
		&self,
		home: &Workspace,
		ersatz_dir: &std::path::Path,
		input: &FormulaInputSimple,
	) -> Result<PathBuf> {
		let rootfs = ersatz_dir.join("rootfs");
		fs::create_dir_all(&rootfs).map_err(|cause| Error::Io {
			context: "creating rootfs directory".into(),
			cause,
		})?;

		match input {
			FormulaInputSimple::Ware(ware_id) if ware_id.packtype.0 == "tar" => {
				let cache_path = home.cache_path(ware_id);
				let file = fs::File::open(&cache_path).map_err(|cause| Error::WareUnpack {
					ware_id: ware_id.clone(),
					cause: Box::new(cause),
				})?;
				tar::Archive::new(file)
					.unpack(&rootfs)
					.map_err(|cause| Error::WareUnpack {
						ware_id: ware_id.clone(),
						cause: Box::new(cause),
					})?;
				Ok(rootfs)
			}
			FormulaInputSimple::Ware(ware_id) if ware_id.packtype.0 == "oci" => {
				let reference: oci_client::Reference = ware_id.hash.parse().map_err(|cause| Error::WareUnpack {
					ware_id: ware_id.clone(),
					cause: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{cause:?}"))),
				})?;
				oci_unpack::unpack(&reference, &RegistryAuth::Anonymous, &rootfs)
					.await
					.map_err(|cause| Error::WareUnpack {
						ware_id: ware_id.clone(),
						cause: Box::new(cause),
					})?;
				Ok(rootfs.join("rootfs"))
			}
			FormulaInputSimple::Ware(ware_id) => Err(Error::WareUnpack {
				ware_id: ware_id.clone(),
				cause: Box::new(std::io::Error::new(
					std::io::ErrorKind::Unsupported,
					format!("unsupported root packtype '{}'", ware_id.packtype),
				)),
			}),
			FormulaInputSimple::Mount(Mount::ReadOnly(path) | Mount::ReadWrite(path)) => {
				Ok(PathBuf::from(path))
			}
			other => Err(Error::FormulaInvalid {
				reason: format!("unsupported root input {other:?}"),
			}),
		}
	}
}

#[async_trait]
impl SandboxDriver for LocalSandboxDriver {
	async fn execute(&self, home_workspace: &Workspace, formula_and_context: &FormulaAndContext) -> Result<RunRecord> {
		let FormulaCapsule::V1(formula) = &formula_and_context.formula;

		let random_suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 16);
		let ersatz_dir = std::env::temp_dir().join(format!("warpforge-{random_suffix}"));
		fs::create_dir_all(&ersatz_dir).map_err(|cause| Error::Io {
			context: "creating scratch directory".into(),
			cause,
		})?;

		let mut environment: IndexMap<String, String> = IndexMap::new();
		let mut root_input = None;

		for (SandboxPort(port), input) in &formula.inputs {
			if let Some(name) = port.strip_prefix('$') {
				let FormulaInput::Simple(FormulaInputSimple::Literal(value)) = input else {
					return Err(Error::FormulaInvalid {
						reason: format!("environment variable '{name}' must be a literal"),
					});
				};
				environment.insert(name.to_owned(), value.clone());
				continue;
			}
			if port == "/" {
				root_input = Some(input.basis().clone());
				continue;
			}
			// Other mount points are the concrete container runtime's
			// concern; this reference driver only honors the root input and
			// environment variables.
		}

		let root_input = root_input.ok_or_else(|| Error::FormulaInvalid {
			reason: "formula has no input mounted at '/'".into(),
		})?;
		let rootfs = self.materialize_rootfs(home_workspace, &ersatz_dir, &root_input).await?;

		let command = match &formula.action {
			Action::Echo => vec!["echo".to_owned(), "hello from warpforge".to_owned()],
			Action::Execute(exec) => exec.command.clone(),
			Action::Script(script) => self.setup_script(&ersatz_dir, script)?,
		};

		let Some((program, args)) = command.split_first() else {
			return Err(Error::FormulaInvalid {
				reason: "action has an empty command".into(),
			});
		};

		let output = Command::new(program)
			.args(args)
			.current_dir(&rootfs)
			.envs(&environment)
			.env("PATH", self.config.subprocess_path())
			.output()
			.await
			.map_err(|cause| Error::ExecutorFailed {
				engine_name: "local".into(),
				cause: Some(Box::new(cause)),
			})?;

		logln!("{}", String::from_utf8_lossy(&output.stdout));
		if !output.status.success() {
			return Err(Error::ExecutorFailed {
				engine_name: "local".into(),
				cause: Some(Box::new(std::io::Error::new(
					std::io::ErrorKind::Other,
					format!(
						"exited with {:?}: {}",
						output.status.code(),
						String::from_utf8_lossy(&output.stderr)
					),
				))),
			});
		}

		// This reference driver declares no gather directives satisfied
		// beyond what it was told to produce: a real driver inspects
		// `formula.outputs` and packs the named paths. Here we report an
		// empty result set for any formula with declared outputs, which
		// is sufficient for the `echo`-only scenarios this driver targets;
		// anything requiring real output packing needs a concrete
		// container-runtime driver, out of scope for the core.
		let _ = &formula.outputs;
		let results: IndexMap<OutputName, FormulaInputSimple> = IndexMap::new();
		Ok(RunRecord { results })
	}
}
