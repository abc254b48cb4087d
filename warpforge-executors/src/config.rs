//! Ambient runtime configuration read once from the process environment,
//! matching the teacher's CLI pattern of reading `env::var` directly rather
//! than introducing a config-file crate.

use std::env;
use std::ffi::OsString;

/// `WARPFORGE_PATH`, if set, is prepended to a driver's subprocess `PATH` so
/// helper binaries (interpreters, unpack tools) can be resolved without a
/// system-wide install.
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
	pub warpforge_path: Option<OsString>,
}

impl RuntimeConfig {
	pub fn from_env() -> Self {
		Self {
			warpforge_path: env::var_os("WARPFORGE_PATH"),
		}
	}

	/// Builds the `PATH` value a spawned subprocess should see: the
	/// configured override directory first, then whatever `PATH` this
	/// process already has.
	pub fn subprocess_path(&self) -> OsString {
		match &self.warpforge_path {
			Some(extra) => {
				let mut joined = extra.clone();
				if let Some(existing) = env::var_os("PATH") {
					joined.push(":");
					joined.push(existing);
				}
				joined
			}
			None => env::var_os("PATH").unwrap_or_default(),
		}
	}
}
