//! Ambient logging and progress reporting. Out of scope for the core
//! evaluation semantics (spec.md's Non-goals exclude "logging and tracing
//! scaffolding" as a feature), but every module that logs still goes
//! through here rather than bare `println!`, matching how the teacher keeps
//! its own executor code free of direct stdout writes.
//!
//! Two independent facilities live here:
//! - [`Logger`]: an explicit, owned TCP broadcaster -- bind a port, accept
//!   clients, stream log lines to each of them (see `examples/server.rs`).
//! - Global sink: `logln!`/`debug!`/`warn!` write to stdout unconditionally
//!   and, once a [`Logger`] has been installed via [`Logger::install`], also
//!   broadcast there. Callers that never install one still get plain stdout
//!   logging, which is what the executor's unit tests run with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to bind terminal server to port {port}")]
	Bind {
		port: u16,
		#[source]
		cause: std::io::Error,
	},
}

pub type Result<T> = std::result::Result<T, Error>;

static GLOBAL_SENDER: OnceLock<Mutex<Option<broadcast::Sender<String>>>> = OnceLock::new();

fn global_sender() -> &'static Mutex<Option<broadcast::Sender<String>>> {
	GLOBAL_SENDER.get_or_init(|| Mutex::new(None))
}

/// A TCP broadcaster: every connected client receives every line passed to
/// [`Logger::log`], in arrival order.
pub struct Logger {
	sender: broadcast::Sender<String>,
}

impl Logger {
	/// Binds `127.0.0.1:port` and spawns a background task that streams
	/// log lines to every client that connects, for as long as the
	/// returned `Logger` (or a clone made by [`Logger::install`]) lives.
	pub async fn new_server(port: u16) -> Result<Self> {
		let listener = TcpListener::bind(("127.0.0.1", port))
			.await
			.map_err(|cause| Error::Bind { port, cause })?;
		let (sender, _) = broadcast::channel(1024);

		let accept_sender = sender.clone();
		tokio::spawn(async move {
			loop {
				let Ok((mut socket, _)) = listener.accept().await else {
					break;
				};
				let mut receiver = accept_sender.subscribe();
				tokio::spawn(async move {
					while let Ok(line) = receiver.recv().await {
						if socket.write_all(line.as_bytes()).await.is_err() {
							break;
						}
					}
				});
			}
		});

		Ok(Logger { sender })
	}

	/// Sends `line` to every currently-connected client. Never blocks on a
	/// slow or absent client: broadcast sends that have no receivers are not
	/// an error.
	pub async fn log(&self, line: &str) -> Result<()> {
		let _ = self.sender.send(line.to_owned());
		Ok(())
	}

	/// Makes this logger's channel the target for `logln!`/`debug!`/`warn!`
	/// for the remainder of the process, in addition to their always-on
	/// stdout output.
	pub fn install(self) {
		*global_sender().lock().unwrap() = Some(self.sender);
	}
}

/// Writes `line` to stdout and, if a [`Logger`] has been installed,
/// broadcasts it there too. Called by the `logln!`/`debug!`/`warn!` macros;
/// exposed directly for callers that already have a formatted string.
pub fn log(line: &str) {
	println!("{line}");
	if let Some(sender) = global_sender().lock().unwrap().as_ref() {
		let _ = sender.send(line.to_owned());
	}
}

#[macro_export]
macro_rules! logln {
	($($arg:tt)*) => {
		$crate::log(&format!($($arg)*))
	};
}

#[macro_export]
macro_rules! debug {
	($($arg:tt)*) => {
		$crate::log(&format!("[debug] {}", format!($($arg)*)))
	};
}

#[macro_export]
macro_rules! warn {
	($($arg:tt)*) => {
		$crate::log(&format!("[warn] {}", format!($($arg)*)))
	};
}

struct Progress {
	label: Mutex<String>,
	max: AtomicU64,
	position: AtomicU64,
}

static PROGRESS: OnceLock<Progress> = OnceLock::new();

fn progress() -> &'static Progress {
	PROGRESS.get_or_init(|| Progress {
		label: Mutex::new(String::new()),
		max: AtomicU64::new(0),
		position: AtomicU64::new(0),
	})
}

/// Names the task the current progress bar tracks, e.g. `"plot"`.
pub fn set_upper(label: &str) {
	*progress().label.lock().unwrap() = label.to_owned();
	progress().position.store(0, Ordering::Relaxed);
}

pub fn set_upper_max(max: u64) {
	progress().max.store(max, Ordering::Relaxed);
}

pub fn set_upper_position(position: u64) {
	progress().position.store(position, Ordering::Relaxed);
	let label = progress().label.lock().unwrap().clone();
	let max = progress().max.load(Ordering::Relaxed);
	log(&format!("[progress] {label} {position}/{max}"));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn progress_tracks_position() {
		set_upper("test-phase");
		set_upper_max(3);
		set_upper_position(1);
		assert_eq!(progress().position.load(Ordering::Relaxed), 1);
		assert_eq!(progress().max.load(Ordering::Relaxed), 3);
	}
}
