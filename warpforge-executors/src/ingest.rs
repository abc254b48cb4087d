//! Git ingest (spec.md §4.3). Shells out to the system `git`, matching
//! `original_source/pkg/plotexec/plot_exec.go`'s `exec.Command` approach
//! rather than a library like `git2`: the original's own comment notes this
//! keeps checked-out files owned by the invoking user, which matters once a
//! rootless container picks them up.

use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use warpforge_api::content::WareID;

use crate::workspace::Workspace;
use crate::{Error, Result};

fn git_error(context: impl Into<String>, output: &Output) -> Error {
	Error::Git {
		context: format!(
			"{}: {}",
			context.into(),
			String::from_utf8_lossy(&output.stderr).trim()
		),
		cause: None,
	}
}

async fn run_git(args: &[&str]) -> Result<Output> {
	Command::new("git")
		.args(args)
		.output()
		.await
		.map_err(|cause| Error::Git {
			context: format!("spawning `git {}`", args.join(" ")),
			cause: Some(Box::new(cause)),
		})
}

/// Resolves `ref_` against the repository at `host_path` to a full commit
/// id, then clones that commit into the home workspace's cache at
/// `cache-path(WareID)` if it isn't already present there. Idempotent: a
/// second ingest of the same `(host_path, ref_)` is a no-op past the
/// existence check.
pub async fn ingest_git(home: &Workspace, host_path: &str, ref_: &str) -> Result<WareID> {
	let abs_path = std::fs::canonicalize(host_path).map_err(|cause| Error::Io {
		context: format!("resolving git ingest host path {host_path:?}"),
		cause,
	})?;
	let git_dir = abs_path.join(".git");

	let output = run_git(&[
		"--git-dir",
		&git_dir.to_string_lossy(),
		"rev-parse",
		ref_,
	])
	.await?;
	if !output.status.success() {
		return Err(git_error(format!("git rev-parse {ref_:?} failed"), &output));
	}
	let hash = String::from_utf8_lossy(&output.stdout).trim().to_owned();

	let ware_id = WareID::new("git", hash);
	let cache_path = home.cache_path(&ware_id);
	if !cache_path.exists() {
		clone_into(&abs_path, &cache_path).await?;
	}
	Ok(ware_id)
}

async fn clone_into(source: &Path, dest: &Path) -> Result<()> {
	if let Some(parent) = dest.parent() {
		std::fs::create_dir_all(parent).map_err(|cause| Error::Io {
			context: format!("creating cache directory {parent:?}"),
			cause,
		})?;
	}
	let source_url = format!("file://{}", source.display());
	let output = run_git(&["clone", &source_url, &dest.to_string_lossy()]).await?;
	if !output.status.success() {
		return Err(git_error(
			format!("git clone {source_url:?} into {dest:?} failed"),
			&output,
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	async fn init_repo(dir: &Path) {
		run_git(&["init", "--quiet", &dir.to_string_lossy()]).await.unwrap();
		run_git(&["-C", &dir.to_string_lossy(), "config", "user.email", "a@b.c"])
			.await
			.unwrap();
		run_git(&["-C", &dir.to_string_lossy(), "config", "user.name", "test"])
			.await
			.unwrap();
		std::fs::write(dir.join("f"), b"hi").unwrap();
		run_git(&["-C", &dir.to_string_lossy(), "add", "f"]).await.unwrap();
		run_git(&["-C", &dir.to_string_lossy(), "commit", "--quiet", "-m", "init"])
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn ingest_is_idempotent() {
		let src = tempdir().unwrap();
		init_repo(src.path()).await;

		let home_dir = tempdir().unwrap();
		let home = Workspace::new(home_dir.path(), true);

		let first = ingest_git(&home, src.path().to_str().unwrap(), "HEAD").await.unwrap();
		assert_eq!(first.packtype.0, "git");
		assert!(home.cache_path(&first).exists());

		let second = ingest_git(&home, src.path().to_str().unwrap(), "HEAD").await.unwrap();
		assert_eq!(first, second);
	}
}
