//! Unpacks an OCI image into a runnable bundle directory: pulls the
//! manifest and config, fetches each layer, and extracts the layers in
//! order onto a rootfs, applying whiteouts and preserving file modes and
//! mtimes. This is the `oci` packtype's materialization path, a sibling to
//! the plain `tar` packtype `warpforge-executors` unpacks directly.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use file_mode::ModePath;
use filetime::{set_file_mtime, FileTime};
use flate2::read::GzDecoder;
use oci_client::client::{Client, ClientConfig};
use oci_client::manifest::OciDescriptor;
use oci_client::secrets::RegistryAuth;
use oci_client::Reference;
use oci_spec::image::ImageConfiguration;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to pull manifest for {reference}")]
	PullManifest {
		reference: String,
		#[source]
		cause: oci_client::errors::OciDistributionError,
	},

	#[error("failed to pull layer {digest}")]
	PullLayer {
		digest: String,
		#[source]
		cause: oci_client::errors::OciDistributionError,
	},

	#[error("failed to parse image config")]
	ParseConfig(#[source] serde_json::Error),

	#[error("layer {digest} digest mismatch: expected {expected}, got {actual}")]
	LayerDigestMismatch {
		digest: String,
		expected: String,
		actual: String,
	},

	#[error("unsupported layer media type {media_type:?}")]
	UnsupportedMediaType { media_type: String },

	#[error("io error unpacking bundle at {path:?}")]
	Io {
		path: PathBuf,
		#[source]
		cause: std::io::Error,
	},
}

type Result<T> = std::result::Result<T, Error>;

/// Pulls `reference` and extracts it into `bundle_path`, which on success
/// contains a `rootfs/` directory (the unpacked filesystem, layers applied
/// lowest-first) and a `config.json` (the OCI image configuration, verbatim
/// from the registry).
pub async fn unpack(reference: &Reference, auth: &RegistryAuth, bundle_path: &Path) -> Result<()> {
	let client = Client::new(ClientConfig::default());

	let (manifest, _digest) = client
		.pull_manifest(reference, auth)
		.await
		.map_err(|cause| Error::PullManifest {
			reference: reference.to_string(),
			cause,
		})?;

	let mut config_bytes = Vec::new();
	client
		.pull_blob(reference, &manifest.config, &mut config_bytes)
		.await
		.map_err(|cause| Error::PullLayer {
			digest: manifest.config.digest.clone(),
			cause,
		})?;
	let config: ImageConfiguration =
		serde_json::from_slice(&config_bytes).map_err(Error::ParseConfig)?;

	let rootfs = bundle_path.join("rootfs");
	fs::create_dir_all(&rootfs).map_err(|cause| Error::Io {
		path: rootfs.clone(),
		cause,
	})?;

	for layer in &manifest.layers {
		let bytes = pull_layer(&client, reference, layer).await?;
		extract_layer(layer, &bytes, &rootfs)?;
	}

	let config_path = bundle_path.join("config.json");
	fs::write(&config_path, &config_bytes).map_err(|cause| Error::Io {
		path: config_path,
		cause,
	})?;
	// Silence an unused-result lint on platforms where ImageConfiguration's
	// only use is the round-trip check above; callers needing env/entrypoint
	// read `config.json` back themselves.
	let _ = &config;

	Ok(())
}

async fn pull_layer(client: &Client, reference: &Reference, layer: &OciDescriptor) -> Result<Vec<u8>> {
	let mut bytes = Vec::new();
	client
		.pull_blob(reference, layer, &mut bytes)
		.await
		.map_err(|cause| Error::PullLayer {
			digest: layer.digest.clone(),
			cause,
		})?;

	if let Some(expected) = layer.digest.strip_prefix("sha256:") {
		let mut hasher = Sha256::new();
		hasher.update(&bytes);
		let actual = format!("{:x}", hasher.finalize());
		if actual != expected {
			return Err(Error::LayerDigestMismatch {
				digest: layer.digest.clone(),
				expected: expected.to_owned(),
				actual,
			});
		}
	}

	Ok(bytes)
}

fn extract_layer(layer: &OciDescriptor, bytes: &[u8], rootfs: &Path) -> Result<()> {
	match layer.media_type.as_str() {
		"application/vnd.oci.image.layer.v1.tar+gzip"
		| "application/vnd.docker.image.rootfs.diff.tar.gzip" => {
			let decoder = GzDecoder::new(bytes);
			extract_tar(decoder, rootfs)
		}
		"application/vnd.oci.image.layer.v1.tar" | "application/vnd.docker.image.rootfs.diff.tar" => {
			extract_tar(bytes, rootfs)
		}
		other => Err(Error::UnsupportedMediaType {
			media_type: other.to_owned(),
		}),
	}
}

fn extract_tar(reader: impl Read, rootfs: &Path) -> Result<()> {
	// Mode and mtime are restored by hand below (via `file-mode`/`filetime`)
	// rather than through `tar`'s own preserve flags, so that whiteout
	// handling and permission/mtime restoration happen in the same pass in a
	// defined order.
	let mut archive = tar::Archive::new(reader);

	for entry in archive.entries().map_err(|cause| Error::Io {
		path: rootfs.to_owned(),
		cause,
	})? {
		let mut entry = entry.map_err(|cause| Error::Io {
			path: rootfs.to_owned(),
			cause,
		})?;
		let relative_path = entry.path().map_err(|cause| Error::Io {
			path: rootfs.to_owned(),
			cause,
		})?;

		// OCI whiteouts: `.wh.<name>` removes `<name>` from the lower
		// layers; `.wh..wh..opq` opaques the directory (drop prior
		// contents). Both are applied directly against `rootfs` as each
		// layer is extracted, so later layers correctly shadow earlier ones.
		if let Some(file_name) = relative_path.file_name().and_then(|n| n.to_str()) {
			if file_name == ".wh..wh..opq" {
				if let Some(parent) = relative_path.parent() {
					let target = rootfs.join(parent);
					if target.exists() {
						fs::remove_dir_all(&target).map_err(|cause| Error::Io {
							path: target.clone(),
							cause,
						})?;
						fs::create_dir_all(&target).map_err(|cause| Error::Io { path: target, cause })?;
					}
				}
				continue;
			}
			if let Some(removed_name) = file_name.strip_prefix(".wh.") {
				let target = match relative_path.parent() {
					Some(parent) => rootfs.join(parent).join(removed_name),
					None => rootfs.join(removed_name),
				};
				if target.is_dir() {
					let _ = fs::remove_dir_all(&target);
				} else {
					let _ = fs::remove_file(&target);
				}
				continue;
			}
		}

		let dest = rootfs.join(&relative_path);
		entry.unpack(&dest).map_err(|cause| Error::Io {
			path: dest.clone(),
			cause,
		})?;

		if let Ok(mode) = entry.header().mode() {
			// Best-effort: a layer may list a path whose directory a later
			// whiteout already removed, or the host filesystem may not
			// support the requested bits.
			let _ = dest.set_mode(mode);
		}
		if let Ok(mtime) = entry.header().mtime() {
			let _ = set_file_mtime(&dest, FileTime::from_unix_time(mtime as i64, 0));
		}
	}
	Ok(())
}
