//! Workspace / WorkspaceSet (spec.md §3 "Workspace / WorkspaceSet", §4.1).
//!
//! The workspace-layout discovery heuristics (walking the filesystem to find
//! `.warpforge` directories) are out of scope: this module only models what
//! the executor consumes once a stack has already been discovered --- a
//! catalog lookup, a cache path, and an is-home predicate per workspace.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use warpforge_api::catalog::{Catalog, CatalogMirrors, CatalogRelease, CatalogReleaseCID};
use warpforge_api::content::{WareID, WarehouseAddr};
use warpforge_api::newtype::ModuleName;
use warpforge_api::plot::CatalogRef;

use crate::{Error, Result};

/// One scope layer in a workspace stack: a directory carrying zero or more
/// catalogs, zero or more mirror tables, and a content-addressed ware cache.
///
/// On disk a catalog module only points at a release by
/// [`CatalogReleaseCID`]; the release document itself (the one holding the
/// item table) is a second file loaded separately. `releases` models that
/// second file, keyed by the CID the module points at.
pub struct Workspace {
	root: PathBuf,
	home: bool,
	catalogs: Vec<Catalog>,
	releases: IndexMap<CatalogReleaseCID, CatalogRelease>,
	mirrors: Vec<CatalogMirrors>,
}

impl Workspace {
	pub fn new(root: impl Into<PathBuf>, home: bool) -> Self {
		Workspace {
			root: root.into(),
			home,
			catalogs: Vec::new(),
			releases: IndexMap::new(),
			mirrors: Vec::new(),
		}
	}

	pub fn with_catalog(mut self, catalog: Catalog) -> Self {
		self.catalogs.push(catalog);
		self
	}

	pub fn with_release(mut self, cid: CatalogReleaseCID, release: CatalogRelease) -> Self {
		self.releases.insert(cid, release);
		self
	}

	pub fn with_mirrors(mut self, mirrors: CatalogMirrors) -> Self {
		self.mirrors.push(mirrors);
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn is_home(&self) -> bool {
		self.home
	}

	/// Content-addressed cache path for `ware_id` within this workspace,
	/// `<root>/.warpforge/cache/<packtype>/<hash>`. Presence of this path is
	/// the atomicity signal spec.md §5 relies on: the core never writes it
	/// directly, only checks for its existence.
	pub fn cache_path(&self, ware_id: &WareID) -> PathBuf {
		self.root
			.join(".warpforge")
			.join("cache")
			.join(&ware_id.packtype.0)
			.join(&ware_id.hash)
	}

	/// Looks up `catalog_ref` in this workspace's own catalogs only (spec.md
	/// §4.1's per-workspace consultation step): module, then release, then
	/// item. Returns `None` when no catalog in this workspace defines the
	/// module/release/item triple -- that is not an error, the caller walks
	/// on to the next workspace.
	fn lookup_ware(&self, catalog_ref: &CatalogRef) -> Option<&WareID> {
		self.catalogs.iter().find_map(|catalog| {
			let module = catalog.modules.get(&catalog_ref.module_name)?;
			let release_cid = module.releases.get(&catalog_ref.release_name)?;
			let release = self.releases.get(release_cid)?;
			release.items.get(&catalog_ref.item_name)
		})
	}

	/// Consults this workspace's mirror tables for `ware_id`, by-Ware first,
	/// then by-Module/packtype (spec.md §4.1's tie-break: first matching
	/// entry within a single workspace wins).
	fn lookup_mirror(&self, ware_id: &WareID, module_name: &ModuleName) -> Option<WarehouseAddr> {
		for mirrors in &self.mirrors {
			if let Some(addrs) = mirrors.by_ware.by_ware.get(ware_id) {
				if let Some(first) = addrs.first() {
					return Some(first.clone());
				}
			}
		}
		for mirrors in &self.mirrors {
			if let Some(by_packtype) = mirrors.by_module.by_module.get(module_name) {
				if let Some(addrs) = by_packtype.get(&ware_id.packtype) {
					if let Some(first) = addrs.first() {
						return Some(first.clone());
					}
				}
			}
		}
		None
	}
}

/// An ordered stack of [`Workspace`]s, nearest-first, plus the designated
/// home workspace (spec.md §3).
pub struct WorkspaceSet {
	pub stack: Vec<Workspace>,
}

impl WorkspaceSet {
	pub fn new(stack: Vec<Workspace>) -> Self {
		WorkspaceSet { stack }
	}

	/// The home workspace, used for the ware cache during ingest and as the
	/// sandbox driver's execution context (spec.md §4.3, §4.7).
	pub fn home(&self) -> Result<&Workspace> {
		self.stack.iter().find(|ws| ws.is_home()).ok_or_else(|| Error::Workspace {
			path: "<workspace stack>".into(),
			cause: Box::new(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"no home workspace in stack",
			)),
		})
	}

	/// Nearest-first catalog resolution (spec.md §4.1): the first workspace
	/// to yield a WareID wins, and that same workspace's mirror tables (not
	/// a farther one's) are consulted for a WarehouseAddr.
	pub fn resolve_catalog_ref(
		&self,
		catalog_ref: &CatalogRef,
	) -> Result<(WareID, Option<WarehouseAddr>)> {
		for ws in &self.stack {
			if let Some(ware_id) = ws.lookup_ware(catalog_ref) {
				let addr = ws.lookup_mirror(ware_id, &catalog_ref.module_name);
				return Ok((ware_id.clone(), addr));
			}
		}
		Err(Error::CatalogMissingEntry {
			catalog_ref: catalog_ref.to_ref_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warpforge_api::catalog::{CatalogModule, CatalogRelease};
	use warpforge_api::newtype::{ItemLabel, ReleaseName};

	fn ref_for(module: &str, release: &str, item: &str) -> CatalogRef {
		CatalogRef {
			module_name: ModuleName(module.into()),
			release_name: ReleaseName(release.into()),
			item_name: ItemLabel(item.into()),
		}
	}

	fn workspace_with(home: bool, module: &str, release: &str, item: &str, ware_id: WareID) -> Workspace {
		let cid = CatalogReleaseCID(format!("{module}-{release}-cid"));
		let mut modules = IndexMap::new();
		modules.insert(
			ModuleName(module.into()),
			CatalogModule {
				name: ModuleName(module.into()),
				releases: IndexMap::from([(ReleaseName(release.into()), cid.clone())]),
				metadata: IndexMap::new(),
			},
		);
		let mut items = IndexMap::new();
		items.insert(ItemLabel(item.into()), ware_id);
		Workspace::new("/tmp/does-not-matter", home)
			.with_catalog(Catalog { modules })
			.with_release(
				cid,
				CatalogRelease {
					release_name: ReleaseName(release.into()),
					items,
					metadata: IndexMap::new(),
				},
			)
	}

	#[test]
	fn nearer_workspace_wins() {
		let near = workspace_with(false, "m", "r", "i", WareID::new("tar", "near"));
		let far = workspace_with(true, "m", "r", "i", WareID::new("tar", "far"));
		let workspaces = WorkspaceSet::new(vec![near, far]);

		let (ware_id, _) = workspaces.resolve_catalog_ref(&ref_for("m", "r", "i")).unwrap();
		assert_eq!(ware_id, WareID::new("tar", "near"));
	}

	#[test]
	fn falls_through_to_farther_workspace_when_not_found() {
		let near = workspace_with(false, "other", "r", "i", WareID::new("tar", "x"));
		let far = workspace_with(true, "m", "r", "i", WareID::new("tar", "far"));
		let workspaces = WorkspaceSet::new(vec![near, far]);

		let (ware_id, _) = workspaces.resolve_catalog_ref(&ref_for("m", "r", "i")).unwrap();
		assert_eq!(ware_id, WareID::new("tar", "far"));
	}

	#[test]
	fn missing_entry_in_every_workspace_errors() {
		let home = Workspace::new("/tmp/does-not-matter", true);
		let workspaces = WorkspaceSet::new(vec![home]);

		let err = workspaces
			.resolve_catalog_ref(&ref_for("no", "such", "thing"))
			.unwrap_err();
		assert!(matches!(err, Error::CatalogMissingEntry { .. }));
	}

	#[test]
	fn nearer_wareid_without_mirror_does_not_fall_through_for_address() {
		let ware_id = WareID::new("tar", "shared");
		let near = workspace_with(false, "m", "r", "i", ware_id.clone());
		let far_mirrors = CatalogMirrors {
			by_ware: warpforge_api::catalog::CatalogMirrorsByWare {
				by_ware: IndexMap::from([(
					ware_id.clone(),
					vec![WarehouseAddr("ca+file:///far/".into())],
				)]),
			},
			by_module: Default::default(),
		};
		let far = workspace_with(true, "m", "r", "i", ware_id).with_mirrors(far_mirrors);
		let workspaces = WorkspaceSet::new(vec![near, far]);

		let (_, addr) = workspaces.resolve_catalog_ref(&ref_for("m", "r", "i")).unwrap();
		assert!(addr.is_none());
	}
}
