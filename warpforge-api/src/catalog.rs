//! On-disk catalog shapes (spec.md §6 "Catalog on disk", §3 "Catalog").
//!
//! A catalog binds module releases to items, and optionally carries mirror
//! tables mapping wares/packtypes to fetch locations. CID computation
//! (DAG-CBOR + SHA-384, multibase `z`) is out of scope for the core: it
//! only ever compares `CatalogReleaseCID` values for identity, never
//! computes one, so the type is an opaque newtype here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::content::{Packtype, WareID, WarehouseAddr};
use crate::newtype::{ItemLabel, ModuleName, ReleaseName};

/// Opaque identity of a [`CatalogRelease`]: a DAG-CBOR/SHA-384/multibase-z
/// CID, computed outside the core.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub struct CatalogReleaseCID(pub String);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogRelease {
	pub release_name: ReleaseName,
	pub items: IndexMap<ItemLabel, WareID>,
	#[serde(default)]
	pub metadata: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogModule {
	pub name: ModuleName,
	pub releases: IndexMap<ReleaseName, CatalogReleaseCID>,
	#[serde(default)]
	pub metadata: IndexMap<String, String>,
}

/// `ModuleName -> CatalogModule`. A workspace may hold several of these,
/// consulted nearest-workspace-first by the catalog resolver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
	pub modules: IndexMap<ModuleName, CatalogModule>,
}

/// Mirror addresses keyed directly by WareID. Consulted before
/// [`CatalogMirrorsByModule`] when resolving a WarehouseAddr (spec.md
/// §4.1).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogMirrorsByWare {
	pub by_ware: IndexMap<WareID, Vec<WarehouseAddr>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogMirrorsByModule {
	pub by_module: IndexMap<ModuleName, IndexMap<Packtype, Vec<WarehouseAddr>>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogMirrors {
	pub by_ware: CatalogMirrorsByWare,
	pub by_module: CatalogMirrorsByModule,
}
