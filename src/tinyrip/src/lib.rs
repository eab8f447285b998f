//! Asset extraction for versioned serialized-file containers
//!
//! Decodes the objects stored in serialized files (asset bundles, scene
//! levels, `.assets` files) into typed records and re-serializes them as
//! YAML documents, keeping cross-file references intact.
//!
//! # Pipeline
//!
//! 1. [`FileCollection`] loads every container of a run and resolves
//!    `(file_index, path_id)` references between them.
//! 2. [`Project`] partitions the assets into export units. Each unit owns an
//!    [`ExportIdAllocator`] handing out stable, collision-free identifiers.
//! 3. Exporting a unit backfills fields stripped from release builds
//!    ([`export::reconstruct`]) and renders each asset as a document node
//!    whose references are rewritten to `{fileID, fileIndex}` pairs.
//!
//! # Version policy
//!
//! Which fields an object carries on disk depends on the producer version
//! and the build flags. The layout tables in [`schema`] spell every
//! transition out as an explicit predicate; [`policy`] answers queries over
//! them.

mod asset;
mod collection;
pub mod document;
pub mod export;
mod file;
mod hash;
pub mod policy;
pub mod reader;
mod report;
pub mod schema;
mod script;
mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use asset::{Asset, AssetKey, Fields, FileId, Reference, Value};
pub use collection::{DanglingReference, FileCollection, Lookup};
pub use document::{Mapping, Node, Scalar};
pub use export::{
    AssetUnit, ExportContext, ExportIdAllocator, ExportableUnit, OcclusionDataUnit, Project,
    ProjectOptions, SceneUnit, UnitKind,
};
pub use file::{normalize_identity, External, ObjectInfo, SerializedFile};
pub use hash::{fnv1a_hash, key_hash};
pub use report::{Diagnostic, FailedUnit, RunReport, SkippedAsset, UnitReport};
pub use schema::ClassId;
pub use script::{MonoScriptResolver, ScriptType, ScriptTypeResolver};
pub use version::{BuildFlags, Version, VersionKind};

/// Errors from decoding and exporting
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Data too short: need {needed} bytes, got {actual}")]
    DataTooShort { needed: usize, actual: usize },

    #[error("Invalid container header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported container generation {0}")]
    UnsupportedGeneration(u32),

    #[error("Invalid version string: {0:?}")]
    InvalidVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate file identity in collection: {0}")]
    DuplicateFile(String),

    #[error("Duplicate path id {path_id} in {file}")]
    DuplicatePathId { file: String, path_id: i64 },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset {asset} is already owned by unit {unit}")]
    AlreadyOwned { asset: String, unit: String },

    #[error("Inconsistent sibling data for {asset}: expected {expected} {kind}, found {actual}")]
    InconsistentSiblingData {
        asset: String,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {kind} window in {asset}: index {index}, size {size} (windows total {total})")]
    InvalidRegion {
        asset: String,
        kind: &'static str,
        index: i32,
        size: i32,
        total: usize,
    },

    #[error("Export id space exhausted for {class} after {attempts} attempts")]
    AllocatorExhaustion { class: ClassId, attempts: u32 },

    #[error("Missing derived field {field} for {class}")]
    MissingDerivedField { class: ClassId, field: &'static str },

    #[error("Import error: {0}")]
    Import(String),
}

impl Error {
    /// Errors that spoil one asset's data but leave the rest of its unit
    /// exportable
    pub fn is_asset_local(&self) -> bool {
        matches!(self, Self::InconsistentSiblingData { .. } | Self::InvalidRegion { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
