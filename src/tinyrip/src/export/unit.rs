//! Export units
//!
//! A unit is the set of assets written into one output document. Units own
//! their identifier allocator and fix their asset order when built, so
//! identifier assignment and output order repeat exactly across runs.

use std::collections::VecDeque;
use std::fmt;

use crate::asset::{AssetKey, FileId};
use crate::collection::FileCollection;
use crate::document::Document;
use crate::export::allocator::{main_object_id, ExportIdAllocator};
use crate::export::{exporter, reconstruct, ExportContext};
use crate::schema::ClassId;
use crate::{Error, Result};

/// Variant tag of an export unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// One standalone asset plus the hierarchy objects it pulls in
    Asset,
    /// Every object of a scene file
    Scene,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Scene => "scene",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every unit variant
pub trait ExportableUnit: Send + Sync {
    /// Output document path, relative to the export root
    fn name(&self) -> &str;

    fn kind(&self) -> UnitKind;

    fn contains(&self, key: AssetKey) -> bool;

    fn export_id_of(&self, key: AssetKey) -> Option<i64>;

    /// Included assets in output order
    fn assets(&self) -> &[AssetKey];

    /// Render every included asset as a document
    fn export(&self, ctx: &mut ExportContext<'_>) -> Result<Vec<Document>>;
}

/// Standalone asset document (`<Class>/<name>.asset`)
#[derive(Debug)]
pub struct AssetUnit {
    name: String,
    root: AssetKey,
    ids: ExportIdAllocator,
}

impl AssetUnit {
    /// Build a unit rooted at `root`
    ///
    /// Hierarchy objects reachable from the root through same-file
    /// references are included in discovery order unless `is_claimed`
    /// reports them as owned by another unit.
    pub fn build(
        collection: &FileCollection,
        root: AssetKey,
        name: String,
        is_claimed: impl Fn(AssetKey) -> bool,
    ) -> Result<Self> {
        let asset = collection
            .asset(root)
            .ok_or_else(|| Error::AssetNotFound(root.to_string()))?;
        let identity = file_identity(collection, root.file);

        let mut ids = ExportIdAllocator::new();
        ids.reserve(root, asset.class, identity, main_object_id(asset.class))?;

        let mut queue = VecDeque::from([root]);
        while let Some(key) = queue.pop_front() {
            let Some(current) = collection.asset(key) else {
                continue;
            };
            for reference in current.references() {
                let Some(target) = collection.resolve(reference, key.file).found() else {
                    continue;
                };
                if target.key.file != root.file
                    || !target.class.is_hierarchy()
                    || ids.contains(target.key)
                    || is_claimed(target.key)
                {
                    continue;
                }
                ids.add(target.key, target.class, identity)?;
                queue.push_back(target.key);
            }
        }

        Ok(Self { name, root, ids })
    }

    pub fn root(&self) -> AssetKey {
        self.root
    }
}

impl ExportableUnit for AssetUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Asset
    }

    fn contains(&self, key: AssetKey) -> bool {
        self.ids.contains(key)
    }

    fn export_id_of(&self, key: AssetKey) -> Option<i64> {
        self.ids.export_id(key)
    }

    fn assets(&self) -> &[AssetKey] {
        self.ids.order()
    }

    fn export(&self, ctx: &mut ExportContext<'_>) -> Result<Vec<Document>> {
        exporter::export_documents(self.assets(), ctx)
    }
}

/// Scene document (`Scenes/<file>.unity`); identifiers are the path ids
#[derive(Debug)]
pub struct SceneUnit {
    name: String,
    file: FileId,
    ids: ExportIdAllocator,
}

impl SceneUnit {
    pub fn build(collection: &FileCollection, file: FileId, name: String) -> Result<Self> {
        let source = collection
            .file(file)
            .ok_or_else(|| Error::AssetNotFound(format!("file {}", file.0)))?;

        let mut ids = ExportIdAllocator::new();
        for asset in source.assets() {
            ids.reserve(asset.key, asset.class, source.identity(), asset.key.path_id)?;
        }

        Ok(Self { name, file, ids })
    }

    pub fn file(&self) -> FileId {
        self.file
    }
}

impl ExportableUnit for SceneUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Scene
    }

    fn contains(&self, key: AssetKey) -> bool {
        self.ids.contains(key)
    }

    fn export_id_of(&self, key: AssetKey) -> Option<i64> {
        self.ids.export_id(key)
    }

    fn assets(&self) -> &[AssetKey] {
        self.ids.order()
    }

    fn export(&self, ctx: &mut ExportContext<'_>) -> Result<Vec<Document>> {
        exporter::export_documents(self.assets(), ctx)
    }
}

/// `OcclusionCullingData` rebuilt from the settings of a pre-5.5 scene
///
/// Owns no source asset: its single document is synthesized at export time
/// and points into the scene unit that owns the settings.
#[derive(Debug)]
pub struct OcclusionDataUnit {
    name: String,
    settings: AssetKey,
}

impl OcclusionDataUnit {
    pub fn new(settings: AssetKey, name: String) -> Self {
        Self { name, settings }
    }

    pub fn settings(&self) -> AssetKey {
        self.settings
    }
}

impl ExportableUnit for OcclusionDataUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Asset
    }

    fn contains(&self, _key: AssetKey) -> bool {
        false
    }

    fn export_id_of(&self, _key: AssetKey) -> Option<i64> {
        None
    }

    fn assets(&self) -> &[AssetKey] {
        &[]
    }

    fn export(&self, ctx: &mut ExportContext<'_>) -> Result<Vec<Document>> {
        let settings = ctx
            .collection()
            .asset(self.settings)
            .ok_or_else(|| Error::AssetNotFound(self.settings.to_string()))?;
        let data = reconstruct::legacy_data(settings, ctx)?;
        let body = exporter::export_asset(&data, ctx)?;
        ctx.report.exported += 1;

        let class = ClassId::OCCLUSION_CULLING_DATA;
        Ok(vec![Document {
            class_id: class.0,
            file_id: main_object_id(class),
            class_name: class.name().to_string(),
            body,
        }])
    }
}

fn file_identity(collection: &FileCollection, file: FileId) -> &str {
    collection.file(file).map(|f| f.identity()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Fields, Reference};
    use crate::schema::ClassId;
    use crate::testing::{game_object_fields, renderer_fields, v, FileBuilder, RELEASE};

    fn collection() -> FileCollection {
        let mut c = FileCollection::new();
        c.add(
            FileBuilder::new("sharedassets0.assets", v("2017.4.1f1"), RELEASE)
                .dependency("level0")
                // Opaque root referencing nothing
                .asset(1, ClassId(4242), Fields::new())
                .asset(2, ClassId::GAME_OBJECT, game_object_fields("Door", &[Reference::local(3)]))
                .asset(3, ClassId::MESH_RENDERER, renderer_fields(Reference::local(2), &[]))
                .asset(4, ClassId::MONO_SCRIPT, Fields::new())
                .build(),
        )
        .unwrap();
        c
    }

    fn key(path_id: i64) -> AssetKey {
        AssetKey::new(FileId(0), path_id)
    }

    #[test]
    fn test_asset_unit_discovers_hierarchy() {
        let c = collection();
        let unit =
            AssetUnit::build(&c, key(2), "GameObject/Door.prefab".into(), |_| false).unwrap();
        assert_eq!(unit.assets(), &[key(2), key(3)]);
        assert_eq!(unit.export_id_of(key(2)), Some(100_000));
        assert!(unit.export_id_of(key(3)).is_some());
        assert!(!unit.contains(key(4)));
        assert_eq!(unit.kind(), UnitKind::Asset);
    }

    #[test]
    fn test_asset_unit_respects_claims() {
        let c = collection();
        let unit = AssetUnit::build(&c, key(2), "x".into(), |k| k == key(3)).unwrap();
        assert_eq!(unit.assets(), &[key(2)]);
    }

    #[test]
    fn test_asset_unit_missing_root() {
        let c = collection();
        assert!(matches!(
            AssetUnit::build(&c, key(77), "x".into(), |_| false),
            Err(Error::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_scene_unit_uses_path_ids() {
        let c = collection();
        let unit = SceneUnit::build(&c, FileId(0), "Scenes/level0.unity".into()).unwrap();
        assert_eq!(unit.assets().len(), 4);
        for path_id in 1..=4 {
            assert_eq!(unit.export_id_of(key(path_id)), Some(path_id));
        }
        assert_eq!(unit.kind().to_string(), "scene");
    }
}
