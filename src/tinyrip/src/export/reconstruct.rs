//! Derived data reconstruction
//!
//! Release builds strip `m_StaticRenderers` and `m_Portals` from
//! `OcclusionCullingData`. The same objects are still listed by the
//! `OcclusionCullingSettings` of every scene the data covers, so they can be
//! rebuilt: each scene descriptor in `m_Scenes` names a scene GUID and the
//! `(index, size)` window its objects occupy in the backing arrays.
//!
//! Before 5.5 there is no data asset at all: the PVS data and object lists
//! live on the settings themselves. [`legacy_data`] builds the
//! `OcclusionCullingData` the editor would have created from them, with a
//! single scene covering every listed object.
//!
//! Reconstruction never mutates the asset. It returns a backfill overlay the
//! exporter reads derived fields from. The only cached state is the list of
//! matching sibling settings, computed once per asset.

use tracing::debug;

use crate::asset::{Asset, AssetKey, Fields, Value};
use crate::collection::{DanglingReference, FileCollection, Lookup};
use crate::export::ExportContext;
use crate::hash::{fnv1a_hash, key_hash};
use crate::schema::ClassId;
use crate::version::{BuildFlags, Version};
use crate::{Error, Result};

/// PVS data moved from the settings into a separate asset in 5.5
const SCENE_BOUND_SINCE: Version = Version::new(5, 5, 0);

/// Upper bound on a rebuilt renderer or portal array
pub const MAX_BACKING_LEN: usize = 1 << 20;

/// Scene descriptor of an `OcclusionCullingData`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcclusionScene {
    pub index_renderers: i32,
    pub size_renderers: i32,
    pub index_portals: i32,
    pub size_portals: i32,
    pub scene: [u8; 16],
}

impl OcclusionScene {
    fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_record()?;
        let int = |name: &str| record.get(name).and_then(Value::as_int).map(|v| v as i32);
        Some(Self {
            index_renderers: int("indexRenderers")?,
            size_renderers: int("sizeRenderers")?,
            index_portals: int("indexPortals")?,
            size_portals: int("sizePortals")?,
            scene: *record.get("scene").and_then(Value::as_guid)?,
        })
    }
}

/// End of the window `[index, index + size)`, `None` when negative or overflowing
fn region_end(index: i32, size: i32) -> Option<usize> {
    let index = usize::try_from(index).ok()?;
    index.checked_add(usize::try_from(size).ok()?)
}

/// Scene descriptors of `asset`, in stored order
pub fn scenes(asset: &Asset) -> Vec<OcclusionScene> {
    asset
        .get("m_Scenes")
        .and_then(Value::as_sequence)
        .map(|items| items.iter().filter_map(OcclusionScene::from_value).collect())
        .unwrap_or_default()
}

/// `OcclusionCullingSettings` whose scene GUID matches a scene of `asset`,
/// scanned once and cached on the asset
pub fn sources<'c>(asset: &Asset, collection: &'c FileCollection) -> Vec<&'c Asset> {
    let keys = asset.sources.get_or_init(|| {
        let guids: Vec<[u8; 16]> = scenes(asset).iter().map(|s| s.scene).collect();
        collection
            .assets()
            .filter(|a| a.class == ClassId::OCCLUSION_CULLING_SETTINGS)
            .filter(|a| {
                a.get("m_SceneGUID")
                    .and_then(Value::as_guid)
                    .is_some_and(|guid| guids.contains(guid))
            })
            .map(|a| a.key)
            .collect()
    });
    keys.iter().filter_map(|&key| collection.asset(key)).collect()
}

/// Rebuild the fields `asset` is missing under its build flags
///
/// Returns an empty overlay when nothing is stripped.
pub fn backfill(asset: &Asset, ctx: &mut ExportContext<'_>) -> Result<Fields> {
    let layout = asset.layout();
    let derived: Vec<_> = layout.derived(asset.flags).map(|spec| spec.name).collect();
    if derived.is_empty() {
        return Ok(Fields::new());
    }

    if asset.class != ClassId::OCCLUSION_CULLING_DATA || asset.version < SCENE_BOUND_SINCE {
        // Nothing to rebuild from; emit the stripped arrays empty
        return Ok(derived
            .into_iter()
            .fold(Fields::new(), |fields, name| fields.with(name, Value::Sequence(Vec::new()))));
    }

    occlusion_backfill(asset, ctx)
}

fn occlusion_backfill(asset: &Asset, ctx: &mut ExportContext<'_>) -> Result<Fields> {
    let collection = ctx.collection();
    let scenes = scenes(asset);
    let siblings = sources(asset, collection);

    let matched: Vec<(OcclusionScene, &Asset)> = scenes
        .iter()
        .filter_map(|scene| {
            siblings
                .iter()
                .find(|s| s.get("m_SceneGUID").and_then(Value::as_guid) == Some(&scene.scene))
                .map(|s| (*scene, *s))
        })
        .collect();

    // Validate everything before writing anything
    for (scene, sibling) in &matched {
        check_count(asset, sibling, "m_StaticRenderers", "renderers", scene.size_renderers)?;
        check_count(asset, sibling, "m_Portals", "portals", scene.size_portals)?;
    }

    let renderer_len = backing_len(asset, &scenes, "renderers", |s| {
        (s.index_renderers, s.size_renderers)
    })?;
    let portal_len = backing_len(asset, &scenes, "portals", |s| (s.index_portals, s.size_portals))?;
    let mut renderers = vec![0i64; renderer_len];
    let mut portals = vec![0i64; portal_len];

    for (scene, sibling) in &matched {
        fill(asset, sibling, "m_StaticRenderers", scene.index_renderers, &mut renderers, ctx);
        fill(asset, sibling, "m_Portals", scene.index_portals, &mut portals, ctx);
    }

    Ok(Fields::new()
        .with("m_StaticRenderers", identifiers(renderers))
        .with("m_Portals", identifiers(portals)))
}

/// Settings written before the data asset existed
pub fn is_legacy_settings(asset: &Asset) -> bool {
    asset.class == ClassId::OCCLUSION_CULLING_SETTINGS && asset.version < SCENE_BOUND_SINCE
}

/// Legacy settings that carry baked PVS data worth a data asset
pub fn has_legacy_pvs(asset: &Asset) -> bool {
    is_legacy_settings(asset)
        && asset
            .get("m_PVSData")
            .is_some_and(|pvs| matches!(pvs, Value::Bytes(bytes) if !bytes.is_empty()))
}

/// Scene GUID given to data rebuilt from legacy settings, stable per file
pub fn legacy_scene_guid(identity: &str) -> [u8; 16] {
    let mut guid = [0u8; 16];
    guid[..8].copy_from_slice(&fnv1a_hash(identity.as_bytes()).to_le_bytes());
    guid[8..].copy_from_slice(&key_hash(identity, 0).to_le_bytes());
    guid
}

/// Build an editor-form `OcclusionCullingData` from pre-5.5 settings
///
/// The record keeps the settings' key and version so diagnostics point at
/// the object the data came from.
pub fn legacy_data(settings: &Asset, ctx: &mut ExportContext<'_>) -> Result<Asset> {
    if !is_legacy_settings(settings) {
        return Err(Error::AssetNotFound(format!(
            "{} {} is not pre-5.5 occlusion settings",
            settings.class, settings.key
        )));
    }

    let identity = ctx
        .collection()
        .file(settings.key.file)
        .map(|f| f.identity().to_string())
        .unwrap_or_default();
    let renderer_count = sibling_refs(settings, "m_StaticRenderers").len();
    let portal_count = sibling_refs(settings, "m_Portals").len();
    let count = |n: usize, kind: &'static str| {
        i32::try_from(n).map_err(|_| Error::InvalidRegion {
            asset: settings.key.to_string(),
            kind,
            index: 0,
            size: i32::MAX,
            total: n,
        })
    };
    let scene = Fields::new()
        .with("indexRenderers", Value::Int(0))
        .with("sizeRenderers", Value::Int(count(renderer_count, "renderers")?.into()))
        .with("indexPortals", Value::Int(0))
        .with("sizePortals", Value::Int(count(portal_count, "portals")?.into()))
        .with("scene", Value::Guid(legacy_scene_guid(&identity)));

    let mut renderers = vec![0i64; renderer_count];
    let mut portals = vec![0i64; portal_count];
    fill(settings, settings, "m_StaticRenderers", 0, &mut renderers, ctx);
    fill(settings, settings, "m_Portals", 0, &mut portals, ctx);

    let pvs = settings
        .get("m_PVSData")
        .cloned()
        .unwrap_or(Value::Bytes(Vec::new()));
    let fields = Fields::new()
        .with("m_ObjectHideFlags", Value::UInt(0))
        .with("m_Name", Value::String(ClassId::OCCLUSION_CULLING_DATA.name().to_string()))
        .with("m_PVSData", pvs)
        .with("m_Scenes", Value::Sequence(vec![Value::Record(scene)]))
        .with("m_StaticRenderers", identifiers(renderers))
        .with("m_Portals", identifiers(portals));

    debug!(
        "Rebuilt occlusion data from {}: {} renderers, {} portals",
        settings.key, renderer_count, portal_count
    );
    Ok(Asset::new(
        settings.key,
        ClassId::OCCLUSION_CULLING_DATA,
        settings.version,
        BuildFlags::NONE,
        fields,
    ))
}

/// Length of a backing array: the furthest window end over all scenes
///
/// Windows tile the array, so no end may pass the sum of all window sizes.
fn backing_len(
    asset: &Asset,
    scenes: &[OcclusionScene],
    kind: &'static str,
    window: impl Fn(&OcclusionScene) -> (i32, i32),
) -> Result<usize> {
    let total = scenes
        .iter()
        .map(|s| usize::try_from(window(s).1).unwrap_or(0))
        .fold(0usize, usize::saturating_add)
        .min(MAX_BACKING_LEN);

    let mut len = 0;
    for scene in scenes {
        let (index, size) = window(scene);
        let end = region_end(index, size)
            .filter(|&end| end <= total)
            .ok_or_else(|| Error::InvalidRegion {
                asset: asset.key.to_string(),
                kind,
                index,
                size,
                total,
            })?;
        len = len.max(end);
    }
    Ok(len)
}

fn sibling_refs<'a>(sibling: &'a Asset, field: &str) -> &'a [Value] {
    sibling
        .get(field)
        .and_then(Value::as_sequence)
        .unwrap_or_default()
}

fn check_count(
    asset: &Asset,
    sibling: &Asset,
    field: &str,
    kind: &'static str,
    expected: i32,
) -> Result<()> {
    let actual = sibling_refs(sibling, field).len();
    let expected = expected.max(0) as usize;
    if actual != expected {
        debug!(
            "{} expects {} {} from {}, found {}",
            asset.key, expected, kind, sibling.key, actual
        );
        return Err(Error::InconsistentSiblingData {
            asset: asset.key.to_string(),
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

fn fill(
    asset: &Asset,
    sibling: &Asset,
    field: &str,
    index: i32,
    out: &mut [i64],
    ctx: &mut ExportContext<'_>,
) {
    let collection = ctx.collection();
    let base = index.max(0) as usize;
    for (offset, value) in sibling_refs(sibling, field).iter().enumerate() {
        let Some(reference) = value.as_reference() else {
            continue;
        };
        // Sibling pointers are relative to the sibling's own file
        let id = match collection.resolve(reference, sibling.key.file) {
            Lookup::Null => 0,
            Lookup::Found(target) => match ctx.export_id_of(target.key) {
                Some(id) => id,
                None => {
                    let dangling =
                        unexported(collection, sibling.key, reference.file_index, target.key);
                    ctx.dangling(asset.key, dangling);
                    0
                }
            },
            Lookup::Dangling(dangling) => {
                ctx.dangling(asset.key, dangling);
                0
            }
        };
        if let Some(slot) = out.get_mut(base + offset) {
            *slot = id;
        }
    }
}

fn unexported(
    collection: &FileCollection,
    from: AssetKey,
    file_index: i32,
    target: AssetKey,
) -> DanglingReference {
    let identity = |key: AssetKey| {
        collection
            .file(key.file)
            .map(|f| f.identity().to_string())
            .unwrap_or_default()
    };
    DanglingReference {
        from_file: identity(from),
        file_index,
        path_id: target.path_id,
        target_file: Some(identity(target)),
    }
}

fn identifiers(ids: Vec<i64>) -> Value {
    Value::Sequence(
        ids.into_iter()
            .map(|id| {
                Value::Record(
                    Fields::new()
                        .with("targetObject", Value::Int(id))
                        .with("targetPrefab", Value::Int(0)),
                )
            })
            .collect(),
    )
}
