//! Class ids, field specs and per-class record layouts
//!
//! Each class has an ordered table of layouts, one per format variant,
//! keyed by the version that introduced it. Inside a layout every field
//! carries an explicit presence predicate; nothing is implied by "newest
//! wins". The field order of a layout is also the output field order.

use std::fmt;

use crate::version::{Version, VersionKind};

/// Oldest producer version this crate knows how to read
pub const MIN_SUPPORTED: Version = Version::new(3, 0, 0);

/// Newest producer version the layout tables were verified against
pub const LATEST_KNOWN: Version = Version::new(2019, 4, 40).with_build(VersionKind::Final, 1);

/// First version series past the verified window
pub const FIRST_UNKNOWN: Version = Version::new(2020, 1, 0);

const V4_3: Version = Version::new(4, 3, 0);
const V5_0: Version = Version::new(5, 0, 0);
const V5_5: Version = Version::new(5, 5, 0);
const V2018_2: Version = Version::new(2018, 2, 0);

/// Numeric class id ("type tag") of a serialized object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub i32);

impl ClassId {
    pub const GAME_OBJECT: Self = Self(1);
    pub const MESH_RENDERER: Self = Self(23);
    pub const OCCLUSION_CULLING_SETTINGS: Self = Self(29);
    pub const MONO_BEHAVIOUR: Self = Self(114);
    pub const MONO_SCRIPT: Self = Self(115);
    pub const OCCLUSION_CULLING_DATA: Self = Self(363);
    pub const OCCLUSION_PORTAL: Self = Self(1034);

    /// Class name used as the document root key
    pub fn name(self) -> &'static str {
        match self {
            Self::GAME_OBJECT => "GameObject",
            Self::MESH_RENDERER => "MeshRenderer",
            Self::OCCLUSION_CULLING_SETTINGS => "OcclusionCullingSettings",
            Self::MONO_BEHAVIOUR => "MonoBehaviour",
            Self::MONO_SCRIPT => "MonoScript",
            Self::OCCLUSION_CULLING_DATA => "OcclusionCullingData",
            Self::OCCLUSION_PORTAL => "OcclusionPortal",
            _ => "Object",
        }
    }

    /// Whether the layout tables know this class
    pub fn is_known(self) -> bool {
        self.name() != "Object"
    }

    /// Scene hierarchy classes travel with the asset that references them
    /// instead of getting a document of their own.
    pub fn is_hierarchy(self) -> bool {
        matches!(
            self,
            Self::GAME_OBJECT | Self::MESH_RENDERER | Self::MONO_BEHAVIOUR | Self::OCCLUSION_PORTAL
        )
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Wire type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    U8,
    U16,
    U32,
    I32,
    I64,
    F32,
    /// Length-prefixed UTF-8, aligned to 4 afterwards
    String,
    /// Length-prefixed byte array
    Bytes,
    /// 16 raw bytes (GUIDs and 128-bit hashes)
    Guid,
    /// `(file_index, path_id)` object pointer
    Pointer,
    /// Object pointer whose target is a compiled script
    ScriptPointer,
    Struct(&'static [FieldSpec]),
    Array(&'static FieldKind),
    /// Every byte left in the object
    Remainder,
}

/// Version and build-flag predicate deciding whether a field is on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub since: Option<Version>,
    pub before: Option<Version>,
    pub editor_only: bool,
}

impl Presence {
    pub const ALWAYS: Self = Self {
        since: None,
        before: None,
        editor_only: false,
    };

    /// Whether the field exists at all for this version
    pub fn holds_for_version(&self, version: Version) -> bool {
        self.since.map_or(true, |since| version >= since)
            && self.before.map_or(true, |before| version < before)
    }

    /// Whether the field is actually serialized for this version and build
    pub fn holds(&self, version: Version, flags: crate::BuildFlags) -> bool {
        self.holds_for_version(version) && !(self.editor_only && flags.is_release())
    }
}

/// One field of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
    /// Align the stream to 4 bytes after reading this field
    pub align: bool,
    /// Stripped fields that can be rebuilt from sibling assets
    pub derived: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::ALWAYS,
            align: false,
            derived: false,
        }
    }

    pub const fn since(self, version: Version) -> Self {
        Self {
            presence: Presence {
                since: Some(version),
                ..self.presence
            },
            ..self
        }
    }

    pub const fn before(self, version: Version) -> Self {
        Self {
            presence: Presence {
                before: Some(version),
                ..self.presence
            },
            ..self
        }
    }

    pub const fn editor_only(self) -> Self {
        Self {
            presence: Presence {
                editor_only: true,
                ..self.presence
            },
            ..self
        }
    }

    pub const fn aligned(self) -> Self {
        Self {
            align: true,
            ..self
        }
    }

    pub const fn derived(self) -> Self {
        Self {
            derived: true,
            ..self
        }
    }
}

/// Record layout of one class variant
#[derive(Debug)]
pub struct Layout {
    pub class: ClassId,
    pub variant: &'static str,
    /// First producer version using this variant
    pub since: Version,
    pub fields: &'static [FieldSpec],
}

const HIDE_FLAGS: FieldSpec = FieldSpec::new("m_ObjectHideFlags", FieldKind::U32).editor_only();

pub const VECTOR3: &[FieldSpec] = &[
    FieldSpec::new("x", FieldKind::F32),
    FieldSpec::new("y", FieldKind::F32),
    FieldSpec::new("z", FieldKind::F32),
];

pub const COMPONENT_PAIR_LEGACY: &[FieldSpec] = &[
    FieldSpec::new("first", FieldKind::I32),
    FieldSpec::new("second", FieldKind::Pointer),
];

pub const COMPONENT_PAIR: &[FieldSpec] = &[FieldSpec::new("component", FieldKind::Pointer)];

/// Region descriptor inside OcclusionCullingData
pub const OCCLUSION_SCENE: &[FieldSpec] = &[
    FieldSpec::new("indexRenderers", FieldKind::I32),
    FieldSpec::new("sizeRenderers", FieldKind::I32),
    FieldSpec::new("indexPortals", FieldKind::I32),
    FieldSpec::new("sizePortals", FieldKind::I32),
    FieldSpec::new("scene", FieldKind::Guid),
];

/// Scene-local object identifier stored by OcclusionCullingData
pub const SCENE_OBJECT_IDENTIFIER: &[FieldSpec] = &[
    FieldSpec::new("targetObject", FieldKind::I64),
    FieldSpec::new("targetPrefab", FieldKind::I64),
];

pub const OCCLUSION_BAKE_SETTINGS: &[FieldSpec] = &[
    FieldSpec::new("smallestOccluder", FieldKind::F32),
    FieldSpec::new("smallestHole", FieldKind::F32),
    FieldSpec::new("backfaceThreshold", FieldKind::F32),
];

const GAME_OBJECT_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new(
        "m_Component",
        FieldKind::Array(&FieldKind::Struct(COMPONENT_PAIR_LEGACY)),
    )
    .before(V5_5),
    FieldSpec::new("m_Component", FieldKind::Array(&FieldKind::Struct(COMPONENT_PAIR))).since(V5_5),
    FieldSpec::new("m_Layer", FieldKind::U32),
    FieldSpec::new("m_Name", FieldKind::String),
    FieldSpec::new("m_Tag", FieldKind::U16),
    FieldSpec::new("m_IsActive", FieldKind::Bool).aligned(),
];

const MESH_RENDERER_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_GameObject", FieldKind::Pointer),
    FieldSpec::new("m_Enabled", FieldKind::Bool),
    FieldSpec::new("m_CastShadows", FieldKind::Bool).before(V5_0),
    FieldSpec::new("m_CastShadows", FieldKind::U8).since(V5_0),
    FieldSpec::new("m_ReceiveShadows", FieldKind::U8).aligned(),
    FieldSpec::new("m_LightmapIndex", FieldKind::U8).before(V5_0).aligned(),
    FieldSpec::new("m_LightmapIndex", FieldKind::U16).since(V5_0).aligned(),
    FieldSpec::new("m_Materials", FieldKind::Array(&FieldKind::Pointer)),
    FieldSpec::new("m_StaticBatchRoot", FieldKind::Pointer).since(V5_0),
];

const OCCLUSION_PORTAL_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_GameObject", FieldKind::Pointer),
    FieldSpec::new("m_Open", FieldKind::Bool).aligned(),
    FieldSpec::new("m_Center", FieldKind::Struct(VECTOR3)),
    FieldSpec::new("m_Size", FieldKind::Struct(VECTOR3)),
];

const OCCLUSION_SETTINGS_LEGACY_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_PVSData", FieldKind::Bytes).aligned(),
    FieldSpec::new("m_QueryMode", FieldKind::I32).since(V4_3),
    FieldSpec::new("m_StaticRenderers", FieldKind::Array(&FieldKind::Pointer)),
    FieldSpec::new("m_Portals", FieldKind::Array(&FieldKind::Pointer)),
];

const OCCLUSION_SETTINGS_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_OcclusionBakeSettings", FieldKind::Struct(OCCLUSION_BAKE_SETTINGS)),
    FieldSpec::new("m_SceneGUID", FieldKind::Guid),
    FieldSpec::new("m_OcclusionCullingData", FieldKind::Pointer),
    FieldSpec::new("m_StaticRenderers", FieldKind::Array(&FieldKind::Pointer)),
    FieldSpec::new("m_Portals", FieldKind::Array(&FieldKind::Pointer)),
];

const MONO_BEHAVIOUR_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_GameObject", FieldKind::Pointer),
    FieldSpec::new("m_Enabled", FieldKind::Bool).aligned(),
    FieldSpec::new("m_Script", FieldKind::ScriptPointer),
    FieldSpec::new("m_Name", FieldKind::String),
    FieldSpec::new("m_RawData", FieldKind::Remainder),
];

const MONO_SCRIPT_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_Name", FieldKind::String),
    FieldSpec::new("m_ExecutionOrder", FieldKind::I32),
    FieldSpec::new("m_PropertiesHash", FieldKind::U32).before(V5_0),
    FieldSpec::new("m_PropertiesHash", FieldKind::Guid).since(V5_0),
    FieldSpec::new("m_ClassName", FieldKind::String),
    FieldSpec::new("m_Namespace", FieldKind::String),
    FieldSpec::new("m_AssemblyName", FieldKind::String),
    FieldSpec::new("m_IsEditorScript", FieldKind::Bool)
        .before(V2018_2)
        .aligned(),
];

const OCCLUSION_CULLING_DATA_FIELDS: &[FieldSpec] = &[
    HIDE_FLAGS,
    FieldSpec::new("m_Name", FieldKind::String),
    FieldSpec::new("m_PVSData", FieldKind::Bytes).aligned(),
    FieldSpec::new("m_Scenes", FieldKind::Array(&FieldKind::Struct(OCCLUSION_SCENE))),
    FieldSpec::new(
        "m_StaticRenderers",
        FieldKind::Array(&FieldKind::Struct(SCENE_OBJECT_IDENTIFIER)),
    )
    .editor_only()
    .derived(),
    FieldSpec::new(
        "m_Portals",
        FieldKind::Array(&FieldKind::Struct(SCENE_OBJECT_IDENTIFIER)),
    )
    .editor_only()
    .derived(),
];

const OPAQUE_FIELDS: &[FieldSpec] = &[FieldSpec::new("m_RawData", FieldKind::Remainder)];

const GAME_OBJECT_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::GAME_OBJECT,
    variant: "default",
    since: MIN_SUPPORTED,
    fields: GAME_OBJECT_FIELDS,
}];

const MESH_RENDERER_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::MESH_RENDERER,
    variant: "default",
    since: MIN_SUPPORTED,
    fields: MESH_RENDERER_FIELDS,
}];

const OCCLUSION_PORTAL_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::OCCLUSION_PORTAL,
    variant: "default",
    since: MIN_SUPPORTED,
    fields: OCCLUSION_PORTAL_FIELDS,
}];

const OCCLUSION_SETTINGS_LAYOUTS: &[Layout] = &[
    Layout {
        class: ClassId::OCCLUSION_CULLING_SETTINGS,
        variant: "legacy",
        since: MIN_SUPPORTED,
        fields: OCCLUSION_SETTINGS_LEGACY_FIELDS,
    },
    Layout {
        class: ClassId::OCCLUSION_CULLING_SETTINGS,
        variant: "scene-bound",
        since: V5_5,
        fields: OCCLUSION_SETTINGS_FIELDS,
    },
];

const MONO_BEHAVIOUR_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::MONO_BEHAVIOUR,
    variant: "default",
    since: MIN_SUPPORTED,
    fields: MONO_BEHAVIOUR_FIELDS,
}];

const MONO_SCRIPT_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::MONO_SCRIPT,
    variant: "default",
    since: MIN_SUPPORTED,
    fields: MONO_SCRIPT_FIELDS,
}];

const OCCLUSION_CULLING_DATA_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId::OCCLUSION_CULLING_DATA,
    variant: "default",
    since: V5_5,
    fields: OCCLUSION_CULLING_DATA_FIELDS,
}];

const OPAQUE_LAYOUTS: &[Layout] = &[Layout {
    class: ClassId(0),
    variant: "opaque",
    since: MIN_SUPPORTED,
    fields: OPAQUE_FIELDS,
}];

/// Layout table of a class, sorted by `since`. Never empty: unknown
/// classes get the opaque single-blob layout.
pub fn layouts(class: ClassId) -> &'static [Layout] {
    match class {
        ClassId::GAME_OBJECT => GAME_OBJECT_LAYOUTS,
        ClassId::MESH_RENDERER => MESH_RENDERER_LAYOUTS,
        ClassId::OCCLUSION_CULLING_SETTINGS => OCCLUSION_SETTINGS_LAYOUTS,
        ClassId::MONO_BEHAVIOUR => MONO_BEHAVIOUR_LAYOUTS,
        ClassId::MONO_SCRIPT => MONO_SCRIPT_LAYOUTS,
        ClassId::OCCLUSION_CULLING_DATA => OCCLUSION_CULLING_DATA_LAYOUTS,
        ClassId::OCCLUSION_PORTAL => OCCLUSION_PORTAL_LAYOUTS,
        _ => OPAQUE_LAYOUTS,
    }
}
