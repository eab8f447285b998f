//! Fixture builders shared by unit tests

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::asset::{Asset, AssetKey, Fields, FileId, Reference, Value};
use crate::file::{SerializedFile, HEADER_SIZE, LONG_PATH_ID_GENERATION};
use crate::policy::{self, LayoutChoice};
use crate::schema::{ClassId, FieldKind, FieldSpec};
use crate::version::{BuildFlags, Version};

pub const EDITOR: BuildFlags = BuildFlags::NONE;
pub const RELEASE: BuildFlags = BuildFlags::SERIALIZE_GAME_RELEASE;

pub fn v(s: &str) -> Version {
    s.parse().unwrap()
}

pub fn guid(n: u8) -> [u8; 16] {
    [n; 16]
}

pub fn scene_object_id(target: i64) -> Value {
    Value::Record(
        Fields::new()
            .with("targetObject", Value::Int(target))
            .with("targetPrefab", Value::Int(0)),
    )
}

fn reference(r: Reference) -> Value {
    Value::Reference(r)
}

fn references(refs: &[Reference]) -> Value {
    Value::Sequence(refs.iter().copied().map(reference).collect())
}

/// GameObject fields in the 5.5+ component layout
pub fn game_object_fields(name: &str, components: &[Reference]) -> Fields {
    Fields::new()
        .with(
            "m_Component",
            Value::Sequence(
                components
                    .iter()
                    .map(|&c| Value::Record(Fields::new().with("component", reference(c))))
                    .collect(),
            ),
        )
        .with("m_Layer", Value::UInt(0))
        .with("m_Name", Value::String(name.to_string()))
        .with("m_Tag", Value::UInt(0))
        .with("m_IsActive", Value::Bool(true))
}

/// MeshRenderer fields in the 5.0+ layout
pub fn renderer_fields(game_object: Reference, materials: &[Reference]) -> Fields {
    Fields::new()
        .with("m_GameObject", reference(game_object))
        .with("m_Enabled", Value::Bool(true))
        .with("m_CastShadows", Value::UInt(1))
        .with("m_ReceiveShadows", Value::UInt(1))
        .with("m_LightmapIndex", Value::UInt(0xffff))
        .with("m_Materials", references(materials))
        .with("m_StaticBatchRoot", reference(Reference::NULL))
}

/// Scene-bound OcclusionCullingSettings fields
pub fn settings_fields(
    scene: [u8; 16],
    data: Reference,
    renderers: &[Reference],
    portals: &[Reference],
) -> Fields {
    Fields::new()
        .with(
            "m_OcclusionBakeSettings",
            Value::Record(
                Fields::new()
                    .with("smallestOccluder", Value::Float(5.0))
                    .with("smallestHole", Value::Float(0.25))
                    .with("backfaceThreshold", Value::Float(100.0)),
            ),
        )
        .with("m_SceneGUID", Value::Guid(scene))
        .with("m_OcclusionCullingData", reference(data))
        .with("m_StaticRenderers", references(renderers))
        .with("m_Portals", references(portals))
}

/// Pre-5.5 OcclusionCullingSettings fields, PVS data held inline
pub fn legacy_settings_fields(
    pvs: &[u8],
    renderers: &[Reference],
    portals: &[Reference],
) -> Fields {
    Fields::new()
        .with("m_PVSData", Value::Bytes(pvs.to_vec()))
        .with("m_QueryMode", Value::Int(0))
        .with("m_StaticRenderers", references(renderers))
        .with("m_Portals", references(portals))
}

/// Release OcclusionCullingData fields; scenes are
/// `(index_renderers, size_renderers, index_portals, size_portals, guid byte)`
pub fn culling_data_fields(name: &str, scenes: &[(i32, i32, i32, i32, u8)]) -> Fields {
    Fields::new()
        .with("m_Name", Value::String(name.to_string()))
        .with("m_PVSData", Value::Bytes(Vec::new()))
        .with(
            "m_Scenes",
            Value::Sequence(
                scenes
                    .iter()
                    .map(|&(ir, sr, ip, sp, g)| {
                        Value::Record(
                            Fields::new()
                                .with("indexRenderers", Value::Int(ir as i64))
                                .with("sizeRenderers", Value::Int(sr as i64))
                                .with("indexPortals", Value::Int(ip as i64))
                                .with("sizePortals", Value::Int(sp as i64))
                                .with("scene", Value::Guid(guid(g))),
                        )
                    })
                    .collect(),
            ),
        )
}

pub fn mono_script_fields(class: &str, namespace: &str, assembly: &str) -> Fields {
    Fields::new()
        .with("m_Name", Value::String(class.to_string()))
        .with("m_ExecutionOrder", Value::Int(0))
        .with("m_PropertiesHash", Value::Guid([0x11; 16]))
        .with("m_ClassName", Value::String(class.to_string()))
        .with("m_Namespace", Value::String(namespace.to_string()))
        .with("m_AssemblyName", Value::String(assembly.to_string()))
        .with("m_IsEditorScript", Value::Bool(false))
}

pub fn mono_behaviour_fields(game_object: Reference, script: Reference, name: &str) -> Fields {
    Fields::new()
        .with("m_GameObject", reference(game_object))
        .with("m_Enabled", Value::Bool(true))
        .with("m_Script", reference(script))
        .with("m_Name", Value::String(name.to_string()))
        .with("m_RawData", Value::Bytes(vec![0, 0, 0, 0]))
}

/// In-memory file builder
pub struct FileBuilder {
    file: SerializedFile,
}

impl FileBuilder {
    pub fn new(name: &str, version: Version, flags: BuildFlags) -> Self {
        Self {
            file: SerializedFile::new(name, version, flags),
        }
    }

    pub fn dependency(mut self, name: &str) -> Self {
        self.file.add_dependency(name);
        self
    }

    /// Add an asset; editor files get `m_ObjectHideFlags` prepended
    pub fn asset(mut self, path_id: i64, class: ClassId, fields: Fields) -> Self {
        let fields = if self.file.flags().is_release() || fields.contains("m_ObjectHideFlags") {
            fields
        } else {
            let hidden = Fields::new().with("m_ObjectHideFlags", Value::UInt(0));
            fields
                .iter()
                .fold(hidden, |acc, (name, value)| acc.with(name, value.clone()))
        };
        let asset = Asset::new(
            AssetKey::new(FileId(0), path_id),
            class,
            self.file.version(),
            self.file.flags(),
            fields,
        );
        self.file.insert(asset).unwrap();
        self
    }

    pub fn build(self) -> SerializedFile {
        self.file
    }
}

/// Serialize `fields` the way [`Asset::decode`] reads them, little endian
pub fn encode_fields(
    class: ClassId,
    version: Version,
    flags: BuildFlags,
    fields: &Fields,
) -> Vec<u8> {
    let choice = policy::variant_for(class, version);
    let mut out = Vec::new();
    for spec in choice.present(flags) {
        let value = fields
            .get(spec.name)
            .unwrap_or_else(|| panic!("fixture lacks {}", spec.name));
        encode_field(&mut out, &choice, flags, spec, value);
    }
    out
}

fn align(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn encode_field(
    out: &mut Vec<u8>,
    choice: &LayoutChoice,
    flags: BuildFlags,
    spec: &FieldSpec,
    value: &Value,
) {
    encode_kind(out, choice, flags, &spec.kind, value);
    if spec.align {
        align(out);
    }
}

fn encode_kind(
    out: &mut Vec<u8>,
    choice: &LayoutChoice,
    flags: BuildFlags,
    kind: &FieldKind,
    value: &Value,
) {
    match (kind, value) {
        (FieldKind::Bool, Value::Bool(b)) => out.push(*b as u8),
        (FieldKind::U8, Value::UInt(u)) => out.push(*u as u8),
        (FieldKind::U16, Value::UInt(u)) => out.write_u16::<LittleEndian>(*u as u16).unwrap(),
        (FieldKind::U32, Value::UInt(u)) => out.write_u32::<LittleEndian>(*u as u32).unwrap(),
        (FieldKind::I32, Value::Int(i)) => out.write_i32::<LittleEndian>(*i as i32).unwrap(),
        (FieldKind::I64, Value::Int(i)) => out.write_i64::<LittleEndian>(*i).unwrap(),
        (FieldKind::F32, Value::Float(f)) => out.write_f32::<LittleEndian>(*f).unwrap(),
        (FieldKind::String, Value::String(s)) => {
            out.write_i32::<LittleEndian>(s.len() as i32).unwrap();
            out.extend_from_slice(s.as_bytes());
            align(out);
        }
        (FieldKind::Bytes, Value::Bytes(b)) => {
            out.write_i32::<LittleEndian>(b.len() as i32).unwrap();
            out.extend_from_slice(b);
        }
        (FieldKind::Guid, Value::Guid(g)) => out.extend_from_slice(g),
        (FieldKind::Pointer | FieldKind::ScriptPointer, Value::Reference(r)) => {
            out.write_i32::<LittleEndian>(r.file_index).unwrap();
            if policy::uses_long_path_ids(choice.effective) {
                out.write_i64::<LittleEndian>(r.path_id).unwrap();
            } else {
                out.write_i32::<LittleEndian>(r.path_id as i32).unwrap();
            }
        }
        (FieldKind::Struct(specs), Value::Record(fields)) => {
            for spec in specs.iter().filter(|s| choice.holds(s, flags)) {
                let child = fields
                    .get(spec.name)
                    .unwrap_or_else(|| panic!("fixture lacks {}", spec.name));
                encode_field(out, choice, flags, spec, child);
            }
        }
        (FieldKind::Array(element), Value::Sequence(items)) => {
            out.write_i32::<LittleEndian>(items.len() as i32).unwrap();
            for item in items {
                encode_kind(out, choice, flags, element, item);
            }
            if matches!(element, FieldKind::Bool | FieldKind::U8) {
                align(out);
            }
        }
        (FieldKind::Remainder, Value::Bytes(b)) => out.extend_from_slice(b),
        (kind, value) => panic!("fixture value {value:?} does not fit {kind:?}"),
    }
}

/// Builds container bytes in the serialized-file layout
pub struct ContainerBuilder {
    version: Version,
    platform: i32,
    generation: u32,
    big_endian: bool,
    objects: Vec<(i64, ClassId, Vec<u8>)>,
    externals: Vec<String>,
}

impl ContainerBuilder {
    pub fn new(version: Version, platform: i32) -> Self {
        Self {
            version,
            platform,
            generation: 17,
            big_endian: false,
            objects: Vec::new(),
            externals: Vec::new(),
        }
    }

    pub fn generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn object(mut self, path_id: i64, class: ClassId, data: Vec<u8>) -> Self {
        self.objects.push((path_id, class, data));
        self
    }

    pub fn external(mut self, path: &str) -> Self {
        self.externals.push(path.to_string());
        self
    }

    fn put_i32(&self, out: &mut Vec<u8>, v: i32) {
        if self.big_endian {
            out.write_i32::<BigEndian>(v).unwrap();
        } else {
            out.write_i32::<LittleEndian>(v).unwrap();
        }
    }

    fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
        self.put_i32(out, v as i32);
    }

    fn put_i64(&self, out: &mut Vec<u8>, v: i64) {
        if self.big_endian {
            out.write_i64::<BigEndian>(v).unwrap();
        } else {
            out.write_i64::<LittleEndian>(v).unwrap();
        }
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];

        out.extend_from_slice(self.version.to_string().as_bytes());
        out.push(0);
        self.put_i32(&mut out, self.platform);

        self.put_i32(&mut out, self.objects.len() as i32);
        let mut byte_start = 0u32;
        for (path_id, class, data) in &self.objects {
            align(&mut out);
            if self.generation >= LONG_PATH_ID_GENERATION {
                self.put_i64(&mut out, *path_id);
            } else {
                self.put_i32(&mut out, *path_id as i32);
            }
            self.put_u32(&mut out, byte_start);
            self.put_u32(&mut out, data.len() as u32);
            self.put_i32(&mut out, class.0);
            byte_start += (data.len() as u32 + 7) & !7;
        }

        self.put_i32(&mut out, self.externals.len() as i32);
        for path in &self.externals {
            out.push(0);
            out.extend_from_slice(&[0u8; 16]);
            self.put_i32(&mut out, 0);
            out.extend_from_slice(path.as_bytes());
            out.push(0);
        }

        let metadata_size = (out.len() - HEADER_SIZE) as u32;
        while out.len() % 16 != 0 {
            out.push(0);
        }
        let data_offset = out.len() as u32;
        for (_, _, data) in &self.objects {
            out.extend_from_slice(data);
            while (out.len() - data_offset as usize) % 8 != 0 {
                out.push(0);
            }
        }

        let file_size = out.len() as u32;
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.write_u32::<BigEndian>(metadata_size).unwrap();
        header.write_u32::<BigEndian>(file_size).unwrap();
        header.write_u32::<BigEndian>(self.generation).unwrap();
        header.write_u32::<BigEndian>(data_offset).unwrap();
        header.push(self.big_endian as u8);
        header.extend_from_slice(&[0, 0, 0]);
        out[..HEADER_SIZE].copy_from_slice(&header);
        out
    }
}
