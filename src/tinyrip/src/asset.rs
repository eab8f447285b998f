//! In-memory asset records
//!
//! An [`Asset`] is one decoded object: its identity plus an ordered list of
//! named [`Value`]s. Which fields exist is decided by the version policy at
//! decode time, so two assets of the same class can carry different field
//! sets.

use std::fmt;
use std::sync::OnceLock;

use tracing::warn;

use crate::policy::{self, LayoutChoice};
use crate::reader::AssetReader;
use crate::schema::{ClassId, FieldKind, FieldSpec};
use crate::version::{BuildFlags, Version};
use crate::Result;

/// Position of a file inside its collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Identity of an asset within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub file: FileId,
    pub path_id: i64,
}

impl AssetKey {
    pub const fn new(file: FileId, path_id: i64) -> Self {
        Self { file, path_id }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.0, self.path_id)
    }
}

/// Cross-object pointer relative to the file that holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Reference {
    /// 0 = same file, n = n-th entry of the file's dependency list
    pub file_index: i32,
    pub path_id: i64,
}

impl Reference {
    pub const NULL: Self = Self {
        file_index: 0,
        path_id: 0,
    };

    pub const fn new(file_index: i32, path_id: i64) -> Self {
        Self {
            file_index,
            path_id,
        }
    }

    pub const fn local(path_id: i64) -> Self {
        Self::new(0, path_id)
    }

    pub fn is_null(&self) -> bool {
        self.path_id == 0
    }
}

/// Decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    String(String),
    Bytes(Vec<u8>),
    Guid([u8; 16]),
    Reference(Reference),
    Record(Fields),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<&[u8; 16]> {
        match self {
            Self::Guid(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Self::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Fields> {
        match self {
            Self::Record(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Visit every reference inside this value, depth first
    pub fn for_each_reference(&self, f: &mut impl FnMut(Reference)) {
        match self {
            Self::Reference(r) => f(*r),
            Self::Record(fields) => fields.for_each_reference(f),
            Self::Sequence(items) => items.iter().for_each(|item| item.for_each_reference(f)),
            _ => {}
        }
    }
}

/// Ordered field map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields(Vec<(&'static str, Value)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a field, replacing an earlier one with the same name in place
    pub fn insert(&mut self, name: &'static str, value: Value) {
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn for_each_reference(&self, f: &mut impl FnMut(Reference)) {
        for (_, value) in &self.0 {
            value.for_each_reference(f);
        }
    }
}

/// One decoded object
#[derive(Debug)]
pub struct Asset {
    pub key: AssetKey,
    pub class: ClassId,
    pub version: Version,
    pub flags: BuildFlags,
    pub fields: Fields,
    /// Effective layout version when the producer version was outside the
    /// verified window
    pub layout_fallback: Option<Version>,
    /// Sibling assets found by the derived-data scan, computed once per run
    pub(crate) sources: OnceLock<Vec<AssetKey>>,
}

impl Asset {
    pub fn new(
        key: AssetKey,
        class: ClassId,
        version: Version,
        flags: BuildFlags,
        fields: Fields,
    ) -> Self {
        Self {
            key,
            class,
            version,
            flags,
            fields,
            layout_fallback: None,
            sources: OnceLock::new(),
        }
    }

    /// Decode an object of `class` from `reader` using the version policy
    pub fn decode(key: AssetKey, class: ClassId, reader: &mut AssetReader<'_>) -> Result<Self> {
        let version = reader.version();
        let flags = reader.flags();
        let choice = policy::variant_for(class, version);

        if choice.fallback {
            warn!(
                "{} {} written by {} has no exact layout, reading as {}",
                class, key, version, choice.effective
            );
        }

        let mut fields = Fields::new();
        for spec in choice.present(flags) {
            fields.insert(spec.name, read_field(reader, &choice, spec)?);
        }

        let mut asset = Self::new(key, class, version, flags, fields);
        if choice.fallback {
            asset.layout_fallback = Some(choice.effective);
        }
        Ok(asset)
    }

    pub fn layout(&self) -> LayoutChoice {
        policy::variant_for(self.class, self.version)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// `m_Name` when the class has one and it is not empty
    pub fn name(&self) -> Option<&str> {
        self.get("m_Name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Every non-null reference held by this asset, in field order
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.fields.for_each_reference(&mut |r| {
            if !r.is_null() {
                refs.push(r);
            }
        });
        refs
    }
}

fn read_field(
    reader: &mut AssetReader<'_>,
    choice: &LayoutChoice,
    spec: &FieldSpec,
) -> Result<Value> {
    let value = read_kind(reader, choice, &spec.kind)?;
    if spec.align {
        reader.align(4);
    }
    Ok(value)
}

fn read_kind(
    reader: &mut AssetReader<'_>,
    choice: &LayoutChoice,
    kind: &FieldKind,
) -> Result<Value> {
    Ok(match kind {
        FieldKind::Bool => Value::Bool(reader.read_bool()?),
        FieldKind::U8 => Value::UInt(reader.read_u8()? as u64),
        FieldKind::U16 => Value::UInt(reader.read_u16()? as u64),
        FieldKind::U32 => Value::UInt(reader.read_u32()? as u64),
        FieldKind::I32 => Value::Int(reader.read_i32()? as i64),
        FieldKind::I64 => Value::Int(reader.read_i64()?),
        FieldKind::F32 => Value::Float(reader.read_f32()?),
        FieldKind::String => Value::String(reader.read_string()?),
        FieldKind::Bytes => Value::Bytes(reader.read_byte_array()?),
        FieldKind::Guid => Value::Guid(reader.read_guid()?),
        FieldKind::Pointer | FieldKind::ScriptPointer => {
            Value::Reference(read_reference(reader, choice)?)
        }
        FieldKind::Struct(specs) => {
            let flags = reader.flags();
            let mut fields = Fields::new();
            for spec in specs.iter().filter(|s| choice.holds(s, flags)) {
                fields.insert(spec.name, read_field(reader, choice, spec)?);
            }
            Value::Record(fields)
        }
        FieldKind::Array(element) => {
            let items = reader.read_array(|r| read_kind(r, choice, element))?;
            // Byte-sized element runs are padded back to 4
            if matches!(element, FieldKind::Bool | FieldKind::U8) {
                reader.align(4);
            }
            Value::Sequence(items)
        }
        FieldKind::Remainder => Value::Bytes(reader.read_remainder().to_vec()),
    })
}

fn read_reference(reader: &mut AssetReader<'_>, choice: &LayoutChoice) -> Result<Reference> {
    let file_index = reader.read_i32()?;
    let path_id = if policy::uses_long_path_ids(choice.effective) {
        reader.read_i64()?
    } else {
        reader.read_i32()? as i64
    };
    Ok(Reference::new(file_index, path_id))
}
