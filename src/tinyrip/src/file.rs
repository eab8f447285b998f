//! Serialized-file container
//!
//! # Layout
//!
//! Header (always big endian, 20 bytes):
//! - `metadata_size: u32`
//! - `file_size: u32`
//! - `generation: u32` (format revision, 9 or newer)
//! - `data_offset: u32`
//! - `endianness: u8` (0 little, 1 big) + 3 reserved bytes
//!
//! Metadata (file endianness):
//! - producer version (null-terminated), target platform `i32`
//! - object table: count, then per object (aligned to 4) `path_id`
//!   (`i64` from generation 14, `i32` before), `byte_start`, `byte_size`,
//!   `class_id`
//! - dependency table: count, then per entry `asset_path` (cstring),
//!   `guid[16]`, `type: i32`, `path` (cstring)
//!
//! Object bytes live at `data_offset + byte_start`.

use std::collections::HashMap;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::asset::{Asset, AssetKey, FileId};
use crate::reader::{AssetReader, Endian};
use crate::schema::ClassId;
use crate::version::{BuildFlags, Version};
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 20;

/// Oldest container generation with the header layout above
pub const MIN_GENERATION: u32 = 9;

/// First generation storing 64-bit path ids in the object table
pub const LONG_PATH_ID_GENERATION: u32 = 14;

/// Upper bound used to tell containers from arbitrary files
const MAX_GENERATION: u32 = 64;

/// Normalized identity of a file: its lower-cased final path component
pub fn normalize_identity(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .to_lowercase()
}

/// Entry of a file's dependency list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct External {
    pub asset_path: String,
    pub guid: [u8; 16],
    pub kind: i32,
    pub path: String,
}

impl External {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            asset_path: String::new(),
            guid: [0; 16],
            kind: 0,
            path: path.into(),
        }
    }

    pub fn identity(&self) -> String {
        normalize_identity(&self.path)
    }
}

/// Object table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub path_id: i64,
    pub byte_start: u32,
    pub byte_size: u32,
    pub class: ClassId,
}

/// One source file: its producer version, dependencies and decoded assets
#[derive(Debug)]
pub struct SerializedFile {
    id: FileId,
    name: String,
    identity: String,
    version: Version,
    flags: BuildFlags,
    platform: i32,
    generation: u32,
    endian: Endian,
    dependencies: Vec<External>,
    objects: Vec<ObjectInfo>,
    assets: Vec<Asset>,
    index: HashMap<i64, usize>,
}

impl SerializedFile {
    /// Empty file, used when assets are built in memory
    pub fn new(name: impl Into<String>, version: Version, flags: BuildFlags) -> Self {
        let name = name.into();
        Self {
            id: FileId(0),
            identity: normalize_identity(&name),
            name,
            version,
            flags,
            platform: if flags.is_release() {
                0
            } else {
                BuildFlags::NO_TARGET_PLATFORM
            },
            generation: LONG_PATH_ID_GENERATION,
            endian: Endian::Little,
            dependencies: Vec::new(),
            objects: Vec::new(),
            assets: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Parse a container and decode all of its objects
    pub fn parse(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let name = name.into();
        if data.len() < HEADER_SIZE {
            return Err(Error::DataTooShort {
                needed: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let metadata_size = BigEndian::read_u32(&data[0..4]) as usize;
        let file_size = BigEndian::read_u32(&data[4..8]) as usize;
        let generation = BigEndian::read_u32(&data[8..12]);
        let data_offset = BigEndian::read_u32(&data[12..16]) as usize;
        let endian = match data[16] {
            0 => Endian::Little,
            1 => Endian::Big,
            other => return Err(Error::InvalidHeader(format!("endianness byte {other}"))),
        };

        if generation < MIN_GENERATION {
            return Err(Error::UnsupportedGeneration(generation));
        }
        if generation > MAX_GENERATION {
            return Err(Error::InvalidHeader(format!("generation {generation}")));
        }
        if file_size > data.len() || data_offset > file_size || metadata_size == 0 {
            return Err(Error::InvalidHeader(format!(
                "file_size {file_size}, data_offset {data_offset}, \
                 metadata_size {metadata_size}, actual length {}",
                data.len()
            )));
        }

        // The reader spans the whole file so alignment is absolute
        let mut meta = AssetReader::new(data, endian, Version::new(0, 0, 0), BuildFlags::NONE);
        meta.seek(HEADER_SIZE);

        let version_string = meta.read_cstring()?;
        let version: Version = version_string.parse()?;
        let platform = meta.read_i32()?;
        let flags = BuildFlags::for_platform(platform);

        let object_count = meta.read_count()?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            meta.align(4);
            let path_id = if generation >= LONG_PATH_ID_GENERATION {
                meta.read_i64()?
            } else {
                meta.read_i32()? as i64
            };
            objects.push(ObjectInfo {
                path_id,
                byte_start: meta.read_u32()?,
                byte_size: meta.read_u32()?,
                class: ClassId(meta.read_i32()?),
            });
        }

        let dependencies = meta.read_array(|r| {
            Ok(External {
                asset_path: r.read_cstring()?,
                guid: r.read_guid()?,
                kind: r.read_i32()?,
                path: r.read_cstring()?,
            })
        })?;

        let mut file = Self::new(name, version, flags);
        file.platform = platform;
        file.generation = generation;
        file.endian = endian;
        file.dependencies = dependencies;

        for info in &objects {
            let start = data_offset + info.byte_start as usize;
            let end = start + info.byte_size as usize;
            if end > file_size {
                return Err(Error::DataTooShort {
                    needed: end,
                    actual: file_size,
                });
            }
            let mut reader = AssetReader::new(&data[start..end], endian, version, flags);
            let key = AssetKey::new(file.id, info.path_id);
            let asset = Asset::decode(key, info.class, &mut reader)?;
            file.insert(asset)?;
        }
        file.objects = objects;

        debug!(
            "Parsed {} (generation {}, {}, {}): {} objects, {} dependencies",
            file.name,
            generation,
            version,
            flags,
            file.assets.len(),
            file.dependencies.len()
        );

        Ok(file)
    }

    /// Read and parse a container from disk
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::parse(name, &data)
    }

    /// Append a dependency; its 1-based position is the `file_index` used by
    /// references into that file
    pub fn add_dependency(&mut self, path: impl Into<String>) -> i32 {
        self.dependencies.push(External::new(path));
        self.dependencies.len() as i32
    }

    /// Add a decoded asset, rejecting a repeated path id
    pub fn insert(&mut self, mut asset: Asset) -> Result<()> {
        let path_id = asset.key.path_id;
        if self.index.contains_key(&path_id) {
            return Err(Error::DuplicatePathId {
                file: self.name.clone(),
                path_id,
            });
        }
        asset.key.file = self.id;
        self.index.insert(path_id, self.assets.len());
        self.assets.push(asset);
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: FileId) {
        self.id = id;
        for asset in &mut self.assets {
            asset.key.file = id;
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn flags(&self) -> BuildFlags {
        self.flags
    }

    pub fn platform(&self) -> i32 {
        self.platform
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn dependencies(&self) -> &[External] {
        &self.dependencies
    }

    /// Object table as read from disk; empty for in-memory files
    pub fn objects(&self) -> &[ObjectInfo] {
        &self.objects
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, path_id: i64) -> Option<&Asset> {
        self.index.get(&path_id).map(|&i| &self.assets[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Fields, Value};
    use crate::testing::{encode_fields, ContainerBuilder};

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity("Assets/Level0"), "level0");
        assert_eq!(
            normalize_identity("C:\\Game\\Data\\SharedAssets0.assets"),
            "sharedassets0.assets"
        );
        assert_eq!(normalize_identity("globalgamemanagers"), "globalgamemanagers");
    }

    #[test]
    fn test_parse_container() {
        let version: Version = "5.6.1f1".parse().unwrap();
        let fields = Fields::new()
            .with("m_Name", Value::String("Data".into()))
            .with("m_PVSData", Value::Bytes(vec![7; 5]))
            .with("m_Scenes", Value::Sequence(vec![]));
        let bytes = ContainerBuilder::new(version, 5)
            .object(
                3,
                ClassId::OCCLUSION_CULLING_DATA,
                encode_fields(
                    ClassId::OCCLUSION_CULLING_DATA,
                    version,
                    BuildFlags::SERIALIZE_GAME_RELEASE,
                    &fields,
                ),
            )
            .external("sharedassets0.assets")
            .build();

        let file = SerializedFile::parse("Level0", &bytes).unwrap();
        assert_eq!(file.identity(), "level0");
        assert_eq!(file.version(), version);
        assert!(file.flags().is_release());
        assert_eq!(file.platform(), 5);
        assert_eq!(file.dependencies().len(), 1);
        assert_eq!(file.dependencies()[0].identity(), "sharedassets0.assets");
        assert_eq!(file.objects().len(), 1);

        let asset = file.asset(3).unwrap();
        assert_eq!(asset.class, ClassId::OCCLUSION_CULLING_DATA);
        assert_eq!(asset.fields, fields);
    }

    #[test]
    fn test_parse_short_path_ids_and_big_endian() {
        let version: Version = "5.0.1f1".parse().unwrap();
        let bytes = ContainerBuilder::new(version, BuildFlags::NO_TARGET_PLATFORM)
            .generation(9)
            .big_endian()
            .object(12, ClassId(4242), vec![1, 2, 3])
            .build();

        let file = SerializedFile::parse("level1", &bytes).unwrap();
        assert_eq!(file.endian(), Endian::Big);
        assert!(!file.flags().is_release());
        assert_eq!(
            file.asset(12).unwrap().get("m_RawData"),
            Some(&Value::Bytes(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_reject_old_generation() {
        let bytes = ContainerBuilder::new("5.0.0f1".parse().unwrap(), 5)
            .generation(8)
            .build();
        assert!(matches!(
            SerializedFile::parse("old", &bytes),
            Err(Error::UnsupportedGeneration(8))
        ));
    }

    #[test]
    fn test_reject_non_container() {
        assert!(SerializedFile::parse("readme.txt", b"hello").is_err());
        let junk = vec![0xffu8; 64];
        assert!(SerializedFile::parse("junk", &junk).is_err());
    }

    #[test]
    fn test_duplicate_path_id() {
        let version = Version::new(2018, 4, 0);
        let mut file = SerializedFile::new("level0", version, BuildFlags::NONE);
        let key = AssetKey::new(FileId(0), 1);
        file.insert(Asset::new(key, ClassId(4242), version, BuildFlags::NONE, Fields::new()))
            .unwrap();
        let err = file
            .insert(Asset::new(key, ClassId(4242), version, BuildFlags::NONE, Fields::new()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePathId { path_id: 1, .. }));
    }

    #[test]
    fn test_add_dependency_returns_file_index() {
        let mut file = SerializedFile::new("level0", Version::new(5, 6, 0), BuildFlags::NONE);
        assert_eq!(file.add_dependency("a.assets"), 1);
        assert_eq!(file.add_dependency("b.assets"), 2);
    }
}
