//! File collection and reference resolution

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::asset::{Asset, AssetKey, FileId, Reference};
use crate::file::{normalize_identity, SerializedFile};
use crate::{Error, Result};

/// Reference whose target file or object is missing from the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// Identity of the file holding the reference
    pub from_file: String,
    pub file_index: i32,
    pub path_id: i64,
    /// Identity the file index named, when the index itself was in range
    pub target_file: Option<String>,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target_file {
            Some(target) => write!(
                f,
                "{} -> {}:{} (file index {})",
                self.from_file, target, self.path_id, self.file_index
            ),
            None => write!(
                f,
                "{} -> <file index {} out of range>:{}",
                self.from_file, self.file_index, self.path_id
            ),
        }
    }
}

/// Outcome of resolving a reference
#[derive(Debug)]
pub enum Lookup<'a> {
    Null,
    Found(&'a Asset),
    Dangling(DanglingReference),
}

impl<'a> Lookup<'a> {
    pub fn found(&self) -> Option<&'a Asset> {
        match self {
            Self::Found(asset) => Some(asset),
            _ => None,
        }
    }
}

/// Every source file of a run, indexed by normalized identity
#[derive(Debug, Default)]
pub struct FileCollection {
    files: Vec<SerializedFile>,
    by_identity: HashMap<String, FileId>,
}

impl FileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; its assets are re-keyed to the assigned [`FileId`]
    pub fn add(&mut self, mut file: SerializedFile) -> Result<FileId> {
        let identity = file.identity().to_string();
        if self.by_identity.contains_key(&identity) {
            return Err(Error::DuplicateFile(identity));
        }
        let id = FileId(self.files.len() as u32);
        file.assign_id(id);
        self.by_identity.insert(identity, id);
        self.files.push(file);
        Ok(id)
    }

    /// Load every container below `dir`
    ///
    /// Files without a valid container header are skipped. Files are added
    /// in path order so ids do not depend on directory iteration order.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir.as_ref())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut collection = Self::new();
        for path in paths {
            match SerializedFile::open(&path) {
                Ok(file) => {
                    collection.add(file)?;
                }
                Err(
                    e @ (Error::InvalidHeader(_)
                    | Error::DataTooShort { .. }
                    | Error::UnsupportedGeneration(_)
                    | Error::InvalidVersion(_)),
                ) => {
                    debug!("Skipping {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Loaded {} files ({} assets) from {}",
            collection.files.len(),
            collection.asset_count(),
            dir.as_ref().display()
        );
        Ok(collection)
    }

    pub fn files(&self) -> &[SerializedFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&SerializedFile> {
        self.files.get(id.0 as usize)
    }

    pub fn assets_of(&self, id: FileId) -> &[Asset] {
        self.file(id).map(SerializedFile::assets).unwrap_or(&[])
    }

    /// Find a file by name or path; matching is on normalized identity
    pub fn lookup(&self, name: &str) -> Option<&SerializedFile> {
        self.by_identity
            .get(&normalize_identity(name))
            .and_then(|&id| self.file(id))
    }

    pub fn asset(&self, key: AssetKey) -> Option<&Asset> {
        self.file(key.file).and_then(|f| f.asset(key.path_id))
    }

    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.files.iter().flat_map(|f| f.assets().iter())
    }

    pub fn asset_count(&self) -> usize {
        self.files.iter().map(|f| f.assets().len()).sum()
    }

    /// File a reference's `file_index` points at, seen from `from`
    pub fn resolve_file(&self, from: FileId, file_index: i32) -> Option<FileId> {
        if file_index == 0 {
            return self.file(from).map(SerializedFile::id);
        }
        let dep = dependency_slot(file_index)?;
        let external = self.file(from)?.dependencies().get(dep)?;
        self.by_identity.get(&external.identity()).copied()
    }

    /// Resolve `reference` as stored in file `from`
    pub fn resolve(&self, reference: Reference, from: FileId) -> Lookup<'_> {
        if reference.is_null() {
            return Lookup::Null;
        }

        let found = self
            .resolve_file(from, reference.file_index)
            .and_then(|file| self.asset(AssetKey::new(file, reference.path_id)));
        if let Some(asset) = found {
            return Lookup::Found(asset);
        }

        let from_file = self.file(from);
        let target_file = if reference.file_index == 0 {
            from_file.map(|f| f.identity().to_string())
        } else {
            dependency_slot(reference.file_index)
                .and_then(|dep| from_file?.dependencies().get(dep))
                .map(|external| external.identity())
        };

        Lookup::Dangling(DanglingReference {
            from_file: from_file
                .map(|f| f.identity().to_string())
                .unwrap_or_default(),
            file_index: reference.file_index,
            path_id: reference.path_id,
            target_file,
        })
    }
}

/// Position in the dependency list of a non-zero `file_index`
fn dependency_slot(file_index: i32) -> Option<usize> {
    usize::try_from(file_index).ok()?.checked_sub(1)
}
