//! Partitioning a collection into export units

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::asset::{Asset, AssetKey, FileId};
use crate::collection::FileCollection;
use crate::export::unit::{AssetUnit, ExportableUnit, OcclusionDataUnit, SceneUnit};
use crate::export::{exporter, reconstruct, ExportContext};
use crate::report::UnitReport;
use crate::script::{MonoScriptResolver, ScriptTypeResolver};
use crate::{Error, Result};

/// File identity globs treated as scenes when none are configured
pub const DEFAULT_SCENE_PATTERNS: &[&str] = &["level*", "*.unity"];

/// Behaviour switches for building and exporting a project
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Fail the unit instead of skipping assets with inconsistent siblings
    pub strict: bool,
    pub scene_patterns: Vec<String>,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            strict: false,
            scene_patterns: DEFAULT_SCENE_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Export units over one collection, plus the asset → unit map
pub struct Project<'c> {
    collection: &'c FileCollection,
    options: ProjectOptions,
    units: Vec<Box<dyn ExportableUnit>>,
    owners: HashMap<AssetKey, usize>,
    names: HashSet<String>,
    resolver: Box<dyn ScriptTypeResolver>,
}

impl<'c> Project<'c> {
    pub fn new(collection: &'c FileCollection, options: ProjectOptions) -> Self {
        Self {
            collection,
            options,
            units: Vec::new(),
            owners: HashMap::new(),
            names: HashSet::new(),
            resolver: Box::new(MonoScriptResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ScriptTypeResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn collection(&self) -> &'c FileCollection {
        self.collection
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn resolver(&self) -> &dyn ScriptTypeResolver {
        self.resolver.as_ref()
    }

    pub fn units(&self) -> impl Iterator<Item = &dyn ExportableUnit> {
        self.units.iter().map(|u| u.as_ref())
    }

    pub fn unit(&self, index: usize) -> Option<&dyn ExportableUnit> {
        self.units.get(index).map(|u| u.as_ref())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Index of the unit owning `key`
    pub fn owner(&self, key: AssetKey) -> Option<usize> {
        self.owners.get(&key).copied()
    }

    pub fn is_scene(&self, identity: &str) -> bool {
        self.options
            .scene_patterns
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, identity))
    }

    /// Add every object of `file` as one scene unit
    ///
    /// Pre-5.5 settings with baked PVS data also get an
    /// `OcclusionCullingData` unit next to the scene.
    pub fn add_scene(&mut self, file: FileId) -> Result<usize> {
        let collection = self.collection;
        let source = collection
            .file(file)
            .ok_or_else(|| Error::AssetNotFound(format!("file {}", file.0)))?;
        for asset in source.assets() {
            self.check_unowned(asset.key)?;
        }

        let stem = sanitize(source.identity().trim_end_matches(".unity"));
        let name = self.unique_name(&format!("Scenes/{stem}"), "unity");
        let unit = SceneUnit::build(collection, file, name)?;
        let index = self.register(Box::new(unit));

        for settings in source.assets().iter().filter(|a| reconstruct::has_legacy_pvs(a)) {
            let name = self.unique_name(&format!("Scenes/{stem}/OcclusionCullingData"), "asset");
            self.register(Box::new(OcclusionDataUnit::new(settings.key, name)));
        }
        Ok(index)
    }

    /// Add a standalone asset unit rooted at `root`
    pub fn add_asset(&mut self, root: AssetKey) -> Result<usize> {
        let asset = self
            .collection
            .asset(root)
            .ok_or_else(|| Error::AssetNotFound(root.to_string()))?;
        self.check_unowned(root)?;

        let name = self.unique_name(&asset_base_name(asset), "asset");
        let owners = &self.owners;
        let unit = AssetUnit::build(self.collection, root, name, |key| owners.contains_key(&key))?;
        Ok(self.register(Box::new(unit)))
    }

    /// Partition the whole collection
    ///
    /// Files matching a scene pattern become scene units. In the remaining
    /// files, non-hierarchy objects become asset units first so they can pull
    /// in their hierarchy; hierarchy objects nobody reached get units last.
    pub fn add_collection(&mut self) -> Result<()> {
        let collection = self.collection;
        let (scenes, others): (Vec<_>, Vec<_>) = collection
            .files()
            .iter()
            .partition(|f| self.is_scene(f.identity()));

        for file in &scenes {
            self.add_scene(file.id())?;
        }

        for file in &others {
            for asset in file.assets().iter().filter(|a| !a.class.is_hierarchy()) {
                if self.owner(asset.key).is_none() {
                    self.add_asset(asset.key)?;
                }
            }
        }
        for file in &others {
            for asset in file.assets() {
                if self.owner(asset.key).is_none() {
                    self.add_asset(asset.key)?;
                }
            }
        }

        info!(
            "Partitioned {} files into {} units ({} scenes)",
            collection.files().len(),
            self.units.len(),
            scenes.len()
        );
        Ok(())
    }

    fn check_unowned(&self, key: AssetKey) -> Result<()> {
        match self.owner(key) {
            Some(unit) => Err(Error::AlreadyOwned {
                asset: key.to_string(),
                unit: self.units[unit].name().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn register(&mut self, unit: Box<dyn ExportableUnit>) -> usize {
        let index = self.units.len();
        for &key in unit.assets() {
            self.owners.insert(key, index);
        }
        debug!("Unit {} ({}): {} assets", unit.name(), unit.kind(), unit.assets().len());
        self.units.push(unit);
        index
    }

    fn unique_name(&mut self, base: &str, ext: &str) -> String {
        let mut name = format!("{base}.{ext}");
        let mut n = 1;
        while self.names.contains(&name.to_lowercase()) {
            name = format!("{base}_{n}.{ext}");
            n += 1;
        }
        self.names.insert(name.to_lowercase());
        name
    }

    /// Render unit `index` as a YAML stream
    pub fn export_unit(&self, index: usize) -> Result<(String, UnitReport)> {
        let unit = self
            .unit(index)
            .ok_or_else(|| Error::AssetNotFound(format!("unit {index}")))?;
        let mut ctx = ExportContext::new(self, index);
        let text = exporter::write_unit(unit, &mut ctx)?;
        Ok((text, ctx.finish()))
    }

    /// Export unit `index` below `root`, creating directories as needed
    pub fn export_to_path(&self, index: usize, root: &Path) -> Result<UnitReport> {
        let (text, report) = self.export_unit(index)?;
        let path = root.join(&report.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, text)?;
        debug!("Wrote {}", path.display());
        Ok(report)
    }
}

fn asset_base_name(asset: &Asset) -> String {
    let stem = match asset.name() {
        Some(name) => sanitize(name),
        None => format!("{}_{}", asset.class.name(), asset.key.path_id),
    };
    format!("{}/{}", asset.class.name(), stem)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
