//! Export command handlers
//!
//! Loads the input into one collection, partitions it into units and writes
//! every unit on a rayon pool, followed by a `manifest.json` run report.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tinyrip::{
    FailedUnit, FileCollection, Project, ProjectOptions, RunReport, SerializedFile, UnitReport,
};
use tracing::{error, info, warn};

/// Run report file written next to the exported units
pub const MANIFEST_NAME: &str = "manifest.json";

/// Options of one export run, merged from the command line and config
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output: PathBuf,
    pub threads: usize,
    pub project: ProjectOptions,
}

/// Handle the export command
pub fn handle(input: &Path, options: &ExportOptions) -> Result<()> {
    let collection = load(input)?;
    if collection.files().is_empty() {
        bail!("No serialized files found in {}", input.display());
    }

    let mut project = Project::new(&collection, options.project.clone());
    project
        .add_collection()
        .context("Failed to partition collection into units")?;

    let report = export_project(&project, &options.output, options.threads)?;
    let manifest = write_manifest(&options.output, &report)?;

    eprintln!(
        "Exported: {} units, {} assets ({} dangling references, {} layout fallbacks, {} skipped)",
        report.units.len(),
        report.total_exported(),
        report.total_dangling(),
        report.total_fallbacks(),
        report.total_skipped()
    );
    eprintln!("Manifest: {}", manifest.display());

    if !report.failed.is_empty() {
        bail!("{} of {} units failed to export", report.failed.len(), project.len());
    }
    Ok(())
}

/// Load a single file, or every container below a directory
pub fn load(input: &Path) -> Result<FileCollection> {
    if input.is_dir() {
        return FileCollection::load_dir(input)
            .with_context(|| format!("Failed to load files from {}", input.display()));
    }

    let file = SerializedFile::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut collection = FileCollection::new();
    collection.add(file)?;
    Ok(collection)
}

/// Export every unit of `project` below `output`
///
/// Units that fail are logged and listed under `failed` with their cause.
pub fn export_project(project: &Project<'_>, output: &Path, threads: usize) -> Result<RunReport> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to start worker pool")?;

    let pb = ProgressBar::new(project.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let results: Vec<Result<UnitReport, FailedUnit>> = pool.install(|| {
        (0..project.len())
            .into_par_iter()
            .map(|index| {
                let result = project.export_to_path(index, output).map_err(|e| {
                    let name = project.unit(index).map(|u| u.name()).unwrap_or("?");
                    error!("Failed to export {}: {}", name, e);
                    FailedUnit {
                        name: name.to_string(),
                        cause: e.to_string(),
                    }
                });
                pb.inc(1);
                result
            })
            .collect()
    });

    pb.finish_with_message("Done");

    let mut report = RunReport {
        files: project.collection().files().len(),
        units: Vec::with_capacity(results.len()),
        failed: Vec::new(),
    };
    for result in results {
        match result {
            Ok(unit) => {
                if !unit.skipped.is_empty() {
                    warn!("{}: skipped {} assets", unit.name, unit.skipped.len());
                }
                report.units.push(unit);
            }
            Err(failed) => report.failed.push(failed),
        }
    }

    info!(
        "Exported {} units ({} assets) to {}",
        report.units.len(),
        report.total_exported(),
        output.display()
    );
    Ok(report)
}

/// Write the run report as pretty JSON, returning its path
pub fn write_manifest(output: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = output.join(MANIFEST_NAME);
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyrip::{Asset, AssetKey, BuildFlags, ClassId, Fields, FileId, Reference, Value, Version};

    fn named(version: Version, path_id: i64, name: &str) -> Asset {
        Asset::new(
            AssetKey::new(FileId(0), path_id),
            ClassId(21),
            version,
            BuildFlags::SERIALIZE_GAME_RELEASE,
            Fields::new().with("m_Name", Value::String(name.into())),
        )
    }

    fn collection() -> FileCollection {
        let version: Version = "2017.4.1f1".parse().unwrap();
        let flags = BuildFlags::SERIALIZE_GAME_RELEASE;

        let mut level = SerializedFile::new("level0", version, flags);
        let shared = level.add_dependency("sharedassets0.assets");
        let renderer = Asset::new(
            AssetKey::new(FileId(0), 1),
            ClassId::MESH_RENDERER,
            version,
            flags,
            Fields::new()
                .with("m_GameObject", Value::Reference(Reference::NULL))
                .with(
                    "m_Materials",
                    Value::Sequence(vec![Value::Reference(Reference::new(shared, 10))]),
                ),
        );
        level.insert(renderer).unwrap();

        let mut assets = SerializedFile::new("sharedassets0.assets", version, flags);
        assets.insert(named(version, 10, "Stone")).unwrap();
        assets.insert(named(version, 11, "Rock")).unwrap();

        let mut collection = FileCollection::new();
        collection.add(level).unwrap();
        collection.add(assets).unwrap();
        collection
    }

    /// Release data declaring 3 renderers for a scene whose settings list 4
    fn inconsistent_collection() -> FileCollection {
        let version: Version = "2017.4.1f1".parse().unwrap();
        let flags = BuildFlags::SERIALIZE_GAME_RELEASE;
        let scene_guid = [7u8; 16];

        let mut shared = SerializedFile::new("sharedassets0.assets", version, flags);
        let window = Fields::new()
            .with("indexRenderers", Value::Int(0))
            .with("sizeRenderers", Value::Int(3))
            .with("indexPortals", Value::Int(0))
            .with("sizePortals", Value::Int(0))
            .with("scene", Value::Guid(scene_guid));
        let data = Asset::new(
            AssetKey::new(FileId(0), 1),
            ClassId::OCCLUSION_CULLING_DATA,
            version,
            flags,
            Fields::new()
                .with("m_Name", Value::String("Data".into()))
                .with("m_PVSData", Value::Bytes(Vec::new()))
                .with("m_Scenes", Value::Sequence(vec![Value::Record(window)])),
        );
        shared.insert(data).unwrap();

        let mut level = SerializedFile::new("level0", version, flags);
        let settings = Asset::new(
            AssetKey::new(FileId(0), 2),
            ClassId::OCCLUSION_CULLING_SETTINGS,
            version,
            flags,
            Fields::new()
                .with("m_SceneGUID", Value::Guid(scene_guid))
                .with(
                    "m_StaticRenderers",
                    Value::Sequence(vec![Value::Reference(Reference::NULL); 4]),
                )
                .with("m_Portals", Value::Sequence(Vec::new())),
        );
        level.insert(settings).unwrap();

        let mut collection = FileCollection::new();
        collection.add(shared).unwrap();
        collection.add(level).unwrap();
        collection
    }

    #[test]
    fn test_export_project_writes_units_and_manifest() {
        let c = collection();
        let mut project = Project::new(&c, ProjectOptions::default());
        project.add_collection().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = export_project(&project, dir.path(), 2).unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(report.files, 2);
        assert_eq!(report.units.len(), 3);
        assert_eq!(report.total_exported(), 3);
        assert_eq!(report.total_dangling(), 0);

        assert!(dir.path().join("Scenes/level0.unity").is_file());
        assert!(dir.path().join("Object/Stone.asset").is_file());
        assert!(dir.path().join("Object/Rock.asset").is_file());

        let scene = report.units.iter().find(|u| u.kind == "scene").unwrap();
        assert_eq!(scene.externals, vec!["Object/Stone.asset".to_string()]);
        let text = fs::read_to_string(dir.path().join("Scenes/level0.unity")).unwrap();
        assert!(text.contains("fileID: 2100000"));
        assert!(text.contains("fileIndex: 1"));

        let path = write_manifest(dir.path(), &report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["files"], 2);
        assert_eq!(json["units"].as_array().unwrap().len(), 3);
        assert_eq!(json["failed"].as_array().unwrap().len(), 0);

        // Strict mode turns a data asset at odds with its settings into a failed unit
        let c = inconsistent_collection();
        let options = ProjectOptions {
            strict: true,
            ..ProjectOptions::default()
        };
        let mut project = Project::new(&c, options);
        project.add_collection().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = export_project(&project, dir.path(), 2).unwrap();
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "OcclusionCullingData/Data.asset");
        assert!(report.failed[0].cause.contains("Inconsistent"), "{}", report.failed[0].cause);
        assert!(!dir.path().join("OcclusionCullingData/Data.asset").exists());

        let path = write_manifest(dir.path(), &report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["failed"][0]["name"], "OcclusionCullingData/Data.asset");
    }

    #[test]
    fn test_load_rejects_non_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"not a serialized file at all").unwrap();
        assert!(load(&path).is_err());

        // Directories skip files without a container header
        let collection = load(dir.path()).unwrap();
        assert!(collection.files().is_empty());
    }
}
