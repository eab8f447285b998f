//! Export units, identifiers and document rendering

mod allocator;
mod exporter;
mod project;
pub mod reconstruct;
mod unit;

pub use allocator::{main_object_id, ExportIdAllocator, DEFAULT_ATTEMPT_LIMIT, ID_BAND};
pub use exporter::{export_asset, export_documents, import_fields, write_unit};
pub use project::{Project, ProjectOptions, DEFAULT_SCENE_PATTERNS};
pub use unit::{AssetUnit, ExportableUnit, OcclusionDataUnit, SceneUnit, UnitKind};

use tracing::debug;

use crate::asset::{AssetKey, FileId, Reference};
use crate::collection::{DanglingReference, FileCollection, Lookup};
use crate::report::UnitReport;

/// Encoded `{fileID, fileIndex}` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportPointer {
    pub file_id: i64,
    pub file_index: i32,
}

impl ExportPointer {
    pub const NULL: Self = Self {
        file_id: 0,
        file_index: 0,
    };
}

/// State of one unit export: the external table and the report
pub struct ExportContext<'a> {
    project: &'a Project<'a>,
    unit: usize,
    /// Other units referenced so far; `fileIndex` n is entry n - 1
    externals: Vec<usize>,
    pub report: UnitReport,
}

impl<'a> ExportContext<'a> {
    pub fn new(project: &'a Project<'a>, unit: usize) -> Self {
        let report = project
            .unit(unit)
            .map(|u| UnitReport::new(u.name(), u.kind().as_str()))
            .unwrap_or_default();
        Self {
            project,
            unit,
            externals: Vec::new(),
            report,
        }
    }

    pub fn project(&self) -> &'a Project<'a> {
        self.project
    }

    pub fn collection(&self) -> &'a FileCollection {
        self.project.collection()
    }

    pub fn unit(&self) -> Option<&'a dyn ExportableUnit> {
        self.project.unit(self.unit)
    }

    /// Export id of `key`: this unit first, then the unit owning it
    pub fn export_id_of(&self, key: AssetKey) -> Option<i64> {
        if let Some(id) = self.unit().and_then(|u| u.export_id_of(key)) {
            return Some(id);
        }
        let owner = self.project.owner(key)?;
        self.project.unit(owner)?.export_id_of(key)
    }

    fn external_index(&mut self, unit: usize) -> i32 {
        let pos = match self.externals.iter().position(|&u| u == unit) {
            Some(pos) => pos,
            None => {
                self.externals.push(unit);
                self.externals.len() - 1
            }
        };
        pos as i32 + 1
    }

    /// Rewrite a reference stored in file `from` by asset `referrer`
    pub fn encode_reference(
        &mut self,
        reference: Reference,
        from: FileId,
        referrer: AssetKey,
    ) -> ExportPointer {
        let target = match self.collection().resolve(reference, from) {
            Lookup::Null => return ExportPointer::NULL,
            Lookup::Dangling(dangling) => {
                self.dangling(referrer, dangling);
                return ExportPointer::NULL;
            }
            Lookup::Found(asset) => asset.key,
        };

        if let Some(file_id) = self.unit().and_then(|u| u.export_id_of(target)) {
            return ExportPointer {
                file_id,
                file_index: 0,
            };
        }

        let owned = self
            .project
            .owner(target)
            .and_then(|owner| Some((owner, self.project.unit(owner)?.export_id_of(target)?)));
        match owned {
            Some((owner, file_id)) => ExportPointer {
                file_id,
                file_index: self.external_index(owner),
            },
            None => {
                debug!("{} references {} which no unit exports", referrer, target);
                ExportPointer::NULL
            }
        }
    }

    pub(crate) fn dangling(&mut self, referrer: AssetKey, reference: DanglingReference) {
        debug!("Dangling reference from {}: {}", referrer, reference);
        self.report.add_dangling(referrer, reference);
    }

    /// Close the export, filling the external table of the report
    pub fn finish(mut self) -> UnitReport {
        self.report.externals = self
            .externals
            .iter()
            .filter_map(|&u| self.project.unit(u))
            .map(|u| u.name().to_string())
            .collect();
        self.report
    }
}
