//! Export diagnostics and per-unit summaries

use serde::Serialize;

use crate::asset::AssetKey;
use crate::collection::DanglingReference;
use crate::schema::ClassId;
use crate::version::Version;

/// Non-fatal problem found while exporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Reference whose target is missing; encoded as a null reference
    DanglingReference {
        asset: String,
        reference: DanglingReference,
    },
    /// Asset decoded with the nearest known layout
    UnknownVersionLayout {
        asset: String,
        class: String,
        version: String,
        effective: String,
    },
}

/// Asset left out of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    pub asset: String,
    pub class: String,
    pub cause: String,
}

/// Outcome of exporting one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub kind: String,
    pub exported: usize,
    pub dangling: usize,
    pub fallbacks: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub skipped: Vec<SkippedAsset>,
    /// Document names of external units; `fileIndex` n is entry n - 1
    pub externals: Vec<String>,
}

impl UnitReport {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn add_dangling(&mut self, asset: AssetKey, reference: DanglingReference) {
        self.dangling += 1;
        self.diagnostics.push(Diagnostic::DanglingReference {
            asset: asset.to_string(),
            reference,
        });
    }

    pub fn add_fallback(
        &mut self,
        asset: AssetKey,
        class: ClassId,
        version: Version,
        effective: Version,
    ) {
        self.fallbacks += 1;
        self.diagnostics.push(Diagnostic::UnknownVersionLayout {
            asset: asset.to_string(),
            class: class.to_string(),
            version: version.to_string(),
            effective: effective.to_string(),
        });
    }

    pub fn add_skipped(&mut self, asset: AssetKey, class: ClassId, cause: impl ToString) {
        self.skipped.push(SkippedAsset {
            asset: asset.to_string(),
            class: class.to_string(),
            cause: cause.to_string(),
        });
    }
}

/// Unit whose export aborted; nothing was written for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUnit {
    pub name: String,
    pub cause: String,
}

/// Summary of a whole run, written as `manifest.json` by the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub files: usize,
    pub units: Vec<UnitReport>,
    pub failed: Vec<FailedUnit>,
}

impl RunReport {
    pub fn total_exported(&self) -> usize {
        self.units.iter().map(|u| u.exported).sum()
    }

    pub fn total_dangling(&self) -> usize {
        self.units.iter().map(|u| u.dangling).sum()
    }

    pub fn total_fallbacks(&self) -> usize {
        self.units.iter().map(|u| u.fallbacks).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.units.iter().map(|u| u.skipped.len()).sum()
    }
}
