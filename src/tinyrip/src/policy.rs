//! Version policy
//!
//! Pure functions answering "which layout, which fields" for a class at a
//! given producer version and build flags. Versions outside the verified
//! window fall back to the nearest known layout; the caller is told so and
//! decides how loudly to report it.

use crate::schema::{self, ClassId, FieldSpec, Layout, FIRST_UNKNOWN, LATEST_KNOWN};
use crate::version::{BuildFlags, Version};

const V5_0: Version = Version::new(5, 0, 0);

/// Layout selected for a (class, version) pair
#[derive(Debug, Clone, Copy)]
pub struct LayoutChoice {
    pub layout: &'static Layout,
    /// Version the field predicates are evaluated at
    pub effective: Version,
    /// Set when `effective` differs from the requested version
    pub fallback: bool,
}

impl LayoutChoice {
    /// Top-level fields serialized under `flags`, in layout order
    pub fn present(&self, flags: BuildFlags) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        let effective = self.effective;
        self.layout
            .fields
            .iter()
            .filter(move |spec| spec.presence.holds(effective, flags))
    }

    /// Fields that belong to this version but were stripped by `flags`
    /// and can be rebuilt from sibling assets
    pub fn derived(&self, flags: BuildFlags) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        let effective = self.effective;
        self.layout.fields.iter().filter(move |spec| {
            spec.derived
                && spec.presence.holds_for_version(effective)
                && !spec.presence.holds(effective, flags)
        })
    }

    /// Whether a nested field spec is on disk at the effective version
    pub fn holds(&self, spec: &FieldSpec, flags: BuildFlags) -> bool {
        spec.presence.holds(self.effective, flags)
    }
}

/// Select the record layout for `class` at `version`
///
/// Versions newer than the verified window are read with the newest known
/// layout; versions older than the class's first layout use that first
/// layout. Both cases set `fallback`.
pub fn variant_for(class: ClassId, version: Version) -> LayoutChoice {
    let table = schema::layouts(class);
    let first = &table[0];

    let (effective, fallback) = if version >= FIRST_UNKNOWN {
        (LATEST_KNOWN, true)
    } else if version < first.since {
        // No lower layout exists: the class did not exist yet, so only
        // records built from older data (or mislabelled files) land here
        (first.since, true)
    } else {
        (version, false)
    };

    let layout = table
        .iter()
        .rev()
        .find(|layout| layout.since <= effective)
        .unwrap_or(first);

    LayoutChoice {
        layout,
        effective,
        fallback,
    }
}

/// Names of the top-level fields present on disk, in layout order
pub fn fields_present(class: ClassId, version: Version, flags: BuildFlags) -> Vec<&'static str> {
    variant_for(class, version)
        .present(flags)
        .map(|spec| spec.name)
        .collect()
}

/// Names of the fields stripped by `flags` that a reconstructor must supply
pub fn derived_fields(class: ClassId, version: Version, flags: BuildFlags) -> Vec<&'static str> {
    variant_for(class, version)
        .derived(flags)
        .map(|spec| spec.name)
        .collect()
}

/// Object pointers store 64-bit path ids from 5.0 on
pub fn uses_long_path_ids(version: Version) -> bool {
    version >= V5_0
}
