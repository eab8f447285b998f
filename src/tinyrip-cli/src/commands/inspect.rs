//! Inspect command handler

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tinyrip::{ClassId, SerializedFile};

/// Handle the inspect command
pub fn handle(input: &Path, objects: bool) -> Result<()> {
    let file = SerializedFile::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    print!("{}", describe(&file, objects));
    Ok(())
}

/// Human-readable summary of a file
pub fn describe(file: &SerializedFile, objects: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File:         {}", file.name());
    let _ = writeln!(out, "Identity:     {}", file.identity());
    let _ = writeln!(out, "Version:      {}", file.version());
    let _ = writeln!(out, "Build:        {}", file.flags());
    let _ = writeln!(out, "Platform:     {}", file.platform());
    let _ = writeln!(out, "Generation:   {}", file.generation());
    let _ = writeln!(out, "Endian:       {:?}", file.endian());
    let _ = writeln!(out, "Objects:      {}", file.assets().len());

    let mut classes: BTreeMap<ClassId, usize> = BTreeMap::new();
    for asset in file.assets() {
        *classes.entry(asset.class).or_default() += 1;
    }
    for (class, count) in &classes {
        let _ = writeln!(out, "  {:>6} {:<26} {}", class.0, class.name(), count);
    }

    let _ = writeln!(out, "Dependencies: {}", file.dependencies().len());
    for (i, dep) in file.dependencies().iter().enumerate() {
        let _ = writeln!(out, "  [{}] {} ({})", i + 1, dep.path, hex::encode(dep.guid));
    }

    if objects {
        let _ = writeln!(out);
        for asset in file.assets() {
            let fallback = match asset.layout_fallback {
                Some(effective) => format!(" [layout {}]", effective),
                None => String::new(),
            };
            let _ = writeln!(
                out,
                "{:>12} {:<26} {}{}",
                asset.key.path_id,
                asset.class.name(),
                asset.name().unwrap_or("-"),
                fallback
            );
        }
    }
    out
}
