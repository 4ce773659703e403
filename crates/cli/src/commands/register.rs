//! `icecore register` — appends one binding to a startup manifest file on
//! disk. There is no live `Registry` for a one-shot CLI invocation to
//! mutate; the manifest this writes is what `run`/`validate` load via
//! `COMPONENT_MANIFEST_PATHS` on their *next* invocation.

use std::path::Path;

use anyhow::{Context, Result};
use icecore_registry::{Manifest, ManifestEntry, RegistryKind};

pub fn run(manifest_path: &Path, kind: RegistryKind, name: String, definition_path: &Path) -> Result<()> {
    let definition: serde_json::Value = {
        let contents = std::fs::read_to_string(definition_path)
            .with_context(|| format!("reading definition file {}", definition_path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing definition file {}", definition_path.display()))?
    };

    let mut manifest = match std::fs::read_to_string(manifest_path) {
        Ok(contents) => serde_json::from_str::<Manifest>(&contents)
            .with_context(|| format!("parsing manifest file {}", manifest_path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("reading manifest file {}", manifest_path.display()))
        }
    };

    if let Some(existing) = manifest
        .entries
        .iter_mut()
        .find(|entry| entry.kind == kind && entry.name == name)
    {
        existing.definition = definition;
    } else {
        manifest.entries.push(ManifestEntry { kind, name, definition });
    }

    let serialized = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(manifest_path, serialized)
        .with_context(|| format!("writing manifest file {}", manifest_path.display()))?;

    println!("registered into {}", manifest_path.display());
    Ok(())
}
