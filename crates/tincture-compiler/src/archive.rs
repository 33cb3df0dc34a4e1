//! Gzip-compressed tar archives in the override-package shape.
//!
//! ```text
//! assets/
//! manifest.json
//! res/
//! res/values/
//! res/values/colors.json
//! res/values-rich/            (optional)
//! res/values-rich/colors.json (optional)
//! ```
//!
//! Headers carry zero mtime, uid and gid so identical inputs produce
//! identical bytes.

use std::io::{Read, Write};
use std::path::{Component, Path};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use tar::{EntryType, Header};

use crate::error::{CompileError, Result};
use crate::manifest::{
    ASSETS_DIR, MANIFEST_PATH, Manifest, RESOURCES_DIR, ResourceTable, ResourceTier,
};

/// Largest file entry the reader will buffer.
pub const MAX_ENTRY_BYTES: u64 = 1 << 20;

/// Serialize a manifest and its tables into archive bytes.
///
/// `tables` must hold the baseline tier and may hold the rich tier; the
/// manifest's declared tiers are checked against it.
pub fn write_archive(manifest: &Manifest, tables: &[(ResourceTier, ResourceTable)]) -> Result<Vec<u8>> {
    let mut tiers: Vec<ResourceTier> = tables.iter().map(|(tier, _)| *tier).collect();
    tiers.sort_unstable();
    tiers.dedup();
    if tiers.len() != tables.len() || tiers != manifest.tiers {
        return Err(CompileError::malformed(
            "resource tables do not match the manifest's declared tiers",
        ));
    }
    if !tiers.contains(&ResourceTier::Baseline) {
        return Err(CompileError::malformed("baseline resource table is required"));
    }

    let mut builder = tar::Builder::new(Vec::new());
    append_dir(&mut builder, ASSETS_DIR)?;
    append_json(&mut builder, MANIFEST_PATH, "manifest", manifest)?;
    append_dir(&mut builder, RESOURCES_DIR)?;
    for tier in &tiers {
        let Some((_, table)) = tables.iter().find(|(t, _)| t == tier) else {
            continue;
        };
        append_dir(&mut builder, tier.dir())?;
        append_json(&mut builder, tier.table_path(), "resource table", table)?;
    }
    builder.finish()?;
    let tar_bytes = builder.into_inner()?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes)?;
    Ok(encoder.finish()?)
}

fn base_header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header
}

fn append_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str) -> Result<()> {
    let mut header = base_header(EntryType::Directory, 0o755, 0);
    builder.append_data(&mut header, Path::new(path), std::io::empty())?;
    Ok(())
}

fn append_json<T: Serialize>(
    builder: &mut tar::Builder<Vec<u8>>,
    path: &str,
    what: &'static str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| CompileError::Serialize { what, source })?;
    let mut header = base_header(EntryType::Regular, 0o644, bytes.len() as u64);
    builder.append_data(&mut header, Path::new(path), bytes.as_slice())?;
    Ok(())
}

/// Parsed contents of an override-package archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReader {
    manifest: Manifest,
    baseline: ResourceTable,
    rich: Option<ResourceTable>,
    entries: Vec<String>,
}

impl ArchiveReader {
    /// Decompress and parse `bytes`.
    ///
    /// Fails on absolute paths, `..` components, links, unknown entries,
    /// oversized files, a missing manifest or baseline table, and tiers that
    /// disagree with the manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut manifest: Option<Manifest> = None;
        let mut baseline: Option<ResourceTable> = None;
        let mut rich: Option<ResourceTable> = None;
        let mut entries = Vec::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry_name(&entry.path()?)?;
            let entry_type = entry.header().entry_type();

            if entry_type.is_dir() {
                if !is_known_dir(&name) {
                    return Err(CompileError::malformed(format!("unexpected directory {name:?}")));
                }
                entries.push(format!("{name}/"));
                continue;
            }
            if !entry_type.is_file() {
                return Err(CompileError::malformed(format!(
                    "entry {name:?} is not a regular file"
                )));
            }
            if entry.size() > MAX_ENTRY_BYTES {
                return Err(CompileError::malformed(format!("entry {name:?} is too large")));
            }
            let mut content = Vec::new();
            entry.by_ref().take(MAX_ENTRY_BYTES).read_to_end(&mut content)?;

            match name.as_str() {
                MANIFEST_PATH => manifest = Some(parse_json(&name, &content)?),
                path if path == ResourceTier::Baseline.table_path() => {
                    baseline = Some(parse_json(&name, &content)?);
                }
                path if path == ResourceTier::Rich.table_path() => {
                    rich = Some(parse_json(&name, &content)?);
                }
                _ => {
                    return Err(CompileError::malformed(format!("unexpected entry {name:?}")));
                }
            }
            entries.push(name);
        }

        let manifest = manifest.ok_or_else(|| CompileError::malformed("missing manifest.json"))?;
        let baseline =
            baseline.ok_or_else(|| CompileError::malformed("missing baseline resource table"))?;
        let present: Vec<ResourceTier> = std::iter::once(ResourceTier::Baseline)
            .chain(rich.as_ref().map(|_| ResourceTier::Rich))
            .collect();
        if present != manifest.tiers {
            return Err(CompileError::malformed(
                "resource tables do not match the manifest's declared tiers",
            ));
        }

        Ok(Self {
            manifest,
            baseline,
            rich,
            entries,
        })
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn baseline_table(&self) -> &ResourceTable {
        &self.baseline
    }

    #[must_use]
    pub fn rich_table(&self) -> Option<&ResourceTable> {
        self.rich.as_ref()
    }

    /// Entry names in archive order; directories end in `/`.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

fn entry_name(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| CompileError::malformed("entry name is not UTF-8"))?,
            ),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(CompileError::malformed(format!(
                    "entry {} escapes the archive root",
                    path.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(CompileError::malformed(format!(
                    "entry {} is absolute",
                    path.display()
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(CompileError::malformed("empty entry name"));
    }
    Ok(parts.join("/"))
}

fn is_known_dir(name: &str) -> bool {
    name == ASSETS_DIR
        || name == RESOURCES_DIR
        || name == ResourceTier::Baseline.dir()
        || name == ResourceTier::Rich.dir()
}

fn parse_json<T: serde::de::DeserializeOwned>(name: &str, content: &[u8]) -> Result<T> {
    serde_json::from_slice(content)
        .map_err(|err| CompileError::malformed(format!("{name}: {err}")))
}
