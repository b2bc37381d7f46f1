//! Named build outputs and their on-disk form.
//!
//! [`Assets`] is the artifact map handed to the plugin. It can be loaded from
//! a build output directory and the entries replaced during a pass written
//! back with atomic temp-file-then-rename writes.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use ssireplace_shared::{Result, SsiReplaceError};

// ---------------------------------------------------------------------------
// SourceMap
// ---------------------------------------------------------------------------

/// Version-3 source map. Rewritten documents carry an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    pub version: u8,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
    pub file: String,
}

impl SourceMap {
    /// A map with no sources or mappings for `file`.
    pub fn empty(file: impl Into<String>) -> Self {
        Self {
            version: 3,
            sources: Vec::new(),
            names: Vec::new(),
            mappings: String::new(),
            file: file.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "version": self.version,
            "sources": self.sources,
            "names": self.names,
            "mappings": self.mappings,
            "file": self.file,
        })
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// One build output: raw content plus an optional source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    content: Vec<u8>,
    map: Option<SourceMap>,
}

impl Asset {
    pub fn from_bytes(content: Vec<u8>) -> Self {
        Self { content, map: None }
    }

    pub fn from_text(content: impl Into<String>) -> Self {
        Self::from_bytes(content.into().into_bytes())
    }

    /// Attach a source map.
    pub fn with_map(mut self, map: SourceMap) -> Self {
        self.map = Some(map);
        self
    }

    /// Content as text. Invalid UTF-8 is replaced, never rejected.
    pub fn source(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.content
    }

    /// Content length in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn map(&self) -> Option<&SourceMap> {
        self.map.as_ref()
    }

    /// SHA-256 of the content, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        format!("{:x}", hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Artifact map keyed by `/`-separated path relative to the output root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    entries: BTreeMap<String, Asset>,
    updated: BTreeSet<String>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an asset without marking it as updated.
    pub fn insert(&mut self, name: impl Into<String>, asset: Asset) {
        self.entries.insert(name.into(), asset);
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Replace an existing asset wholesale and mark it for commit.
    pub fn update_asset(&mut self, name: &str, asset: Asset) -> Result<()> {
        let slot = self
            .entries
            .get_mut(name)
            .ok_or_else(|| SsiReplaceError::ArtifactNotFound { name: name.into() })?;
        *slot = asset;
        self.updated.insert(name.to_string());
        Ok(())
    }

    /// Names replaced through [`Assets::update_asset`].
    pub fn updated(&self) -> impl Iterator<Item = &str> {
        self.updated.iter().map(String::as_str)
    }

    /// Load every regular file under `dir` as an asset.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut assets = Self::new();
        collect_files(dir, dir, &mut assets)?;
        info!(count = assets.len(), "loaded build assets");
        Ok(assets)
    }

    /// Write updated assets under `dir`. Returns the paths written.
    ///
    /// Each file is written to a sibling temp file and renamed over the target,
    /// so readers never observe a half-written document.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn write_updated(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for name in &self.updated {
            let Some(asset) = self.entries.get(name) else {
                continue;
            };

            let target = name.split('/').fold(dir.to_path_buf(), |p, part| p.join(part));
            let parent = target.parent().unwrap_or(dir);
            std::fs::create_dir_all(parent).map_err(|e| SsiReplaceError::io(parent, e))?;

            let file_name = target
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            let temp = parent.join(format!(".{file_name}.tmp"));

            std::fs::write(&temp, asset.buffer()).map_err(|e| SsiReplaceError::io(&temp, e))?;
            std::fs::rename(&temp, &target).map_err(|e| SsiReplaceError::io(&target, e))?;

            debug!(path = %target.display(), bytes = asset.size(), "asset written");
            written.push(target);
        }

        Ok(written)
    }
}

fn collect_files(root: &Path, dir: &Path, assets: &mut Assets) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| SsiReplaceError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| SsiReplaceError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SsiReplaceError::io(&path, e))?;

        if file_type.is_dir() {
            collect_files(root, &path, assets)?;
        } else if file_type.is_file() {
            let content = std::fs::read(&path).map_err(|e| SsiReplaceError::io(&path, e))?;
            assets.insert(asset_name(root, &path), Asset::from_bytes(content));
        }
    }

    Ok(())
}

/// `/`-joined path of `path` relative to `root`.
fn asset_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
