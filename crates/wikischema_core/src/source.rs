use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub const SOURCE_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub version: String,
    pub path: Option<PathBuf>,
    pub text: String,
    pub content_hash: String,
}

impl SourceDocument {
    pub fn new(version: impl Into<String>, text: impl Into<String>, path: Option<PathBuf>) -> Self {
        let text = text.into();
        Self {
            version: version.into(),
            content_hash: content_hash(&text),
            path,
            text,
        }
    }
}

/// Raw wiki documents keyed by version label.
pub trait DocumentSource {
    /// Known version labels in ascending string order.
    fn versions(&self) -> Result<Vec<String>>;
    fn load(&self, version: &str) -> Result<SourceDocument>;
}

/// Every `*.txt` file directly under `root`; the file stem is the version.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_paths(&self) -> Result<BTreeMap<String, PathBuf>> {
        let mut out = BTreeMap::new();
        if !self.root.exists() {
            return Ok(out);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.with_context(|| format!("failed to walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }
            let Some(version) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            out.insert(version.to_string(), path.to_path_buf());
        }
        Ok(out)
    }
}

impl DocumentSource for DirectorySource {
    fn versions(&self) -> Result<Vec<String>> {
        Ok(self.document_paths()?.into_keys().collect())
    }

    fn load(&self, version: &str) -> Result<SourceDocument> {
        let path = self.root.join(format!("{version}.{SOURCE_EXTENSION}"));
        if !path.is_file() {
            bail!(
                "no source document for version {version} under {}",
                self.root.display()
            );
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(SourceDocument::new(version, text, Some(path)))
    }
}

/// In-memory documents, for callers that already hold the text.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, version: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(version, text);
        self
    }

    pub fn insert(&mut self, version: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(version.into(), text.into());
    }
}

impl DocumentSource for MemorySource {
    fn versions(&self) -> Result<Vec<String>> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn load(&self, version: &str) -> Result<SourceDocument> {
        let Some(text) = self.documents.get(version) else {
            bail!("no in-memory document for version {version}");
        };
        Ok(SourceDocument::new(version, text.as_str(), None))
    }
}

/// First 8 bytes of the SHA-256 digest, hex encoded.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut output = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
