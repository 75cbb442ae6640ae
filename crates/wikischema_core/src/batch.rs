use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::extract::{ExtractOptions, extract_document};
use crate::model::VersionSnapshot;
use crate::naming::NameDeriver;
use crate::projections::{Projections, SideFiles, write_side_files};
use crate::source::{DocumentSource, SourceDocument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub extract: ExtractOptions,
    pub format: SnapshotFormat,
    pub side_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub version: String,
    pub output_path: PathBuf,
    pub entity_count: usize,
    pub section_count: usize,
    pub content_hash: String,
    pub side_files: Option<SideFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub version: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: Vec<ProcessedDocument>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedSnapshots {
    pub snapshots: Vec<VersionSnapshot>,
    pub skipped: Vec<BatchFailure>,
}

/// Extracts every document of `source` into `output_dir`.
///
/// A document that fails to load or write is recorded in `failures` and the
/// batch moves on; only an unreadable version listing aborts the run.
pub fn process_batch(
    source: &dyn DocumentSource,
    output_dir: &Path,
    options: &BatchOptions,
    deriver: &dyn NameDeriver,
) -> Result<BatchReport> {
    let versions = source.versions().context("failed to list source documents")?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut report = BatchReport::default();
    for version in versions {
        let outcome = source
            .load(&version)
            .and_then(|document| process_document(&document, output_dir, options, deriver));
        match outcome {
            Ok(processed) => {
                debug!(version = %processed.version, output = %processed.output_path.display(), "extracted document");
                report.processed.push(processed);
            }
            Err(error) => {
                let error = format!("{error:#}");
                warn!(version = %version, error = %error, "skipping document");
                report.failures.push(BatchFailure { version, error });
            }
        }
    }
    Ok(report)
}

pub fn process_document(
    document: &SourceDocument,
    output_dir: &Path,
    options: &BatchOptions,
    deriver: &dyn NameDeriver,
) -> Result<ProcessedDocument> {
    let snapshot = extract_document(
        &document.text,
        Some(&document.version),
        &options.extract,
        deriver,
    );
    let output_path = output_dir.join(format!(
        "{}.{}",
        document.version,
        options.format.as_str()
    ));
    write_snapshot(&output_path, &snapshot, options.format)?;

    let side_files = if options.side_files {
        let projections = Projections::from_snapshot(&snapshot, deriver);
        Some(write_side_files(output_dir, &snapshot.version, &projections)?)
    } else {
        None
    };

    Ok(ProcessedDocument {
        version: snapshot.version,
        output_path,
        entity_count: snapshot.entities.len(),
        section_count: snapshot.sections.len(),
        content_hash: document.content_hash.clone(),
        side_files,
    })
}

pub fn write_snapshot(path: &Path, snapshot: &VersionSnapshot, format: SnapshotFormat) -> Result<()> {
    let rendered = match format {
        SnapshotFormat::Json => {
            let mut json = serde_json::to_string_pretty(snapshot)
                .context("failed to serialize snapshot as JSON")?;
            json.push('\n');
            json
        }
        SnapshotFormat::Yaml => {
            serde_yaml::to_string(snapshot).context("failed to serialize snapshot as YAML")?
        }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
}

/// Reads a snapshot, choosing the format from the file extension.
pub fn read_snapshot(path: &Path) -> Result<VersionSnapshot> {
    let Some(format) = SnapshotFormat::from_path(path) else {
        bail!("unsupported snapshot extension: {}", path.display());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut snapshot: VersionSnapshot = match format {
        SnapshotFormat::Json => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        SnapshotFormat::Yaml => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
    };
    if snapshot.version.trim().is_empty()
        && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
    {
        snapshot.version = stem.to_string();
    }
    Ok(snapshot)
}

/// Loads every snapshot file directly under `dir`. Unreadable files are
/// reported in `skipped` instead of failing the load.
pub fn load_snapshots(dir: &Path) -> Result<LoadedSnapshots> {
    let mut loaded = LoadedSnapshots::default();
    if !dir.exists() {
        return Ok(loaded);
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && SnapshotFormat::from_path(entry.path()).is_some() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    for path in paths {
        match read_snapshot(&path) {
            Ok(snapshot) => loaded.snapshots.push(snapshot),
            Err(error) => {
                let error = format!("{error:#}");
                warn!(path = %path.display(), error = %error, "skipping snapshot");
                loaded.skipped.push(BatchFailure {
                    version: path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    error,
                });
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::{Result, bail};
    use tempfile::tempdir;

    use super::{
        BatchOptions, SnapshotFormat, load_snapshots, process_batch, read_snapshot,
        write_snapshot,
    };
    use crate::model::VersionSnapshot;
    use crate::naming::PatternNameDeriver;
    use crate::source::{DocumentSource, MemorySource, SourceDocument};

    const DOCUMENT: &str = r#"{| class="wikitable"
|-
| 54
| Zombie
| 0.6
| 1.95
| <code>minecraft:zombie</code>
|}
== Entity Metadata ==
=== Zombie ===
{| class="wikitable"
|-
| 0
| Boolean
| Is baby
|
| false
|}
"#;

    struct FlakySource {
        inner: MemorySource,
    }

    impl DocumentSource for FlakySource {
        fn versions(&self) -> Result<Vec<String>> {
            let mut versions = self.inner.versions()?;
            versions.insert(1, "1.20.5".to_string());
            Ok(versions)
        }

        fn load(&self, version: &str) -> Result<SourceDocument> {
            if version == "1.20.5" {
                bail!("revision could not be fetched");
            }
            self.inner.load(version)
        }
    }

    #[test]
    fn failing_document_does_not_abort_the_batch() {
        let temp = tempdir().expect("tempdir");
        let source = FlakySource {
            inner: MemorySource::new()
                .with_document("1.20", DOCUMENT)
                .with_document("1.21", DOCUMENT),
        };
        let options = BatchOptions {
            side_files: true,
            ..BatchOptions::default()
        };

        let report =
            process_batch(&source, temp.path(), &options, &PatternNameDeriver).expect("batch");
        let versions = report
            .processed
            .iter()
            .map(|processed| processed.version.as_str())
            .collect::<Vec<_>>();
        assert_eq!(versions, vec!["1.20", "1.21"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].version, "1.20.5");
        assert!(report.failures[0].error.contains("could not be fetched"));

        let processed = &report.processed[1];
        assert_eq!(processed.output_path, temp.path().join("1.21.json"));
        assert_eq!(processed.entity_count, 1);
        assert_eq!(processed.section_count, 1);
        assert!(temp.path().join("1.21-meanings.txt").exists());

        let snapshot = read_snapshot(&processed.output_path).expect("read");
        assert_eq!(snapshot.version, "1.21");
        assert!(snapshot.sections.contains_key("minecraft:zombie"));
    }

    #[test]
    fn yaml_output_skips_side_files_when_disabled() {
        let temp = tempdir().expect("tempdir");
        let source = MemorySource::new().with_document("1.21", DOCUMENT);
        let options = BatchOptions {
            format: SnapshotFormat::Yaml,
            side_files: false,
            ..BatchOptions::default()
        };
        let report =
            process_batch(&source, temp.path(), &options, &PatternNameDeriver).expect("batch");
        assert_eq!(report.processed[0].output_path, temp.path().join("1.21.yaml"));
        assert!(report.processed[0].side_files.is_none());
        assert!(!temp.path().join("1.21-types.txt").exists());
    }

    #[test]
    fn load_snapshots_skips_unreadable_files() {
        let temp = tempdir().expect("tempdir");
        write_snapshot(
            &temp.path().join("1.20.json"),
            &VersionSnapshot::empty("1.20"),
            SnapshotFormat::Json,
        )
        .expect("write json");
        write_snapshot(
            &temp.path().join("1.21.yaml"),
            &VersionSnapshot::empty("1.21"),
            SnapshotFormat::Yaml,
        )
        .expect("write yaml");
        fs::write(temp.path().join("broken.json"), "{not json").expect("write broken");
        fs::write(temp.path().join("1.21-types.txt"), "Byte\n").expect("write side file");

        let loaded = load_snapshots(temp.path()).expect("load");
        let versions = loaded
            .snapshots
            .iter()
            .map(|snapshot| snapshot.version.as_str())
            .collect::<Vec<_>>();
        assert_eq!(versions, vec!["1.20", "1.21"]);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].version, "broken");
    }

    #[test]
    fn snapshot_version_falls_back_to_file_stem() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("1.19.json");
        fs::write(&path, r#"{"version": "", "entities": {}}"#).expect("write");
        assert_eq!(read_snapshot(&path).expect("read").version, "1.19");
        assert!(read_snapshot(&temp.path().join("1.19.toml")).is_err());
    }

    #[test]
    fn format_parsing_accepts_yml_alias() {
        assert_eq!(SnapshotFormat::parse("YAML"), Some(SnapshotFormat::Yaml));
        assert_eq!(SnapshotFormat::parse("yml"), Some(SnapshotFormat::Yaml));
        assert_eq!(SnapshotFormat::parse("toml"), None);
    }
}
