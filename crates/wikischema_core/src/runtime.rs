use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::batch::SnapshotFormat;
use crate::extract::{DEFAULT_METADATA_HEADING, DEFAULT_NAMESPACE, DEFAULT_VERSION_PROBE_LINES};
use crate::source::{DirectorySource, DocumentSource};

pub const PROJECT_ROOT_ENV: &str = "WIKISCHEMA_PROJECT_ROOT";
pub const CONFIG_ENV: &str = "WIKISCHEMA_CONFIG";
pub const STATE_DIR_NAME: &str = ".wikischema";
pub const SOURCE_DIR_NAME: &str = "source";
pub const OUTPUT_DIR_NAME: &str = "output";
pub const REPORTS_DIR_NAME: &str = "reports";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nsource_dir={}\noutput_dir={}\nreports_dir={}\nstate_dir={}\nconfig_path={} ({})",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.source_dir),
            normalize_for_display(&self.output_dir),
            normalize_for_display(&self.reports_dir),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub project_root_exists: bool,
    pub source_dir_exists: bool,
    pub output_dir_exists: bool,
    pub state_dir_exists: bool,
    pub config_exists: bool,
    pub source_documents: usize,
    pub snapshot_files: usize,
    pub warnings: Vec<String>,
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> Result<RuntimeStatus> {
    let project_root_exists = paths.project_root.exists();
    let source_dir_exists = paths.source_dir.exists();
    let output_dir_exists = paths.output_dir.exists();
    let state_dir_exists = paths.state_dir.exists();
    let config_exists = paths.config_path.exists();

    let source_documents = DirectorySource::new(&paths.source_dir).versions()?.len();
    let snapshot_files = if output_dir_exists {
        count_snapshot_files(&paths.output_dir)?
    } else {
        0
    };

    let mut warnings = Vec::new();
    if !source_dir_exists {
        warnings.push("source/ is missing; run `wikischema init` and add <version>.txt documents".to_string());
    } else if source_documents == 0 {
        warnings.push("source/ has no <version>.txt documents".to_string());
    }
    if !state_dir_exists {
        warnings.push(".wikischema/ is missing; run `wikischema init`".to_string());
    }

    Ok(RuntimeStatus {
        project_root_exists,
        source_dir_exists,
        output_dir_exists,
        state_dir_exists,
        config_exists,
        source_documents,
        snapshot_files,
        warnings,
    })
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub materialize_config: bool,
    pub force: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            materialize_config: true,
            force: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = resolve_project_root(context, overrides, &lookup_env);

    let state_dir = project_root.join(STATE_DIR_NAME);
    let source_dir = project_root.join(SOURCE_DIR_NAME);
    let output_dir = project_root.join(OUTPUT_DIR_NAME);
    let reports_dir = output_dir.join(REPORTS_DIR_NAME);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (
            absolutize(path, &project_root),
            ValueSource::Flag,
        )
    } else if let Some(value) = lookup_env(CONFIG_ENV).filter(|value| !value.trim().is_empty()) {
        (
            absolutize(Path::new(value.trim()), &project_root),
            ValueSource::Env,
        )
    } else {
        (state_dir.join("config.toml"), ValueSource::Default)
    };

    Ok(ResolvedPaths {
        project_root,
        source_dir,
        output_dir,
        reports_dir,
        state_dir,
        config_path,
        root_source,
        config_source,
    })
}

pub fn init_layout(paths: &ResolvedPaths, options: &InitOptions) -> Result<InitReport> {
    let mut created_dirs = Vec::new();

    let required_dirs = [
        paths.source_dir.clone(),
        paths.output_dir.clone(),
        paths.reports_dir.clone(),
        paths.state_dir.clone(),
    ];
    for dir in &required_dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_config = if options.materialize_config {
        write_text_file(&paths.config_path, &render_materialized_config(), options.force)?
    } else {
        false
    };

    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

pub fn render_materialized_config() -> String {
    format!(
        "# wikischema configuration (materialized by `wikischema init`)\n\n[extract]\n# Prefix for section keys that do not match an entity display name.\nnamespace = \"{DEFAULT_NAMESPACE}\"\n# Level-2 heading that opens the metadata region.\nmetadata_heading = \"{DEFAULT_METADATA_HEADING}\"\n# Leading lines scanned for a version label when none is given.\nversion_probe_lines = {DEFAULT_VERSION_PROBE_LINES}\n\n[output]\n# json | yaml\nformat = \"json\"\n# Write <version>-meanings.txt, -meaning_to_name.txt, -meaning_compare.txt and -types.txt.\nside_files = true\n",
    )
}

fn resolve_project_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> (PathBuf, ValueSource)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.project_root.as_deref() {
        return (absolutize(path, &context.cwd), ValueSource::Flag);
    }

    if let Some(value) = lookup_env(PROJECT_ROOT_ENV).filter(|value| !value.trim().is_empty()) {
        return (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        );
    }

    match detect_project_root_heuristic(&context.cwd) {
        Some(root) => (root, ValueSource::Heuristic),
        None => (context.cwd.clone(), ValueSource::Default),
    }
}

/// Nearest ancestor of `cwd` holding `source/` or `.wikischema/`.
fn detect_project_root_heuristic(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|candidate| {
            candidate.join(SOURCE_DIR_NAME).is_dir() || candidate.join(STATE_DIR_NAME).is_dir()
        })
        .map(Path::to_path_buf)
}

fn count_snapshot_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && SnapshotFormat::from_path(&path).is_some() {
            count += 1;
        }
    }
    Ok(count)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
