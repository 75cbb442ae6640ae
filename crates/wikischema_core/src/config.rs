use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchOptions, SnapshotFormat};
use crate::extract::{
    DEFAULT_METADATA_HEADING, DEFAULT_NAMESPACE, DEFAULT_VERSION_PROBE_LINES, ExtractOptions,
};

pub const NAMESPACE_ENV: &str = "WIKISCHEMA_NAMESPACE";
pub const OUTPUT_FORMAT_ENV: &str = "WIKISCHEMA_OUTPUT_FORMAT";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SchemaConfig {
    #[serde(default)]
    pub extract: ExtractSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExtractSection {
    pub namespace: Option<String>,
    pub metadata_heading: Option<String>,
    pub version_probe_lines: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    pub format: Option<String>,
    pub side_files: Option<bool>,
}

impl SchemaConfig {
    pub fn extract_options(&self) -> ExtractOptions {
        self.extract_options_with_lookup(|key| env::var(key).ok())
    }

    pub fn batch_options(&self) -> Result<BatchOptions> {
        self.batch_options_with_lookup(|key| env::var(key).ok())
    }

    /// Namespace: env WIKISCHEMA_NAMESPACE > config > DEFAULT_NAMESPACE.
    pub fn extract_options_with_lookup<F>(&self, lookup_env: F) -> ExtractOptions
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = non_empty(lookup_env(NAMESPACE_ENV))
            .or_else(|| non_empty(self.extract.namespace.clone()))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let metadata_heading = non_empty(self.extract.metadata_heading.clone())
            .unwrap_or_else(|| DEFAULT_METADATA_HEADING.to_string());

        ExtractOptions {
            namespace,
            metadata_heading,
            version_probe_lines: self
                .extract
                .version_probe_lines
                .unwrap_or(DEFAULT_VERSION_PROBE_LINES),
        }
    }

    /// Output format: env WIKISCHEMA_OUTPUT_FORMAT > config > json.
    pub fn batch_options_with_lookup<F>(&self, lookup_env: F) -> Result<BatchOptions>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match non_empty(lookup_env(OUTPUT_FORMAT_ENV))
            .or_else(|| non_empty(self.output.format.clone()))
        {
            Some(value) => match SnapshotFormat::parse(&value) {
                Some(format) => format,
                None => bail!("unsupported output format `{value}` (expected json or yaml)"),
            },
            None => SnapshotFormat::default(),
        };

        Ok(BatchOptions {
            extract: self.extract_options_with_lookup(&lookup_env),
            format,
            side_files: self.output.side_files.unwrap_or(true),
        })
    }
}

/// Load and parse a SchemaConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<SchemaConfig> {
    if !config_path.exists() {
        return Ok(SchemaConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: SchemaConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{NAMESPACE_ENV, OUTPUT_FORMAT_ENV, SchemaConfig, load_config};
    use crate::batch::SnapshotFormat;

    #[test]
    fn default_config_uses_builtin_options() {
        let options = SchemaConfig::default().extract_options_with_lookup(|_| None);
        assert_eq!(options.namespace, "minecraft");
        assert_eq!(options.metadata_heading, "Entity Metadata");
        assert_eq!(options.version_probe_lines, 10);

        let batch = SchemaConfig::default()
            .batch_options_with_lookup(|_| None)
            .expect("batch options");
        assert_eq!(batch.format, SnapshotFormat::Json);
        assert!(batch.side_files);
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, SchemaConfig::default());
    }

    #[test]
    fn load_config_parses_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[extract]
namespace = "example"
metadata_heading = "Metadata"
version_probe_lines = 3

[output]
format = "yaml"
side_files = false
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        let batch = config
            .batch_options_with_lookup(|_| None)
            .expect("batch options");
        assert_eq!(batch.extract.namespace, "example");
        assert_eq!(batch.extract.metadata_heading, "Metadata");
        assert_eq!(batch.extract.version_probe_lines, 3);
        assert_eq!(batch.format, SnapshotFormat::Yaml);
        assert!(!batch.side_files);
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[paths]\nproject_root = \"/foo\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.extract.namespace.is_none());
        assert!(config.output.format.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[extract\nnamespace = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn env_overrides_config_values() {
        let mut config = SchemaConfig::default();
        config.extract.namespace = Some("from_config".to_string());
        config.output.format = Some("json".to_string());
        let env = HashMap::from([
            (NAMESPACE_ENV.to_string(), " from_env ".to_string()),
            (OUTPUT_FORMAT_ENV.to_string(), "yml".to_string()),
        ]);

        let batch = config
            .batch_options_with_lookup(|key| env.get(key).cloned())
            .expect("batch options");
        assert_eq!(batch.extract.namespace, "from_env");
        assert_eq!(batch.format, SnapshotFormat::Yaml);
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        let mut config = SchemaConfig::default();
        config.output.format = Some("csv".to_string());
        let error = config
            .batch_options_with_lookup(|_| None)
            .expect_err("must fail");
        assert!(error.to_string().contains("unsupported output format"));
    }
}
