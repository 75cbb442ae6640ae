use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::entities::{extract_entities, ids_by_display_name};
use crate::markup::normalize_whitespace;
use crate::model::{Entity, Section, VersionSnapshot};
use crate::naming::{NameDeriver, to_snake_case};
use crate::sections::extract_sections;

pub const DEFAULT_NAMESPACE: &str = "minecraft";
pub const DEFAULT_METADATA_HEADING: &str = "Entity Metadata";
pub const DEFAULT_VERSION_PROBE_LINES: usize = 10;
pub const UNKNOWN_VERSION: &str = "unknown";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d+(?:\.\d+)*\b").expect("version pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Prefix for section keys that do not match an entity display name.
    pub namespace: String,
    /// Level-2 heading that opens the metadata region.
    pub metadata_heading: String,
    pub version_probe_lines: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            metadata_heading: DEFAULT_METADATA_HEADING.to_string(),
            version_probe_lines: DEFAULT_VERSION_PROBE_LINES,
        }
    }
}

/// Turns one wiki document into a structured snapshot.
///
/// The entity listing and the metadata region are read independently: a
/// document without the metadata heading still yields its entities, with an
/// empty section map.
pub fn extract_document(
    text: &str,
    version_hint: Option<&str>,
    options: &ExtractOptions,
    deriver: &dyn NameDeriver,
) -> VersionSnapshot {
    let lines = text.split('\n').collect::<Vec<_>>();
    let region = metadata_region(&lines, &options.metadata_heading);

    let entity_lines = match region {
        Some((start, _)) => &lines[..start],
        None => &lines[..],
    };
    let entities = extract_entities(entity_lines);

    let sections = match region {
        Some((start, end)) => keyed_sections(&lines[start..end], &entities, options, deriver),
        None => BTreeMap::new(),
    };

    let version = version_hint
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(str::to_string)
        .or_else(|| detect_version(&lines, options.version_probe_lines))
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

    VersionSnapshot {
        version,
        entities,
        sections,
    }
}

/// Finds `[start, end)` of the metadata region: its level-2 heading up to the
/// next heading of level 2 or shallower.
pub fn metadata_region<S: AsRef<str>>(lines: &[S], heading: &str) -> Option<(usize, usize)> {
    let start = lines.iter().position(|line| {
        heading_of(line.as_ref())
            .is_some_and(|(level, text)| level == 2 && text.eq_ignore_ascii_case(heading.trim()))
    })?;
    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| heading_of(line.as_ref()).is_some_and(|(level, _)| level <= 2))
        .map(|(index, _)| index)
        .unwrap_or(lines.len());
    Some((start, end))
}

pub fn detect_version<S: AsRef<str>>(lines: &[S], probe_lines: usize) -> Option<String> {
    lines
        .iter()
        .take(probe_lines)
        .find_map(|line| VERSION_RE.find(line.as_ref()))
        .map(|found| found.as_str().to_string())
}

/// `(level, text)` for a `== text ==` style heading line.
fn heading_of(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim();
    if trimmed.len() < 4 || !trimmed.starts_with('=') || !trimmed.ends_with('=') {
        return None;
    }
    let leading = trimmed.chars().take_while(|ch| *ch == '=').count();
    let trailing = trimmed.chars().rev().take_while(|ch| *ch == '=').count();
    if leading != trailing || !(1..=6).contains(&leading) || leading * 2 >= trimmed.len() {
        return None;
    }
    let text = normalize_whitespace(&trimmed[leading..trimmed.len() - trailing]);
    if text.is_empty() {
        return None;
    }
    Some((leading, text))
}

fn keyed_sections(
    lines: &[&str],
    entities: &BTreeMap<String, Entity>,
    options: &ExtractOptions,
    deriver: &dyn NameDeriver,
) -> BTreeMap<String, Section> {
    let ids = ids_by_display_name(entities);
    let section_key = |name: &str| {
        ids.get(name)
            .cloned()
            .unwrap_or_else(|| format!("{}:{}", options.namespace, to_snake_case(name)))
    };

    let mut extracted = extract_sections(lines, deriver);
    let mut keyed = BTreeMap::new();
    for name in &extracted.order {
        let Some(mut section) = extracted.by_name.remove(name) else {
            continue;
        };
        section.inherits_from = section.inherits_from.as_deref().map(section_key);
        let key = section_key(name);
        if keyed.insert(key.clone(), section).is_some() {
            warn!(section = %name, key = %key, "section key collision, keeping the later section");
        }
    }
    keyed
}
