use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::markup::normalize_whitespace;

static SECTION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^===\s*(.+?)\s*===\s*$").expect("section header pattern"));

static INHERIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{\s*Metadata\s+inherit\|([^}|]+)(?:\|inherits=([^}]+))?\}\}")
        .expect("inherit marker pattern")
});

/// Child section name to declared parent name; `None` means explicitly no parent.
pub type ParentMap = BTreeMap<String, Option<String>>;

/// Returns the section name when `line` is a level-3 heading.
pub fn section_header(line: &str) -> Option<String> {
    SECTION_HEADER_RE
        .captures(line.trim())
        .and_then(|captures| captures.get(1))
        .map(|name| normalize_whitespace(name.as_str()))
}

/// Collects section names in first-seen order plus every inheritance marker.
///
/// Markers may appear anywhere in the text; a later marker for the same child
/// replaces the earlier one.
pub fn collect_inheritance<S: AsRef<str>>(lines: &[S]) -> (Vec<String>, ParentMap) {
    let mut section_names: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut parents = ParentMap::new();

    for line in lines {
        let stripped = line.as_ref().trim();

        for captures in INHERIT_RE.captures_iter(stripped) {
            let Some(child) = captures.get(1) else {
                continue;
            };
            let parent = captures
                .get(2)
                .map(|parent| normalize_whitespace(parent.as_str()))
                .filter(|parent| !parent.is_empty());
            parents.insert(normalize_whitespace(child.as_str()), parent);
        }

        if let Some(name) = section_header(stripped)
            && seen.insert(name.clone())
        {
            section_names.push(name);
        }
    }

    (section_names, parents)
}

/// Orders sections so that every parent precedes its children.
///
/// A parent that is not itself a known section creates no dependency. Sections
/// caught in a cycle are appended in discovery order after everything else.
pub fn topological_order(section_names: &[String], parents: &ParentMap) -> Vec<String> {
    let known = section_names
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for section in section_names {
        if let Some(Some(parent)) = parents.get(section)
            && known.contains(parent.as_str())
        {
            *pending.entry(section.as_str()).or_default() += 1;
            dependents
                .entry(parent.as_str())
                .or_default()
                .push(section.as_str());
        }
    }

    let mut queue = section_names
        .iter()
        .map(String::as_str)
        .filter(|section| !pending.contains_key(section))
        .collect::<VecDeque<_>>();
    let mut ordered = Vec::with_capacity(section_names.len());
    let mut placed = HashSet::new();

    while let Some(current) = queue.pop_front() {
        if !placed.insert(current) {
            continue;
        }
        ordered.push(current.to_string());
        for dependent in dependents.get(current).into_iter().flatten().copied() {
            if let Some(count) = pending.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    for section in section_names {
        if !placed.contains(section.as_str()) {
            debug!(section = %section, "inheritance cycle, appending in discovery order");
            placed.insert(section.as_str());
            ordered.push(section.clone());
        }
    }

    ordered
}
