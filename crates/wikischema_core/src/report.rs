use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::diff::{Change, EntityDiff, FieldState, HistoryEntry, SectionDiff};

pub const ENTITY_REPORT_FILENAME: &str = "entity_changes.txt";
pub const METADATA_REPORT_FILENAME: &str = "metadata_changes.txt";

const RULE_WIDTH: usize = 120;
const ENTITY_DIVIDER: &str =
    "|-----------------|----------|------------------------------------------|----------------------|";
const FIELD_DIVIDER: &str = "|---------------------------|----------|-------|----------------------|---------------------|------------------------------|----------------------|";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub entity_report: PathBuf,
    pub metadata_report: PathBuf,
}

pub fn render_entity_report(diff: &EntityDiff) -> String {
    let mut lines = banner("ENTITY PROPERTY CHANGES");
    lines.push(String::new());
    lines.push("Entities whose type index or bounding box changed, appeared or disappeared.".to_string());
    lines.push(format!("Versions: {}", joined_versions(&diff.versions)));

    for change in &diff.changes {
        lines.push(String::new());
        lines.push("=".repeat(RULE_WIDTH));
        lines.push(format!("Entity: {}", change.id));
        lines.push("=".repeat(RULE_WIDTH));
        lines.push(String::new());
        lines.push(format!(
            "| {:15} | {:8} | {:40} | {:20} |",
            "Property", "Version", "Value", "Changes"
        ));
        lines.push(ENTITY_DIVIDER.to_string());
        for (position, property) in change.properties.iter().enumerate() {
            if position > 0 {
                lines.push(ENTITY_DIVIDER.to_string());
            }
            for entry in &property.entries {
                let value = entry.value.as_deref().unwrap_or("-");
                lines.push(format!(
                    "| {:15} | {:8} | {:40} | {:20} |",
                    property.property,
                    clip(&entry.version, 8),
                    clip(value, 40),
                    clip(&describe_change(&entry.change), 20),
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(summary_line("entities", diff.changes.len(), diff.total));
    lines.join("\n")
}

pub fn render_metadata_report(diff: &SectionDiff) -> String {
    let mut lines = banner("METADATA FIELD CHANGES");
    lines.push(String::new());
    lines.push("Metadata sections whose inheritance or field definitions changed.".to_string());
    lines.push(format!("Versions: {}", joined_versions(&diff.versions)));

    for change in &diff.changes {
        lines.push(String::new());
        lines.push("=".repeat(RULE_WIDTH));
        lines.push(format!("Metadata Type: {}", change.key));
        lines.push("=".repeat(RULE_WIDTH));

        lines.push(String::new());
        lines.push("Inheritance:".to_string());
        let mut header = "| Version  |".to_string();
        let mut divider = "|----------|".to_string();
        let mut row = "| Inherits |".to_string();
        for entry in &change.inheritance {
            header.push_str(&format!(" {:^20} |", clip(&entry.version, 20)));
            divider.push_str(&format!("{}|", "-".repeat(22)));
            let cell = if !entry.present {
                "-".to_string()
            } else {
                let parent = clip(entry.inherits_from.as_deref().unwrap_or("None"), 16);
                if entry.changed {
                    format!("{parent}[!]")
                } else {
                    parent
                }
            };
            row.push_str(&format!(" {cell:^20} |"));
        }
        lines.push(header);
        lines.push(divider);
        lines.push(row);

        if change.fields.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push("Field Changes:".to_string());
        lines.push(format!(
            "| {:25} | {:8} | {:5} | {:20} | {:19} | {:28} | {:20} |",
            "Field Name", "Version", "Index", "Type", "Default", "Meaning", "Changes"
        ));
        lines.push(FIELD_DIVIDER.to_string());
        for (position, field) in change.fields.iter().enumerate() {
            if position > 0 {
                lines.push(FIELD_DIVIDER.to_string());
            }
            for (row_index, entry) in field.entries.iter().enumerate() {
                let name = if row_index == 0 {
                    clip(&field.name, 25)
                } else {
                    String::new()
                };
                lines.push(field_row(&name, entry));
            }
        }
    }

    lines.push(String::new());
    lines.push("[!] = changed from the previous version".to_string());
    lines.push(summary_line("metadata types", diff.changes.len(), diff.total));
    lines.join("\n")
}

/// Writes both reports into `reports_dir`, creating it when missing.
pub fn write_reports(
    reports_dir: &Path,
    entities: &EntityDiff,
    sections: &SectionDiff,
) -> Result<WrittenReports> {
    fs::create_dir_all(reports_dir)
        .with_context(|| format!("failed to create {}", reports_dir.display()))?;

    let entity_report = reports_dir.join(ENTITY_REPORT_FILENAME);
    fs::write(&entity_report, render_entity_report(entities))
        .with_context(|| format!("failed to write {}", entity_report.display()))?;

    let metadata_report = reports_dir.join(METADATA_REPORT_FILENAME);
    fs::write(&metadata_report, render_metadata_report(sections))
        .with_context(|| format!("failed to write {}", metadata_report.display()))?;

    Ok(WrittenReports {
        entity_report,
        metadata_report,
    })
}

pub fn summary_line(label: &str, changed: usize, total: usize) -> String {
    format!("Total {label} with changes: {changed} changed / {total} total")
}

fn field_row(name: &str, entry: &HistoryEntry<FieldState>) -> String {
    let (index, field_type, default_value, meaning) = match &entry.value {
        Some(state) => (
            state.index.to_string(),
            state.field_type.as_str(),
            state.default_value.as_str(),
            state.meaning.as_str(),
        ),
        None => ("-".to_string(), "-", "-", ""),
    };
    format!(
        "| {:25} | {:8} | {:^5} | {:20} | {:19} | {:28} | {:20} |",
        name,
        clip(&entry.version, 8),
        index,
        clip(field_type, 20),
        clip(default_value, 19),
        clip(meaning, 28),
        clip(&describe_change(&entry.change), 20),
    )
}

fn describe_change(change: &Change) -> String {
    match change {
        Change::Initial => String::new(),
        Change::Added => "ADDED".to_string(),
        Change::Removed => "REMOVED".to_string(),
        Change::Changed { deltas } => deltas
            .iter()
            .map(|delta| match delta.property.as_str() {
                "type_index" | "index" => format!("{}→{}", delta.from, delta.to),
                "type" => "Type changed".to_string(),
                "default" => "Default changed".to_string(),
                _ => "Changed".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn banner(title: &str) -> Vec<String> {
    let padding = RULE_WIDTH.saturating_sub(title.len()) / 2;
    vec![
        "=".repeat(RULE_WIDTH),
        format!("{}{title}", " ".repeat(padding)),
        "=".repeat(RULE_WIDTH),
    ]
}

fn joined_versions(versions: &[String]) -> String {
    if versions.is_empty() {
        "<none>".to_string()
    } else {
        versions.join(", ")
    }
}

/// Truncates to `width` characters, marking the cut with `...`.
fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept = value.chars().take(width.saturating_sub(3)).collect::<String>();
    format!("{kept}...")
}
