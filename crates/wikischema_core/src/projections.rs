use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::VersionSnapshot;
use crate::naming::NameDeriver;

/// Flat listings derived from one snapshot's sections, in section-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projections {
    /// Regular field meanings, with bit-flag meanings standing in for their parents.
    pub meanings: Vec<String>,
    /// The deriver applied to each entry of `meanings`.
    pub names: Vec<String>,
    pub types: Vec<String>,
}

impl Projections {
    pub fn from_snapshot(snapshot: &VersionSnapshot, deriver: &dyn NameDeriver) -> Self {
        let mut meanings = Vec::new();
        let mut types = Vec::new();

        for section in snapshot.sections.values() {
            for field in &section.fields {
                if !field.field_type.is_empty() {
                    types.push(field.field_type.clone());
                }
                if field.is_bitmask() {
                    meanings.extend(
                        field
                            .bit_flags
                            .iter()
                            .filter(|flag| !flag.meaning.is_empty())
                            .map(|flag| flag.meaning.clone()),
                    );
                } else if !field.meaning.is_empty() {
                    meanings.push(field.meaning.clone());
                }
            }
        }

        let names = meanings
            .iter()
            .map(|meaning| deriver.derive(meaning))
            .collect();
        Self {
            meanings,
            names,
            types,
        }
    }

    /// Meaning and derived name on alternating lines.
    pub fn meaning_compare(&self) -> Vec<String> {
        self.meanings
            .iter()
            .zip(&self.names)
            .flat_map(|(meaning, name)| [meaning.clone(), name.clone()])
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideFiles {
    pub meanings: PathBuf,
    pub names: PathBuf,
    pub meaning_compare: PathBuf,
    pub types: PathBuf,
}

impl SideFiles {
    pub fn for_version(output_dir: &Path, version: &str) -> Self {
        Self {
            meanings: output_dir.join(format!("{version}-meanings.txt")),
            names: output_dir.join(format!("{version}-meaning_to_name.txt")),
            meaning_compare: output_dir.join(format!("{version}-meaning_compare.txt")),
            types: output_dir.join(format!("{version}-types.txt")),
        }
    }
}

pub fn write_side_files(
    output_dir: &Path,
    version: &str,
    projections: &Projections,
) -> Result<SideFiles> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let files = SideFiles::for_version(output_dir, version);

    write_lines(&files.meanings, &projections.meanings)?;
    write_lines(&files.names, &projections.names)?;
    write_lines(&files.meaning_compare, &projections.meaning_compare())?;
    write_lines(&files.types, &projections.types)?;
    Ok(files)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
