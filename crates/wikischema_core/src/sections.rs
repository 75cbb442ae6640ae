use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::inheritance::{ParentMap, collect_inheritance, section_header, topological_order};
use crate::model::{BitFlag, Field, Section};
use crate::naming::NameDeriver;
use crate::table::{is_table_open, parse_wikitable};

static HEX_MASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9A-Fa-f]+$").expect("hex mask pattern"));

const UNKNOWN_TYPE: &str = "Unknown";

/// Sections keyed by their heading text, in the order they were extracted.
#[derive(Debug, Clone, Default)]
pub struct ExtractedSections {
    pub order: Vec<String>,
    pub by_name: BTreeMap<String, Section>,
}

/// Extracts every level-3 section of the metadata region.
///
/// Sections are visited parents-first so that each child's base index can be
/// computed from the already-extracted field counts of its ancestors.
pub fn extract_sections<S: AsRef<str>>(lines: &[S], deriver: &dyn NameDeriver) -> ExtractedSections {
    let (section_names, parents) = collect_inheritance(lines);
    let order = topological_order(&section_names, &parents);

    let mut by_name = BTreeMap::new();
    for name in &order {
        extract_section(lines, name, &mut by_name, &parents, deriver);
    }

    ExtractedSections {
        order,
        by_name,
    }
}

/// Line range `[start, end)` of a section: its heading up to the next heading.
pub fn find_section_span<S: AsRef<str>>(lines: &[S], section_name: &str) -> Option<(usize, usize)> {
    let start = lines
        .iter()
        .position(|line| section_header(line.as_ref()).as_deref() == Some(section_name))?;
    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| section_header(line.as_ref()).is_some())
        .map(|(index, _)| index)
        .unwrap_or(lines.len());
    Some((start, end))
}

/// Sum of the field counts along the ancestor chain of `section_name`.
///
/// Ancestors not yet extracted contribute zero. The walk stops at the first
/// repeated name, so cycles terminate.
pub fn base_index(
    section_name: &str,
    parents: &ParentMap,
    extracted: &BTreeMap<String, Section>,
) -> usize {
    let mut visited = HashSet::from([section_name]);
    let mut chain = Vec::new();
    let mut current = parents.get(section_name).and_then(Option::as_deref);

    while let Some(parent) = current {
        if !visited.insert(parent) {
            break;
        }
        chain.push(parent);
        current = parents.get(parent).and_then(Option::as_deref);
    }

    chain
        .iter()
        .rev()
        .filter_map(|ancestor| extracted.get(*ancestor))
        .map(|section| section.fields.len())
        .sum()
}

pub fn extract_section<S: AsRef<str>>(
    lines: &[S],
    section_name: &str,
    extracted: &mut BTreeMap<String, Section>,
    parents: &ParentMap,
    deriver: &dyn NameDeriver,
) {
    let Some((start, end)) = find_section_span(lines, section_name) else {
        return;
    };
    let base = base_index(section_name, parents, extracted);
    let bounded = &lines[..end];

    let mut fields: Vec<Field> = Vec::new();
    let mut last_field: Option<usize> = None;
    let mut next_index = base;
    let mut cursor = start + 1;

    while cursor < end {
        let stripped = bounded[cursor].as_ref().trim();
        // Prose, including "No additional metadata.", contributes no fields.
        if !is_table_open(stripped) {
            cursor += 1;
            continue;
        }

        let (after_table, table) = parse_wikitable(bounded, cursor);
        for cells in &table.rows {
            if let Some(position) = last_field
                && is_bit_flag_row(cells)
            {
                let parent = &mut fields[position];
                parent.meaning.clear();
                parent.bit_flags.push(BitFlag {
                    mask: cells[0].clone(),
                    meaning: cells[1].clone(),
                    name: deriver.derive(&cells[1]),
                });
                continue;
            }

            fields.push(field_from_cells(cells, next_index, deriver));
            last_field = Some(fields.len() - 1);
            next_index += 1;
        }
        cursor = after_table;
    }

    let inherits_from = parents.get(section_name).cloned().flatten();
    extracted.insert(
        section_name.to_string(),
        Section {
            inherits_from,
            fields,
        },
    );
}

fn is_bit_flag_row(cells: &[String]) -> bool {
    cells.len() == 2 && HEX_MASK_RE.is_match(&cells[0])
}

/// Columns: index, type, meaning, (unused), default.
fn field_from_cells(cells: &[String], index: usize, deriver: &dyn NameDeriver) -> Field {
    let field_type = cells
        .get(1)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
    let default_value = cells.get(4).or(cells.last()).cloned().unwrap_or_default();
    let meaning = cells.get(2).cloned().unwrap_or_default();
    let name = if meaning.is_empty() {
        format!("field{index}")
    } else {
        deriver.derive(&meaning)
    };

    Field {
        index,
        field_type,
        default_value,
        meaning,
        name,
        bit_flags: Vec::new(),
    }
}
