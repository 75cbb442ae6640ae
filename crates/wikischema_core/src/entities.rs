use std::collections::BTreeMap;

use crate::markup::strip_code_tags;
use crate::model::{Entity, TypeIndex};
use crate::table::{is_table_open, parse_wikitable};

/// Minimum cells an entity row needs: type, name, width, height, id.
pub const ENTITY_ROW_CELLS: usize = 5;

/// Reads every wikitable in `lines` and keeps rows shaped like entity listings.
///
/// Rows with fewer than five cells are skipped. A repeated id keeps the last row.
pub fn extract_entities<S: AsRef<str>>(lines: &[S]) -> BTreeMap<String, Entity> {
    let mut entities = BTreeMap::new();
    let mut cursor = 0usize;

    while cursor < lines.len() {
        if !is_table_open(lines[cursor].as_ref()) {
            cursor += 1;
            continue;
        }

        let (after_table, table) = parse_wikitable(lines, cursor);
        for row in &table.rows {
            if row.len() < ENTITY_ROW_CELLS {
                continue;
            }
            let id = strip_code_tags(&row[4]).trim().to_string();
            entities.insert(
                id,
                Entity {
                    type_index: TypeIndex::parse(&row[0]),
                    display_name: row[1].clone(),
                    bounding_box_horizontal: row[2].clone(),
                    bounding_box_vertical: row[3].clone(),
                },
            );
        }
        cursor = after_table;
    }

    entities
}

/// Display name to entity id, used to key metadata sections by their entity.
pub fn ids_by_display_name(entities: &BTreeMap<String, Entity>) -> BTreeMap<String, String> {
    entities
        .iter()
        .map(|(id, entity)| (entity.display_name.clone(), id.clone()))
        .collect()
}
