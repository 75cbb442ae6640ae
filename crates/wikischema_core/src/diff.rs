use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::model::{Entity, Section, VersionSnapshot};

pub const ENTITY_PROPERTIES: [&str; 3] = ["type_index", "bounding_box_xz", "bounding_box_y"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub property: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Present in the first known version.
    Initial,
    /// Present after being absent in the previous version.
    Added,
    Changed { deltas: Vec<Delta> },
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry<T> {
    pub version: String,
    pub value: Option<T>,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyHistory {
    pub property: String,
    pub entries: Vec<HistoryEntry<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityChange {
    pub id: String,
    pub properties: Vec<PropertyHistory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDiff {
    pub versions: Vec<String>,
    pub total: usize,
    pub changes: Vec<EntityChange>,
}

/// The comparable view of one field, or of one bit of a bitmask field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldState {
    pub index: usize,
    pub field_type: String,
    pub default_value: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldHistory {
    pub name: String,
    pub entries: Vec<HistoryEntry<FieldState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritanceEntry {
    pub version: String,
    pub present: bool,
    pub inherits_from: Option<String>,
    /// Differs from the last version where the section was present.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionChange {
    pub key: String,
    pub inheritance: Vec<InheritanceEntry>,
    pub fields: Vec<FieldHistory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionDiff {
    pub versions: Vec<String>,
    pub total: usize,
    pub changes: Vec<SectionChange>,
}

/// Snapshots keyed and ordered by version label; a repeated label keeps the last.
///
/// Labels compare as plain strings, so `1.21.10` sorts before `1.21.9`.
pub fn order_by_version(snapshots: &[VersionSnapshot]) -> BTreeMap<&str, &VersionSnapshot> {
    snapshots
        .iter()
        .map(|snapshot| (snapshot.version.as_str(), snapshot))
        .collect()
}

pub fn diff_entities(snapshots: &[VersionSnapshot]) -> EntityDiff {
    let ordered = order_by_version(snapshots);
    let versions = ordered.keys().map(|version| version.to_string()).collect::<Vec<_>>();
    let ids = ordered
        .values()
        .flat_map(|snapshot| snapshot.entities.keys())
        .collect::<BTreeSet<_>>();

    let mut changes = Vec::new();
    for id in &ids {
        let per_version = ordered
            .values()
            .map(|snapshot| snapshot.entities.get(*id))
            .collect::<Vec<_>>();
        if !entity_changed(&per_version) {
            continue;
        }

        let properties = ENTITY_PROPERTIES
            .iter()
            .map(|property| {
                let values = per_version
                    .iter()
                    .map(|entity| entity.map(|entity| entity_property(entity, property)))
                    .collect::<Vec<_>>();
                PropertyHistory {
                    property: property.to_string(),
                    entries: history(&versions, &values, |from, to| {
                        vec![Delta {
                            property: property.to_string(),
                            from: from.clone(),
                            to: to.clone(),
                        }]
                    }),
                }
            })
            .collect();
        changes.push(EntityChange {
            id: id.to_string(),
            properties,
        });
    }

    EntityDiff {
        versions,
        total: ids.len(),
        changes,
    }
}

pub fn diff_sections(snapshots: &[VersionSnapshot]) -> SectionDiff {
    let ordered = order_by_version(snapshots);
    let versions = ordered.keys().map(|version| version.to_string()).collect::<Vec<_>>();
    let keys = ordered
        .values()
        .flat_map(|snapshot| snapshot.sections.keys())
        .collect::<BTreeSet<_>>();

    let mut changes = Vec::new();
    for key in &keys {
        let per_version = ordered
            .values()
            .map(|snapshot| snapshot.sections.get(*key))
            .collect::<Vec<_>>();
        let fields_per_version = per_version
            .iter()
            .map(|section| section.map(comparable_fields))
            .collect::<Vec<_>>();
        if !section_changed(&per_version, &fields_per_version) {
            continue;
        }

        let names = fields_per_version
            .iter()
            .flatten()
            .flat_map(|fields| fields.keys().cloned())
            .collect::<BTreeSet<_>>();
        let fields = names
            .into_iter()
            .map(|name| {
                let values = fields_per_version
                    .iter()
                    .map(|fields| fields.as_ref().and_then(|fields| fields.get(&name)).cloned())
                    .collect::<Vec<_>>();
                FieldHistory {
                    entries: history(&versions, &values, field_deltas),
                    name,
                }
            })
            .collect();

        changes.push(SectionChange {
            key: key.to_string(),
            inheritance: inheritance_entries(&versions, &per_version),
            fields,
        });
    }

    SectionDiff {
        versions,
        total: keys.len(),
        changes,
    }
}

/// An entity changed when its property tuple is not constant across the
/// versions containing it, or when it is missing from some version.
pub fn entity_changed(per_version: &[Option<&Entity>]) -> bool {
    let present = per_version.iter().flatten().collect::<Vec<_>>();
    if present.is_empty() {
        return false;
    }
    if present.len() != per_version.len() {
        return true;
    }
    let tuples = present
        .iter()
        .map(|entity| {
            (
                entity.type_index.to_string(),
                entity.bounding_box_horizontal.as_str(),
                entity.bounding_box_vertical.as_str(),
            )
        })
        .collect::<BTreeSet<_>>();
    tuples.len() > 1
}

pub fn section_changed(
    per_version: &[Option<&Section>],
    fields_per_version: &[Option<BTreeMap<String, FieldState>>],
) -> bool {
    let present = per_version.iter().flatten().collect::<Vec<_>>();
    if present.is_empty() {
        return false;
    }
    if present.len() != per_version.len() {
        return true;
    }

    let parents = present
        .iter()
        .map(|section| section.inherits_from.as_deref())
        .collect::<BTreeSet<_>>();
    if parents.len() > 1 {
        return true;
    }

    let mut by_name: BTreeMap<&str, Vec<&FieldState>> = BTreeMap::new();
    for fields in fields_per_version.iter().flatten() {
        for (name, state) in fields {
            by_name.entry(name.as_str()).or_default().push(state);
        }
    }
    by_name.values().any(|states| {
        if states.len() != present.len() {
            return true;
        }
        let first = states[0];
        states.iter().any(|state| {
            state.index != first.index
                || state.field_type != first.field_type
                || state.default_value != first.default_value
        })
    })
}

/// Flattens a section into name-keyed comparable fields. Each bit of a bitmask
/// field stands in for its parent, typed `Byte[<mask>]`. When two fields derive
/// the same name, the later one wins.
pub fn comparable_fields(section: &Section) -> BTreeMap<String, FieldState> {
    let mut fields = BTreeMap::new();
    for field in &section.fields {
        if field.is_bitmask() {
            for flag in &field.bit_flags {
                let name = if flag.name.is_empty() {
                    format!("bit_{}_{}", field.index, flag.mask)
                } else {
                    flag.name.clone()
                };
                let state = FieldState {
                    index: field.index,
                    field_type: format!("Byte[{}]", flag.mask),
                    default_value: field.default_value.clone(),
                    meaning: flag.meaning.clone(),
                };
                insert_comparable(&mut fields, name, state);
            }
            continue;
        }

        let name = if field.name.is_empty() {
            format!("field_{}", field.index)
        } else {
            field.name.clone()
        };
        let state = FieldState {
            index: field.index,
            field_type: field.field_type.clone(),
            default_value: field.default_value.clone(),
            meaning: field.meaning.clone(),
        };
        insert_comparable(&mut fields, name, state);
    }
    fields
}

fn insert_comparable(fields: &mut BTreeMap<String, FieldState>, name: String, state: FieldState) {
    let index = state.index;
    if let Some(replaced) = fields.insert(name.clone(), state) {
        debug!(
            field = %name,
            replaced_index = replaced.index,
            index,
            "duplicate field name, keeping the later field"
        );
    }
}

fn entity_property(entity: &Entity, property: &str) -> String {
    match property {
        "type_index" => entity.type_index.to_string(),
        "bounding_box_xz" => entity.bounding_box_horizontal.clone(),
        _ => entity.bounding_box_vertical.clone(),
    }
}

fn field_deltas(from: &FieldState, to: &FieldState) -> Vec<Delta> {
    let mut deltas = Vec::new();
    if from.index != to.index {
        deltas.push(Delta {
            property: "index".to_string(),
            from: from.index.to_string(),
            to: to.index.to_string(),
        });
    }
    if from.field_type != to.field_type {
        deltas.push(Delta {
            property: "type".to_string(),
            from: from.field_type.clone(),
            to: to.field_type.clone(),
        });
    }
    if from.default_value != to.default_value {
        deltas.push(Delta {
            property: "default".to_string(),
            from: from.default_value.clone(),
            to: to.default_value.clone(),
        });
    }
    deltas
}

/// Walks one value through the ordered versions, emitting an entry for the
/// first appearance, every change, every removal and every re-appearance.
fn history<T, F>(versions: &[String], values: &[Option<T>], deltas: F) -> Vec<HistoryEntry<T>>
where
    T: Clone + PartialEq,
    F: Fn(&T, &T) -> Vec<Delta>,
{
    let mut entries = Vec::new();
    let mut previous: Option<&T> = None;

    for (position, (version, value)) in versions.iter().zip(values).enumerate() {
        match (previous, value) {
            (None, Some(current)) => {
                let change = if position == 0 {
                    Change::Initial
                } else {
                    Change::Added
                };
                entries.push(HistoryEntry {
                    version: version.clone(),
                    value: Some(current.clone()),
                    change,
                });
            }
            (Some(before), Some(current)) if before != current => {
                let found = deltas(before, current);
                if !found.is_empty() {
                    entries.push(HistoryEntry {
                        version: version.clone(),
                        value: Some(current.clone()),
                        change: Change::Changed { deltas: found },
                    });
                }
            }
            (Some(_), None) => entries.push(HistoryEntry {
                version: version.clone(),
                value: None,
                change: Change::Removed,
            }),
            _ => {}
        }
        previous = value.as_ref();
    }

    entries
}

fn inheritance_entries(versions: &[String], per_version: &[Option<&Section>]) -> Vec<InheritanceEntry> {
    let mut entries = Vec::with_capacity(versions.len());
    let mut last_present: Option<Option<&str>> = None;

    for (version, section) in versions.iter().zip(per_version) {
        let Some(section) = section else {
            entries.push(InheritanceEntry {
                version: version.clone(),
                present: false,
                inherits_from: None,
                changed: false,
            });
            continue;
        };
        let parent = section.inherits_from.as_deref();
        let changed = last_present.is_some_and(|before| before != parent);
        entries.push(InheritanceEntry {
            version: version.clone(),
            present: true,
            inherits_from: parent.map(str::to_string),
            changed,
        });
        last_present = Some(parent);
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::{
        Change, Delta, comparable_fields, diff_entities, diff_sections, order_by_version,
    };
    use crate::model::{BitFlag, Entity, Field, Section, TypeIndex, VersionSnapshot};

    fn entity(type_index: u64, width: &str) -> Entity {
        Entity {
            type_index: TypeIndex::Id(type_index),
            display_name: "Zombie".to_string(),
            bounding_box_horizontal: width.to_string(),
            bounding_box_vertical: "1.95".to_string(),
        }
    }

    fn field(index: usize, field_type: &str, name: &str, default_value: &str) -> Field {
        Field {
            index,
            field_type: field_type.to_string(),
            default_value: default_value.to_string(),
            meaning: name.to_string(),
            name: name.to_string(),
            bit_flags: Vec::new(),
        }
    }

    fn snapshot(version: &str) -> VersionSnapshot {
        VersionSnapshot::empty(version)
    }

    #[test]
    fn type_index_change_and_added_entity_are_reported() {
        let mut a = snapshot("1.20");
        a.entities.insert("mob:zombie".to_string(), entity(54, "0.6"));
        a.entities.insert("mob:steady".to_string(), entity(1, "0.5"));

        let mut b = snapshot("1.21");
        b.entities.insert("mob:zombie".to_string(), entity(55, "0.6"));
        b.entities.insert("mob:steady".to_string(), entity(1, "0.5"));
        b.entities.insert("mob:breeze".to_string(), entity(60, "0.6"));

        let diff = diff_entities(&[b, a]);
        assert_eq!(diff.versions, vec!["1.20".to_string(), "1.21".to_string()]);
        assert_eq!(diff.total, 3);
        let ids = diff
            .changes
            .iter()
            .map(|change| change.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["mob:breeze", "mob:zombie"]);

        let zombie = &diff.changes[1];
        let type_index = &zombie.properties[0];
        assert_eq!(type_index.property, "type_index");
        assert_eq!(type_index.entries.len(), 2);
        assert_eq!(type_index.entries[0].change, Change::Initial);
        assert_eq!(
            type_index.entries[1].change,
            Change::Changed {
                deltas: vec![Delta {
                    property: "type_index".to_string(),
                    from: "54".to_string(),
                    to: "55".to_string(),
                }]
            }
        );
        assert_eq!(zombie.properties[1].entries.len(), 1);

        let breeze = &diff.changes[0].properties[0];
        assert_eq!(breeze.entries.len(), 1);
        assert_eq!(breeze.entries[0].version, "1.21");
        assert_eq!(breeze.entries[0].change, Change::Added);
        assert_eq!(breeze.entries[0].value.as_deref(), Some("60"));
    }

    #[test]
    fn duplicate_field_names_keep_the_later_field() {
        let section = Section {
            inherits_from: None,
            fields: vec![
                field(3, "VarInt", "health", "20"),
                field(4, "Float", "health", "1.0"),
            ],
        };
        let fields = comparable_fields(&section);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["health"].index, 4);
        assert_eq!(fields["health"].field_type, "Float");
    }

    #[test]
    fn removal_and_reappearance_are_tracked() {
        let mut a = snapshot("1");
        a.entities.insert("mob:pig".to_string(), entity(3, "0.9"));
        let b = snapshot("2");
        let mut c = snapshot("3");
        c.entities.insert("mob:pig".to_string(), entity(3, "0.9"));

        let diff = diff_entities(&[a, b, c]);
        let entries = &diff.changes[0].properties[0].entries;
        let kinds = entries
            .iter()
            .map(|entry| (entry.version.as_str(), entry.change.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ("1", Change::Initial),
                ("2", Change::Removed),
                ("3", Change::Added),
            ]
        );
    }

    #[test]
    fn versions_sort_lexicographically() {
        let snapshots = [snapshot("1.21.9"), snapshot("1.21.10"), snapshot("1.20")];
        let ordered = order_by_version(&snapshots);
        assert_eq!(
            ordered.keys().copied().collect::<Vec<_>>(),
            vec!["1.20", "1.21.10", "1.21.9"]
        );
    }

    #[test]
    fn unchanged_section_is_not_reported() {
        let section = Section {
            inherits_from: Some("minecraft:entity".to_string()),
            fields: vec![field(8, "Byte", "handFlags", "0")],
        };
        let mut a = snapshot("1.20");
        a.sections.insert("minecraft:living".to_string(), section.clone());
        let mut b = snapshot("1.21");
        b.sections.insert("minecraft:living".to_string(), section);

        let diff = diff_sections(&[a, b]);
        assert_eq!(diff.total, 1);
        assert!(diff.changes.is_empty());
    }

    #[test]
    fn field_index_shift_and_inheritance_change_are_reported() {
        let mut a = snapshot("1.20");
        a.sections.insert(
            "minecraft:zombie".to_string(),
            Section {
                inherits_from: Some("minecraft:monster".to_string()),
                fields: vec![field(16, "Boolean", "isBaby", "false")],
            },
        );
        let mut b = snapshot("1.21");
        b.sections.insert(
            "minecraft:zombie".to_string(),
            Section {
                inherits_from: Some("minecraft:mob".to_string()),
                fields: vec![
                    field(17, "Boolean", "isBaby", "false"),
                    field(18, "VarInt", "unusedType", "0"),
                ],
            },
        );

        let diff = diff_sections(&[a, b]);
        let change = &diff.changes[0];
        assert!(!change.inheritance[0].changed);
        assert!(change.inheritance[1].changed);
        assert_eq!(change.inheritance[1].inherits_from.as_deref(), Some("minecraft:mob"));

        let names = change
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["isBaby", "unusedType"]);
        assert_eq!(
            change.fields[0].entries[1].change,
            Change::Changed {
                deltas: vec![Delta {
                    property: "index".to_string(),
                    from: "16".to_string(),
                    to: "17".to_string(),
                }]
            }
        );
        assert_eq!(change.fields[1].entries[0].change, Change::Added);
    }

    #[test]
    fn bitmask_fields_compare_per_bit() {
        let mut flags = field(0, "Byte", "", "0");
        flags.meaning.clear();
        flags.bit_flags = vec![
            BitFlag {
                mask: "0x01".to_string(),
                meaning: "Is on fire".to_string(),
                name: "isOnFire".to_string(),
            },
            BitFlag {
                mask: "0x02".to_string(),
                meaning: "Is crouching".to_string(),
                name: String::new(),
            },
        ];
        let section = Section {
            inherits_from: None,
            fields: vec![flags],
        };

        let comparable = comparable_fields(&section);
        assert_eq!(
            comparable.keys().cloned().collect::<Vec<_>>(),
            vec!["bit_0_0x02".to_string(), "isOnFire".to_string()]
        );
        assert_eq!(comparable["isOnFire"].field_type, "Byte[0x01]");
        assert_eq!(comparable["isOnFire"].meaning, "Is on fire");

        let mut moved = section.clone();
        moved.fields[0].bit_flags[0].mask = "0x04".to_string();
        let mut a = snapshot("a");
        a.sections.insert("minecraft:entity".to_string(), section);
        let mut b = snapshot("b");
        b.sections.insert("minecraft:entity".to_string(), moved);

        let diff = diff_sections(&[a, b]);
        let on_fire = diff.changes[0]
            .fields
            .iter()
            .find(|field| field.name == "isOnFire")
            .expect("isOnFire history");
        assert_eq!(
            on_fire.entries[1].change,
            Change::Changed {
                deltas: vec![Delta {
                    property: "type".to_string(),
                    from: "Byte[0x01]".to_string(),
                    to: "Byte[0x04]".to_string(),
                }]
            }
        );
    }

    #[test]
    fn section_missing_from_a_version_is_reported() {
        let mut a = snapshot("1.20");
        a.sections.insert("minecraft:breeze".to_string(), Section::default());
        let b = snapshot("1.21");

        let diff = diff_sections(&[a, b]);
        assert_eq!(diff.changes.len(), 1);
        assert!(diff.changes[0].inheritance[0].present);
        assert!(!diff.changes[0].inheritance[1].present);
    }
}
