use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity type slot: numeric when the wiki lists a number, otherwise the raw label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeIndex {
    Id(u64),
    Label(String),
}

impl TypeIndex {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.is_empty()
            && trimmed.bytes().all(|byte| byte.is_ascii_digit())
            && let Ok(value) = trimmed.parse::<u64>()
        {
            return Self::Id(value);
        }
        Self::Label(text.to_string())
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(value) => write!(f, "{value}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub type_index: TypeIndex,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "bounding_box_xz")]
    pub bounding_box_horizontal: String,
    #[serde(rename = "bounding_box_y")]
    pub bounding_box_vertical: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitFlag {
    pub mask: String,
    pub meaning: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub index: usize,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "default")]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub meaning: String,
    pub name: String,
    #[serde(rename = "bitmask", default, skip_serializing_if = "Vec::is_empty")]
    pub bit_flags: Vec<BitFlag>,
}

impl Field {
    pub fn is_bitmask(&self) -> bool {
        !self.bit_flags.is_empty()
    }
}

/// One metadata schema block. Inherited fields are never copied in; they only
/// offset the indexes of the section's own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "inherits", default)]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Section {
    /// Index of the first own field, when the section declares any.
    pub fn base_index(&self) -> Option<usize> {
        self.fields.first().map(|field| field.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version: String,
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
    #[serde(rename = "metadata", default)]
    pub sections: BTreeMap<String, Section>,
}

impl VersionSnapshot {
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entities: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }
}
