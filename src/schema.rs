use indexmap::IndexMap;
use serde::{ Deserialize, Deserializer, Serialize, Serializer };
use std::collections::HashMap;
use std::fmt;

use crate::point::VectorDatabaseName;

/// Table name to ordered field names, as reported by the backend's schema introspection.
pub type TableSchema = IndexMap<String, Vec<String>>;

/// Field name to its metadata, for a single table or point.
pub type FieldMap = IndexMap<String, FieldDescription>;

/// Table name to the metadata of each of its fields.
pub type FieldDescriptions = IndexMap<String, FieldMap>;

/// Tables flagged `true` are dropped from vectorization requests altogether.
pub type ExcludedTables = HashMap<String, bool>;

/// Sensitivity rating attached to a field, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Confidentiality(u8);

impl Confidentiality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const DEFAULT: u8 = 5;

    /// Clamps any integer into the valid range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    /// Maps a range control position in `[0.0, 1.0]` onto `1..=10`.
    ///
    /// Positions outside the track are pinned to its ends, so dragging to
    /// either extreme records exactly 1 or 10.
    pub fn from_range_position(position: f64) -> Self {
        if position.is_nan() {
            return Self::default();
        }
        let position = position.clamp(0.0, 1.0);
        let span = (Self::MAX - Self::MIN) as f64;
        Self::new((Self::MIN as f64 + position * span).round() as i64)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Confidentiality {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for Confidentiality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Confidentiality {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self::new)
    }
}

impl Serialize for Confidentiality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Confidentiality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        if raw.is_nan() {
            return Ok(Self::default());
        }
        Ok(Self::new(raw.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64))
    }
}

/// Operator-authored metadata for one field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Free text; empty means "not described".
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confidentiality: Confidentiality,
}

impl FieldDescription {
    pub fn new(description: impl Into<String>, confidentiality: Confidentiality) -> Self {
        Self {
            description: description.into(),
            confidentiality,
        }
    }

    /// Whether the description carries anything besides whitespace.
    pub fn is_described(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

/// Builds the blank draft for a freshly loaded schema: every field empty at
/// the default confidentiality, every table included.
pub fn blank_drafts(schema: &TableSchema) -> (FieldDescriptions, ExcludedTables) {
    let mut descriptions = FieldDescriptions::new();
    let mut excluded = ExcludedTables::new();

    for (table, fields) in schema {
        let field_map = fields
            .iter()
            .map(|field| (field.clone(), FieldDescription::default()))
            .collect::<FieldMap>();
        descriptions.insert(table.clone(), field_map);
        excluded.insert(table.clone(), false);
    }

    (descriptions, excluded)
}

/// Keeps only described fields of non-excluded tables; tables left with no
/// described field are dropped.
pub fn filter_described(
    descriptions: &FieldDescriptions,
    excluded: &ExcludedTables
) -> FieldDescriptions {
    descriptions
        .iter()
        .filter(|(table, _)| !excluded.get(*table).copied().unwrap_or(false))
        .filter_map(|(table, fields)| {
            let described = fields
                .iter()
                .filter(|(_, field)| field.is_described())
                .map(|(name, field)| (name.clone(), field.clone()))
                .collect::<FieldMap>();
            (!described.is_empty()).then(|| (table.clone(), described))
        })
        .collect()
}

/// Wrapper the backend expects around the description payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldsDescriptionEnvelope {
    pub fields_description: FieldDescriptions,
}

/// Body of `POST /vector/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateVectorRequest {
    pub vector_database: VectorDatabaseName,
    /// Absent in automatic mode and whenever nothing survived filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_description: Option<FieldsDescriptionEnvelope>,
}

impl CreateVectorRequest {
    pub fn automatic(collection: impl Into<String>) -> Self {
        Self {
            vector_database: VectorDatabaseName::new(collection),
            fields_description: None,
        }
    }

    pub fn with_descriptions(collection: impl Into<String>, described: FieldDescriptions) -> Self {
        let fields_description = (!described.is_empty()).then(|| FieldsDescriptionEnvelope {
            fields_description: described,
        });
        Self {
            vector_database: VectorDatabaseName::new(collection),
            fields_description,
        }
    }
}

/// Table counts over a loaded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchemaStats {
    pub total: usize,
    pub excluded: usize,
    pub active: usize,
}

impl SchemaStats {
    pub fn compute(schema: &TableSchema, excluded: &ExcludedTables) -> Self {
        let total = schema.len();
        let excluded = schema
            .keys()
            .filter(|table| excluded.get(*table).copied().unwrap_or(false))
            .count();
        Self {
            total,
            excluded,
            active: total - excluded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_schema() -> TableSchema {
        serde_json::from_value(json!({ "users": ["id", "email"], "orders": ["id"] })).unwrap()
    }

    #[test]
    fn schema_keeps_backend_order() {
        let schema: TableSchema = serde_json::from_str(
            r#"{"zeta": ["b", "a"], "alpha": ["c"]}"#
        ).unwrap();
        let tables: Vec<_> = schema.keys().cloned().collect();
        assert_eq!(tables, vec!["zeta", "alpha"]);
        assert_eq!(schema["zeta"], vec!["b", "a"]);
    }

    #[test]
    fn confidentiality_is_clamped() {
        assert_eq!(Confidentiality::new(0).get(), 1);
        assert_eq!(Confidentiality::new(-20).get(), 1);
        assert_eq!(Confidentiality::new(11).get(), 10);
        assert_eq!(Confidentiality::new(7).get(), 7);
        assert_eq!(Confidentiality::default().get(), 5);
    }

    #[test]
    fn range_extremes_record_one_and_ten() {
        assert_eq!(Confidentiality::from_range_position(0.0).get(), 1);
        assert_eq!(Confidentiality::from_range_position(1.0).get(), 10);
        assert_eq!(Confidentiality::from_range_position(-0.3).get(), 1);
        assert_eq!(Confidentiality::from_range_position(1.7).get(), 10);
        assert_eq!(Confidentiality::from_range_position(0.5).get(), 6);
    }

    #[test]
    fn confidentiality_deserializes_leniently() {
        let field: FieldDescription = serde_json::from_value(
            json!({ "description": "x", "confidentiality": 42 })
        ).unwrap();
        assert_eq!(field.confidentiality.get(), 10);

        let field: FieldDescription = serde_json::from_value(
            json!({ "description": "x", "confidentiality": 3.0 })
        ).unwrap();
        assert_eq!(field.confidentiality.get(), 3);

        let field: FieldDescription = serde_json::from_value(json!({ "description": "x" })).unwrap();
        assert_eq!(field.confidentiality.get(), 5);
    }

    #[test]
    fn blank_drafts_cover_every_field() {
        let (descriptions, excluded) = blank_drafts(&users_schema());
        assert_eq!(descriptions["users"].len(), 2);
        assert_eq!(descriptions["users"]["email"], FieldDescription::default());
        assert_eq!(excluded.get("users"), Some(&false));
        assert_eq!(excluded.get("orders"), Some(&false));
    }

    #[test]
    fn excluded_table_never_reaches_payload() {
        let (mut descriptions, mut excluded) = blank_drafts(&users_schema());
        descriptions["users"]["email"].description = "contact address".into();
        excluded.insert("users".into(), true);

        let filtered = filter_described(&descriptions, &excluded);
        assert!(!filtered.contains_key("users"));
    }

    #[test]
    fn whitespace_descriptions_are_dropped() {
        let (mut descriptions, excluded) = blank_drafts(&users_schema());
        descriptions["users"]["id"].description = "   \t".into();
        descriptions["users"]["email"].description = "contact address".into();

        let filtered = filter_described(&descriptions, &excluded);
        assert_eq!(filtered["users"].len(), 1);
        assert!(filtered["users"].contains_key("email"));
        assert!(!filtered.contains_key("orders"));
    }

    #[test]
    fn stats_count_exclusions() {
        let schema = users_schema();
        let (_, mut excluded) = blank_drafts(&schema);
        excluded.insert("orders".into(), true);
        let stats = SchemaStats::compute(&schema, &excluded);
        assert_eq!(stats, SchemaStats { total: 2, excluded: 1, active: 1 });
    }
}
