use indexmap::IndexMap;
use serde::{ Deserialize, Deserializer, Serialize };
use serde_json::Value;

use crate::schema::{ Confidentiality, FieldMap };

/// A stored vector record as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(deserialize_with = "deserialize_point_id")]
    pub id: String,
    pub collection: String,
    /// Older backends spell this key `matadata`.
    #[serde(alias = "matadata")]
    pub metadata: PointMetadata,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointMetadata {
    pub table_name: String,
    #[serde(default)]
    pub value: FieldMap,
}

/// Qdrant ids are either UUID strings or unsigned integers; both end up as strings here.
fn deserialize_point_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported point id: {}", other))),
    }
}

/// Local, unsaved copy of a point's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EditingPoint {
    pub id: String,
    pub collection: String,
    pub table_name: String,
    pub fields: FieldMap,
    pub has_changes: bool,
}

impl EditingPoint {
    pub fn from_point(point: &Point) -> Self {
        Self {
            id: point.id.clone(),
            collection: point.collection.clone(),
            table_name: point.metadata.table_name.clone(),
            fields: point.metadata.value.clone(),
            has_changes: false,
        }
    }

    /// Returns false when the field does not exist on this point.
    pub fn set_description(&mut self, field: &str, description: &str) -> bool {
        match self.fields.get_mut(field) {
            Some(entry) => {
                entry.description = description.to_string();
                self.has_changes = true;
                true
            }
            None => false,
        }
    }

    pub fn set_confidentiality(&mut self, field: &str, confidentiality: Confidentiality) -> bool {
        match self.fields.get_mut(field) {
            Some(entry) => {
                entry.confidentiality = confidentiality;
                self.has_changes = true;
                true
            }
            None => false,
        }
    }

    pub fn to_update_request(&self) -> UpdatePointRequest {
        UpdatePointRequest {
            point: PointUpdate {
                id: self.id.clone(),
                table_name: self.table_name.clone(),
                value: self.fields.clone(),
            },
            collection_name: VectorDatabaseName::new(&self.collection),
        }
    }

    /// The draft as a point, used as the new baseline once a save went through.
    pub fn to_point(&self) -> Point {
        Point {
            id: self.id.clone(),
            collection: self.collection.clone(),
            metadata: PointMetadata {
                table_name: self.table_name.clone(),
                value: self.fields.clone(),
            },
        }
    }
}

/// The backend wraps collection names in `{ "vector_database": <name> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDatabaseName {
    pub vector_database: String,
}

impl VectorDatabaseName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            vector_database: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointUpdate {
    pub id: String,
    pub table_name: String,
    pub value: FieldMap,
}

/// Body of `PUT /vector/update_point`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePointRequest {
    pub point: PointUpdate,
    pub collection_name: VectorDatabaseName,
}

/// Points sharing a collection, in the order the backend listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionGroup {
    pub name: String,
    pub points: Vec<Point>,
}

impl CollectionGroup {
    pub fn count(&self) -> usize {
        self.points.len()
    }
}

/// Groups points by collection; groups appear in first-seen order.
pub fn group_by_collection(points: &[Point]) -> Vec<CollectionGroup> {
    let mut groups: IndexMap<&str, Vec<Point>> = IndexMap::new();
    for point in points {
        groups.entry(point.collection.as_str()).or_default().push(point.clone());
    }
    groups
        .into_iter()
        .map(|(name, points)| CollectionGroup { name: name.to_string(), points })
        .collect()
}
