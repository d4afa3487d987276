//! Wire-level {json:api} documents and their conversion into client types.
//!
//! Relationship and document `data` members are classified by a single match
//! over the JSON value: `null`, an object, or an array.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::collection::Collection;
use super::error::JsonApiError;
use super::resource::{Relationship, RelationshipData, RelationshipLinks, Resource};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Identifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

/// The three shapes a relationship's `data` member can take.
#[derive(Debug, Clone)]
pub(crate) enum RelationshipShape {
    Null,
    One(Identifier),
    Many(Vec<Identifier>),
}

impl<'de> Deserialize<'de> for RelationshipShape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::Null),
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(Self::One)
                .map_err(D::Error::custom),
            value @ Value::Array(_) => serde_json::from_value(value)
                .map(Self::Many)
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "invalid relationship data: {other}"
            ))),
        }
    }
}

/// Distinguishes an explicit `"data": null` from a missing `data` member.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LinksObject {
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
    #[serde(default)]
    pub related: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RelationshipObject {
    /// `None` when the server sent only links.
    #[serde(default, deserialize_with = "present")]
    pub data: Option<RelationshipShape>,
    #[serde(default)]
    pub links: LinksObject,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResourceObject {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipObject>,
    #[serde(default)]
    pub links: LinksObject,
}

#[derive(Debug)]
pub(crate) enum DocumentData {
    Empty,
    One(ResourceObject),
    Many(Vec<ResourceObject>),
}

/// A parsed success envelope.
#[derive(Debug)]
pub(crate) struct Document {
    pub data: DocumentData,
    pub links: LinksObject,
    pub included: Vec<ResourceObject>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    links: LinksObject,
    #[serde(default)]
    included: Vec<ResourceObject>,
}

impl Document {
    pub fn parse(body: &[u8]) -> Result<Self, JsonApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self {
                data: DocumentData::Empty,
                links: LinksObject::default(),
                included: Vec::new(),
            });
        }

        let raw: RawDocument = serde_json::from_slice(body)?;
        let data = match raw.data {
            Value::Null => DocumentData::Empty,
            value @ Value::Object(_) => DocumentData::One(serde_json::from_value(value)?),
            value @ Value::Array(_) => DocumentData::Many(serde_json::from_value(value)?),
            other => {
                return Err(JsonApiError::unexpected(format!(
                    "document data must be an object or array, got {other}"
                )));
            }
        };

        Ok(Self {
            data,
            links: raw.links,
            included: raw.included,
        })
    }

    pub fn into_resource(self) -> Result<Resource, JsonApiError> {
        match self.data {
            DocumentData::One(object) => Ok(object.into_resource(&self.included)),
            DocumentData::Many(_) => Err(JsonApiError::unexpected(
                "expected a single resource, got a list",
            )),
            DocumentData::Empty => Err(JsonApiError::unexpected("response carried no data")),
        }
    }

    pub fn into_collection(self) -> Result<Collection, JsonApiError> {
        let items = match self.data {
            DocumentData::Many(objects) => objects
                .into_iter()
                .map(|object| object.into_resource(&self.included))
                .collect(),
            DocumentData::Empty => Vec::new(),
            DocumentData::One(_) => {
                return Err(JsonApiError::unexpected(
                    "expected a list, got a single resource",
                ));
            }
        };

        Ok(Collection {
            items,
            next_cursor: self.links.next,
            previous_cursor: self.links.previous,
        })
    }
}

impl ResourceObject {
    pub fn into_resource(self, included: &[ResourceObject]) -> Resource {
        let relationships = self
            .relationships
            .into_iter()
            .map(|(key, object)| (key, object.into_relationship(included)))
            .collect();

        Resource {
            resource_type: self.resource_type,
            id: self.id.unwrap_or_default(),
            attributes: self.attributes,
            relationships,
            self_link: self.links.self_link,
            binary: BTreeMap::new(),
        }
    }
}

impl RelationshipObject {
    pub fn links(&self) -> RelationshipLinks {
        RelationshipLinks {
            self_link: self.links.self_link.clone(),
            related: self.links.related.clone(),
        }
    }

    pub fn into_relationship(self, included: &[ResourceObject]) -> Relationship {
        let links = self.links();
        let data = match self.data {
            // Links only: a to-many relationship whose members are fetched via `related`.
            None => RelationshipData::Plural {
                collection: Collection::default(),
                fetched: false,
            },
            Some(RelationshipShape::Null) => RelationshipData::Null,
            Some(RelationshipShape::One(identifier)) => {
                let (resource, fetched) = resolve(identifier, included);
                RelationshipData::Singular {
                    resource: Box::new(resource),
                    fetched,
                }
            }
            Some(RelationshipShape::Many(identifiers)) => {
                let resolved: Vec<(Resource, bool)> = identifiers
                    .into_iter()
                    .map(|identifier| resolve(identifier, included))
                    .collect();
                let fetched = !resolved.is_empty() && resolved.iter().all(|(_, f)| *f);
                RelationshipData::Plural {
                    collection: Collection {
                        items: resolved.into_iter().map(|(r, _)| r).collect(),
                        next_cursor: None,
                        previous_cursor: None,
                    },
                    fetched,
                }
            }
        };

        Relationship { data, links }
    }
}

/// Look an identifier up in `included`; found objects count as fetched.
fn resolve(identifier: Identifier, included: &[ResourceObject]) -> (Resource, bool) {
    match included.iter().find(|object| {
        object.resource_type == identifier.resource_type
            && object.id.as_deref() == Some(identifier.id.as_str())
    }) {
        Some(object) => (object.clone().into_resource(&[]), true),
        None => (
            Resource::identifier(identifier.resource_type, identifier.id),
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Document {
        Document::parse(value.to_string().as_bytes()).expect("document should parse")
    }

    #[test]
    fn relationship_shapes_are_classified_by_value() {
        let doc = parse(json!({
            "data": {
                "type": "resources",
                "id": "o:org:p:proj:r:res",
                "attributes": {"slug": "res"},
                "relationships": {
                    "project": {"data": {"type": "projects", "id": "o:org:p:proj"}},
                    "base": {"data": null},
                    "categories": {"data": [
                        {"type": "categories", "id": "a"},
                        {"type": "categories", "id": "b"}
                    ]},
                    "languages": {"links": {"related": "/projects/x/languages"}}
                },
                "links": {"self": "/resources/o:org:p:proj:r:res"}
            }
        }));

        let resource = doc.into_resource().expect("single resource");
        assert_eq!(resource.id, "o:org:p:proj:r:res");
        assert_eq!(
            resource.self_link.as_deref(),
            Some("/resources/o:org:p:proj:r:res")
        );

        assert!(matches!(
            resource.relationships["project"].data,
            RelationshipData::Singular { fetched: false, .. }
        ));
        assert!(matches!(
            resource.relationships["base"].data,
            RelationshipData::Null
        ));
        match &resource.relationships["categories"].data {
            RelationshipData::Plural {
                collection,
                fetched,
            } => {
                assert_eq!(collection.items.len(), 2);
                assert!(!fetched);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        let languages = &resource.relationships["languages"];
        assert!(!languages.is_fetched());
        assert_eq!(
            languages.links.related.as_deref(),
            Some("/projects/x/languages")
        );
    }

    #[test]
    fn included_objects_mark_relationship_fetched() {
        let doc = parse(json!({
            "data": {
                "type": "projects",
                "id": "o:org:p:proj",
                "relationships": {
                    "source_language": {"data": {"type": "languages", "id": "l:en"}}
                }
            },
            "included": [
                {"type": "languages", "id": "l:en", "attributes": {"code": "en"}}
            ]
        }));

        let project = doc.into_resource().expect("single resource");
        match &project.relationships["source_language"].data {
            RelationshipData::Singular { resource, fetched } => {
                assert!(*fetched);
                assert_eq!(resource.attributes["code"], json!("en"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn plural_document_keeps_cursors() {
        let doc = parse(json!({
            "data": [
                {"type": "languages", "id": "l:el"},
                {"type": "languages", "id": "l:fr"}
            ],
            "links": {"next": "/languages?page=2", "previous": null}
        }));

        let collection = doc.into_collection().expect("collection");
        assert_eq!(collection.items.len(), 2);
        assert_eq!(collection.next_cursor.as_deref(), Some("/languages?page=2"));
        assert_eq!(collection.previous_cursor, None);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let doc = parse(json!({"data": []}));
        assert!(doc.into_resource().is_err());

        let doc = parse(json!({"data": {"type": "t", "id": "1"}}));
        assert!(doc.into_collection().is_err());
    }

    #[test]
    fn empty_body_parses_to_empty_document() {
        let doc = Document::parse(b"").expect("empty body");
        assert!(matches!(doc.data, DocumentData::Empty));
    }

    #[test]
    fn scalar_relationship_data_is_rejected() {
        let body = json!({
            "data": {
                "type": "t",
                "id": "1",
                "relationships": {"bad": {"data": 5}}
            }
        });
        assert!(Document::parse(body.to_string().as_bytes()).is_err());
    }
}
