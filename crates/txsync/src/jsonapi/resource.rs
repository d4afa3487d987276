//! Resources and their relationships.
//!
//! A [`Resource`] is an in-memory copy of one remote object. Every network
//! operation takes the [`JsonApiClient`] explicitly; nothing is cached beyond
//! the value the caller holds.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::client::JsonApiClient;
use super::collection::Collection;
use super::error::JsonApiError;
use super::payload::{Document, DocumentData, ResourceObject};
use crate::http::{HttpMethod, MultipartPart};

/// Links attached to a relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipLinks {
    pub self_link: Option<String>,
    pub related: Option<String>,
}

/// The value side of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipData {
    Null,
    /// A to-one reference. `fetched` is false while only `{type, id}` is known.
    Singular {
        resource: Box<Resource>,
        fetched: bool,
    },
    /// A to-many reference.
    Plural {
        collection: Collection,
        fetched: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub data: RelationshipData,
    pub links: RelationshipLinks,
}

impl Relationship {
    pub fn null() -> Self {
        Self {
            data: RelationshipData::Null,
            links: RelationshipLinks::default(),
        }
    }

    pub fn singular(resource: Resource) -> Self {
        Self {
            data: RelationshipData::Singular {
                resource: Box::new(resource),
                fetched: false,
            },
            links: RelationshipLinks::default(),
        }
    }

    pub fn plural(items: Vec<Resource>) -> Self {
        Self {
            data: RelationshipData::Plural {
                collection: Collection::from_items(items),
                fetched: false,
            },
            links: RelationshipLinks::default(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        match &self.data {
            RelationshipData::Null => true,
            RelationshipData::Singular { fetched, .. } | RelationshipData::Plural { fetched, .. } => {
                *fetched
            }
        }
    }

    /// The referenced resource of a to-one relationship.
    pub fn resource(&self) -> Option<&Resource> {
        match &self.data {
            RelationshipData::Singular { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// The members of a to-many relationship (empty otherwise).
    pub fn items(&self) -> &[Resource] {
        match &self.data {
            RelationshipData::Plural { collection, .. } => &collection.items,
            _ => &[],
        }
    }

    fn identifier_payload(&self) -> Value {
        match &self.data {
            RelationshipData::Null => Value::Null,
            RelationshipData::Singular { resource, .. } => resource.identifier_payload(),
            RelationshipData::Plural { collection, .. } => Value::Array(
                collection
                    .items
                    .iter()
                    .map(Resource::identifier_payload)
                    .collect(),
            ),
        }
    }

    /// True when both sides reference the same objects in the same shape.
    fn same_shape(&self, other: &Relationship) -> bool {
        match (&self.data, &other.data) {
            (RelationshipData::Null, RelationshipData::Null) => true,
            (
                RelationshipData::Singular { resource: a, .. },
                RelationshipData::Singular { resource: b, .. },
            ) => a.resource_type == b.resource_type && a.id == b.id,
            (
                RelationshipData::Plural { collection: a, .. },
                RelationshipData::Plural { collection: b, .. },
            ) => a.identifiers() == b.identifiers(),
            _ => false,
        }
    }
}

/// One remote object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    /// Empty until the first successful save.
    pub id: String,
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Relationship>,
    pub self_link: Option<String>,
    /// Byte attributes, sent only by [`Resource::save_as_multipart`].
    pub binary: BTreeMap<String, Vec<u8>>,
}

impl Resource {
    /// A new, unsaved resource.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    /// A bare `{type, id}` reference.
    pub fn identifier(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn set_binary_attribute(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.binary.insert(key.into(), bytes);
    }

    pub fn relationship(&self, key: &str) -> Option<&Relationship> {
        self.relationships.get(key)
    }

    /// Id of the resource a to-one relationship points at.
    pub fn related_id(&self, key: &str) -> Option<&str> {
        self.relationship(key)
            .and_then(Relationship::resource)
            .map(|r| r.id.as_str())
    }

    /// Assign a to-one relationship; `None` sets it to null. Existing links are kept.
    pub fn set_relationship(&mut self, key: impl Into<String>, value: Option<Resource>) {
        let data = match value {
            Some(resource) => Relationship::singular(resource).data,
            None => RelationshipData::Null,
        };
        self.relationships
            .entry(key.into())
            .and_modify(|rel| rel.data = data.clone())
            .or_insert(Relationship {
                data,
                links: RelationshipLinks::default(),
            });
    }

    pub fn set_plural_relationship(&mut self, key: impl Into<String>, items: Vec<Resource>) {
        let data = Relationship::plural(items).data;
        self.relationships
            .entry(key.into())
            .and_modify(|rel| rel.data = data.clone())
            .or_insert(Relationship {
                data,
                links: RelationshipLinks::default(),
            });
    }

    /// Deserialize the attribute map into a caller-defined shape.
    pub fn map_attributes<T: DeserializeOwned>(&self) -> Result<T, JsonApiError> {
        Ok(serde_json::from_value(Value::Object(self.attributes.clone()))?)
    }

    /// Merge a caller-defined shape back into the attribute map.
    pub fn unmap_attributes<T: Serialize>(&mut self, value: &T) -> Result<(), JsonApiError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                self.attributes.extend(map);
                Ok(())
            }
            _ => Err(JsonApiError::AttributesNotObject),
        }
    }

    fn identifier_payload(&self) -> Value {
        json!({"type": self.resource_type, "id": self.id})
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.resource_type)
    }

    fn object_path(&self) -> String {
        format!("/{}/{}", self.resource_type, self.id)
    }

    fn self_path(&self) -> String {
        self.self_link.clone().unwrap_or_else(|| self.object_path())
    }

    fn save_target(&self) -> (HttpMethod, String) {
        if self.id.is_empty() {
            (HttpMethod::Post, self.collection_path())
        } else {
            (HttpMethod::Patch, self.object_path())
        }
    }

    fn payload(&self, fields: Option<&[&str]>) -> Value {
        let wanted = |key: &str| fields.is_none_or(|fields| fields.contains(&key));

        let mut data = Map::new();
        data.insert("type".into(), Value::String(self.resource_type.clone()));
        if !self.id.is_empty() {
            data.insert("id".into(), Value::String(self.id.clone()));
        }

        let attributes: Map<String, Value> = self
            .attributes
            .iter()
            .filter(|(key, _)| wanted(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !attributes.is_empty() {
            data.insert("attributes".into(), Value::Object(attributes));
        }

        let relationships: Map<String, Value> = self
            .relationships
            .iter()
            .filter(|(key, _)| wanted(key))
            .map(|(key, rel)| (key.clone(), json!({"data": rel.identifier_payload()})))
            .collect();
        if !relationships.is_empty() {
            data.insert("relationships".into(), Value::Object(relationships));
        }

        json!({"data": Value::Object(data)})
    }

    /// Create (empty id) or update the resource. `None` sends every key.
    pub async fn save(
        &mut self,
        client: &JsonApiClient,
        fields: Option<&[&str]>,
    ) -> Result<(), JsonApiError> {
        let (method, path) = self.save_target();
        let document = client
            .send_json(method, &path, Some(self.payload(fields)))
            .await?;
        self.absorb(document)
    }

    /// Like [`Resource::save`], but as `multipart/form-data`.
    ///
    /// String attributes become text fields, byte attributes file parts and
    /// to-one relationships their id.
    pub async fn save_as_multipart(
        &mut self,
        client: &JsonApiClient,
        fields: Option<&[&str]>,
    ) -> Result<(), JsonApiError> {
        let wanted = |key: &str| fields.is_none_or(|fields| fields.contains(&key));
        let mut parts = Vec::new();

        for (key, value) in self.attributes.iter().filter(|(key, _)| wanted(key)) {
            match value {
                Value::Null => {}
                Value::String(text) => parts.push(MultipartPart::text(key, text)),
                other => parts.push(MultipartPart::text(key, other.to_string())),
            }
        }
        for (key, bytes) in self.binary.iter().filter(|(key, _)| wanted(key)) {
            parts.push(MultipartPart::file(key, key, bytes.clone()));
        }
        for (key, rel) in self.relationships.iter().filter(|(key, _)| wanted(key)) {
            if let Some(resource) = rel.resource() {
                parts.push(MultipartPart::text(key, &resource.id));
            }
        }

        let (method, path) = self.save_target();
        let document = client.send_multipart(method, &path, parts).await?;
        self.absorb(document)
    }

    /// Delete the remote object and clear the local id.
    pub async fn delete(&mut self, client: &JsonApiClient) -> Result<(), JsonApiError> {
        client
            .send_json(HttpMethod::Delete, &self.self_path(), None)
            .await?;
        self.id.clear();
        Ok(())
    }

    /// Re-read the resource from the server.
    pub async fn reload(&mut self, client: &JsonApiClient) -> Result<(), JsonApiError> {
        let document = client
            .send_json(HttpMethod::Get, &self.self_path(), None)
            .await?;
        self.absorb(document)
    }

    /// Load the full data behind a relationship. A no-op once fetched.
    pub async fn fetch(&mut self, client: &JsonApiClient, key: &str) -> Result<(), JsonApiError> {
        let relationship = self
            .relationships
            .get_mut(key)
            .ok_or_else(|| JsonApiError::UnknownRelationship(key.to_string()))?;
        if relationship.is_fetched() {
            return Ok(());
        }

        let (path, singular) = match &relationship.data {
            RelationshipData::Null => return Ok(()),
            RelationshipData::Singular { resource, .. } => (
                relationship
                    .links
                    .related
                    .clone()
                    .unwrap_or_else(|| resource.object_path()),
                true,
            ),
            RelationshipData::Plural { .. } => (
                relationship
                    .links
                    .related
                    .clone()
                    .ok_or_else(|| JsonApiError::MissingRelatedLink(key.to_string()))?,
                false,
            ),
        };

        let document = client.send_json(HttpMethod::Get, &path, None).await?;
        relationship.data = if singular || matches!(document.data, DocumentData::One(_)) {
            RelationshipData::Singular {
                resource: Box::new(document.into_resource()?),
                fetched: true,
            }
        } else {
            RelationshipData::Plural {
                collection: document.into_collection()?,
                fetched: true,
            }
        };
        Ok(())
    }

    /// Add members to a to-many relationship.
    pub async fn add(
        &mut self,
        client: &JsonApiClient,
        key: &str,
        items: &[Resource],
    ) -> Result<(), JsonApiError> {
        self.edit_relationship(client, HttpMethod::Post, key, items)
            .await
    }

    /// Remove members from a to-many relationship.
    pub async fn remove(
        &mut self,
        client: &JsonApiClient,
        key: &str,
        items: &[Resource],
    ) -> Result<(), JsonApiError> {
        self.edit_relationship(client, HttpMethod::Delete, key, items)
            .await
    }

    /// Replace the members of a to-many relationship.
    pub async fn reset(
        &mut self,
        client: &JsonApiClient,
        key: &str,
        items: &[Resource],
    ) -> Result<(), JsonApiError> {
        self.edit_relationship(client, HttpMethod::Patch, key, items)
            .await?;
        if let Some(rel) = self.relationships.get_mut(key) {
            rel.data = RelationshipData::Plural {
                collection: Collection::from_items(items.to_vec()),
                fetched: false,
            };
        }
        Ok(())
    }

    async fn edit_relationship(
        &mut self,
        client: &JsonApiClient,
        method: HttpMethod,
        key: &str,
        items: &[Resource],
    ) -> Result<(), JsonApiError> {
        let path = self
            .relationships
            .get(key)
            .and_then(|rel| rel.links.self_link.clone())
            .unwrap_or_else(|| format!("{}/relationships/{key}", self.object_path()));
        let body = json!({
            "data": items.iter().map(Resource::identifier_payload).collect::<Vec<_>>()
        });

        client.send_json(method, &path, Some(body)).await?;

        let rel = self
            .relationships
            .entry(key.to_string())
            .or_insert_with(|| Relationship::plural(Vec::new()));
        if let RelationshipData::Plural { fetched, .. } = &mut rel.data {
            *fetched = false;
        }
        Ok(())
    }

    /// Overwrite local state with a server response.
    fn absorb(&mut self, document: Document) -> Result<(), JsonApiError> {
        match document.data {
            // 204 No Content and friends.
            DocumentData::Empty => Ok(()),
            DocumentData::One(object) => {
                self.absorb_object(object, &document.included);
                Ok(())
            }
            DocumentData::Many(_) => Err(JsonApiError::unexpected(
                "expected a single resource in response",
            )),
        }
    }

    fn absorb_object(&mut self, object: ResourceObject, included: &[ResourceObject]) {
        if let Some(id) = object.id.filter(|id| !id.is_empty()) {
            self.id = id;
        }
        if object.links.self_link.is_some() {
            self.self_link = object.links.self_link;
        }
        self.attributes = object.attributes;

        for (key, incoming) in object.relationships {
            let links = incoming.links();
            let links_only = incoming.data.is_none();
            let replacement = incoming.into_relationship(included);

            let kept = match self.relationships.get_mut(&key) {
                Some(existing)
                    if links_only
                        || (existing.same_shape(&replacement) && !replacement.is_fetched()) =>
                {
                    existing.links = links;
                    true
                }
                _ => false,
            };
            if !kept {
                self.relationships.insert(key, replacement);
            }
        }
    }
}
