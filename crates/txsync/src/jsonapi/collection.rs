//! One page of a plural response.

use super::client::JsonApiClient;
use super::error::JsonApiError;
use super::resource::Resource;
use crate::http::HttpMethod;

/// A single page of resources plus the cursors around it.
///
/// Traversal is explicit: nothing is fetched until [`Collection::next_page`]
/// or [`Collection::previous_page`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub items: Vec<Resource>,
    pub next_cursor: Option<String>,
    pub previous_cursor: Option<String>,
}

impl Collection {
    pub fn from_items(items: Vec<Resource>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.items.iter()
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// `(type, id)` pairs in order.
    pub fn identifiers(&self) -> Vec<(&str, &str)> {
        self.items
            .iter()
            .map(|r| (r.resource_type.as_str(), r.id.as_str()))
            .collect()
    }

    pub async fn next_page(
        &self,
        client: &JsonApiClient,
    ) -> Result<Option<Collection>, JsonApiError> {
        Self::follow(client, self.next_cursor.as_deref()).await
    }

    pub async fn previous_page(
        &self,
        client: &JsonApiClient,
    ) -> Result<Option<Collection>, JsonApiError> {
        Self::follow(client, self.previous_cursor.as_deref()).await
    }

    /// Walk every following page and return all items.
    pub async fn collect_all(self, client: &JsonApiClient) -> Result<Vec<Resource>, JsonApiError> {
        let mut items = Vec::with_capacity(self.items.len());
        let mut page = self;
        loop {
            let next = page.next_page(client).await?;
            items.append(&mut page.items);
            match next {
                Some(following) => page = following,
                None => return Ok(items),
            }
        }
    }

    async fn follow(
        client: &JsonApiClient,
        cursor: Option<&str>,
    ) -> Result<Option<Collection>, JsonApiError> {
        let Some(cursor) = cursor else {
            return Ok(None);
        };
        let document = client.send_json(HttpMethod::Get, cursor, None).await?;
        document.into_collection().map(Some)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Collection {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::jsonapi::Query;
    use serde_json::json;
    use std::sync::Arc;

    const HOST: &str = "https://api.test";

    #[tokio::test]
    async fn collect_all_follows_next_links() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/languages"),
            200,
            json!({
                "data": [{"type": "languages", "id": "l:el"}],
                "links": {"next": format!("{HOST}/languages?page%5Bcursor%5D=2")}
            }),
        );
        transport.push_json(
            HttpMethod::Get,
            format!("{HOST}/languages?page%5Bcursor%5D=2"),
            200,
            json!({
                "data": [{"type": "languages", "id": "l:fr"}],
                "links": {"next": null, "previous": format!("{HOST}/languages")}
            }),
        );
        let client = JsonApiClient::new_with_transport(HOST, "t", Arc::new(transport.clone()));

        let first = client
            .list("languages", &Query::new())
            .await
            .expect("first page");
        assert!(first.has_next());

        let all = first.collect_all(&client).await.expect("all pages");
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["l:el", "l:fr"]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_cursor_yields_none_without_request() {
        let transport = MockTransport::new();
        let client = JsonApiClient::new_with_transport(HOST, "t", Arc::new(transport.clone()));

        let page = Collection::default();
        assert!(page.next_page(&client).await.expect("ok").is_none());
        assert!(page.previous_page(&client).await.expect("ok").is_none());
        assert!(transport.requests().is_empty());
    }
}
