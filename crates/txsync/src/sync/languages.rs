//! Process-wide table of languages the server knows.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::jsonapi::{JsonApiClient, JsonApiError, Query, Resource};

/// Language code → `languages` resource.
pub type LanguageTable = BTreeMap<String, Resource>;

/// Lazily loaded, explicitly invalidated copy of `/languages`.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct LanguageCache {
    table: Arc<Mutex<Option<Arc<LanguageTable>>>>,
}

impl LanguageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table, loading it on first use.
    pub async fn all(&self, client: &JsonApiClient) -> Result<Arc<LanguageTable>, JsonApiError> {
        let mut guard = self.table.lock().await;
        if let Some(table) = guard.as_ref() {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(load(client).await?);
        *guard = Some(Arc::clone(&table));
        Ok(table)
    }

    pub async fn get(
        &self,
        client: &JsonApiClient,
        code: &str,
    ) -> Result<Option<Resource>, JsonApiError> {
        Ok(self.all(client).await?.get(code).cloned())
    }

    /// Drop the cached table; the next lookup reloads it.
    pub async fn invalidate(&self) {
        *self.table.lock().await = None;
    }

    /// Reload now.
    pub async fn refresh(&self, client: &JsonApiClient) -> Result<Arc<LanguageTable>, JsonApiError> {
        self.invalidate().await;
        self.all(client).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct LanguageAttributes {
    #[serde(default)]
    code: Option<String>,
}

async fn load(client: &JsonApiClient) -> Result<LanguageTable, JsonApiError> {
    let languages = client
        .list("languages", &Query::new())
        .await?
        .collect_all(client)
        .await?;
    tracing::debug!(count = languages.len(), "Loaded language table");

    Ok(languages
        .into_iter()
        .map(|language| {
            let attributes: LanguageAttributes = language.map_attributes()?;
            let code = attributes
                .code
                .unwrap_or_else(|| super::ids::language_code(&language.id).to_string());
            Ok((code, language))
        })
        .collect::<Result<_, JsonApiError>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};
    use serde_json::json;

    const HOST: &str = "https://api.test";

    fn languages_page() -> serde_json::Value {
        json!({"data": [
            {"type": "languages", "id": "l:el", "attributes": {"code": "el"}},
            {"type": "languages", "id": "l:fr", "attributes": {"code": "fr"}}
        ]})
    }

    #[tokio::test]
    async fn loads_once_until_invalidated() {
        let transport = MockTransport::new();
        transport.push_json(HttpMethod::Get, format!("{HOST}/languages"), 200, languages_page());
        transport.push_json(HttpMethod::Get, format!("{HOST}/languages"), 200, languages_page());
        let client = JsonApiClient::new_with_transport(HOST, "t", Arc::new(transport.clone()));
        let cache = LanguageCache::new();

        assert!(cache.get(&client, "el").await.expect("el").is_some());
        assert!(cache.get(&client, "xx").await.expect("xx").is_none());
        assert_eq!(transport.requests().len(), 1);

        let table = cache.refresh(&client).await.expect("refresh");
        assert_eq!(table.len(), 2);
        assert_eq!(transport.requests().len(), 2);
    }
}
