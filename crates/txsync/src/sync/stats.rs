//! Per-language translation statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids;
use super::types::ContentMode;
use crate::jsonapi::{JsonApiClient, JsonApiError, Query};

/// Attributes of a `resource_language_stats` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub translated_strings: u64,
    #[serde(default)]
    pub reviewed_strings: u64,
    #[serde(default)]
    pub proofread_strings: u64,
    #[serde(default)]
    pub total_strings: u64,
}

impl LanguageStats {
    /// Completion for a content mode. A resource with no strings counts as complete.
    pub fn percentage(&self, mode: ContentMode) -> f64 {
        if self.total_strings == 0 {
            return 100.0;
        }
        let done = match mode {
            ContentMode::Default => self.translated_strings,
            ContentMode::Reviewed => self.reviewed_strings,
            ContentMode::Proofread => self.proofread_strings,
        };
        done as f64 * 100.0 / self.total_strings as f64
    }

    /// Whether this language falls short of a threshold. Non-positive
    /// thresholds never do.
    pub fn below_threshold(&self, mode: ContentMode, threshold: Option<i32>) -> bool {
        match threshold {
            Some(minimum) if minimum > 0 => self.percentage(mode) < f64::from(minimum),
            _ => false,
        }
    }
}

/// Remote language code → stats.
pub type StatsTable = BTreeMap<String, LanguageStats>;

/// Stats for a resource, optionally limited to one language.
pub async fn fetch_stats(
    client: &JsonApiClient,
    project_id: &str,
    resource_id: &str,
    language: Option<&str>,
) -> Result<StatsTable, JsonApiError> {
    let mut query = Query::new()
        .filter("project", project_id)
        .filter("resource", resource_id);
    if let Some(code) = language {
        query = query.filter("language", ids::language_id(code));
    }

    let items = client
        .list("resource_language_stats", &query)
        .await?
        .collect_all(client)
        .await?;

    let mut table = StatsTable::new();
    for item in items {
        let Some(language_id) = item.related_id("language") else {
            continue;
        };
        let code = ids::language_code(language_id).to_string();
        table.insert(code, item.map_attributes()?);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn percentage_by_mode() {
        let stats = LanguageStats {
            translated_strings: 30,
            reviewed_strings: 10,
            proofread_strings: 0,
            total_strings: 100,
            last_update: None,
        };
        assert_eq!(stats.percentage(ContentMode::Default), 30.0);
        assert_eq!(stats.percentage(ContentMode::Reviewed), 10.0);
        assert!(stats.below_threshold(ContentMode::Default, Some(40)));
        assert!(!stats.below_threshold(ContentMode::Default, Some(30)));
        assert!(!stats.below_threshold(ContentMode::Proofread, Some(0)));
        assert!(!stats.below_threshold(ContentMode::Proofread, None));
    }

    #[test]
    fn empty_resource_is_complete() {
        let stats = LanguageStats::default();
        assert!(!stats.below_threshold(ContentMode::Default, Some(100)));
    }

    #[tokio::test]
    async fn fetch_stats_keys_by_language_code() {
        let host = "https://api.test";
        let query = Query::new()
            .filter("project", "o:org:p:proj")
            .filter("resource", "o:org:p:proj:r:res");
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{host}/resource_language_stats?{}", query.encode()),
            200,
            json!({"data": [{
                "type": "resource_language_stats",
                "id": "o:org:p:proj:r:res:l:el",
                "attributes": {
                    "last_update": "2024-01-02T03:04:05Z",
                    "translated_strings": 3,
                    "total_strings": 4,
                    "untranslated_words": 9
                },
                "relationships": {
                    "language": {"data": {"type": "languages", "id": "l:el"}}
                }
            }]}),
        );
        let client = JsonApiClient::new_with_transport(host, "t", Arc::new(transport));

        let table = fetch_stats(&client, "o:org:p:proj", "o:org:p:proj:r:res", None)
            .await
            .expect("stats");

        let el = &table["el"];
        assert_eq!(el.translated_strings, 3);
        assert_eq!(el.total_strings, 4);
        assert_eq!(
            el.last_update,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
    }
}
