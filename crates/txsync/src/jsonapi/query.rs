//! Query-string encoding for list endpoints.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// Filters, includes and extra parameters for a list request.
///
/// Encoding is deterministic: filters and extras are kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: BTreeMap<String, String>,
    pub includes: Vec<String>,
    pub extras: BTreeMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter. `__` in the key nests: `age__gt` becomes `filter[age][gt]`.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn include(mut self, key: impl Into<String>) -> Self {
        self.includes.push(key.into());
        self
    }

    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.includes.is_empty() && self.extras.is_empty()
    }

    /// URL-encoded query string, without the leading `?`.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.filters {
            let nested: String = key.split("__").map(|part| format!("[{part}]")).collect();
            serializer.append_pair(&format!("filter{nested}"), value);
        }
        if !self.includes.is_empty() {
            serializer.append_pair("include", &self.includes.join(","));
        }
        for (key, value) in &self.extras {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_encodes_to_empty_string() {
        assert_eq!(Query::new().encode(), "");
        assert!(Query::new().is_empty());
    }

    #[test]
    fn nested_filter_keys_use_brackets() {
        let query = Query::new().filter("age__gt", "5");
        assert_eq!(query.encode(), "filter%5Bage%5D%5Bgt%5D=5");
    }

    #[test]
    fn encoding_is_sorted_and_stable() {
        let a = Query::new()
            .filter("project", "o:org:p:proj")
            .filter("language", "l:el")
            .include("language")
            .include("resource")
            .extra("limit", "100");
        let b = Query::new()
            .extra("limit", "100")
            .filter("language", "l:el")
            .include("language")
            .include("resource")
            .filter("project", "o:org:p:proj");

        assert_eq!(a.encode(), b.encode());
        assert_eq!(
            a.encode(),
            "filter%5Blanguage%5D=l%3Ael&filter%5Bproject%5D=o%3Aorg%3Ap%3Aproj\
             &include=language%2Cresource&limit=100"
        );
    }
}
