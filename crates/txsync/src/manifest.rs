//! The project manifest: which local files map to which remote resources.
//!
//! The CLI loads it from `txsync.toml`; the library only sees the
//! deserialized [`Manifest`].

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::sync::SyncError;

/// All configured resources plus the shared language mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Remote → local language codes, applied to every resource.
    #[serde(default)]
    pub lang_map: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<ConfigResource>,
}

/// One `[[resources]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigResource {
    pub organization_slug: String,
    pub project_slug: String,
    pub resource_slug: String,
    /// Path pattern with a `<lang>` placeholder.
    pub file_filter: String,
    pub source_file: String,
    #[serde(default)]
    pub source_language: Option<String>,
    /// i18n format used when the resource has to be created (e.g. `PO`).
    #[serde(default, rename = "type")]
    pub i18n_type: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    /// Local language code → path, overriding the file filter.
    #[serde(default)]
    pub language_overrides: BTreeMap<String, String>,
    /// Remote → local language codes; wins over the manifest-wide map.
    #[serde(default)]
    pub lang_map: BTreeMap<String, String>,
    #[serde(default)]
    pub minimum_percentage: Option<i32>,
}

impl ConfigResource {
    pub fn project_id(&self) -> String {
        crate::sync::ids::project_id(&self.organization_slug, &self.project_slug)
    }

    /// Remote id, `o:<org>:p:<project>:r:<resource>`.
    pub fn resource_id(&self) -> String {
        crate::sync::ids::resource_id(
            &self.organization_slug,
            &self.project_slug,
            &self.resource_slug,
        )
    }

    /// Selection key, `<project>.<resource>`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.project_slug, self.resource_slug)
    }

    /// Display name used when creating the resource.
    pub fn name(&self) -> &str {
        self.resource_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.resource_slug)
    }
}

/// Bidirectional language code mapping for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageMap {
    remote_to_local: BTreeMap<String, String>,
}

impl LanguageMap {
    pub fn new(remote_to_local: BTreeMap<String, String>) -> Self {
        Self { remote_to_local }
    }

    pub fn to_local(&self, remote: &str) -> String {
        self.remote_to_local
            .get(remote)
            .cloned()
            .unwrap_or_else(|| remote.to_string())
    }

    pub fn to_remote(&self, local: &str) -> String {
        self.remote_to_local
            .iter()
            .find(|(_, l)| l.as_str() == local)
            .map(|(remote, _)| remote.clone())
            .unwrap_or_else(|| local.to_string())
    }
}

impl Manifest {
    /// Language mapping for a resource, resource entries winning.
    pub fn language_map(&self, resource: &ConfigResource) -> LanguageMap {
        let mut merged = self.lang_map.clone();
        merged.extend(resource.lang_map.clone());
        LanguageMap::new(merged)
    }

    /// Resources named by `<project>.<resource>` patterns (`*` wildcards allowed).
    ///
    /// No patterns selects everything. A pattern that matches nothing is an
    /// error.
    pub fn select(&self, patterns: &[String]) -> Result<Vec<ConfigResource>, SyncError> {
        if patterns.is_empty() {
            return Ok(self.resources.clone());
        }

        let mut selected: Vec<ConfigResource> = Vec::new();
        for pattern in patterns {
            let matches: Vec<&ConfigResource> = self
                .resources
                .iter()
                .filter(|r| wildcard_match(pattern, &r.key()))
                .collect();
            if matches.is_empty() {
                return Err(SyncError::ResourceNotInConfig(pattern.clone()));
            }
            for resource in matches {
                if !selected.contains(resource) {
                    selected.push(resource.clone());
                }
            }
        }
        Ok(selected)
    }
}

/// Glob match where `*` spans any run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let Some((first, rest)) = pattern.split_once('*') else {
        return pattern == text;
    };
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };

    let mut pieces: Vec<&str> = rest.split('*').collect();
    let last = pieces.pop().unwrap_or_default();
    for piece in pieces {
        match remaining.find(piece) {
            Some(index) => remaining = &remaining[index + piece.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(project: &str, slug: &str) -> ConfigResource {
        ConfigResource {
            organization_slug: "org".into(),
            project_slug: project.into(),
            resource_slug: slug.into(),
            file_filter: "locale/<lang>.po".into(),
            source_file: "locale/en.po".into(),
            ..ConfigResource::default()
        }
    }

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("proj.res", "proj.res"));
        assert!(!wildcard_match("proj.res", "proj.res2"));
        assert!(wildcard_match("proj.*", "proj.res"));
        assert!(wildcard_match("*.res", "web.res"));
        assert!(wildcard_match("p*j.r*s", "proj.res"));
        assert!(wildcard_match("*", "anything"));
        assert!(!wildcard_match("proj.*x", "proj.res"));
        assert!(!wildcard_match("a*a", "a"));
    }

    #[test]
    fn select_by_pattern_and_reject_unknown() {
        let manifest = Manifest {
            lang_map: BTreeMap::new(),
            resources: vec![resource("web", "app"), resource("web", "emails"), resource("docs", "app")],
        };

        assert_eq!(manifest.select(&[]).expect("all").len(), 3);

        let web = manifest.select(&["web.*".to_string()]).expect("web");
        assert_eq!(web.len(), 2);

        // Overlapping patterns do not duplicate.
        let both = manifest
            .select(&["*.app".to_string(), "web.app".to_string()])
            .expect("apps");
        assert_eq!(both.len(), 2);

        let err = manifest
            .select(&["web.missing".to_string()])
            .expect_err("unknown");
        assert!(matches!(err, SyncError::ResourceNotInConfig(id) if id == "web.missing"));
    }

    #[test]
    fn resource_lang_map_wins() {
        let mut res = resource("web", "app");
        res.lang_map.insert("pt_BR".into(), "pt-br".into());
        let manifest = Manifest {
            lang_map: BTreeMap::from([
                ("pt_BR".to_string(), "portuguese".to_string()),
                ("de".to_string(), "de-DE".to_string()),
            ]),
            resources: vec![res.clone()],
        };

        let map = manifest.language_map(&res);
        assert_eq!(map.to_local("pt_BR"), "pt-br");
        assert_eq!(map.to_local("de"), "de-DE");
        assert_eq!(map.to_local("el"), "el");
        assert_eq!(map.to_remote("pt-br"), "pt_BR");
        assert_eq!(map.to_remote("fr"), "fr");
    }

    #[test]
    fn ids_and_names() {
        let mut res = resource("web", "app");
        assert_eq!(res.resource_id(), "o:org:p:web:r:app");
        assert_eq!(res.project_id(), "o:org:p:web");
        assert_eq!(res.key(), "web.app");
        assert_eq!(res.name(), "app");
        res.resource_name = Some("Web app".into());
        assert_eq!(res.name(), "Web app");
    }
}
