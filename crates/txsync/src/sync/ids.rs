//! Remote id formats and branch slugs.

pub fn project_id(organization: &str, project: &str) -> String {
    format!("o:{organization}:p:{project}")
}

pub fn resource_id(organization: &str, project: &str, resource: &str) -> String {
    format!("o:{organization}:p:{project}:r:{resource}")
}

pub fn language_id(code: &str) -> String {
    format!("l:{code}")
}

/// Language code of an `l:<code>` id.
pub fn language_code(id: &str) -> &str {
    id.strip_prefix("l:").unwrap_or(id)
}

/// Lowercase, with every run of characters outside `[a-z0-9_]` collapsed into `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `<slug>--<branch>`; the resource slug comes first so ids stay grouped.
pub fn branch_slug(resource_slug: &str, branch: &str) -> String {
    format!("{resource_slug}--{}", slugify(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_formats() {
        assert_eq!(project_id("org", "proj"), "o:org:p:proj");
        assert_eq!(resource_id("org", "proj", "res"), "o:org:p:proj:r:res");
        assert_eq!(language_id("pt_BR"), "l:pt_BR");
        assert_eq!(language_code("l:pt_BR"), "pt_BR");
        assert_eq!(language_code("el"), "el");
    }

    #[test]
    fn slugify_branch_names() {
        assert_eq!(slugify("abranch"), "abranch");
        assert_eq!(slugify("feature/New Thing"), "feature-new-thing");
        assert_eq!(slugify("--weird!!name--"), "weird-name");
        assert_eq!(slugify("release_1.2"), "release_1-2");
    }

    #[test]
    fn branch_slug_suffixes_resource() {
        assert_eq!(branch_slug("resslug", "abranch"), "resslug--abranch");
        assert_eq!(branch_slug("app", "fix/login"), "app--fix-login");
    }
}
