//! Resolve `<lang>` path patterns against the filesystem.
//!
//! A file filter such as `locale/<lang>/LC_MESSAGES/django.po` names one file
//! per language. [`match_files`] finds the languages that have a file on disk;
//! [`translation_path`] goes the other way.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Placeholder substituted with a language code.
pub const LANG_PLACEHOLDER: &str = "<lang>";

#[derive(Debug, Error)]
pub enum FileFilterError {
    #[error("File filter '{0}' does not contain the '<lang>' placeholder")]
    MissingPlaceholder(String),

    #[error("Failed to read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Check that a file filter can name per-language files.
pub fn validate_file_filter(pattern: &str) -> Result<(), FileFilterError> {
    if pattern.contains(LANG_PLACEHOLDER) {
        Ok(())
    } else {
        Err(FileFilterError::MissingPlaceholder(pattern.to_string()))
    }
}

/// Split on either separator so patterns written on another platform still work.
fn segments(pattern: &str) -> Vec<String> {
    pattern
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn start_dir(root: &Path, pattern: &str) -> PathBuf {
    if pattern.starts_with('/') || Path::new(pattern).is_absolute() {
        PathBuf::from(std::path::MAIN_SEPARATOR_STR)
    } else {
        root.to_path_buf()
    }
}

/// Every existing file the pattern names, keyed by language code.
///
/// Directories are read one wildcarded level at a time. A pattern without
/// `<lang>` resolves to a single entry under the empty key when the file
/// exists.
pub fn match_files(root: &Path, pattern: &str) -> Result<BTreeMap<String, PathBuf>, FileFilterError> {
    walk(&start_dir(root, pattern), &segments(pattern))
}

fn walk(dir: &Path, parts: &[String]) -> Result<BTreeMap<String, PathBuf>, FileFilterError> {
    let mut found = BTreeMap::new();

    let Some((head, rest)) = parts.split_first() else {
        if dir.is_file() {
            found.insert(String::new(), dir.to_path_buf());
        }
        return Ok(found);
    };

    if !head.contains(LANG_PLACEHOLDER) {
        return walk(&dir.join(head), rest);
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Ok(found);
        }
        Err(source) => {
            return Err(FileFilterError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    for name in names {
        let Some(code) = capture(head, &name) else {
            continue;
        };
        let substituted: Vec<String> = rest
            .iter()
            .map(|part| part.replace(LANG_PLACEHOLDER, code))
            .collect();
        if let Some(path) = walk(&dir.join(&name), &substituted)?.remove("") {
            found.insert(code.to_string(), path);
        }
    }

    Ok(found)
}

/// The language code that turns `segment` into `name`, shortest first.
fn capture<'a>(segment: &str, name: &'a str) -> Option<&'a str> {
    let prefix = segment.split(LANG_PLACEHOLDER).next().unwrap_or_default();
    let tail = name.strip_prefix(prefix)?;

    tail.char_indices()
        .skip(1)
        .map(|(end, _)| end)
        .chain(std::iter::once(tail.len()))
        .map(|end| &tail[..end])
        .filter(|code| !code.is_empty())
        .find(|code| segment.replace(LANG_PLACEHOLDER, code) == name)
}

/// Path of the file the pattern names for `lang`.
pub fn translation_path(root: &Path, pattern: &str, lang: &str) -> PathBuf {
    segments(pattern)
        .iter()
        .fold(start_dir(root, pattern), |path, part| {
            path.join(part.replace(LANG_PLACEHOLDER, lang))
        })
}
