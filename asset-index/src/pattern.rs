//! Classification of raw theme paths into asset paths.
//!
//! A raw path is eligible when it lives under `source/`, no segment of the
//! remaining path starts with `_`, it is not inside a `node_modules`
//! directory, and it does not end with an editor backup (`~`) or lock (`%`)
//! marker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Root prefix every asset path is stripped of.
pub const SOURCE_PREFIX: &str = "source/";

const DEPENDENCY_DIR: &str = "node_modules";

/// Canonical asset-relative path (raw path without the `source/` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetPath(String);

impl AssetPath {
    /// Validate an already-stripped asset path.
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if is_eligible(&path) {
            Ok(Self(path))
        } else {
            Err(IndexError::InvalidAssetPath(path))
        }
    }

    /// Borrow the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetPath {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<AssetPath> for String {
    fn from(path: AssetPath) -> Self {
        path.0
    }
}

/// Outcome of classifying a raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    /// The path is a tracked asset.
    Accepted(AssetPath),

    /// The path is outside the asset namespace.
    Rejected,
}

impl PathMatch {
    /// Check if the path was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Get the asset path, if accepted.
    pub fn asset_path(&self) -> Option<&AssetPath> {
        match self {
            Self::Accepted(path) => Some(path),
            Self::Rejected => None,
        }
    }

    /// Convert into the asset path, if accepted.
    pub fn into_asset_path(self) -> Option<AssetPath> {
        match self {
            Self::Accepted(path) => Some(path),
            Self::Rejected => None,
        }
    }
}

/// Classify a repository-relative raw path such as `source/style.css`.
pub fn match_path(raw_path: &str) -> PathMatch {
    match raw_path.strip_prefix(SOURCE_PREFIX) {
        Some(rest) if is_eligible(rest) => PathMatch::Accepted(AssetPath(rest.to_string())),
        _ => PathMatch::Rejected,
    }
}

fn is_eligible(path: &str) -> bool {
    if path.is_empty() || is_tmp_file(path) {
        return false;
    }

    !path
        .split('/')
        .any(|segment| segment.starts_with('_') || segment == DEPENDENCY_DIR)
}

fn is_tmp_file(path: &str) -> bool {
    path.ends_with('~') || path.ends_with('%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn accepted(path: &str) -> PathMatch {
        PathMatch::Accepted(AssetPath(path.to_string()))
    }

    #[test]
    fn test_accepts_source_files() {
        assert_eq!(match_path("source/foo.jpg"), accepted("foo.jpg"));
        assert_eq!(match_path("source/css/style.css"), accepted("css/style.css"));
        assert_eq!(match_path("source/a_b/c_d.js"), accepted("a_b/c_d.js"));
    }

    #[test]
    fn test_rejects_hidden_segments() {
        assert_eq!(match_path("source/_foo.jpg"), PathMatch::Rejected);
        assert_eq!(match_path("source/foo/_bar.jpg"), PathMatch::Rejected);
        assert_eq!(match_path("source/_partials/nav.css"), PathMatch::Rejected);
    }

    #[test]
    fn test_rejects_tmp_files() {
        assert_eq!(match_path("source/foo.jpg~"), PathMatch::Rejected);
        assert_eq!(match_path("source/foo.jpg%"), PathMatch::Rejected);
        assert_eq!(match_path("source/dir/foo.jpg%"), PathMatch::Rejected);
    }

    #[test]
    fn test_rejects_outside_source() {
        assert_eq!(match_path("layout/foo.swig"), PathMatch::Rejected);
        assert_eq!(match_path("layout/foo.njk"), PathMatch::Rejected);
        assert_eq!(match_path("package.json"), PathMatch::Rejected);
        assert_eq!(match_path("node_modules/test/test.js"), PathMatch::Rejected);
        assert_eq!(match_path("source"), PathMatch::Rejected);
        assert_eq!(match_path("Source/foo.jpg"), PathMatch::Rejected);
    }

    #[test]
    fn test_rejects_dependency_dirs() {
        assert_eq!(
            match_path("source/node_modules/test/test.js"),
            PathMatch::Rejected
        );
        assert_eq!(
            match_path("source/node_modules_backup.js"),
            accepted("node_modules_backup.js")
        );
    }

    #[test]
    fn test_rejects_empty_asset_path() {
        assert_eq!(match_path("source/"), PathMatch::Rejected);
    }

    #[test]
    fn test_asset_path_parse() {
        assert_eq!(AssetPath::parse("foo.jpg").unwrap().as_str(), "foo.jpg");
        assert!(AssetPath::parse("").is_err());
        assert!(AssetPath::parse("foo/_bar.jpg").is_err());
        assert!(AssetPath::parse("foo.jpg~").is_err());
    }

    #[test]
    fn test_asset_path_serde_validates() {
        let path: AssetPath = serde_json::from_str("\"img/logo.png\"").unwrap();
        assert_eq!(path.as_str(), "img/logo.png");
        assert!(serde_json::from_str::<AssetPath>("\"_hidden.png\"").is_err());
    }

    #[test]
    fn test_match_is_deterministic() {
        for raw in ["source/a.css", "source/_a.css", "layout/a.njk"] {
            assert_eq!(match_path(raw), match_path(raw));
        }
    }
}
