//! Classified file change events.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::pattern::{AssetPath, match_path};

/// How the watcher classified a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ChangeType {
    /// File newly appeared or is indexed for the first time.
    Create,

    /// File content changed since it was last indexed.
    Update,

    /// File present and unchanged.
    Skip,

    /// File removed from disk.
    Delete,
}

impl ChangeType {
    /// Get the wire name of the change type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "skip" => Ok(Self::Skip),
            "delete" => Ok(Self::Delete),
            other => Err(IndexError::InvalidChangeType(other.to_string())),
        }
    }
}

impl TryFrom<String> for ChangeType {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangeType> for &'static str {
    fn from(kind: ChangeType) -> Self {
        kind.as_str()
    }
}

/// A change to a single theme file, already accepted by the path matcher.
///
/// Decoding checks that `assetPath` is exactly what the matcher yields for
/// `rawPath`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawFileChangeEvent")]
pub struct FileChangeEvent {
    /// The kind of change.
    #[serde(rename = "type")]
    pub kind: ChangeType,

    /// Theme-relative path as seen by the watcher, e.g. `source/style.css`.
    pub raw_path: String,

    /// Absolute location of the file on disk.
    pub source_file_path: PathBuf,

    /// Canonical asset path computed from `raw_path`.
    pub asset_path: AssetPath,
}

/// Wire form of [`FileChangeEvent`] before the asset path is checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileChangeEvent {
    #[serde(rename = "type")]
    kind: ChangeType,
    raw_path: String,
    source_file_path: PathBuf,
    asset_path: String,
}

impl TryFrom<RawFileChangeEvent> for FileChangeEvent {
    type Error = IndexError;

    fn try_from(raw: RawFileChangeEvent) -> Result<Self, Self::Error> {
        match match_path(&raw.raw_path).into_asset_path() {
            Some(asset_path) if asset_path.as_str() == raw.asset_path => Ok(Self {
                kind: raw.kind,
                raw_path: raw.raw_path,
                source_file_path: raw.source_file_path,
                asset_path,
            }),
            _ => Err(IndexError::InvalidAssetPath(raw.asset_path)),
        }
    }
}

impl FileChangeEvent {
    /// Classify a raw path and build an event for it.
    ///
    /// Returns `None` when the path is not an asset; such events are never
    /// dispatched.
    pub fn classify(
        kind: ChangeType,
        raw_path: impl Into<String>,
        source_file_path: impl Into<PathBuf>,
    ) -> Option<Self> {
        let raw_path = raw_path.into();
        let asset_path = match_path(&raw_path).into_asset_path()?;

        Some(Self {
            kind,
            raw_path,
            source_file_path: source_file_path.into(),
            asset_path,
        })
    }
}

/// A batch of change events collected by the caller.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Events in this batch.
    pub events: Vec<FileChangeEvent>,
}

impl EventBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn push(&mut self, event: FileChangeEvent) {
        self.events.push(event);
    }

    /// Classify a raw path and add it if it is an asset.
    ///
    /// Returns whether the event was added.
    pub fn push_raw(
        &mut self,
        kind: ChangeType,
        raw_path: impl Into<String>,
        source_file_path: impl Into<PathBuf>,
    ) -> bool {
        match FileChangeEvent::classify(kind, raw_path, source_file_path) {
            Some(event) => {
                self.events.push(event);
                true
            }
            None => false,
        }
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Deduplicate events, keeping the latest one for each asset path.
    ///
    /// Surviving events keep the order of their last occurrence.
    pub fn deduplicate(&mut self) {
        let mut latest: HashMap<AssetPath, usize> = HashMap::new();
        for (idx, event) in self.events.iter().enumerate() {
            latest.insert(event.asset_path.clone(), idx);
        }

        let mut idx = 0;
        self.events.retain(|event| {
            let keep = latest.get(&event.asset_path) == Some(&idx);
            idx += 1;
            keep
        });
    }

    /// Consume the batch and return its events.
    pub fn into_events(self) -> Vec<FileChangeEvent> {
        self.events
    }
}

impl IntoIterator for EventBatch {
    type Item = FileChangeEvent;
    type IntoIter = std::vec::IntoIter<FileChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
