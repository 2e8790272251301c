//! Reconciliation of the asset index with classified file changes.
//!
//! | change | store effect                       | `modified` |
//! |--------|------------------------------------|------------|
//! | create | upsert `{id, path}`                | true       |
//! | update | set flag on record, upsert if none | true       |
//! | skip   | nothing                            | unchanged  |
//! | delete | remove if present                  | n/a        |

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::event::{ChangeType, FileChangeEvent};
use crate::pattern::AssetPath;
use crate::store::{AssetRecord, AssetStore};

/// What a dispatch did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A record was written with `modified = true` for a create.
    Created,

    /// A record was marked modified (or written) for an update.
    Updated,

    /// The index was left untouched.
    Skipped,

    /// The record was removed.
    Deleted,

    /// A delete found no record; nothing to do.
    AlreadyAbsent,
}

/// Applies file changes to an [`AssetStore`].
pub struct Reconciler {
    /// Prefix of every record id.
    namespace: String,

    /// Backing store.
    store: Arc<dyn AssetStore>,

    /// Batch concurrency limit.
    max_concurrent_dispatches: usize,
}

impl Reconciler {
    /// Create a reconciler with the default batch concurrency.
    ///
    /// Fails when the namespace is empty or ends with `/`.
    pub fn new(namespace: impl Into<String>, store: Arc<dyn AssetStore>) -> Result<Self> {
        Self::from_config(&IndexConfig::new(namespace), store)
    }

    /// Create a reconciler from a validated configuration.
    pub fn from_config(config: &IndexConfig, store: Arc<dyn AssetStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            namespace: config.namespace.clone(),
            store,
            max_concurrent_dispatches: config.max_concurrent_dispatches,
        })
    }

    /// The id namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    /// Record id for an asset path.
    pub fn asset_id(&self, path: &AssetPath) -> String {
        format!("{}/{path}", self.namespace)
    }

    /// Apply one event to the index.
    ///
    /// Store errors are returned unchanged.
    pub async fn dispatch(&self, event: &FileChangeEvent) -> Result<DispatchOutcome> {
        let id = self.asset_id(&event.asset_path);
        debug!("Dispatching {} for {id}", event.kind);

        match event.kind {
            ChangeType::Create => {
                self.store
                    .insert(AssetRecord::new(id, event.asset_path.clone(), true))
                    .await?;
                Ok(DispatchOutcome::Created)
            }
            ChangeType::Update => {
                if !self.store.update_modified(&id, true).await? {
                    debug!("No record for updated asset {id}, inserting");
                    self.store
                        .insert(AssetRecord::new(id, event.asset_path.clone(), true))
                        .await?;
                }
                Ok(DispatchOutcome::Updated)
            }
            ChangeType::Skip => Ok(DispatchOutcome::Skipped),
            ChangeType::Delete => {
                if self.store.remove(&id).await? {
                    Ok(DispatchOutcome::Deleted)
                } else {
                    Ok(DispatchOutcome::AlreadyAbsent)
                }
            }
        }
    }

    /// Classify a raw path and dispatch it.
    ///
    /// Returns `None` without touching the store when the path is not an
    /// asset.
    pub async fn process(
        &self,
        kind: ChangeType,
        raw_path: &str,
        source_file_path: impl AsRef<Path>,
    ) -> Result<Option<DispatchOutcome>> {
        let Some(event) =
            FileChangeEvent::classify(kind, raw_path, source_file_path.as_ref().to_path_buf())
        else {
            debug!("Ignoring non-asset path: {raw_path}");
            return Ok(None);
        };

        self.dispatch(&event).await.map(Some)
    }

    /// Dispatch events concurrently.
    ///
    /// Every event is dispatched even if others fail; failures are collected
    /// in the report.
    pub async fn dispatch_batch(
        &self,
        events: impl IntoIterator<Item = FileChangeEvent>,
    ) -> BatchReport {
        let results: Vec<(AssetPath, Result<DispatchOutcome>)> = stream::iter(events)
            .map(|event| async move {
                let result = self.dispatch(&event).await;
                (event.asset_path, result)
            })
            .buffer_unordered(self.max_concurrent_dispatches)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!("Failed to reconcile {path}: {e}");
                    report.failures.push((path, e));
                }
            }
        }

        if let Err(e) = self.store.flush().await {
            warn!("Failed to flush asset store: {e}");
            report.flush_error = Some(e);
        }

        info!(
            "Reconciled {} assets (created: {}, updated: {}, skipped: {}, deleted: {}, failed: {})",
            report.total(),
            report.created,
            report.updated,
            report.skipped,
            report.deleted + report.already_absent,
            report.failures.len()
        );

        report
    }

    /// Records in this namespace that still need downstream processing.
    pub async fn modified_assets(&self) -> Result<Vec<AssetRecord>> {
        let prefix = format!("{}/", self.namespace);
        let mut records: Vec<AssetRecord> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|record| record.modified && record.id.starts_with(&prefix))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Clear the `modified` flag once downstream output has been derived.
    ///
    /// Returns `false` when the asset is not indexed.
    pub async fn mark_processed(&self, path: &AssetPath) -> Result<bool> {
        self.store.update_modified(&self.asset_id(path), false).await
    }
}

/// Summary of a batch dispatch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Create events applied.
    pub created: usize,

    /// Update events applied.
    pub updated: usize,

    /// Skip events.
    pub skipped: usize,

    /// Delete events that removed a record.
    pub deleted: usize,

    /// Delete events that found nothing.
    pub already_absent: usize,

    /// Events whose dispatch failed.
    pub failures: Vec<(AssetPath, IndexError)>,

    /// Error writing buffered store mutations after the batch.
    pub flush_error: Option<IndexError>,
}

impl BatchReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Created => self.created += 1,
            DispatchOutcome::Updated => self.updated += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
            DispatchOutcome::Deleted => self.deleted += 1,
            DispatchOutcome::AlreadyAbsent => self.already_absent += 1,
        }
    }

    /// Number of events in the batch.
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.skipped
            + self.deleted
            + self.already_absent
            + self.failures.len()
    }

    /// Check if every event succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.flush_error.is_none()
    }
}
