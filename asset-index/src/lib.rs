//! # Theme Asset Index
//!
//! This crate keeps the theme asset index consistent with the theme's
//! `source/` directory. The watcher (or a full rescan) reports classified
//! file changes; this crate decides whether a path is an asset and applies
//! the matching mutation to the index.
//!
//! ## Features
//!
//! - **Path Matching**: Classify raw theme paths into asset paths
//! - **Reconciliation**: Apply create/update/skip/delete to asset records
//! - **Pluggable Storage**: In-memory and JSON-file stores behind one trait
//! - **Batch Dispatch**: Concurrent, independent dispatch of many changes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Theme Asset Index                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  raw path ──► match_path ──► FileChangeEvent ──► Reconciler     │
//! │                   │                                  │          │
//! │                   ▼                                  ▼          │
//! │               Rejected                          AssetStore      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use theme_asset_index::{ChangeType, MemoryAssetStore, Reconciler};
//!
//! # async fn run() -> theme_asset_index::Result<()> {
//! let reconciler = Reconciler::new(
//!     "themes/landscape/source",
//!     Arc::new(MemoryAssetStore::new()),
//! )?;
//! reconciler
//!     .process(
//!         ChangeType::Create,
//!         "source/css/style.css",
//!         "/site/themes/landscape/source/css/style.css",
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod pattern;
pub mod reconciler;
pub mod store;

pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use event::{ChangeType, EventBatch, FileChangeEvent};
pub use pattern::{AssetPath, PathMatch, SOURCE_PREFIX, match_path};
pub use reconciler::{BatchReport, DispatchOutcome, Reconciler};
pub use store::{AssetRecord, AssetStore, JsonAssetStore, MemoryAssetStore, open_store};
