//! Board Sync - optimistic data layer for the project board
//!
//! Keeps client-visible project, task, member and calendar lists consistent
//! with the remote table store while mutations are in flight.
//!
//! ## Call chain
//!
//! ```text
//! View intent ──► MutationCoordinator ──► CacheStore::patch   (speculative)
//!                        │
//!                        └──────────────► BoardGateway         (await)
//!                        │
//!                        ├─ ok  ──► swap in authoritative record, invalidate tags
//!                        └─ err ──► undo every patch, notify
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use board_client::{BoardGateway, HttpTableStore, StaticCredentials};
//! use board_sync::{Caches, ProjectsView, SyncConfig, TracingNotifier, ViewContext};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig::from_env()?;
//! let store = Arc::new(HttpTableStore::new(config.to_store_config())?);
//! let gateway = BoardGateway::new(store, Arc::new(StaticCredentials::new("jwt")));
//! let ctx = ViewContext::new(gateway, Caches::new(), Arc::new(TracingNotifier), config.display);
//!
//! let projects = ProjectsView::new(ctx, None);
//! projects.mount().await?;
//! projects.edit_form(|form| form.name = "Launch".into());
//! let _ = projects.submit_create().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod optimistic;
pub mod queries;
pub mod telemetry;
pub mod views;

pub use cache::{
    CacheEvent, CacheStore, Caches, Draft, Invalidate, QueryData, QueryKey, Tag, UndoToken,
};
pub use config::SyncConfig;
pub use error::{ConfigError, MutationError};
pub use notify::{Notification, Notifier, RecordingNotifier, Severity, TracingNotifier};
pub use optimistic::{MutationCoordinator, MutationSpec};
pub use queries::{ensure_loaded, load, spawn_refetcher, Fetcher};
pub use views::{CalendarView, Dialog, MembersView, ProjectsView, TasksView, ViewContext};
