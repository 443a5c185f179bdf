//! # curio-sync
//!
//! Incremental sync pipeline for the curio content archive.
//!
//! This crate provides:
//! - Assemble dispatch (fetch + tidy) producing save-ready drafts
//! - The content upsert pipeline (`create_items`, `bulk_create_items`,
//!   `update_items`)
//! - The incremental sync controller reconciling the blog source's
//!   edit-date index against the store
//!
//! ## Example
//!
//! ```ignore
//! use curio_db::Database;
//! use curio_fetch::SourceRegistry;
//! use curio_sync::SyncController;
//!
//! let db = Database::connect("postgres://localhost/curio").await?;
//! let sources = SourceRegistry::from_env();
//! let controller = SyncController::new(db, sources, 20);
//!
//! let created = controller.download_new_items().await?;
//! println!("downloaded {} new posts", created.len());
//! ```

pub mod assemble;
pub mod controller;
pub mod pipeline;

// Re-export core types
pub use curio_core::*;

pub use assemble::assemble_items;
pub use controller::SyncController;
pub use pipeline::{bulk_create_items, create_items, update_items};
