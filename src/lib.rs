// Photo Gallery - Library Entry Point
//
// Indexes photo/video trees into a dated catalog and serves stable browsing views over it.

pub mod access;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod timestamp;
pub mod tools;
pub mod view;

pub use error::{GalleryError, Result};
pub use ingest::{Indexer, ReconcileReport};
pub use timestamp::{Provenance, Resolution, TimestampResolver};
pub use view::{Position, ViewCache, ViewKey};
