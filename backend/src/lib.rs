//! Folder and file manager backend.
//!
//! The folder tree lives in memory inside [`store::TreeStore`] and is written
//! through to one JSON document on every change. Uploaded bytes live in a flat
//! public directory managed by [`blobs::BlobDir`].

pub mod blobs;
pub mod bridge;
pub mod config;
pub mod error;
pub mod humanize;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod names;
pub mod routes;
pub mod store;
pub mod tree;

use blobs::BlobDir;
use store::TreeStore;

pub struct AppState {
    pub store: TreeStore,
    pub blobs: BlobDir,
}
