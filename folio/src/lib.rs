//! Folio: semantic memory for a document-reading assistant.
//!
//! Conversations are distilled into typed memory entities, linked into a
//! per-owner knowledge graph alongside documents and notes, and served back
//! as search results, graph views and bounded prompt context. Natural
//! language reader commands are translated into structured actions through
//! a semantic cache.

pub mod actions;
pub mod api;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod intelligence;
pub mod llm;
pub mod models;
pub mod services;

pub use error::{FolioError, Result};
