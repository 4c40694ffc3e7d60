mod action;
mod common;
mod context;
mod conversation;
mod document;
mod entity;
mod graph;
mod note;
mod profile;

pub use action::*;
pub use common::{EntityMetadata, MetadataValue};
pub use context::*;
pub use conversation::*;
pub use document::*;
pub use entity::*;
pub use graph::*;
pub use note::*;
pub use profile::*;
