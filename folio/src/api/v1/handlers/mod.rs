pub mod actions;
pub mod context;
pub mod graph;
pub(crate) mod health;
pub mod interests;
pub mod library;
pub mod memories;
pub mod relationships;

pub use health::health_check;
