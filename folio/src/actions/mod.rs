mod cache;

pub use cache::{normalize_query, query_hash, ActionSemanticCache};
