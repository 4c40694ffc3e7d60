pub mod algorithms;
mod engine;
mod unified;

pub use engine::MemoryGraphEngine;
pub use unified::UnifiedGraphEngine;
