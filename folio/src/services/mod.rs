mod context;
pub mod interest_refresh;
mod library;
mod memory;

pub use context::ContextBuilder;
pub use interest_refresh::InterestRefreshManager;
pub use library::LibraryService;
pub use memory::MemoryService;
