mod api;
mod gateway;


pub use api::{ApiConfig, EmbeddingApiClient};
pub use gateway::EmbeddingGateway;
