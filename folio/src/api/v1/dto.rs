//! Request and response bodies specific to the v1 HTTP surface. Domain types
//! that already serialize the way clients expect are returned directly.

use serde::{Deserialize, Serialize};

use crate::models::{ContextLimits, ConversationTurn, DocumentContext, SearchFilters};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractMemoriesRequest {
    pub conversation_id: Option<String>,
    pub turns: Vec<ConversationTurn>,
    pub document: Option<DocumentContext>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMemoriesRequest {
    pub query: String,
    #[serde(flatten)]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateActionRequest {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildContextRequest {
    pub query: String,
    /// Falls back to the server's configured limits when absent.
    pub limits: Option<ContextLimits>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphSearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedParams {
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterParams {
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGraphParams {
    pub max_depth: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineParams {
    pub concept: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheParams {
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildInterestsParams {
    pub window_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    #[test]
    fn search_request_flattens_filters() {
        let req: SearchMemoriesRequest = serde_json::from_value(serde_json::json!({
            "query": "lenses",
            "entityTypes": ["concept"],
            "threshold": 0.6
        }))
        .unwrap();
        assert_eq!(req.query, "lenses");
        assert_eq!(req.filters.entity_types, vec![EntityType::Concept]);
        assert_eq!(req.filters.threshold, Some(0.6));
        assert!(req.filters.limit.is_none());
    }

    #[test]
    fn extract_request_accepts_minimal_body() {
        let req: ExtractMemoriesRequest = serde_json::from_value(serde_json::json!({
            "turns": [{"role": "user", "content": "What is refraction?"}]
        }))
        .unwrap();
        assert!(req.conversation_id.is_none());
        assert_eq!(req.turns.len(), 1);
    }
}
