use std::sync::Arc;

use crate::actions::ActionSemanticCache;
use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::graph::UnifiedGraphEngine;
use crate::intelligence::{EntityExtractor, InterestAnalyzer, RelationshipDetector};
use crate::llm::LlmProvider;
use crate::services::{ContextBuilder, LibraryService, MemoryService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub embeddings: EmbeddingGateway,
    pub llm: LlmProvider,
    pub memory: Arc<MemoryService>,
    pub library: Arc<LibraryService>,
    pub graph: Arc<UnifiedGraphEngine>,
    pub detector: RelationshipDetector,
    pub actions: ActionSemanticCache,
    pub context: Arc<ContextBuilder>,
    pub interests: Arc<InterestAnalyzer>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DatabaseBackend>,
        embeddings: EmbeddingGateway,
        llm: LlmProvider,
    ) -> Self {
        let config = Arc::new(config);

        let extractor = EntityExtractor::new(llm.clone());
        let memory = MemoryService::new(
            db.clone(),
            embeddings.clone(),
            extractor,
            config.search.clone(),
        );
        let library = LibraryService::new(db.clone(), embeddings.clone());
        let graph = Arc::new(UnifiedGraphEngine::new(
            db.clone(),
            embeddings.clone(),
            config.graph.clone(),
            config.search.clone(),
        ));
        let detector = RelationshipDetector::new(db.clone(), embeddings.clone(), &config.detector);
        let actions = ActionSemanticCache::new(
            db.clone(),
            embeddings.clone(),
            llm.clone(),
            config.action_cache.clone(),
        );
        let context = ContextBuilder::new(
            graph.clone(),
            embeddings.clone(),
            config.search.default_threshold,
        );
        let interests = InterestAnalyzer::new(db.clone());

        Self {
            config,
            db,
            embeddings,
            llm,
            memory: Arc::new(memory),
            library: Arc::new(library),
            graph,
            detector,
            actions,
            context: Arc::new(context),
            interests: Arc::new(interests),
        }
    }
}
