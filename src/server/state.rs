use crate::config::AppConfig;
use crate::embedding::EmbeddingClient;
use crate::facets::FacetProvider;
use crate::search::HybridSearchEngine;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<HybridSearchEngine>,
    pub embedding_client: Arc<EmbeddingClient>,
    pub facet_provider: Option<Arc<dyn FacetProvider>>,
    pub start_time: Instant,
}
