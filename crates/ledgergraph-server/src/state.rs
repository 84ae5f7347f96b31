//! Shared handler state.

use std::sync::Arc;

use ledgergraph::{AppState, Config};
use ledgergraph_agent::{ChatAgent, SessionManager};
use ledgergraph_graph::AnalyticsEngine;
use ledgergraph_index::Indexer;
use ledgergraph_pipeline::PipelineCoordinator;

/// Everything the route handlers need, cloned per request.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub state: Arc<AppState>,
    pub coordinator: Arc<PipelineCoordinator>,
    pub agent: Arc<ChatAgent>,
    pub sessions: SessionManager,
    pub analytics: Arc<AnalyticsEngine>,
    pub indexer: Indexer,
}
