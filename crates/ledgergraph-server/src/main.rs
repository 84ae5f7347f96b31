//! LedgerGraph service binary.
//!
//! Loads configuration, restores the state snapshot, wires the pipeline
//! components (stores connected best-effort per their enable flags) and
//! serves the REST surface until signalled. Shutdown writes the snapshot
//! back.

use std::process::ExitCode;
use std::sync::Arc;

use ledgergraph::progress::ProgressTracker;
use ledgergraph::{AppState, Config};
use ledgergraph_agent::{ChatAgent, SessionManager};
use ledgergraph_bedrock::{ChatBedrock, CompletionModel};
use ledgergraph_extract::{AdeClient, ExtractionOrchestrator, OrchestratorOptions};
use ledgergraph_graph::{AnalyticsEngine, Normalizer, RiskDetector};
use ledgergraph_index::{
    GraphStore, Indexer, Neo4jGraphStore, VectorStore, WeaviateVectorStore,
};
use ledgergraph_pipeline::{Ingestor, PipelineCoordinator};
use ledgergraph_server::{build_router, AppContext};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> ledgergraph::Result<()> {
    config.ensure_directories()?;
    tracing::info!(
        name = %config.app_name,
        version = %config.app_version,
        "starting service"
    );

    // Restore persisted state.
    let state = Arc::new(AppState::new());
    state.load_snapshot(&config.state_dir())?;

    // Stores are optional collaborators: a disabled or unreachable store
    // degrades the pipeline, it does not stop startup.
    let vector: Option<Arc<dyn VectorStore>> = if config.enable_weaviate {
        match WeaviateVectorStore::new(&config.weaviate_url, config.weaviate_api_key.clone()) {
            Ok(store) => {
                if let Err(err) = store.ensure_schema().await {
                    tracing::warn!(error = %err, "vector store unreachable, continuing without it");
                    None
                } else {
                    tracing::info!(url = %config.weaviate_url, "vector store connected");
                    Some(Arc::new(store))
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "vector store misconfigured, continuing without it");
                None
            }
        }
    } else {
        tracing::info!("vector store disabled by configuration");
        None
    };

    let graph_store: Option<Arc<dyn GraphStore>> = if config.enable_neo4j {
        match Neo4jGraphStore::connect(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
        )
        .await
        {
            Ok(store) => {
                tracing::info!(uri = %config.neo4j_uri, "graph store connected");
                Some(Arc::new(store))
            }
            Err(err) => {
                tracing::warn!(error = %err, "graph store unreachable, continuing without it");
                None
            }
        }
    } else {
        tracing::info!("graph store disabled by configuration");
        None
    };

    let model: Arc<dyn CompletionModel> = Arc::new(
        ChatBedrock::new(config.aws_region.clone())
            .await
            .with_model(config.model_id.clone())
            .with_fallback_models(config.fallback_model_ids.clone()),
    );

    let progress = Arc::new(ProgressTracker::new());
    let ade_client = AdeClient::new(&config.ade_api_url, &config.ade_api_key)?;
    let orchestrator = ExtractionOrchestrator::new(
        ade_client,
        state.clone(),
        progress.clone(),
        OrchestratorOptions {
            sync_max_bytes: config.ade_sync_max_bytes,
            zip_concurrency: 20,
            poll_max_iterations: config.extract_poll_max_iterations,
            adaptive_schema: config.adaptive_schema,
            jobs_dir: config.jobs_dir(),
        },
    );

    let indexer = Indexer::new(vector, graph_store.clone());
    let analytics = Arc::new(AnalyticsEngine::new(graph_store));
    let coordinator = Arc::new(PipelineCoordinator::new(
        state.clone(),
        progress,
        Ingestor::new(config.upload_dir.clone(), config.max_upload_size),
        orchestrator,
        Normalizer::new(model.clone()),
        indexer.clone(),
        RiskDetector::new(model.clone()),
    ));
    let agent = Arc::new(ChatAgent::new(
        model,
        indexer.clone(),
        analytics.clone(),
        config.api_prefix.clone(),
    ));
    let sessions = SessionManager::new(state.clone());

    let config = Arc::new(config);
    let router = build_router(AppContext {
        config: config.clone(),
        state: state.clone(),
        coordinator,
        agent,
        sessions,
        analytics,
        indexer,
    });

    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, prefix = %config.api_prefix, "listening");

    let state_dir = config.state_dir();
    let shutdown_state = state.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "signal handler failed");
            }
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Durable snapshot on the way out.
    shutdown_state.save_snapshot(&state_dir)?;
    tracing::info!("state snapshot written, exiting");
    Ok(())
}
