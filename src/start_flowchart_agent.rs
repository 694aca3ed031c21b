//! Startup helpers for the flowchart agent server.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::agent::FlowchartAssistant;
use crate::config::{AppConfig, ExplainerBackend};
use crate::diagram::{DiagramRenderer, PlantUmlRenderer, UploadStore};
use crate::llm::{OllamaCompleter, OpenAiCompatClient, TextCompleter, VisionModel};
use crate::server::{self, AppState};
use crate::tools::flowchart_tools;

/// Run the server until Ctrl+C (used by the `flowchart-agent` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting flowchart agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config, shutdown_signal())) {
        error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Install the global `tracing` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build the state and serve until `shutdown` completes.
///
/// # Errors
/// Returns an error if a collaborator cannot be built or the server fails.
pub async fn serve<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = initialize(&config)?;
    info!(
        chat_model = %config.chat.model,
        vision_model = %config.vision.model,
        explainer = %config.explainer.backend,
        out_dir = %config.server.out_dir.display(),
        "collaborators ready"
    );

    server::run_server_with_shutdown(state, config.server.port, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if a provider client or the renderer cannot be built.
pub fn initialize(config: &AppConfig) -> anyhow::Result<Arc<AppState>> {
    let uploads = UploadStore::new(config.server.out_dir.clone());
    let assistant = build_assistant(config, uploads.clone())?;
    let renderer: Arc<dyn DiagramRenderer> =
        Arc::new(PlantUmlRenderer::new(&config.plantuml).context("PlantUML renderer")?);

    Ok(AppState::new(
        assistant,
        renderer,
        uploads,
        config.server.max_upload_bytes,
    ))
}

/// Wire the configured providers into a ready [`FlowchartAssistant`].
///
/// The vision tool only reads images stored in `uploads`.
///
/// # Errors
/// Returns an error if a provider client cannot be built or a tool is missing.
pub fn build_assistant(config: &AppConfig, uploads: UploadStore) -> anyhow::Result<FlowchartAssistant> {
    let chat = Arc::new(OpenAiCompatClient::new(&config.chat).context("chat model")?);
    let vision: Arc<dyn VisionModel> =
        Arc::new(OpenAiCompatClient::new(&config.vision).context("vision model")?);

    let explainer: Arc<dyn TextCompleter> = match config.explainer.backend {
        ExplainerBackend::Chat => chat.clone(),
        ExplainerBackend::Ollama => {
            Arc::new(OllamaCompleter::new(&config.explainer).context("Ollama explainer")?)
        }
    };

    let tools = flowchart_tools(explainer, vision, uploads).context("tool registry")?;
    Ok(FlowchartAssistant::new(chat, Arc::new(tools), &config.agent))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
