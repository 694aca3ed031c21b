//! HTTP route handlers for the flowchart assistant API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{error, warn};

use crate::agent::{AgentError, Message, ThreadId, ThreadSummary};
use crate::diagram::{DiagramError, FILES_ROUTE};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(state.uploads.root());
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/threads", post(create_thread).get(list_threads))
        .route("/api/threads/{id}", delete(delete_thread))
        .route(
            "/api/threads/{id}/messages",
            get(thread_history).post(submit_message),
        )
        .route("/api/threads/{id}/diagram", put(upload_diagram))
        .route("/api/threads/{id}/image", post(upload_image))
        .nest_service(FILES_ROUTE, files)
        .layer(body_limit)
        .with_state(state)
}

/// Error body returned by every failing endpoint.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let status = match &err {
            AgentError::EmptyMessage => StatusCode::BAD_REQUEST,
            AgentError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AgentError::UnknownThread(_) => StatusCode::NOT_FOUND,
            AgentError::IterationLimit { .. } | AgentError::ToolExecution(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<DiagramError> for ApiError {
    fn from(err: DiagramError) -> Self {
        let status = match &err {
            DiagramError::UnsupportedImageType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DiagramError::EmptyImage => StatusCode::BAD_REQUEST,
            DiagramError::Http(_)
            | DiagramError::Status { .. }
            | DiagramError::Encoding(_)
            | DiagramError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "flowchart-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Thread creation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateThreadResponse {
    /// Id of the new thread.
    pub thread_id: ThreadId,
}

async fn create_thread(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let thread_id = state.assistant.create_thread();
    (StatusCode::CREATED, Json(CreateThreadResponse { thread_id }))
}

async fn list_threads(State(state): State<Arc<AppState>>) -> Json<Vec<ThreadSummary>> {
    Json(state.assistant.threads().await)
}

async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let thread_id = ThreadId::from(thread_id);
    state.assistant.delete_thread(&thread_id)?;

    if let Err(e) = state.uploads.remove_thread(thread_id.as_str()).await {
        warn!(thread = %thread_id, "cannot remove thread files: {e}");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Thread history response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Thread id.
    pub thread_id: ThreadId,
    /// Current diagram source.
    pub diagram_source: Option<String>,
    /// Current image reference.
    pub image_reference: Option<String>,
    /// Full message history.
    pub messages: Vec<Message>,
}

async fn thread_history(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation = state.assistant.history(&ThreadId::from(thread_id)).await?;
    Ok(Json(HistoryResponse {
        messages: conversation.messages().to_vec(),
        thread_id: conversation.thread_id,
        diagram_source: conversation.diagram_source,
        image_reference: conversation.image_reference,
    }))
}

/// Chat turn request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The user's message.
    pub message: String,
    /// Replaces the thread's diagram source when present.
    #[serde(default)]
    pub diagram_source: Option<String>,
    /// Replaces the thread's image reference when present. Must name an
    /// image previously uploaded through the image endpoint.
    #[serde(default)]
    pub image_reference: Option<String>,
}

/// Chat turn response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Thread id.
    pub thread_id: ThreadId,
    /// The assistant's answer.
    pub reply: String,
}

async fn submit_message(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let thread_id = ThreadId::from(thread_id);
    let image_reference = match request.image_reference {
        Some(reference) if !reference.trim().is_empty() => {
            let resolved = state.uploads.resolve_image(&reference).await.ok_or_else(|| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    format!("image reference is not an uploaded image: {reference}"),
                )
            })?;
            Some(resolved.to_string_lossy().into_owned())
        }
        other => other,
    };

    let reply = state
        .assistant
        .submit(
            &thread_id,
            &request.message,
            request.diagram_source,
            image_reference,
        )
        .await
        .map_err(|e| {
            error!(thread = %thread_id, "turn failed: {e}");
            ApiError::from(e)
        })?;

    Ok(Json(SubmitResponse { thread_id, reply }))
}

/// Diagram source upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiagramRequest {
    /// PlantUML source text.
    pub source: String,
}

/// Diagram upload response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiagramResponse {
    /// Where the rendered PNG is served, if rendering succeeded.
    pub rendered_url: Option<String>,
}

async fn upload_diagram(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(request): Json<DiagramRequest>,
) -> Json<DiagramResponse> {
    let thread_id = ThreadId::from(thread_id);
    let rendered_url = if request.source.trim().is_empty() {
        None
    } else {
        render_for_display(&state, &thread_id, &request.source).await
    };

    state
        .assistant
        .set_diagram_source(&thread_id, Some(request.source))
        .await;

    Json(DiagramResponse { rendered_url })
}

/// Render and save the PNG shown next to the chat. Failures only lose the preview.
async fn render_for_display(state: &AppState, thread_id: &ThreadId, source: &str) -> Option<String> {
    let png = match state.renderer.render_png(source).await {
        Ok(png) => png,
        Err(e) => {
            warn!(thread = %thread_id, "diagram rendering failed: {e}");
            return None;
        }
    };

    match state.uploads.save_rendered(thread_id.as_str(), &png).await {
        Ok(saved) => Some(saved.public_url()),
        Err(e) => {
            warn!(thread = %thread_id, "cannot save rendered diagram: {e}");
            None
        }
    }
}

/// Image upload query string.
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    /// Original file name; its extension selects the image type.
    pub name: String,
}

/// Image upload response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    /// New image reference of the thread.
    pub image_reference: String,
    /// Where the image is served.
    pub url: String,
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> Result<Json<ImageResponse>, ApiError> {
    let thread_id = ThreadId::from(thread_id);
    let saved = state
        .uploads
        .save_image(thread_id.as_str(), &query.name, &body)
        .await?;
    let image_reference = saved.reference();

    state
        .assistant
        .set_image_reference(&thread_id, Some(image_reference.clone()))
        .await;

    Ok(Json(ImageResponse {
        image_reference,
        url: saved.public_url(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FlowchartAssistant;
    use crate::config::AgentConfig;
    use crate::diagram::{DiagramRenderer, UploadStore};
    use crate::llm::errors::ProviderError;
    use crate::llm::types::ModelReply;
    use crate::testing::{RecordingCompleter, ScriptedChat, StubRenderer, StubVision};
    use crate::tools::flowchart_tools;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        out_dir: TempDir,
    }

    fn app(chat: ScriptedChat, renderer: StubRenderer) -> TestApp {
        let out_dir = tempfile::tempdir().expect("temp dir");
        let uploads = UploadStore::new(out_dir.path());
        let tools = flowchart_tools(
            Arc::new(RecordingCompleter::replying("explained")),
            Arc::new(StubVision::replying("described")),
            uploads.clone(),
        )
        .expect("tools");
        let assistant = FlowchartAssistant::new(
            Arc::new(chat),
            Arc::new(tools),
            &AgentConfig::default(),
        );
        let renderer: Arc<dyn DiagramRenderer> = Arc::new(renderer);
        let state = AppState::new(assistant, renderer, uploads, 1024);
        TestApp {
            router: create_router(state),
            out_dir,
        }
    }

    fn image_request(thread: &str, name: &str, bytes: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/threads/{thread}/image?name={name}"))
            .body(Body::from(bytes))
            .expect("request")
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::failing());
        let (status, body) = send(&app.router, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_thread_and_chat() {
        let app = app(
            ScriptedChat::replies(vec![ModelReply::text("It is a flowchart.")]),
            StubRenderer::failing(),
        );

        let (status, created) = send(&app.router, empty_request("POST", "/api/threads")).await;
        assert_eq!(status, StatusCode::CREATED);
        let thread_id = created["thread_id"].as_str().expect("thread id").to_string();

        let uri = format!("/api/threads/{thread_id}/messages");
        let (status, body) = send(
            &app.router,
            json_request("POST", &uri, &json!({ "message": "What is this?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "It is a flowchart.");

        let (status, history) = send(&app.router, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["messages"].as_array().map(Vec::len), Some(2));
        assert_eq!(history["messages"][0]["role"], "user");
        assert_eq!(history["messages"][1]["role"], "assistant");

        let (status, threads) = send(&app.router, empty_request("GET", "/api/threads")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(threads[0]["message_count"], 2);
    }

    #[tokio::test]
    async fn test_turn_errors_map_to_status() {
        let app = app(
            ScriptedChat::new(vec![Err(ProviderError::Timeout)]),
            StubRenderer::failing(),
        );

        let (status, body) = send(
            &app.router,
            json_request("POST", "/api/threads/t1/messages", &json!({ "message": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &app.router,
            json_request("POST", "/api/threads/t1/messages", &json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_thread() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::failing());
        let (status, _) = send(&app.router, empty_request("GET", "/api/threads/nope/messages")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app.router, empty_request("DELETE", "/api/threads/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_diagram_upload_renders_preview() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::replying(b"png"));

        let (status, body) = send(
            &app.router,
            json_request("PUT", "/api/threads/t1/diagram", &json!({ "source": "A->B" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rendered_url"], "/files/t1/diagram.png");

        let (status, _) = send(&app.router, empty_request("GET", "/files/t1/diagram.png")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, history) = send(&app.router, empty_request("GET", "/api/threads/t1/messages")).await;
        assert_eq!(history["diagram_source"], "A->B");
    }

    #[tokio::test]
    async fn test_diagram_upload_survives_render_failure() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::failing());

        let (status, body) = send(
            &app.router,
            json_request("PUT", "/api/threads/t1/diagram", &json!({ "source": "A->B" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["rendered_url"].is_null());

        let (_, history) = send(&app.router, empty_request("GET", "/api/threads/t1/messages")).await;
        assert_eq!(history["diagram_source"], "A->B");
    }

    #[tokio::test]
    async fn test_image_upload() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::failing());

        let (status, body) = send(&app.router, image_request("t1", "flow.png", b"png-bytes")).await;
        assert_eq!(status, StatusCode::OK);
        let reference = body["image_reference"].as_str().expect("reference").to_string();
        assert!(reference.ends_with("-flow.png"));

        let (_, history) = send(&app.router, empty_request("GET", "/api/threads/t1/messages")).await;
        assert_eq!(history["image_reference"], reference.as_str());

        let (status, _) = send(&app.router, image_request("t1", "anim.gif", b"gif")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::failing());

        let request = Request::builder()
            .method("POST")
            .uri("/api/threads/t1/image?name=big.png")
            .body(Body::from(vec![0_u8; 4096]))
            .expect("request");
        let (status, _) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let app = app(ScriptedChat::replies(Vec::new()), StubRenderer::replying(b"png"));

        let (_, created) = send(&app.router, empty_request("POST", "/api/threads")).await;
        let thread_id = created["thread_id"].as_str().expect("thread id").to_string();
        let (_, image) = send(&app.router, image_request(&thread_id, "flow.png", b"png")).await;
        let (_, diagram) = send(
            &app.router,
            json_request(
                "PUT",
                &format!("/api/threads/{thread_id}/diagram"),
                &json!({ "source": "A->B" }),
            ),
        )
        .await;
        let image_url = image["url"].as_str().expect("image url").to_string();
        let rendered_url = diagram["rendered_url"].as_str().expect("rendered url").to_string();
        let image_path = image["image_reference"].as_str().expect("reference").to_string();
        assert!(std::path::Path::new(&image_path).exists());

        let uri = format!("/api/threads/{thread_id}");
        let (status, _) = send(&app.router, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!std::path::Path::new(&image_path).exists());
        assert!(!app.out_dir.path().join(&thread_id).exists());
        for url in [image_url, rendered_url] {
            let (status, _) = send(&app.router, empty_request("GET", &url)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let (status, _) = send(&app.router, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_rejects_foreign_image_reference() {
        let app = app(
            ScriptedChat::replies(vec![ModelReply::text("unused")]),
            StubRenderer::failing(),
        );
        let secret = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .expect("outside file");
        std::fs::write(secret.path(), b"secret").expect("write");

        for reference in [secret.path().to_string_lossy().into_owned(), "/etc/passwd".to_string()] {
            let (status, body) = send(
                &app.router,
                json_request(
                    "POST",
                    "/api/threads/t1/messages",
                    &json!({ "message": "Describe it", "image_reference": reference }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string());
        }

        let (status, _) = send(&app.router, empty_request("GET", "/api/threads/t1/messages")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_accepts_uploaded_image_reference() {
        let app = app(
            ScriptedChat::replies(vec![ModelReply::text("Two boxes.")]),
            StubRenderer::failing(),
        );
        let (_, image) = send(&app.router, image_request("t1", "flow.png", b"png")).await;
        let reference = image["image_reference"].as_str().expect("reference").to_string();

        let (status, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/threads/t2/messages",
                &json!({ "message": "And this?", "image_reference": reference }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "Two boxes.");
    }
}
