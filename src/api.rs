//! # API Server Module
//!
//! ## Purpose
//! REST API server exposing the annotation session operations: document
//! loading, word selection, definition generation, footnote commit/removal,
//! renumbering, and export.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with document text, selections, word ids
//! - **Output**: JSON responses carrying the updated session snapshot
//! - **Endpoints**: Document, words, definitions, footnotes, export, health
//!
//! ## Key Features
//! - Single-session server: one annotation session behind a write lock, so
//!   every structural mutation applies atomically against the latest state
//! - Definition generation releases the lock while provider calls run
//! - CORS support for the browser frontend
//! - Structured error responses with category and recoverability

use crate::errors::AnnotateError;
use crate::provider::DefinitionRequest;
use crate::session::SessionSnapshot;
use crate::utils::Timer;
use crate::{AppState, WordDefinitionResult, WordId};
use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Result as ActixResult};
use serde::{Deserialize, Serialize};

/// The annotator API server
pub struct ApiServer {
    app_state: AppState,
}

/// Request payload for loading a pasted document
#[derive(Debug, Deserialize)]
pub struct LoadDocumentRequest {
    pub text: String,
}

/// Query parameters for the upload endpoint
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
}

/// Request payload for selecting a word
#[derive(Debug, Deserialize)]
pub struct SelectWordRequest {
    pub selection: String,
}

/// Response for a word selection attempt
#[derive(Debug, Serialize)]
pub struct SelectWordResponse {
    pub selected: bool,
    pub word_id: Option<WordId>,
    pub session: SessionSnapshot,
}

/// Response for structural mutations
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub changed: bool,
    pub session: SessionSnapshot,
}

/// Response for a single-word generation
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub result: Option<WordDefinitionResult>,
    pub elapsed_ms: u64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub document_loaded: bool,
    pub selections: usize,
    pub footnotes: usize,
}

impl ApiServer {
    /// Create a new API server
    pub async fn new(app_state: AppState) -> crate::Result<Self> {
        Ok(Self { app_state })
    }

    /// Run the API server
    pub async fn run(self) -> crate::Result<()> {
        let config = self.app_state.config.clone();
        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        let payload_limit = config.server.max_upload_size_mb * 1024 * 1024;
        let workers = config.server.workers;
        let enable_cors = config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        let server = HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };

            App::new()
                .app_data(web::Data::new(self.app_state.clone()))
                .app_data(web::PayloadConfig::new(payload_limit))
                .wrap(cors)
                .route("/document", web::post().to(load_document_handler))
                .route("/document/upload", web::post().to(upload_document_handler))
                .route("/document", web::get().to(document_handler))
                .route("/words", web::post().to(select_word_handler))
                .route("/words", web::delete().to(clear_words_handler))
                .route("/words/{word_id}", web::delete().to(deselect_word_handler))
                .route(
                    "/words/{word_id}/definition",
                    web::post().to(generate_one_handler),
                )
                .route("/definitions", web::post().to(generate_all_handler))
                .route(
                    "/words/{word_id}/lines/{index}",
                    web::post().to(toggle_line_handler),
                )
                .route(
                    "/words/{word_id}/footnote",
                    web::put().to(commit_footnote_handler),
                )
                .route(
                    "/words/{word_id}/footnote",
                    web::delete().to(remove_footnote_handler),
                )
                .route("/footnotes/renumber", web::post().to(renumber_handler))
                .route("/export", web::get().to(export_handler))
                .route("/health", web::get().to(health_handler))
                .route("/", web::get().to(index_handler))
        })
        .workers(workers)
        .bind(&bind_addr)
        .map_err(|e| AnnotateError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| AnnotateError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

/// Map an error to its HTTP response
fn error_response(error: &AnnotateError) -> HttpResponse {
    let body = serde_json::json!({
        "error": error.category(),
        "message": error.to_string(),
        "recoverable": error.is_recoverable(),
    });

    match error {
        AnnotateError::Validation { .. } => HttpResponse::BadRequest().json(body),
        AnnotateError::WordNotFound { .. } => HttpResponse::NotFound().json(body),
        AnnotateError::Extraction { .. } => HttpResponse::UnprocessableEntity().json(body),
        AnnotateError::Provider { .. } | AnnotateError::Network { .. } => {
            HttpResponse::BadGateway().json(body)
        }
        AnnotateError::Config { .. } | AnnotateError::Internal { .. } => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Load a pasted document
async fn load_document_handler(
    app_state: web::Data<AppState>,
    request: web::Json<LoadDocumentRequest>,
) -> ActixResult<HttpResponse> {
    let text = request.text.trim();
    if text.is_empty() {
        return Ok(error_response(&AnnotateError::validation(
            "text",
            "document text is empty",
        )));
    }

    let mut session = app_state.session.write().await;
    session.load_document(text.to_string());
    Ok(HttpResponse::Ok().json(session.snapshot()))
}

/// Load an uploaded document through the text extractor
async fn upload_document_handler(
    app_state: web::Data<AppState>,
    http_request: HttpRequest,
    params: web::Query<UploadParams>,
    content: web::Bytes,
) -> ActixResult<HttpResponse> {
    let media_type = http_request
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let extracted =
        app_state
            .extractor
            .extract(&content, &media_type, params.filename.as_deref());

    match extracted {
        Ok(text) => {
            let mut session = app_state.session.write().await;
            session.load_document(text);
            Ok(HttpResponse::Ok().json(session.snapshot()))
        }
        Err(error) => {
            tracing::warn!(%error, media_type, "document upload rejected");
            Ok(error_response(&error))
        }
    }
}

/// Current session state
async fn document_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let session = app_state.session.read().await;
    Ok(HttpResponse::Ok().json(session.snapshot()))
}

/// Select a word for annotation
async fn select_word_handler(
    app_state: web::Data<AppState>,
    request: web::Json<SelectWordRequest>,
) -> ActixResult<HttpResponse> {
    let mut session = app_state.session.write().await;
    match session.select_word(&request.selection) {
        Ok(word_id) => Ok(HttpResponse::Ok().json(SelectWordResponse {
            selected: word_id.is_some(),
            word_id,
            session: session.snapshot(),
        })),
        Err(error) => Ok(error_response(&error)),
    }
}

/// Deselect one word
async fn deselect_word_handler(
    app_state: web::Data<AppState>,
    path: web::Path<WordId>,
) -> ActixResult<HttpResponse> {
    let word_id = path.into_inner();
    let mut session = app_state.session.write().await;
    let changed = session.deselect_word(word_id);
    Ok(HttpResponse::Ok().json(MutationResponse {
        changed,
        session: session.snapshot(),
    }))
}

/// Clear all selections
async fn clear_words_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let mut session = app_state.session.write().await;
    session.clear_all();
    Ok(HttpResponse::Ok().json(MutationResponse {
        changed: true,
        session: session.snapshot(),
    }))
}

/// Generate the definition for one word
async fn generate_one_handler(
    app_state: web::Data<AppState>,
    path: web::Path<WordId>,
) -> ActixResult<HttpResponse> {
    let word_id = path.into_inner();
    let timer = Timer::start();

    // Snapshot the request under the lock, then release it for the provider
    // call so other session operations are not blocked.
    let request = {
        let mut session = app_state.session.write().await;
        match session.begin_generation(word_id) {
            Ok(request) => request,
            Err(error) => return Ok(error_response(&error)),
        }
    };

    let outcome = app_state
        .provider
        .define(DefinitionRequest {
            context_text: request.context,
            word: request.word,
        })
        .await;

    let mut session = app_state.session.write().await;
    session.apply_generation(word_id, outcome);
    let result = session
        .results()
        .iter()
        .find(|r| r.word_id == word_id)
        .cloned();

    Ok(HttpResponse::Ok().json(GenerationResponse {
        result,
        elapsed_ms: timer.elapsed_ms(),
    }))
}

/// Generate definitions for all selected words concurrently
async fn generate_all_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let timer = Timer::start();

    let requests = {
        let mut session = app_state.session.write().await;
        session.begin_generation_all()
    };

    let calls = requests.into_iter().map(|request| {
        let provider = app_state.provider.clone();
        async move {
            let outcome = provider
                .define(DefinitionRequest {
                    context_text: request.context,
                    word: request.word,
                })
                .await;
            (request.word_id, outcome)
        }
    });
    let outcomes = futures::future::join_all(calls).await;

    let mut session = app_state.session.write().await;
    for (word_id, outcome) in outcomes {
        session.apply_generation(word_id, outcome);
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session": session.snapshot(),
        "elapsed_ms": timer.elapsed_ms(),
    })))
}

/// Toggle one definition line for a word
async fn toggle_line_handler(
    app_state: web::Data<AppState>,
    path: web::Path<(WordId, usize)>,
) -> ActixResult<HttpResponse> {
    let (word_id, index) = path.into_inner();
    let mut session = app_state.session.write().await;

    // The session treats an out-of-range index as a programming error, so the
    // API boundary validates it first.
    let out_of_range = session
        .results()
        .iter()
        .find(|r| r.word_id == word_id)
        .and_then(|r| r.definition.as_ref())
        .map(|d| index > d.definition_lines.len())
        .unwrap_or(false);
    if out_of_range {
        return Ok(error_response(&AnnotateError::validation(
            "index",
            "line index out of range",
        )));
    }

    match session.toggle_line(word_id, index) {
        Ok(()) => Ok(HttpResponse::Ok().json(MutationResponse {
            changed: true,
            session: session.snapshot(),
        })),
        Err(error) => Ok(error_response(&error)),
    }
}

/// Commit a word's definition as a footnote
async fn commit_footnote_handler(
    app_state: web::Data<AppState>,
    path: web::Path<WordId>,
) -> ActixResult<HttpResponse> {
    let word_id = path.into_inner();
    let mut session = app_state.session.write().await;
    match session.commit_footnote(word_id) {
        Ok(changed) => Ok(HttpResponse::Ok().json(MutationResponse {
            changed,
            session: session.snapshot(),
        })),
        Err(error) => Ok(error_response(&error)),
    }
}

/// Remove a word's footnote
async fn remove_footnote_handler(
    app_state: web::Data<AppState>,
    path: web::Path<WordId>,
) -> ActixResult<HttpResponse> {
    let word_id = path.into_inner();
    let mut session = app_state.session.write().await;
    match session.remove_footnote(word_id) {
        Ok(changed) => Ok(HttpResponse::Ok().json(MutationResponse {
            changed,
            session: session.snapshot(),
        })),
        Err(error) => Ok(error_response(&error)),
    }
}

/// Renumber footnotes by document position
async fn renumber_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let mut session = app_state.session.write().await;
    session.renumber_footnotes();
    Ok(HttpResponse::Ok().json(MutationResponse {
        changed: true,
        session: session.snapshot(),
    }))
}

/// Export payload for the document exporter
async fn export_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let session = app_state.session.read().await;
    Ok(HttpResponse::Ok().json(session.export()))
}

/// Health check endpoint
async fn health_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let session = app_state.session.read().await;
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: app_state.provider.name().to_string(),
        document_loaded: session.has_document(),
        selections: session.selections().len(),
        footnotes: session.footnotes().len(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Index page listing the available endpoints
async fn index_handler() -> ActixResult<HttpResponse> {
    let html = r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Document Annotator</title>
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .endpoint { margin: 12px 0; padding: 12px; background: #f8f9fa; border-radius: 5px; }
            .method { font-weight: bold; color: #27ae60; }
        </style>
    </head>
    <body>
        <h1>Document Annotator API</h1>
        <p>Select terms in a loaded document, generate definitions, and commit them as numbered footnotes.</p>

        <div class="endpoint"><span class="method">POST</span> /document — load pasted text</div>
        <div class="endpoint"><span class="method">POST</span> /document/upload — upload a document for extraction</div>
        <div class="endpoint"><span class="method">POST</span> /words — select a term</div>
        <div class="endpoint"><span class="method">POST</span> /definitions — generate definitions for all selections</div>
        <div class="endpoint"><span class="method">PUT</span> /words/{id}/footnote — commit a footnote</div>
        <div class="endpoint"><span class="method">GET</span> /export — export payload with numbered footnotes</div>
        <div class="endpoint"><span class="method">GET</span> /health — component health</div>
    </body>
    </html>
    "#;

    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TextExtractionService;
    use crate::provider::DefinitionProvider;
    use crate::{AnnotationSession, Config, WordDefinition};
    use actix_web::{test, App};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CannedProvider;

    #[async_trait]
    impl DefinitionProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn define(&self, request: DefinitionRequest) -> crate::Result<WordDefinition> {
            Ok(WordDefinition {
                word: request.word,
                definition_lines: vec!["a canned sense".to_string()],
                example: "canned example".to_string(),
            })
        }
    }

    fn app_state() -> AppState {
        let config = Arc::new(Config::default());
        AppState {
            session: Arc::new(tokio::sync::RwLock::new(AnnotationSession::new(&config))),
            provider: Arc::new(CannedProvider),
            extractor: Arc::new(TextExtractionService::new()),
            config,
        }
    }

    #[actix_web::test]
    async fn test_select_and_commit_flow() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/document", web::post().to(load_document_handler))
                .route("/words", web::post().to(select_word_handler))
                .route(
                    "/words/{word_id}/definition",
                    web::post().to(generate_one_handler),
                )
                .route(
                    "/words/{word_id}/footnote",
                    web::put().to(commit_footnote_handler),
                ),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/document")
            .set_json(serde_json::json!({ "text": "Cats are mammals. Dogs bark." }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert!(response.status().is_success());

        let request = test::TestRequest::post()
            .uri("/words")
            .set_json(serde_json::json!({ "selection": "mammals" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["selected"], serde_json::json!(true));
        let word_id = body["word_id"].as_str().unwrap().to_string();

        let request = test::TestRequest::post()
            .uri(&format!("/words/{}/definition", word_id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert!(response.status().is_success());

        let request = test::TestRequest::put()
            .uri(&format!("/words/{}/footnote", word_id))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert!(response.status().is_success());

        let session = state.session.read().await;
        assert_eq!(session.footnotes().len(), 1);
        assert!(session.annotated().contains("mammals<sup>1)</sup>"));
    }

    #[actix_web::test]
    async fn test_oversized_selection_maps_to_bad_request() {
        let state = app_state();
        state
            .session
            .write()
            .await
            .load_document("Some document text.".to_string());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/words", web::post().to(select_word_handler)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/words")
            .set_json(serde_json::json!({ "selection": "x".repeat(51) }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unsupported_upload_is_rejected() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/document/upload", web::post().to(upload_document_handler)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/document/upload?filename=report.pdf")
            .insert_header(("content-type", "application/pdf"))
            .set_payload(vec![0x25, 0x50, 0x44, 0x46])
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(
            response.status(),
            actix_web::http::StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
