//! # API REST
//!
//! REST API implementation for the incident capture backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Every handler delegates to an [`IncidentBackend`]; there is no business logic here beyond
//! parsing path parameters and the completion check in front of submission.

#![warn(rust_2018_idioms)]

pub mod dto;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use dto::*;
use ica_core::{
    BackendError, CoreConfig, EnhancedNarrativeId, ExportSection, IncidentBackend, IncidentId,
    IncidentMetadata, MemoryBackend, NonEmptyText, Phase, QuestionId, StorageRef,
};

type ApiError = (StatusCode, &'static str);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Application state for the REST API server
///
/// Holds the backend every handler delegates to.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn IncidentBackend>,
}

impl AppState {
    pub fn new(backend: Arc<dyn IncidentBackend>) -> Self {
        Self { backend }
    }

    /// State backed by a fresh [`MemoryBackend`].
    pub fn in_memory(cfg: Arc<CoreConfig>) -> Self {
        Self::new(Arc::new(MemoryBackend::new(cfg)))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_incident,
        list_incidents,
        get_incident,
        upsert_narrative,
        generate_questions,
        list_questions,
        submit_answer,
        generate_enhancement,
        update_enhancement,
        completion,
        submit,
        generate_pdf,
        download_pdf,
    ),
    components(schemas(
        HealthRes,
        CreateIncidentReq,
        CreateIncidentRes,
        IncidentRes,
        ListIncidentsRes,
        UpsertNarrativeReq,
        UpsertNarrativeRes,
        GenerateQuestionsReq,
        QuestionRes,
        QuestionsRes,
        SubmitAnswerReq,
        AnswerRes,
        EnhancementRes,
        UpdateEnhancementReq,
        CompletionRes,
        SubmitReq,
        SubmitRes,
        GeneratePdfReq,
        PdfRes,
        PdfDownloadRes,
    ))
)]
pub struct ApiDoc;

/// Builds the router with every route, CORS and the OpenAPI document.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/incidents", post(create_incident).get(list_incidents))
        .route("/incidents/:id", get(get_incident))
        .route("/incidents/:id/narrative", put(upsert_narrative))
        .route(
            "/incidents/:id/questions/:phase",
            post(generate_questions).get(list_questions),
        )
        .route("/incidents/:id/answers/:question_id", put(submit_answer))
        .route(
            "/incidents/:id/enhancement",
            post(generate_enhancement).put(update_enhancement),
        )
        .route("/incidents/:id/completion", get(completion))
        .route("/incidents/:id/submit", post(submit))
        .route("/incidents/:id/pdf", post(generate_pdf))
        .route("/pdf/:storage_ref", get(download_pdf))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the API until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Serving incident capture REST API on {}", addr);
    axum::serve(listener, router(state)).await
}

/// Maps a backend failure onto a status code, logging it first.
fn backend_error(context: &'static str, err: BackendError) -> ApiError {
    let status = match &err {
        BackendError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
        BackendError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Bad request"),
        BackendError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
        BackendError::Generation(_) => (StatusCode::BAD_GATEWAY, "Generation failed"),
        BackendError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
        BackendError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable"),
    };
    if status.0.is_server_error() {
        tracing::error!("{} error: {:?}", context, err);
    } else {
        tracing::warn!("{} rejected: {}", context, err);
    }
    status
}

fn parse_incident_id(raw: &str) -> Result<IncidentId, ApiError> {
    IncidentId::parse(raw).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid incident id"))
}

fn parse_phase(raw: &str) -> Result<Phase, ApiError> {
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid phase"))
}

fn required_text(raw: &str, error: &'static str) -> Result<NonEmptyText, ApiError> {
    NonEmptyText::new(raw).map_err(|_| (StatusCode::BAD_REQUEST, error))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Incident capture REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/incidents",
    request_body = CreateIncidentReq,
    responses(
        (status = 200, description = "Incident created", body = CreateIncidentRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a draft incident from the metadata step
///
/// # Errors
/// Returns `400 Bad Request` if a name or the location is blank, the timestamp does not parse,
/// or the event time lies in the future.
#[axum::debug_handler]
async fn create_incident(
    State(state): State<AppState>,
    Json(req): Json<CreateIncidentReq>,
) -> ApiResult<CreateIncidentRes> {
    let event_date_time = DateTime::parse_from_rfc3339(&req.event_date_time)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid event_date_time"))?
        .with_timezone(&Utc);
    let metadata = IncidentMetadata {
        reporter_name: required_text(&req.reporter_name, "reporter_name is required")?,
        participant_name: required_text(&req.participant_name, "participant_name is required")?,
        event_date_time,
        location: required_text(&req.location, "location is required")?,
    };

    let id = state
        .backend
        .create_incident(metadata)
        .await
        .map_err(|e| backend_error("Create incident", e))?;
    Ok(Json(CreateIncidentRes {
        incident_id: id.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListIncidentsQuery {
    reporter: String,
}

#[utoipa::path(
    get,
    path = "/incidents",
    params(("reporter" = String, Query, description = "Reporter whose drafts are listed")),
    responses(
        (status = 200, description = "Unsubmitted incidents, newest first", body = ListIncidentsRes)
    )
)]
#[axum::debug_handler]
async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> ApiResult<ListIncidentsRes> {
    let incidents = state
        .backend
        .list_incomplete_incidents(query.reporter.trim())
        .await
        .map_err(|e| backend_error("List incidents", e))?;
    Ok(Json(ListIncidentsRes {
        incidents: incidents.iter().map(IncidentRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/incidents/{id}",
    params(("id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Incident", body = IncidentRes),
        (status = 404, description = "Not found")
    )
)]
#[axum::debug_handler]
async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<IncidentRes> {
    let id = parse_incident_id(&id)?;
    let incident = state
        .backend
        .get_incident(id)
        .await
        .map_err(|e| backend_error("Get incident", e))?;
    Ok(Json(IncidentRes::from(&incident)))
}

#[utoipa::path(
    put,
    path = "/incidents/{id}/narrative",
    params(("id" = String, Path, description = "Incident id")),
    request_body = UpsertNarrativeReq,
    responses(
        (status = 200, description = "Narrative saved", body = UpsertNarrativeRes),
        (status = 404, description = "Not found"),
        (status = 409, description = "Incident already submitted")
    )
)]
/// Replace the four narrative phases
#[axum::debug_handler]
async fn upsert_narrative(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpsertNarrativeReq>,
) -> ApiResult<UpsertNarrativeRes> {
    let id = parse_incident_id(&id)?;
    state
        .backend
        .upsert_narrative(id, req.into())
        .await
        .map_err(|e| backend_error("Upsert narrative", e))?;
    let narrative = state
        .backend
        .get_narrative(id)
        .await
        .map_err(|e| backend_error("Upsert narrative", e))?;
    Ok(Json(UpsertNarrativeRes {
        version: narrative.map_or(0, |n| n.version),
    }))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/questions/{phase}",
    params(
        ("id" = String, Path, description = "Incident id"),
        ("phase" = String, Path, description = "before_event, during_event, end_event or post_event")
    ),
    request_body = GenerateQuestionsReq,
    responses(
        (status = 200, description = "Generated or cached questions", body = QuestionsRes),
        (status = 502, description = "Generation failed")
    )
)]
/// Generate clarification questions for one phase
///
/// Unchanged narrative content returns the previous questions with `cached: true` unless
/// `force_regenerate` is set.
#[axum::debug_handler]
async fn generate_questions(
    State(state): State<AppState>,
    Path((id, phase)): Path<(String, String)>,
    Json(req): Json<GenerateQuestionsReq>,
) -> ApiResult<QuestionsRes> {
    let id = parse_incident_id(&id)?;
    let phase = parse_phase(&phase)?;
    let generated = state
        .backend
        .generate_clarification_questions(id, phase, &req.narrative_content, req.force_regenerate)
        .await
        .map_err(|e| backend_error("Generate questions", e))?;
    Ok(Json(QuestionsRes {
        questions: generated.questions.iter().map(QuestionRes::from).collect(),
        cached: generated.cached,
    }))
}

#[utoipa::path(
    get,
    path = "/incidents/{id}/questions/{phase}",
    params(
        ("id" = String, Path, description = "Incident id"),
        ("phase" = String, Path, description = "Narrative phase")
    ),
    responses(
        (status = 200, description = "Questions for the phase", body = QuestionsRes)
    )
)]
#[axum::debug_handler]
async fn list_questions(
    State(state): State<AppState>,
    Path((id, phase)): Path<(String, String)>,
) -> ApiResult<QuestionsRes> {
    let id = parse_incident_id(&id)?;
    let phase = parse_phase(&phase)?;
    let questions = state
        .backend
        .list_questions(id, phase)
        .await
        .map_err(|e| backend_error("List questions", e))?;
    Ok(Json(QuestionsRes {
        questions: questions.iter().map(QuestionRes::from).collect(),
        cached: true,
    }))
}

#[utoipa::path(
    put,
    path = "/incidents/{id}/answers/{question_id}",
    params(
        ("id" = String, Path, description = "Incident id"),
        ("question_id" = String, Path, description = "Question id")
    ),
    request_body = SubmitAnswerReq,
    responses(
        (status = 200, description = "Answer saved", body = AnswerRes),
        (status = 404, description = "Question not found")
    )
)]
#[axum::debug_handler]
async fn submit_answer(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(String, String)>,
    Json(req): Json<SubmitAnswerReq>,
) -> ApiResult<AnswerRes> {
    let id = parse_incident_id(&id)?;
    let question_id = QuestionId::parse(&question_id)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid question id"))?;
    let phase = parse_phase(&req.phase)?;
    let receipt = state
        .backend
        .submit_clarification_answer(id, question_id, phase, &req.text)
        .await
        .map_err(|e| backend_error("Submit answer", e))?;
    Ok(Json(receipt.into()))
}

/// Reads the current enhanced narrative, which must exist after a successful mutation.
async fn current_enhancement(
    state: &AppState,
    id: IncidentId,
    context: &'static str,
) -> ApiResult<EnhancementRes> {
    let enhanced = state
        .backend
        .get_enhanced_narrative(id)
        .await
        .map_err(|e| backend_error(context, e))?
        .ok_or((StatusCode::NOT_FOUND, "Not found"))?;
    Ok(Json(EnhancementRes::from(&enhanced)))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/enhancement",
    params(("id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Enhanced narrative generated", body = EnhancementRes),
        (status = 502, description = "Generation failed")
    )
)]
#[axum::debug_handler]
async fn generate_enhancement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EnhancementRes> {
    let id = parse_incident_id(&id)?;
    state
        .backend
        .generate_enhancement(id)
        .await
        .map_err(|e| backend_error("Generate enhancement", e))?;
    current_enhancement(&state, id, "Generate enhancement").await
}

#[utoipa::path(
    put,
    path = "/incidents/{id}/enhancement",
    params(("id" = String, Path, description = "Incident id")),
    request_body = UpdateEnhancementReq,
    responses(
        (status = 200, description = "Reporter edit saved", body = EnhancementRes),
        (status = 404, description = "No enhanced narrative yet")
    )
)]
#[axum::debug_handler]
async fn update_enhancement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEnhancementReq>,
) -> ApiResult<EnhancementRes> {
    let id = parse_incident_id(&id)?;
    state
        .backend
        .update_enhanced_narrative(id, &req.user_content)
        .await
        .map_err(|e| backend_error("Update enhancement", e))?;
    current_enhancement(&state, id, "Update enhancement").await
}

#[utoipa::path(
    get,
    path = "/incidents/{id}/completion",
    params(("id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Completion checklist", body = CompletionRes)
    )
)]
#[axum::debug_handler]
async fn completion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CompletionRes> {
    let id = parse_incident_id(&id)?;
    let report = state
        .backend
        .validate_workflow_completion(id)
        .await
        .map_err(|e| backend_error("Validate completion", e))?;
    Ok(Json(report.into()))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/submit",
    params(("id" = String, Path, description = "Incident id")),
    request_body = SubmitReq,
    responses(
        (status = 200, description = "Submitted for analysis", body = SubmitRes),
        (status = 409, description = "Workflow incomplete, stale enhancement or already submitted")
    )
)]
/// Hand the incident off for analysis
///
/// # Errors
/// Returns `409 Conflict` without attempting the handoff when the completion checklist is not
/// fully satisfied.
#[axum::debug_handler]
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitReq>,
) -> ApiResult<SubmitRes> {
    let id = parse_incident_id(&id)?;
    let enhanced_id = EnhancedNarrativeId::parse(&req.enhanced_narrative_id)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid enhanced narrative id"))?;

    let report = state
        .backend
        .validate_workflow_completion(id)
        .await
        .map_err(|e| backend_error("Submit", e))?;
    if !report.all_complete {
        tracing::warn!(
            incident_id = %id,
            missing = ?report.missing_requirements,
            "Submit rejected: workflow incomplete"
        );
        return Err((StatusCode::CONFLICT, "Workflow incomplete"));
    }

    let receipt = state
        .backend
        .submit_for_analysis(id, enhanced_id)
        .await
        .map_err(|e| backend_error("Submit", e))?;
    Ok(Json(receipt.into()))
}

#[utoipa::path(
    post,
    path = "/incidents/{id}/pdf",
    params(("id" = String, Path, description = "Incident id")),
    request_body = GeneratePdfReq,
    responses(
        (status = 200, description = "Document generated", body = PdfRes),
        (status = 400, description = "Unknown or missing sections")
    )
)]
#[axum::debug_handler]
async fn generate_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GeneratePdfReq>,
) -> ApiResult<PdfRes> {
    let id = parse_incident_id(&id)?;
    let sections = req
        .sections
        .iter()
        .map(|s| s.parse::<ExportSection>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid section"))?;
    let artifact = state
        .backend
        .generate_pdf(id, &sections)
        .await
        .map_err(|e| backend_error("Generate PDF", e))?;
    Ok(Json(artifact.into()))
}

#[utoipa::path(
    get,
    path = "/pdf/{storage_ref}",
    params(("storage_ref" = String, Path, description = "Storage reference of a generated document")),
    responses(
        (status = 200, description = "Download location", body = PdfDownloadRes),
        (status = 404, description = "Not found")
    )
)]
#[axum::debug_handler]
async fn download_pdf(
    State(state): State<AppState>,
    Path(storage_ref): Path<String>,
) -> ApiResult<PdfDownloadRes> {
    let download = state
        .backend
        .download_pdf(&StorageRef::new(storage_ref))
        .await
        .map_err(|e| backend_error("Download PDF", e))?;
    Ok(Json(download.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::in_memory(Arc::new(CoreConfig::default())))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        (status, bytes.to_vec())
    }

    async fn call_json<T: DeserializeOwned>(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> T {
        let (status, bytes) = call(app, method, uri, body).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
        serde_json::from_slice(&bytes).expect("response should be valid JSON")
    }

    async fn create(app: &Router) -> String {
        let event = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        let res: CreateIncidentRes = call_json(
            app,
            "POST",
            "/incidents",
            Some(json!({
                "reporter_name": "Sam Carter",
                "participant_name": "Jane Doe",
                "event_date_time": event,
                "location": "Hall A"
            })),
        )
        .await;
        res.incident_id
    }

    const NARRATIVE: &str = "Jane was waiting in Hall A for the bus and became upset when it ran late.";

    #[tokio::test]
    async fn test_health() {
        let res: HealthRes = call_json(&app(), "GET", "/health", None).await;
        assert!(res.ok);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let doc: Value = call_json(&app(), "GET", "/api-docs/openapi.json", None).await;
        assert!(doc["paths"]["/incidents/{id}/submit"].is_object());
    }

    #[tokio::test]
    async fn test_create_and_get_incident() {
        let app = app();
        let id = create(&app).await;
        let incident: IncidentRes = call_json(&app, "GET", &format!("/incidents/{id}"), None).await;
        assert_eq!(incident.participant_name, "Jane Doe");
        assert_eq!(incident.capture_status, "draft");

        let listed: ListIncidentsRes =
            call_json(&app, "GET", "/incidents?reporter=Sam%20Carter", None).await;
        assert_eq!(listed.incidents.len(), 1);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let app = app();
        let (status, _) = call(&app, "GET", "/incidents/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = IncidentId::new();
        let (status, _) = call(&app, "GET", &format!("/incidents/{unknown}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let future = (Utc::now() + chrono::Duration::days(1)).to_rfc3339();
        let (status, _) = call(
            &app,
            "POST",
            "/incidents",
            Some(json!({
                "reporter_name": "Sam Carter",
                "participant_name": "Jane Doe",
                "event_date_time": future,
                "location": "Hall A"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let id = create(&app).await;
        let (status, _) = call(&app, "POST", &format!("/incidents/{id}/enhancement"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_incomplete_submit_is_conflict() {
        let app = app();
        let id = create(&app).await;
        let enhanced = IncidentId::new().to_string();
        let (status, _) = call(
            &app,
            "POST",
            &format!("/incidents/{id}/submit"),
            Some(json!({ "enhanced_narrative_id": enhanced })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let incident: IncidentRes = call_json(&app, "GET", &format!("/incidents/{id}"), None).await;
        assert_eq!(incident.handoff_status, "not_started");
    }

    #[tokio::test]
    async fn test_full_flow_over_http() {
        let app = app();
        let id = create(&app).await;

        let saved: UpsertNarrativeRes = call_json(
            &app,
            "PUT",
            &format!("/incidents/{id}/narrative"),
            Some(json!({ "before_event": NARRATIVE })),
        )
        .await;
        assert_eq!(saved.version, 1);

        for phase in Phase::ALL {
            let generated: QuestionsRes = call_json(
                &app,
                "POST",
                &format!("/incidents/{id}/questions/{phase}"),
                Some(json!({ "narrative_content": NARRATIVE })),
            )
            .await;
            assert!(!generated.cached);
            assert_eq!(generated.questions[0].ordinal, 1);
        }

        let questions: QuestionsRes =
            call_json(&app, "GET", &format!("/incidents/{id}/questions/before_event"), None).await;
        let answer: AnswerRes = call_json(
            &app,
            "PUT",
            &format!("/incidents/{id}/answers/{}", questions.questions[0].id),
            Some(json!({ "phase": "before_event", "text": "She had been calm at lunch." })),
        )
        .await;
        assert!(answer.is_complete);

        let enhanced: EnhancementRes =
            call_json(&app, "POST", &format!("/incidents/{id}/enhancement"), None).await;
        let edited: EnhancementRes = call_json(
            &app,
            "PUT",
            &format!("/incidents/{id}/enhancement"),
            Some(json!({ "user_content": "Reporter's own wording." })),
        )
        .await;
        assert!(edited.user_edited);
        assert_eq!(edited.effective_text, "Reporter's own wording.");

        let report: CompletionRes =
            call_json(&app, "GET", &format!("/incidents/{id}/completion"), None).await;
        assert!(report.all_complete, "{:?}", report.missing_requirements);

        let pdf: PdfRes = call_json(
            &app,
            "POST",
            &format!("/incidents/{id}/pdf"),
            Some(json!({ "sections": ["metadata", "enhanced_narrative"] })),
        )
        .await;
        let download: PdfDownloadRes =
            call_json(&app, "GET", &format!("/pdf/{}", pdf.storage_ref), None).await;
        assert!(download.url.ends_with(&pdf.storage_ref));

        let submit_body = json!({ "enhanced_narrative_id": enhanced.enhanced_narrative_id });
        let receipt: SubmitRes = call_json(
            &app,
            "POST",
            &format!("/incidents/{id}/submit"),
            Some(submit_body.clone()),
        )
        .await;
        assert_eq!(receipt.handoff_id.len(), 32);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/incidents/{id}/submit"),
            Some(submit_body),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
