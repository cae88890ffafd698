//! REST API for the recommendation service.
//!
//! Exposes the engine over HTTP with axum, streams pipeline progress as
//! Server-Sent Events and serves an OpenAPI document with a Swagger page.

use std::sync::{Arc, OnceLock, RwLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::catalog::{CatalogDocument, CatalogSnapshot, CatalogSummary};
use crate::composer::{
    ContainerDiagnostic, InfeasibleParcel, InfeasibleReason, ItemMembership, OrderTotals,
    ParcelOutcome, ParcelRecord, ParcelResult, PlanRecord, Recommendation, RejectionStage,
};
use crate::config::ApiConfig;
use crate::error::EngineError;
use crate::model::{
    Container, ContainerClass, Item, ItemSpec, OrderLine, Product, ProhibitedRule, RateEntry,
};
use crate::optimizer::{
    EngineSettings, OrderRequest, RecommendEvent, expand_items, recommend, recommend_batch,
    recommend_items, simulate,
};
use crate::selector::Candidate;
use crate::splitter::SplitCause;

/// Shared handler state.
///
/// The catalog sits behind a lock that is only held long enough to clone
/// the current `Arc`; every request then works on its own snapshot.
#[derive(Clone)]
pub struct ApiState {
    settings: Arc<EngineSettings>,
    catalog: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl ApiState {
    pub fn new(settings: EngineSettings, catalog: CatalogSnapshot) -> Self {
        Self {
            settings: Arc::new(settings),
            catalog: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let guard = self
            .catalog
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn replace_catalog(&self, catalog: CatalogSnapshot) {
        let mut guard = self
            .catalog
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(catalog);
    }

    fn settings_for(&self, carrier: Option<&str>) -> EngineSettings {
        match carrier.map(str::trim).filter(|c| !c.is_empty()) {
            Some(carrier) => self.settings.with_requested_carrier(carrier),
            None => EngineSettings::clone(&self.settings),
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pack-advisor API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request body for the recommendation endpoints.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "order_id": "ORD-1001",
        "lines": [
            { "product_id": "SKU-TEA", "quantity": 2 },
            { "product_id": "SKU-DETERGENT", "quantity": 1 }
        ],
        "carrier": "CarrierB"
    })
)]
pub struct RecommendRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub lines: Vec<OrderLine>,
    /// Carrier to price with first; the configured one when absent.
    #[serde(default)]
    #[schema(nullable = true)]
    pub carrier: Option<String>,
}

/// Recommendation plus the derived views most callers need.
#[derive(Serialize, ToSchema)]
pub struct RecommendResponse {
    pub recommendation: Recommendation,
    pub infeasible: Vec<InfeasibleParcel>,
    pub plan: PlanRecord,
}

impl RecommendResponse {
    fn from_recommendation(recommendation: Recommendation) -> Self {
        Self {
            infeasible: recommendation.infeasible_report(),
            plan: recommendation.to_plan_record(),
            recommendation,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "orders": [
            { "order_id": "ORD-1", "lines": [{ "product_id": "SKU-TSHIRT", "quantity": 1 }] },
            { "order_id": "ORD-2", "lines": [{ "product_id": "SKU-POSTER", "quantity": 2 }] }
        ]
    })
)]
pub struct BatchRequest {
    pub orders: Vec<OrderRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub carrier: Option<String>,
}

/// Result for one order of a batch; exactly one of `recommendation` and `error` is set.
#[derive(Serialize, ToSchema)]
pub struct BatchEntry {
    pub order_id: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub error: Option<ErrorResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct BatchResponse {
    pub results: Vec<BatchEntry>,
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "item": { "dims": [250, 180, 60], "weight_g": 900, "padding_mm": 5 },
        "limit": 3
    })
)]
pub struct SimulateRequest {
    pub item: ItemSpec,
    /// Number of candidates; the configured limit when absent.
    #[serde(default)]
    #[schema(nullable = true)]
    pub limit: Option<usize>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub carrier: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SimulateResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub catalog: CatalogSummary,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn engine_error(err: &EngineError) -> ErrorResponse {
    match err {
        EngineError::InvalidInput(inner) => {
            ErrorResponse::new("Invalid input data", inner.to_string())
        }
    }
}

fn engine_error_response(err: &EngineError) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(engine_error(err))).into_response()
}

fn internal_error(details: impl Into<String>) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", details)
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(value)| value)
        .map_err(json_deserialize_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_recommend,
        handle_recommend_stream,
        handle_recommend_batch,
        handle_simulate,
        handle_get_catalog,
        handle_put_catalog,
        handle_health
    ),
    components(
        schemas(
            RecommendRequest,
            RecommendResponse,
            BatchRequest,
            BatchResponse,
            BatchEntry,
            SimulateRequest,
            SimulateResponse,
            HealthResponse,
            ErrorResponse,
            OrderRequest,
            OrderLine,
            ItemSpec,
            Item,
            Recommendation,
            ParcelResult,
            ParcelOutcome,
            OrderTotals,
            ContainerDiagnostic,
            RejectionStage,
            InfeasibleParcel,
            InfeasibleReason,
            PlanRecord,
            ParcelRecord,
            ItemMembership,
            SplitCause,
            Candidate,
            RecommendEvent,
            CatalogDocument,
            CatalogSummary,
            Product,
            Container,
            ContainerClass,
            ProhibitedRule,
            RateEntry
        )
    ),
    tags(
        (name = "recommendation", description = "Parcel, container and rate recommendations"),
        (name = "catalog", description = "Catalog snapshot management")
    )
)]
struct ApiDoc;

/// Builds the router with CORS and all routes.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/recommend", post(handle_recommend))
        .route("/recommend_stream", post(handle_recommend_stream))
        .route("/recommend_batch", post(handle_recommend_batch))
        .route("/simulate", post(handle_simulate))
        .route("/catalog", get(handle_get_catalog).put(handle_put_catalog))
        .route("/health", get(handle_health))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        host = config.display_host(),
        port = config.port(),
        "server listening on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("local access: http://localhost:{}", config.port());
    }
    info!(
        "endpoints: POST /recommend, POST /recommend_stream, POST /recommend_batch, \
         POST /simulate, GET|PUT /catalog, GET /health, GET /docs"
    );

    axum::serve(listener, router(state)).await
}

/// Handler for POST /recommend.
///
/// Splits the order into parcels and picks the cheapest container and rate
/// for each.
#[utoipa::path(
    post,
    path = "/recommend",
    request_body = RecommendRequest,
    responses(
        (status = 200, description = "Recommendation computed", body = RecommendResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid JSON, unknown product or invalid quantity",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Worker failed", body = ErrorResponse)
    ),
    tag = "recommendation"
)]
async fn handle_recommend(
    State(state): State<ApiState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let catalog = state.snapshot();
    let settings = state.settings_for(request.carrier.as_deref());
    info!(
        order_id = request.order_id.as_deref().unwrap_or("-"),
        lines = request.lines.len(),
        "recommend request"
    );

    let lines = request.lines;
    let computed =
        tokio::task::spawn_blocking(move || recommend(&lines, &catalog, &settings)).await;

    match computed {
        Ok(Ok(mut recommendation)) => {
            recommendation.order_id = request.order_id;
            let response = RecommendResponse::from_recommendation(recommendation);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "recommend request rejected");
            engine_error_response(&err)
        }
        Err(err) => {
            error!(error = %err, "recommend worker failed");
            internal_error(err.to_string())
        }
    }
}

/// Handler for POST /recommend_stream (SSE).
///
/// Streams pipeline events as they happen, followed by a `result` event that
/// carries the full recommendation.
#[utoipa::path(
    post,
    path = "/recommend_stream",
    request_body = RecommendRequest,
    responses(
        (
            status = 200,
            description = "Streams pipeline events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid JSON, unknown product or invalid quantity",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Worker failed", body = ErrorResponse)
    ),
    tag = "recommendation"
)]
async fn handle_recommend_stream(
    State(state): State<ApiState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let catalog = state.snapshot();
    let settings = state.settings_for(request.carrier.as_deref());

    // Expansion happens once, before the response starts, so invalid input
    // still gets a plain 422.
    let lines = request.lines;
    let expanded = {
        let catalog = Arc::clone(&catalog);
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || expand_items(&lines, &catalog, &settings)).await
    };
    let items = match expanded {
        Ok(Ok(items)) => items,
        Ok(Err(err)) => {
            warn!(error = %err, "recommend stream rejected");
            return engine_error_response(&err);
        }
        Err(err) => {
            error!(error = %err, "stream validation worker failed");
            return internal_error(err.to_string());
        }
    };

    let (tx, rx) = mpsc::channel::<Event>(32);
    let order_id = request.order_id;

    tokio::task::spawn_blocking(move || {
        let mut recommendation = recommend_items(items, &catalog, &settings, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver means the client went away; later events are dropped.
                let _ = tx.blocking_send(Event::default().data(json));
            }
        });
        recommendation.order_id = order_id;
        match serde_json::to_string(&recommendation) {
            Ok(json) => {
                let _ = tx.blocking_send(Event::default().event("result").data(json));
            }
            Err(err) => {
                let body =
                    ErrorResponse::new("Could not serialize recommendation", err.to_string());
                if let Ok(json) = serde_json::to_string(&body) {
                    let _ = tx.blocking_send(Event::default().event("error").data(json));
                }
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /recommend_batch.
///
/// Computes all orders in parallel against one catalog snapshot. Results
/// keep request order; invalid orders are reported inline.
#[utoipa::path(
    post,
    path = "/recommend_batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "One entry per order, in request order", body = BatchResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid JSON", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Batch worker failed", body = ErrorResponse)
    ),
    tag = "recommendation"
)]
async fn handle_recommend_batch(
    State(state): State<ApiState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let catalog = state.snapshot();
    let settings = state.settings_for(request.carrier.as_deref());
    info!(orders = request.orders.len(), "batch request");

    let orders = request.orders;
    let computed = tokio::task::spawn_blocking(move || {
        let results = recommend_batch(&orders, &catalog, &settings);
        orders
            .into_iter()
            .zip(results)
            .map(|(order, result)| match result {
                Ok(recommendation) => BatchEntry {
                    order_id: order.order_id,
                    recommendation: Some(recommendation),
                    error: None,
                },
                Err(err) => BatchEntry {
                    order_id: order.order_id,
                    recommendation: None,
                    error: Some(engine_error(&err)),
                },
            })
            .collect::<Vec<_>>()
    })
    .await;

    match computed {
        Ok(results) => (StatusCode::OK, Json(BatchResponse { results })).into_response(),
        Err(err) => {
            error!(error = %err, "batch worker failed");
            internal_error(err.to_string())
        }
    }
}

/// Handler for POST /simulate.
///
/// Ranks containers for a hypothetical item without splitting.
#[utoipa::path(
    post,
    path = "/simulate",
    request_body = SimulateRequest,
    responses(
        (status = 200, description = "Candidates, best first", body = SimulateResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid JSON or non-positive dimensions or weight",
            body = ErrorResponse
        )
    ),
    tag = "recommendation"
)]
async fn handle_simulate(
    State(state): State<ApiState>,
    payload: Result<Json<SimulateRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let catalog = state.snapshot();
    let settings = state.settings_for(request.carrier.as_deref());
    let limit = request.limit.unwrap_or(settings.simulation_limit);

    match simulate(&request.item, &catalog, &settings, limit) {
        Ok(candidates) => (StatusCode::OK, Json(SimulateResponse { candidates })).into_response(),
        Err(err) => engine_error_response(&err),
    }
}

/// Handler for GET /catalog.
#[utoipa::path(
    get,
    path = "/catalog",
    responses((status = 200, description = "Current catalog snapshot", body = CatalogDocument)),
    tag = "catalog"
)]
async fn handle_get_catalog(State(state): State<ApiState>) -> Response {
    let catalog = state.snapshot();
    (StatusCode::OK, Json(catalog.to_document())).into_response()
}

/// Handler for PUT /catalog.
///
/// Validates the new catalog and swaps it in atomically. Requests already
/// running keep the snapshot they started with.
#[utoipa::path(
    put,
    path = "/catalog",
    request_body = CatalogDocument,
    responses(
        (status = 200, description = "Catalog replaced", body = CatalogSummary),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid catalog", body = ErrorResponse)
    ),
    tag = "catalog"
)]
async fn handle_put_catalog(
    State(state): State<ApiState>,
    payload: Result<Json<CatalogDocument>, JsonRejection>,
) -> Response {
    let document = match parse_json(payload) {
        Ok(document) => document,
        Err(response) => return response,
    };

    match CatalogSnapshot::new(document) {
        Ok(catalog) => {
            let summary = catalog.summary();
            state.replace_catalog(catalog);
            info!(
                products = summary.products,
                containers = summary.containers,
                rates = summary.rates,
                "catalog replaced"
            );
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(err) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid catalog",
            err.to_string(),
        ),
    }
}

/// Handler for GET /health.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "catalog"
)]
async fn handle_health(State(state): State<ApiState>) -> Response {
    let response = HealthResponse {
        status: "ok".to_string(),
        catalog: state.snapshot().summary(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
