use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod auth_client;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser; // The resolved authenticated user identity.
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use auth_client::{AuthState, MockAuthService, SupabaseAuthClient};
pub use config::AppConfig;
pub use repository::{MockRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas decorated with the
/// `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::sign_up, handlers::get_schedule, handlers::get_me,
        handlers::get_approval_status, handlers::student_dashboard,
        handlers::teacher_dashboard, handlers::org_dashboard,
        handlers::list_teachers, handlers::add_teacher, handlers::update_teacher,
        handlers::delete_teacher, handlers::list_members, handlers::add_student,
        handlers::update_student, handlers::delete_student, handlers::approve_member,
        handlers::reject_member, handlers::list_all_classes, handlers::create_class,
        handlers::update_class, handlers::delete_class
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::Role, models::ApprovalStatus, models::ClassStatus,
            models::TargetGender, models::Profile, models::Class,
            models::ScheduleEntry, models::SignUpRequest, models::AddTeacherRequest,
            models::UpdateTeacherRequest, models::AddStudentRequest,
            models::UpdateStudentRequest, models::CreateClassRequest,
            models::UpdateClassRequest, models::ActionResult,
            models::OrgDashboardStats, models::ApprovalStatusResponse,
        )
    ),
    tags(
        (name = "lms-portal", description = "Learning Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and
/// immutable container holding all essential application services and configuration.
/// The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Auth Layer: Abstracts the external auth collaborator's admin API.
    pub auth: AuthState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors to selectively pull components from the
// shared AppState, keeping dependency boundaries explicit.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the `authenticated_routes`.
///
/// *Mechanism*: It attempts to extract `AuthUser` from the request. Since `AuthUser`
/// implements `FromRequestParts`, if authentication (session validation, DB lookup)
/// fails, the extractor immediately rejects the request with a 401 Unauthorized
/// status, preventing execution of the handler.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Fallback for unmatched paths. Registered so the access gate sees every request
/// under a protected prefix, even ones that resolve to no route.
async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Areas: both prefixes carry the admin requirement in the gate;
        // the handlers additionally run the shared `require_admin` check.
        .nest("/admin", admin::admin_routes())
        .nest("/organization", admin::organization_routes())
        .fallback(not_found)
        // Access Control Gate: evaluated for every request, before any handler.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::access_gate,
        ))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: Generates a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: Wraps the entire request/response lifecycle in a
                // tracing span, correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: Ensures the generated x-request-id header is
                // returned to the client and injected into subsequent service calls.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (Applied last, allowing all traffic in/out after processing)
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize the tracing span creation. It extracts
/// the `x-request-id` header (if present) and includes it in the structured logging
/// metadata alongside the HTTP method and URI, so every log line for a single
/// request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
