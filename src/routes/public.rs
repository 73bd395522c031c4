use crate::{AppState, handlers};
use axum::{
    Json,
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// The gate still sees every request here: authenticated users hitting `/auth`
/// are bounced to their role's dashboard before these handlers run.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET /auth
        // The sign-in landing. Only ever rendered for anonymous clients — the gate
        // redirects authenticated users away before the handler is reached.
        .route(
            "/auth",
            get(|| async { Json(serde_json::json!({ "page": "sign-in" })) }),
        )
        // POST /auth/signup
        // Self sign-up through the external auth provider; new profiles start pending.
        .route("/auth/signup", post(handlers::sign_up))
        // GET /schedule
        // The public class schedule, instructor contact joined in.
        .route("/schedule", get(handlers::get_schedule))
}
