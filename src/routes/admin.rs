use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the admin role. The
/// `/admin` and `/organization` prefixes share the same requirement in the gate's
/// classifier, and every handler additionally calls the shared `require_admin`
/// check — no inline role string comparisons anywhere.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/teachers
        // Teacher roster and provisioning (temporary password, auto-approved profile).
        .route(
            "/teachers",
            get(handlers::list_teachers).post(handlers::add_teacher),
        )
        // PUT/DELETE /admin/teachers/{id}
        // Edit a teacher profile; deletion is refused while active classes remain.
        .route(
            "/teachers/{id}",
            put(handlers::update_teacher).delete(handlers::delete_teacher),
        )
        // GET/POST /admin/members
        // Member roster (filterable by approval status) and student provisioning.
        .route(
            "/members",
            get(handlers::list_members).post(handlers::add_student),
        )
        // PUT/DELETE /admin/members/{id}
        .route(
            "/members/{id}",
            put(handlers::update_student).delete(handlers::delete_student),
        )
        // POST /admin/members/{id}/approve | /reject
        // The approval queue decisions gating protected-area access for members.
        .route("/members/{id}/approve", post(handlers::approve_member))
        .route("/members/{id}/reject", post(handlers::reject_member))
        // Class management.
        .route(
            "/classes",
            get(handlers::list_all_classes).post(handlers::create_class),
        )
        .route(
            "/classes/{id}",
            put(handlers::update_class).delete(handlers::delete_class),
        )
}

/// Organization routes, mounted under `/organization`. Same admin requirement as
/// `/admin` — the original portal simply splits the dashboard out to its own area.
pub fn organization_routes() -> Router<AppState> {
    Router::new()
        // GET /organization/dashboard
        .route("/dashboard", get(handlers::org_dashboard))
}
