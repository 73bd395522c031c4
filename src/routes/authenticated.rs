use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes requiring a validated session. The `/student` and `/teacher` prefixes are
/// protected areas: the Access Control Gate has already enforced identity, approval
/// status and role by the time a request lands here. `/me` and `/pending-approval`
/// are reachable without passing the role gate, so they rely on the `AuthUser`
/// extractor middleware layered above this module for the 401 rejection.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The authenticated user's profile record.
        .route("/me", get(handlers::get_me))
        // GET /pending-approval
        // Approval status for the waiting page. Approved users never see this:
        // the gate redirects them to their dashboard first.
        .route("/pending-approval", get(handlers::get_approval_status))
        // GET /student/dashboard
        // Upcoming classes for an approved student.
        .route("/student/dashboard", get(handlers::student_dashboard))
        // GET /teacher/dashboard
        // The requesting instructor's own classes. Shared teacher check inside
        // the handler, in addition to the gate's prefix rule.
        .route("/teacher/dashboard", get(handlers::teacher_dashboard))
}
