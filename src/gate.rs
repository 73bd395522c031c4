//! Access Control Gate.
//!
//! Evaluated once per incoming request, before any handler runs. Given the request
//! path and the identity resolved from session cookies, the gate either lets the
//! request continue unchanged or redirects it to the auth page, the pending-approval
//! page, the role's home dashboard, or home.
//!
//! The gate holds no state between requests: every decision is derived fresh from
//! the token and, when needed, a single profile-status lookup. Evaluating it twice
//! for the same unchanged inputs yields the same decision.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{SessionIdentity, local_bypass_identity, resolve_session},
    models::{ApprovalStatus, Role},
    repository::RepositoryState,
};

/// Path of the auth (sign-in) page unauthenticated users are sent to.
pub const AUTH_PATH: &str = "/auth";
/// Path non-approved users are parked on while awaiting an admin decision.
pub const PENDING_APPROVAL_PATH: &str = "/pending-approval";
/// Fallback for role mismatches on protected areas.
pub const HOME_PATH: &str = "/";

/// RouteCategory
///
/// Derived, never stored: a pure function of the request path prefix. Mirrors the
/// portal's area layout — admin and organization pages share the admin requirement,
/// teacher pages accept teachers and admins, student pages any approved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    /// `/admin/*` and `/organization/*`: admin only.
    ProtectedAdmin,
    /// `/teacher/*`: teacher or admin.
    ProtectedTeacher,
    /// `/student/*`: any approved identity.
    ProtectedStudent,
    /// `/auth*`: public, but authenticated users are bounced to their dashboard.
    AuthPage,
    /// Exactly `/pending-approval`.
    PendingApproval,
    /// Everything else (schedule, health, docs, ...).
    Public,
}

impl RouteCategory {
    /// Whether this category requires an authenticated identity at all.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            RouteCategory::ProtectedAdmin
                | RouteCategory::ProtectedTeacher
                | RouteCategory::ProtectedStudent
        )
    }
}

/// classify
///
/// Categorizes a request path. Prefix matching for the protected areas and the auth
/// page, exact matching for the pending-approval page.
pub fn classify(path: &str) -> RouteCategory {
    if path.starts_with("/admin") || path.starts_with("/organization") {
        RouteCategory::ProtectedAdmin
    } else if path.starts_with("/teacher") {
        RouteCategory::ProtectedTeacher
    } else if path.starts_with("/student") {
        RouteCategory::ProtectedStudent
    } else if path.starts_with(AUTH_PATH) {
        RouteCategory::AuthPage
    } else if path == PENDING_APPROVAL_PATH {
        RouteCategory::PendingApproval
    } else {
        RouteCategory::Public
    }
}

/// GateDecision
///
/// The terminal state of one gate evaluation: pass the request through unchanged,
/// or answer with a redirect to the given path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Redirect(String),
}

impl GateDecision {
    fn redirect(to: impl Into<String>) -> Self {
        GateDecision::Redirect(to.into())
    }
}

/// evaluate
///
/// The Decision Engine. Rules are evaluated in fixed order; the first matching rule
/// wins. Performs at most one profile-status lookup (rules 3 and 6 are mutually
/// exclusive since rule 3 excludes the pending-approval path).
///
/// Missing profile rows and lookup failures both count as non-approved: the
/// repository resolves either to `None`, which never equals `Some(Approved)`.
/// Fail-closed is deliberate — see DESIGN.md.
pub async fn evaluate(
    repo: &RepositoryState,
    path: &str,
    identity: Option<&SessionIdentity>,
) -> GateDecision {
    let category = classify(path);

    // Rule 1: protected area without a resolved identity -> sign in first.
    let Some(user) = identity else {
        if category.is_protected() {
            return GateDecision::redirect(AUTH_PATH);
        }
        return GateDecision::Continue;
    };

    // Rule 2: authenticated users have no business on the auth page.
    if category == RouteCategory::AuthPage {
        return GateDecision::redirect(user.role.home_path());
    }

    // Rule 3: non-admins must be approved before entering any protected area.
    // Admins bypass the status check unconditionally.
    if user.role != Role::Admin && category.is_protected() && path != PENDING_APPROVAL_PATH {
        let status = repo.get_profile_status(user.id).await;
        if status != Some(ApprovalStatus::Approved) {
            return GateDecision::redirect(PENDING_APPROVAL_PATH);
        }
    }

    // Rule 4: admin/organization area requires the admin role.
    if category == RouteCategory::ProtectedAdmin && user.role != Role::Admin {
        return GateDecision::redirect(HOME_PATH);
    }

    // Rule 5: teacher area requires teacher or admin.
    if category == RouteCategory::ProtectedTeacher
        && user.role != Role::Teacher
        && user.role != Role::Admin
    {
        return GateDecision::redirect(HOME_PATH);
    }

    // Rule 6: approved users no longer belong on the pending page.
    if category == RouteCategory::PendingApproval {
        let status = repo.get_profile_status(user.id).await;
        if status == Some(ApprovalStatus::Approved) {
            return GateDecision::redirect(user.role.home_path());
        }
    }

    // Rule 7: allow the request through unchanged.
    GateDecision::Continue
}

/// access_gate
///
/// The axum middleware wrapping the whole router. Resolves the session from the
/// request headers (fail-closed), runs the decision engine, and either forwards the
/// request or short-circuits with a 307 redirect. Session validation is local JWT
/// decoding, so there are no refreshed cookies to carry onto the response; anything
/// a downstream handler sets passes through untouched.
///
/// The Env::Local `x-user-id` bypass is honored here too, so a bypass-only request
/// reaches protected prefixes with the same identity the `AuthUser` extractor
/// resolves downstream.
pub async fn access_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = match local_bypass_identity(request.headers(), &state.config, &state.repo).await
    {
        Some(identity) => Some(identity),
        None => resolve_session(request.headers(), &state.config),
    };
    let path = request.uri().path().to_string();

    match evaluate(&state.repo, &path, identity.as_ref()).await {
        GateDecision::Continue => next.run(request).await,
        GateDecision::Redirect(to) => {
            tracing::debug!(path = %path, to = %to, "access gate redirect");
            Redirect::temporary(&to).into_response()
        }
    }
}
