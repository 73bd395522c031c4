/// Router Module Index
///
/// Organizes the application's routing logic into access-segregated modules. The
/// path prefixes here are load-bearing: the Access Control Gate classifies requests
/// purely by prefix (`/admin`, `/organization`, `/teacher`, `/student`, `/auth`,
/// `/pending-approval`), so each module mounts its routes under the prefix whose
/// access rules it expects.

/// Routes accessible to all users (anonymous, read-only, plus sign-up).
pub mod public;

/// Routes requiring a validated session: profile, approval status, dashboards.
pub mod authenticated;

/// Routes restricted to the admin role: member/teacher provisioning, class
/// management, organization dashboard.
pub mod admin;
