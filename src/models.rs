use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Role & Status Enums ---

/// Role
///
/// The RBAC tag carried by every identity and profile. Replaces the ad-hoc string
/// comparisons the frontend used to scatter across server actions: every authorization
/// decision in this codebase goes through this enum and the shared checks in `auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// The dashboard a freshly authenticated user of this role lands on.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/organization/dashboard",
            Role::Teacher => "/teacher/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// ApprovalStatus
///
/// Tri-state flag gating non-admin access to protected areas. New sign-ups start
/// as Pending and are moved to Approved/Rejected by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// ClassStatus
///
/// Lifecycle of a scheduled class. Stored on the row; transitions are driven by
/// admin/teacher updates, not by a clock inside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum ClassStatus {
    #[default]
    Upcoming,
    Live,
    Ended,
}

/// TargetGender
///
/// Audience restriction for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum TargetGender {
    #[default]
    All,
    Male,
    Female,
}

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// The user's canonical application-level record stored in the `public.profiles` table,
/// keyed by the external auth subject id. The access gate only ever reads `role` and
/// `status`; the remaining fields serve the admin/teacher CRUD surface.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    // Primary Key, also the Foreign Key to the external auth.users table.
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    // The RBAC field.
    pub role: Role,
    // Approval gate for non-admin users.
    pub status: ApprovalStatus,
    // Teacher-specific fields; NULL for students and admins.
    pub specialization: Option<String>,
    pub bio: Option<String>,
    // Public URL fragment for teacher pages, e.g. "jane-doe-4f21".
    pub slug: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Class
///
/// A scheduled class session from the `public.classes` table. `instructor_name` is
/// denormalized at creation time so listing the schedule needs no join; the single
/// FK lookup to the instructor profile happens only in `ScheduleEntry`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Class {
    pub id: Uuid,
    pub title: String,
    // FK to public.profiles.id.
    pub instructor_id: Uuid,
    pub instructor_name: String,
    pub description: Option<String>,
    // Duration in minutes.
    pub duration: i32,
    pub meet_link: Option<String>,
    #[ts(type = "string")]
    pub start_time: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ClassStatus,
    pub target_gender: TargetGender,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ScheduleEntry
///
/// A class enriched with the instructor's contact email via the single permitted
/// FK join (class -> instructor profile). This is what the public schedule serves.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ScheduleEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub class: Class,
    pub instructor_email: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// SignUpRequest
///
/// Input payload for the public self sign-up endpoint (POST /auth/signup).
/// The password is only passed through to the external auth provider and never
/// persisted or logged internally by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// AddTeacherRequest
///
/// Input payload for admin-side teacher provisioning (POST /admin/teachers).
/// No password field: the handler generates a temporary one and creates the
/// auth user with a pre-confirmed email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddTeacherRequest {
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub bio: String,
}

/// UpdateTeacherRequest
///
/// Partial edit of an existing teacher profile (PUT /admin/teachers/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateTeacherRequest {
    pub full_name: String,
    pub specialization: String,
    pub bio: String,
}

/// AddStudentRequest
///
/// Input payload for admin-side student provisioning (POST /admin/members).
/// The generated temporary password is returned in the success message so the
/// admin can hand it to the student out of band.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AddStudentRequest {
    pub full_name: String,
    pub email: String,
}

/// UpdateStudentRequest
///
/// Edit of an existing member profile (PUT /admin/members/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateStudentRequest {
    pub full_name: String,
}

/// CreateClassRequest
///
/// Input payload for scheduling a new class (POST /admin/classes).
/// `end_time` is derived server-side from `start_time + duration`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateClassRequest {
    pub title: String,
    pub instructor_id: Uuid,
    pub description: Option<String>,
    // Minutes.
    pub duration: i32,
    pub meet_link: Option<String>,
    #[ts(type = "string")]
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub target_gender: TargetGender,
}

/// UpdateClassRequest
///
/// Partial update payload for modifying an existing class (PUT /admin/classes/{id}).
///
/// Uses `Option<T>` for all fields and `#[serde(skip_serializing_if = "Option::is_none")]`
/// to efficiently handle partial updates, ensuring only provided fields are touched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateClassRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClassStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_gender: Option<TargetGender>,
}

// --- Internal Transfer Types (Repository Inputs) ---

/// NewClass
///
/// Fully resolved class row, assembled by the handler (instructor name looked up,
/// end time computed) before insertion.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub title: String,
    pub instructor_id: Uuid,
    pub instructor_name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub meet_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub target_gender: TargetGender,
}

/// TeacherProfileUpdate
///
/// Field set applied when an admin edits a teacher profile. `status` is only
/// populated during initial provisioning (auto-approval of admin-created accounts).
#[derive(Debug, Clone)]
pub struct TeacherProfileUpdate {
    pub full_name: String,
    pub specialization: String,
    pub bio: String,
    pub slug: String,
    pub status: Option<ApprovalStatus>,
}

// --- Output Schemas ---

/// ActionResult
///
/// Structured success/error envelope returned by every mutation endpoint. Failures
/// from the data/auth collaborators are reported here with a human-readable message,
/// never thrown as an uncaught fault across the handler boundary.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// OrgDashboardStats
///
/// Output schema for the organization (admin) dashboard (GET /organization/dashboard).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrgDashboardStats {
    pub total_students: i64,
    pub total_teachers: i64,
    /// Members still awaiting an admin decision.
    pub pending_approvals: i64,
    pub total_classes: i64,
    pub upcoming_classes: i64,
}

/// ApprovalStatusResponse
///
/// Output schema for the pending-approval page (GET /pending-approval).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ApprovalStatusResponse {
    pub status: ApprovalStatus,
}

// --- Small helpers used by the provisioning flows ---

/// slugify
///
/// Lowercases, trims and dash-joins a display name for use in public teacher URLs.
/// Keeps alphanumerics only; collapses runs of separators into a single dash.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// generate_short_id
///
/// Four random base-36 characters appended to slugs to keep them unique.
pub fn generate_short_id() -> String {
    random_base36(4)
}

/// generate_temp_password
///
/// Ten random base-36 characters, matching the provisioning contract for
/// admin-created accounts. The admin relays this to the new user out of band.
pub fn generate_temp_password() -> String {
    random_base36(10)
}

fn random_base36(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
