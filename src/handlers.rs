use crate::{
    AppState,
    auth::AuthUser,
    models::{
        ActionResult, AddStudentRequest, AddTeacherRequest, ApprovalStatus,
        ApprovalStatusResponse, Class, CreateClassRequest, NewClass, OrgDashboardStats, Profile,
        Role, ScheduleEntry, SignUpRequest, TeacherProfileUpdate, UpdateClassRequest,
        UpdateStudentRequest, UpdateTeacherRequest, generate_short_id, generate_temp_password,
        slugify,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// MemberFilter
///
/// Accepted query parameters for the member listing endpoint (GET /admin/members).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct MemberFilter {
    /// Optional approval-status filter (pending, approved, rejected).
    pub status: Option<ApprovalStatus>,
}

// --- Public Handlers ---

/// sign_up
///
/// [Public Route] Self sign-up via the external auth provider's admin API with a
/// pre-confirmed email. The matching profile row is written immediately with status
/// `pending`, so the access gate never observes the gap between auth-user creation
/// and the provider's profile trigger firing.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses((status = 200, description = "Sign-up result", body = ActionResult))
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Json<ActionResult> {
    let user_id = match state
        .auth
        .create_user(&payload.email, &payload.password, &payload.full_name, payload.role)
        .await
    {
        Ok(id) => id,
        Err(e) => return Json(ActionResult::err(e)),
    };

    let profile = Profile {
        id: user_id,
        email: payload.email,
        full_name: Some(payload.full_name),
        role: payload.role,
        // New sign-ups wait for an admin decision.
        status: ApprovalStatus::Pending,
        created_at: Utc::now(),
        ..Default::default()
    };

    if !state.repo.upsert_profile(profile).await {
        return Json(ActionResult::err(
            "Auth user created but profile creation failed",
        ));
    }

    Json(ActionResult::ok())
}

/// get_schedule
///
/// [Public Route] The full class schedule, ordered by start time, with the
/// instructor's email joined in.
#[utoipa::path(
    get,
    path = "/schedule",
    responses((status = 200, description = "All classes", body = [ScheduleEntry]))
)]
pub async fn get_schedule(State(state): State<AppState>) -> Json<Vec<ScheduleEntry>> {
    Json(state.repo.list_classes().await)
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The requesting user's full profile record.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = Profile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, StatusCode> {
    match state.repo.get_profile(id).await {
        Some(profile) => Ok(Json(profile)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// get_approval_status
///
/// [Authenticated Route] The requesting user's approval status, as shown on the
/// pending-approval page. A missing profile row reads as `pending` — the same
/// fail-closed treatment the gate applies.
#[utoipa::path(
    get,
    path = "/pending-approval",
    responses((status = 200, description = "Approval status", body = ApprovalStatusResponse))
)]
pub async fn get_approval_status(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<ApprovalStatusResponse> {
    let status = state
        .repo
        .get_profile_status(id)
        .await
        .unwrap_or(ApprovalStatus::Pending);
    Json(ApprovalStatusResponse { status })
}

/// student_dashboard
///
/// [Student Route] Upcoming classes for the student's dashboard. The access gate has
/// already guaranteed an approved identity by the time this runs.
#[utoipa::path(
    get,
    path = "/student/dashboard",
    responses((status = 200, description = "Upcoming classes", body = [Class]))
)]
pub async fn student_dashboard(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Class>> {
    Json(state.repo.list_upcoming_classes().await)
}

/// teacher_dashboard
///
/// [Teacher Route] Classes taught by the requesting instructor.
///
/// *Authorization*: defense in depth — the gate already filters by path prefix, and
/// the handler still calls the shared teacher check.
#[utoipa::path(
    get,
    path = "/teacher/dashboard",
    responses((status = 200, description = "My classes", body = [Class]))
)]
pub async fn teacher_dashboard(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Class>>, StatusCode> {
    auth.require_teacher()?;
    Ok(Json(state.repo.list_classes_for_instructor(auth.id).await))
}

// --- Admin Handlers ---
//
// Every handler below calls the single shared `require_admin` check before touching
// the collaborators, in addition to the path-prefix gate.

/// org_dashboard
///
/// [Admin Route] Aggregate counters for the organization dashboard.
#[utoipa::path(
    get,
    path = "/organization/dashboard",
    responses((status = 200, description = "Stats", body = OrgDashboardStats))
)]
pub async fn org_dashboard(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<OrgDashboardStats>, StatusCode> {
    auth.require_admin()?;
    Ok(Json(state.repo.get_stats().await))
}

/// list_teachers
///
/// [Admin Route] All teacher profiles, ordered by name.
#[utoipa::path(
    get,
    path = "/admin/teachers",
    responses((status = 200, description = "Teachers", body = [Profile]))
)]
pub async fn list_teachers(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, StatusCode> {
    auth.require_admin()?;
    Ok(Json(state.repo.list_profiles(Role::Teacher, None).await))
}

/// add_teacher
///
/// [Admin Route] Provisions a teacher account: creates the auth user with a generated
/// temporary password and a pre-confirmed email, then writes the profile (bio,
/// specialization, slug) with status `approved` — admin-created accounts skip the
/// approval queue.
#[utoipa::path(
    post,
    path = "/admin/teachers",
    request_body = AddTeacherRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn add_teacher(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddTeacherRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    let temp_password = generate_temp_password();
    let user_id = match state
        .auth
        .create_user(&payload.email, &temp_password, &payload.full_name, Role::Teacher)
        .await
    {
        Ok(id) => id,
        Err(e) => return Ok(Json(ActionResult::err(e))),
    };

    let profile = Profile {
        id: user_id,
        email: payload.email,
        full_name: Some(payload.full_name.clone()),
        role: Role::Teacher,
        status: ApprovalStatus::Approved,
        specialization: Some(payload.specialization),
        bio: Some(payload.bio),
        slug: Some(format!("{}-{}", slugify(&payload.full_name), generate_short_id())),
        created_at: Utc::now(),
    };

    if !state.repo.upsert_profile(profile).await {
        return Ok(Json(ActionResult::err(
            "Auth user created but profile update failed",
        )));
    }

    Ok(Json(ActionResult::ok_with(format!(
        "Teacher {} added successfully.",
        payload.full_name
    ))))
}

/// update_teacher
///
/// [Admin Route] Edits an existing teacher profile and keeps the auth provider's
/// metadata (display name) in sync.
#[utoipa::path(
    put,
    path = "/admin/teachers/{id}",
    params(("id" = Uuid, Path, description = "Teacher ID")),
    request_body = UpdateTeacherRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn update_teacher(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTeacherRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    let short = id.simple().to_string().chars().take(4).collect::<String>();
    let update = TeacherProfileUpdate {
        slug: format!("{}-{}", slugify(&payload.full_name), short),
        full_name: payload.full_name.clone(),
        specialization: payload.specialization,
        bio: payload.bio,
        // Edits never touch the approval status.
        status: None,
    };

    if !state.repo.update_teacher_profile(id, update).await {
        return Ok(Json(ActionResult::err("Teacher not found")));
    }

    if let Err(e) = state
        .auth
        .update_user(id, &payload.full_name, Role::Teacher)
        .await
    {
        return Ok(Json(ActionResult::err(format!(
            "Profile updated but auth metadata sync failed: {}",
            e
        ))));
    }

    Ok(Json(ActionResult::ok_with("Teacher updated successfully")))
}

/// delete_teacher
///
/// [Admin Route] Removes a teacher account. Refused while the teacher still has
/// classes in status upcoming or live; deleting the auth user cascades to the
/// profile row.
#[utoipa::path(
    delete,
    path = "/admin/teachers/{id}",
    params(("id" = Uuid, Path, description = "Teacher ID")),
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn delete_teacher(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    let active = state.repo.active_classes_for_instructor(id).await;
    if !active.is_empty() {
        return Ok(Json(ActionResult::err(format!(
            "Cannot delete teacher. They have {} active or upcoming classes (e.g., \"{}\"). \
             Please reassign or end these classes first.",
            active.len(),
            active[0].title
        ))));
    }

    match state.auth.delete_user(id).await {
        Ok(()) => Ok(Json(ActionResult::ok_with("Teacher deleted successfully"))),
        Err(e) => Ok(Json(ActionResult::err(e))),
    }
}

/// list_members
///
/// [Admin Route] Student profiles, optionally narrowed to one approval status
/// (the approval queue is `?status=pending`).
#[utoipa::path(
    get,
    path = "/admin/members",
    params(MemberFilter),
    responses((status = 200, description = "Members", body = [Profile]))
)]
pub async fn list_members(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<MemberFilter>,
) -> Result<Json<Vec<Profile>>, StatusCode> {
    auth.require_admin()?;
    Ok(Json(
        state.repo.list_profiles(Role::Student, filter.status).await,
    ))
}

/// add_student
///
/// [Admin Route] Provisions a student account with a generated temporary password
/// and immediate approval. The password is returned in the success message so the
/// admin can relay it out of band.
#[utoipa::path(
    post,
    path = "/admin/members",
    request_body = AddStudentRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn add_student(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddStudentRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    let temp_password = generate_temp_password();
    let user_id = match state
        .auth
        .create_user(&payload.email, &temp_password, &payload.full_name, Role::Student)
        .await
    {
        Ok(id) => id,
        Err(e) => return Ok(Json(ActionResult::err(e))),
    };

    let profile = Profile {
        id: user_id,
        email: payload.email,
        full_name: Some(payload.full_name.clone()),
        role: Role::Student,
        status: ApprovalStatus::Approved,
        created_at: Utc::now(),
        ..Default::default()
    };

    if !state.repo.upsert_profile(profile).await {
        return Ok(Json(ActionResult::err(
            "Auth user created but status update failed",
        )));
    }

    Ok(Json(ActionResult::ok_with(format!(
        "Student {} added successfully. Password: {}",
        payload.full_name, temp_password
    ))))
}

/// update_student
///
/// [Admin Route] Renames an existing member profile.
#[utoipa::path(
    put,
    path = "/admin/members/{id}",
    params(("id" = Uuid, Path, description = "Member ID")),
    request_body = UpdateStudentRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn update_student(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    if state.repo.set_member_name(id, payload.full_name).await {
        Ok(Json(ActionResult::ok()))
    } else {
        Ok(Json(ActionResult::err("Member not found")))
    }
}

/// delete_student
///
/// [Admin Route] Removes a member account via the auth provider (cascades to the profile).
#[utoipa::path(
    delete,
    path = "/admin/members/{id}",
    params(("id" = Uuid, Path, description = "Member ID")),
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn delete_student(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    match state.auth.delete_user(id).await {
        Ok(()) => Ok(Json(ActionResult::ok())),
        Err(e) => Ok(Json(ActionResult::err(e))),
    }
}

/// approve_member
///
/// [Admin Route] Moves a member out of the approval queue. The next gate evaluation
/// for that user observes the new status.
#[utoipa::path(
    post,
    path = "/admin/members/{id}/approve",
    params(("id" = Uuid, Path, description = "Member ID")),
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn approve_member(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    if state
        .repo
        .set_profile_status(id, ApprovalStatus::Approved)
        .await
    {
        Ok(Json(ActionResult::ok()))
    } else {
        Ok(Json(ActionResult::err("Member not found")))
    }
}

/// reject_member
///
/// [Admin Route] Marks a member as rejected; they stay parked on the pending page.
#[utoipa::path(
    post,
    path = "/admin/members/{id}/reject",
    params(("id" = Uuid, Path, description = "Member ID")),
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn reject_member(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    if state
        .repo
        .set_profile_status(id, ApprovalStatus::Rejected)
        .await
    {
        Ok(Json(ActionResult::ok()))
    } else {
        Ok(Json(ActionResult::err("Member not found")))
    }
}

/// list_all_classes
///
/// [Admin Route] Every class with instructor contact, for the management table.
#[utoipa::path(
    get,
    path = "/admin/classes",
    responses((status = 200, description = "All classes", body = [ScheduleEntry]))
)]
pub async fn list_all_classes(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleEntry>>, StatusCode> {
    auth.require_admin()?;
    Ok(Json(state.repo.list_classes().await))
}

/// create_class
///
/// [Admin Route] Schedules a new class. The instructor must be an existing teacher
/// profile; the end time is derived from start time plus duration.
#[utoipa::path(
    post,
    path = "/admin/classes",
    request_body = CreateClassRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn create_class(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    if payload.title.trim().is_empty() {
        return Ok(Json(ActionResult::err("Please enter a class title")));
    }
    if payload.duration <= 0 {
        return Ok(Json(ActionResult::err("Please enter a valid duration")));
    }

    let instructor = match state.repo.get_profile(payload.instructor_id).await {
        Some(p) if p.role == Role::Teacher => p,
        Some(_) => {
            return Ok(Json(ActionResult::err(
                "Selected instructor is not a teacher",
            )));
        }
        None => return Ok(Json(ActionResult::err("Instructor not found"))),
    };

    let instructor_name = instructor.full_name.unwrap_or(instructor.email);
    let end_time = payload.start_time + Duration::minutes(payload.duration as i64);

    let new = NewClass {
        title: payload.title.clone(),
        instructor_id: payload.instructor_id,
        instructor_name,
        description: payload.description,
        duration: payload.duration,
        meet_link: payload.meet_link,
        start_time: payload.start_time,
        end_time,
        target_gender: payload.target_gender,
    };

    match state.repo.create_class(new).await {
        Some(class) => Ok(Json(ActionResult::ok_with(format!(
            "Class \"{}\" scheduled.",
            class.title
        )))),
        None => Ok(Json(ActionResult::err("Failed to create class"))),
    }
}

/// update_class
///
/// [Admin Route] Partial update of a scheduled class (reschedule, go live, end,
/// change audience).
#[utoipa::path(
    put,
    path = "/admin/classes/{id}",
    params(("id" = Uuid, Path, description = "Class ID")),
    request_body = UpdateClassRequest,
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn update_class(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClassRequest>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    match state.repo.update_class(id, payload).await {
        Some(_) => Ok(Json(ActionResult::ok())),
        None => Ok(Json(ActionResult::err("Class not found"))),
    }
}

/// delete_class
///
/// [Admin Route] Removes a class from the schedule.
#[utoipa::path(
    delete,
    path = "/admin/classes/{id}",
    params(("id" = Uuid, Path, description = "Class ID")),
    responses((status = 200, description = "Result", body = ActionResult))
)]
pub async fn delete_class(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResult>, StatusCode> {
    auth.require_admin()?;

    if state.repo.delete_class(id).await {
        Ok(Json(ActionResult::ok()))
    } else {
        Ok(Json(ActionResult::err("Class not found")))
    }
}
