use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use lms_portal::{
    AppConfig, AppState, AuthState, MockAuthService, MockRepository, RepositoryState,
    auth::{Claims, UserMetadata},
    create_router,
    models::{
        ActionResult, ApprovalStatus, Class, ClassStatus, OrgDashboardStats, Profile, Role,
        ScheduleEntry, TargetGender,
    },
    repository::Repository,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestApp {
    address: String,
    repo: Arc<MockRepository>,
    auth: Arc<MockAuthService>,
    config: AppConfig,
}

async fn spawn_app() -> TestApp {
    spawn_app_with(MockAuthService::new()).await
}

async fn spawn_app_with(auth: MockAuthService) -> TestApp {
    let repo = Arc::new(MockRepository::new());
    let auth = Arc::new(auth);
    let config = AppConfig::default();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        auth: auth.clone() as AuthState,
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        auth,
        config,
    }
}

fn make_token(config: &AppConfig, user_id: Uuid, role: &str) -> String {
    let claims = Claims {
        sub: user_id,
        email: Some("user@example.com".to_string()),
        exp: (Utc::now().timestamp() + 3600) as usize,
        user_metadata: UserMetadata {
            full_name: Some("Test User".to_string()),
            role: Some(role.to_string()),
        },
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

/// Seeds an approved admin and returns the cookie header value for them.
fn seed_admin(app: &TestApp) -> String {
    let admin_id = Uuid::new_v4();
    app.repo.insert_profile(Profile {
        id: admin_id,
        email: "admin@example.com".to_string(),
        full_name: Some("Site Admin".to_string()),
        role: Role::Admin,
        status: ApprovalStatus::Approved,
        ..Default::default()
    });
    format!(
        "sb-access-token={}",
        make_token(&app.config, admin_id, "admin")
    )
}

fn seed_teacher(app: &TestApp, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    app.repo.insert_profile(Profile {
        id,
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        full_name: Some(name.to_string()),
        role: Role::Teacher,
        status: ApprovalStatus::Approved,
        ..Default::default()
    });
    id
}

fn class_for(instructor_id: Uuid, title: &str, status: ClassStatus) -> Class {
    let start = Utc::now() + Duration::hours(2);
    Class {
        id: Uuid::new_v4(),
        title: title.to_string(),
        instructor_id,
        instructor_name: "Test Instructor".to_string(),
        description: None,
        duration: 60,
        meet_link: None,
        start_time: start,
        end_time: Some(start + Duration::hours(1)),
        status,
        target_gender: TargetGender::All,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn add_teacher_provisions_auth_user_and_approved_profile() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/admin/teachers", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "full_name": "Aisha Khan",
            "email": "aisha@example.com",
            "specialization": "Tajweed",
            "bio": "Ten years of teaching."
        }))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());

    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.message.as_deref(),
        Some("Teacher Aisha Khan added successfully.")
    );

    let created = app.auth.created_users();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].email, "aisha@example.com");
    assert_eq!(created[0].role, Role::Teacher);
    // Temporary password: ten characters, lowercase base-36.
    assert_eq!(created[0].password.len(), 10);
    assert!(
        created[0]
            .password
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    );

    let profile = app.repo.get_profile(created[0].id).await.unwrap();
    assert_eq!(profile.role, Role::Teacher);
    assert_eq!(profile.status, ApprovalStatus::Approved);
    assert_eq!(profile.specialization.as_deref(), Some("Tajweed"));
    assert!(profile.slug.unwrap().starts_with("aisha-khan-"));
}

#[tokio::test]
async fn add_teacher_reports_auth_provider_failure() {
    let app = spawn_app_with(MockAuthService::failing()).await;
    let cookie = seed_admin(&app);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/admin/teachers", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "full_name": "Aisha Khan",
            "email": "aisha@example.com",
            "specialization": "Tajweed",
            "bio": ""
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let result: ActionResult = response.json().await.unwrap();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn add_student_returns_temp_password_in_message() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/admin/members", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "full_name": "Bilal Ahmed",
            "email": "bilal@example.com"
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);

    let created = app.auth.created_users();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].role, Role::Student);
    let message = result.message.unwrap();
    assert!(message.contains("Bilal Ahmed added successfully."));
    assert!(message.contains(&format!("Password: {}", created[0].password)));

    let profile = app.repo.get_profile(created[0].id).await.unwrap();
    assert_eq!(profile.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn update_teacher_rewrites_slug_and_syncs_auth_metadata() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Old Name");
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/admin/teachers/{}", app.address, teacher_id))
        .header("Cookie", &cookie)
        .json(&json!({
            "full_name": "New Name",
            "specialization": "Fiqh",
            "bio": "Updated bio"
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);

    let profile = app.repo.get_profile(teacher_id).await.unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("New Name"));
    assert_eq!(profile.specialization.as_deref(), Some("Fiqh"));
    assert!(profile.slug.unwrap().starts_with("new-name-"));
}

#[tokio::test]
async fn update_teacher_reports_missing_profile() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/admin/teachers/{}", app.address, Uuid::new_v4()))
        .header("Cookie", &cookie)
        .json(&json!({
            "full_name": "Nobody",
            "specialization": "",
            "bio": ""
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Teacher not found"));
}

#[tokio::test]
async fn delete_teacher_refused_while_classes_are_active() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Busy Teacher");
    app.repo
        .insert_class(class_for(teacher_id, "Morning Quran Circle", ClassStatus::Upcoming));
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/admin/teachers/{}", app.address, teacher_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("Cannot delete teacher"));
    assert!(error.contains("Morning Quran Circle"));
    assert!(app.auth.deleted_users().is_empty());
}

#[tokio::test]
async fn delete_teacher_succeeds_once_classes_have_ended() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Free Teacher");
    app.repo
        .insert_class(class_for(teacher_id, "Old Class", ClassStatus::Ended));
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/admin/teachers/{}", app.address, teacher_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(app.auth.deleted_users(), vec![teacher_id]);
}

#[tokio::test]
async fn approve_and_reject_move_members_through_the_queue() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let member_id = Uuid::new_v4();
    app.repo.insert_profile(Profile {
        id: member_id,
        email: "member@example.com".to_string(),
        role: Role::Student,
        status: ApprovalStatus::Pending,
        ..Default::default()
    });
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/admin/members/{}/approve", app.address, member_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);
    assert_eq!(
        app.repo.get_profile_status(member_id).await,
        Some(ApprovalStatus::Approved)
    );

    let response = client
        .post(format!("{}/admin/members/{}/reject", app.address, member_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);
    assert_eq!(
        app.repo.get_profile_status(member_id).await,
        Some(ApprovalStatus::Rejected)
    );
}

#[tokio::test]
async fn list_members_filters_by_approval_status() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    for (name, status) in [
        ("Pending One", ApprovalStatus::Pending),
        ("Approved One", ApprovalStatus::Approved),
        ("Pending Two", ApprovalStatus::Pending),
    ] {
        app.repo.insert_profile(Profile {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name.replace(' ', ".")),
            full_name: Some(name.to_string()),
            role: Role::Student,
            status,
            ..Default::default()
        });
    }
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/admin/members?status=pending", app.address))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let members: Vec<Profile> = response.json().await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.status == ApprovalStatus::Pending));

    let response = client
        .get(format!("{}/admin/members", app.address))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let members: Vec<Profile> = response.json().await.unwrap();
    assert_eq!(members.len(), 3);
}

#[tokio::test]
async fn create_class_validates_input_and_instructor() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    let start = Utc::now() + Duration::days(1);
    let client = reqwest::Client::new();

    // Empty title.
    let response = client
        .post(format!("{}/admin/classes", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "title": "   ",
            "instructor_id": teacher_id,
            "duration": 60,
            "start_time": start
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert_eq!(result.error.as_deref(), Some("Please enter a class title"));

    // Non-positive duration.
    let response = client
        .post(format!("{}/admin/classes", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "title": "Evening Class",
            "instructor_id": teacher_id,
            "duration": 0,
            "start_time": start
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert_eq!(result.error.as_deref(), Some("Please enter a valid duration"));

    // Unknown instructor.
    let response = client
        .post(format!("{}/admin/classes", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "title": "Evening Class",
            "instructor_id": Uuid::new_v4(),
            "duration": 60,
            "start_time": start
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert_eq!(result.error.as_deref(), Some("Instructor not found"));
}

#[tokio::test]
async fn create_class_derives_end_time_and_appears_on_the_schedule() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    let start = Utc::now() + Duration::days(1);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/admin/classes", app.address))
        .header("Cookie", &cookie)
        .json(&json!({
            "title": "Evening Tafsir",
            "instructor_id": teacher_id,
            "duration": 90,
            "start_time": start,
            "meet_link": "https://meet.example.com/abc"
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.message.as_deref(),
        Some("Class \"Evening Tafsir\" scheduled.")
    );

    // Public schedule sees it, instructor email joined in.
    let response = client
        .get(format!("{}/schedule", app.address))
        .send()
        .await
        .unwrap();
    let schedule: Vec<ScheduleEntry> = response.json().await.unwrap();
    assert_eq!(schedule.len(), 1);
    let entry = &schedule[0];
    assert_eq!(entry.class.title, "Evening Tafsir");
    assert_eq!(entry.class.status, ClassStatus::Upcoming);
    assert_eq!(entry.class.instructor_name, "Ustadh Omar");
    assert_eq!(
        entry.class.end_time,
        Some(entry.class.start_time + Duration::minutes(90))
    );
    assert_eq!(
        entry.instructor_email.as_deref(),
        Some("ustadh.omar@example.com")
    );
}

#[tokio::test]
async fn update_class_applies_only_provided_fields() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    let class = class_for(teacher_id, "Original Title", ClassStatus::Upcoming);
    let class_id = class.id;
    app.repo.insert_class(class);
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/admin/classes/{}", app.address, class_id))
        .header("Cookie", &cookie)
        .json(&json!({ "status": "live" }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);

    let classes = app.repo.list_classes_for_instructor(teacher_id).await;
    assert_eq!(classes[0].status, ClassStatus::Live);
    assert_eq!(classes[0].title, "Original Title");
}

#[tokio::test]
async fn update_class_recomputes_end_time_on_reschedule() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    let class = class_for(teacher_id, "Morning Tafsir", ClassStatus::Upcoming);
    let class_id = class.id;
    let original_start = class.start_time;
    app.repo.insert_class(class);
    let client = reqwest::Client::new();

    // Stretching the duration moves the end time with it.
    let response = client
        .put(format!("{}/admin/classes/{}", app.address, class_id))
        .header("Cookie", &cookie)
        .json(&json!({ "duration": 120 }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);

    let classes = app.repo.list_classes_for_instructor(teacher_id).await;
    assert_eq!(classes[0].duration, 120);
    assert_eq!(
        classes[0].end_time,
        Some(original_start + Duration::minutes(120))
    );

    // Moving the start moves the end by the same offset, keeping the duration.
    let new_start = original_start + Duration::days(1);
    let response = client
        .put(format!("{}/admin/classes/{}", app.address, class_id))
        .header("Cookie", &cookie)
        .json(&json!({ "start_time": new_start }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);

    let classes = app.repo.list_classes_for_instructor(teacher_id).await;
    assert_eq!(classes[0].end_time, Some(new_start + Duration::minutes(120)));
}

#[tokio::test]
async fn delete_class_removes_it_from_the_schedule() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    let class = class_for(teacher_id, "Doomed Class", ClassStatus::Upcoming);
    let class_id = class.id;
    app.repo.insert_class(class);
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/admin/classes/{}", app.address, class_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success);
    assert!(app.repo.list_classes().await.is_empty());

    // Second delete: already gone.
    let response = client
        .delete(format!("{}/admin/classes/{}", app.address, class_id))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert_eq!(result.error.as_deref(), Some("Class not found"));
}

#[tokio::test]
async fn org_dashboard_aggregates_counts() {
    let app = spawn_app().await;
    let cookie = seed_admin(&app);
    let teacher_id = seed_teacher(&app, "Ustadh Omar");
    app.repo.insert_profile(Profile {
        id: Uuid::new_v4(),
        email: "pending@example.com".to_string(),
        role: Role::Student,
        status: ApprovalStatus::Pending,
        ..Default::default()
    });
    app.repo.insert_profile(Profile {
        id: Uuid::new_v4(),
        email: "approved@example.com".to_string(),
        role: Role::Student,
        status: ApprovalStatus::Approved,
        ..Default::default()
    });
    app.repo
        .insert_class(class_for(teacher_id, "Upcoming", ClassStatus::Upcoming));
    app.repo
        .insert_class(class_for(teacher_id, "Ended", ClassStatus::Ended));
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/organization/dashboard", app.address))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let stats: OrgDashboardStats = response.json().await.unwrap();
    assert_eq!(stats.total_students, 2);
    assert_eq!(stats.total_teachers, 1);
    assert_eq!(stats.pending_approvals, 1);
    assert_eq!(stats.total_classes, 2);
    assert_eq!(stats.upcoming_classes, 1);
}

#[tokio::test]
async fn sign_up_creates_a_pending_profile() {
    let app = spawn_app().await;
    let expected_id = Uuid::new_v4();
    app.auth.queue_user_id(expected_id);
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({
            "full_name": "New Student",
            "email": "new@example.com",
            "password": "chosen-password",
            "role": "student"
        }))
        .send()
        .await
        .unwrap();
    let result: ActionResult = response.json().await.unwrap();
    assert!(result.success, "{:?}", result.error);

    let profile = app.repo.get_profile(expected_id).await.unwrap();
    assert_eq!(profile.email, "new@example.com");
    assert_eq!(profile.role, Role::Student);
    assert_eq!(profile.status, ApprovalStatus::Pending);
}
