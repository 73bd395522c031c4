use crate::models::{
    ApprovalStatus, Class, ClassStatus, NewClass, OrgDashboardStats, Profile, Role, ScheduleEntry,
    TeacherProfileUpdate, UpdateClassRequest,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations against the external
/// data collaborator. This is the core of the Repository Abstraction pattern, allowing
/// the gate and the handlers to interact with the data layer without knowing the
/// specific implementation (Postgres, Mock, etc.).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable and usable across Axum's asynchronous
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> Option<Profile>;

    /// Status-only lookup used by the access gate. Resolves to `None` both when the
    /// row is missing and when the query fails; callers treat `None` as non-approved.
    async fn get_profile_status(&self, id: Uuid) -> Option<ApprovalStatus>;

    /// Lists profiles of one role, optionally narrowed by approval status.
    async fn list_profiles(&self, role: Role, status: Option<ApprovalStatus>) -> Vec<Profile>;

    /// Insert-or-update used by admin provisioning. The auth provider's trigger
    /// normally creates the row; the upsert also covers the gap when it has not
    /// fired yet (or is absent in a local stack).
    async fn upsert_profile(&self, profile: Profile) -> bool;

    /// Edit of an existing teacher profile. Returns false when no row matched.
    async fn update_teacher_profile(&self, id: Uuid, update: TeacherProfileUpdate) -> bool;

    async fn set_member_name(&self, id: Uuid, full_name: String) -> bool;
    async fn set_profile_status(&self, id: Uuid, status: ApprovalStatus) -> bool;

    // --- Classes ---
    /// Full schedule, instructor email joined, ordered by start time.
    async fn list_classes(&self) -> Vec<ScheduleEntry>;
    async fn list_upcoming_classes(&self) -> Vec<Class>;
    async fn list_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class>;

    /// Classes in status upcoming or live, used to guard teacher deletion.
    async fn active_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class>;

    async fn create_class(&self, new: NewClass) -> Option<Class>;
    async fn update_class(&self, id: Uuid, req: UpdateClassRequest) -> Option<Class>;
    async fn delete_class(&self, id: Uuid) -> bool;

    // --- Dashboard ---
    async fn get_stats(&self) -> OrgDashboardStats;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const PROFILE_COLUMNS: &str =
    "id, email, full_name, role, status, specialization, bio, slug, created_at";
const CLASS_COLUMNS: &str = "id, title, instructor_id, instructor_name, description, duration, \
     meet_link, start_time, end_time, status, target_gender, created_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL
/// database behind the external data collaborator. Uses the runtime query API so the
/// crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_profile
    ///
    /// Retrieves the full profile record needed for authentication and the admin views.
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_profile error: {:?}", e);
            None
        })
    }

    /// get_profile_status
    ///
    /// The gate's single conditional lookup. **Fail-closed**: a query error is logged
    /// and reported as `None`, which the gate treats exactly like a missing row.
    async fn get_profile_status(&self, id: Uuid) -> Option<ApprovalStatus> {
        sqlx::query_scalar::<_, ApprovalStatus>("SELECT status FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_profile_status error: {:?}", e);
                None
            })
    }

    /// list_profiles
    ///
    /// Implements the role/status filtering using QueryBuilder for safe parameterization.
    async fn list_profiles(&self, role: Role, status: Option<ApprovalStatus>) -> Vec<Profile> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE role = "
        ));
        builder.push_bind(role);

        if let Some(s) = status {
            builder.push(" AND status = ");
            builder.push_bind(s);
        }

        builder.push(" ORDER BY full_name ASC");

        match builder.build_query_as::<Profile>().fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("list_profiles error: {:?}", e);
                vec![]
            }
        }
    }

    /// upsert_profile
    ///
    /// Inserts the provisioning result or overwrites the trigger-created row with the
    /// admin-supplied fields (name, role fields, approval status).
    async fn upsert_profile(&self, profile: Profile) -> bool {
        let result = sqlx::query(
            r#"
            INSERT INTO profiles (id, email, full_name, role, status, specialization, bio, slug, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                role = EXCLUDED.role,
                status = EXCLUDED.status,
                specialization = EXCLUDED.specialization,
                bio = EXCLUDED.bio,
                slug = EXCLUDED.slug
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(profile.role)
        .bind(profile.status)
        .bind(&profile.specialization)
        .bind(&profile.bio)
        .bind(&profile.slug)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("upsert_profile error: {:?}", e);
                false
            }
        }
    }

    /// update_teacher_profile
    ///
    /// Edit-only path: never creates a row. `status` applies only when populated
    /// (initial provisioning auto-approves, later edits leave it untouched).
    async fn update_teacher_profile(&self, id: Uuid, update: TeacherProfileUpdate) -> bool {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET full_name = $2,
                specialization = $3,
                bio = $4,
                slug = $5,
                status = COALESCE($6, status)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.specialization)
        .bind(&update.bio)
        .bind(&update.slug)
        .bind(update.status)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("update_teacher_profile error: {:?}", e);
                false
            }
        }
    }

    async fn set_member_name(&self, id: Uuid, full_name: String) -> bool {
        let result = sqlx::query("UPDATE profiles SET full_name = $2 WHERE id = $1")
            .bind(id)
            .bind(full_name)
            .execute(&self.pool)
            .await;
        match result {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_member_name error: {:?}", e);
                false
            }
        }
    }

    async fn set_profile_status(&self, id: Uuid, status: ApprovalStatus) -> bool {
        let result = sqlx::query("UPDATE profiles SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await;
        match result {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_profile_status error: {:?}", e);
                false
            }
        }
    }

    /// list_classes
    ///
    /// The public schedule: every class with the instructor's email joined in via the
    /// single permitted FK lookup, ordered chronologically.
    async fn list_classes(&self) -> Vec<ScheduleEntry> {
        let query = r#"
            SELECT
                c.id, c.title, c.instructor_id, c.instructor_name, c.description,
                c.duration, c.meet_link, c.start_time, c.end_time, c.status,
                c.target_gender, c.created_at,
                p.email AS instructor_email
            FROM classes c
            LEFT JOIN profiles p ON c.instructor_id = p.id
            ORDER BY c.start_time ASC
        "#;

        sqlx::query_as::<_, ScheduleEntry>(query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_classes error: {:?}", e);
                vec![]
            })
    }

    async fn list_upcoming_classes(&self) -> Vec<Class> {
        sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE status = $1 ORDER BY start_time ASC"
        ))
        .bind(ClassStatus::Upcoming)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_upcoming_classes error: {:?}", e);
            vec![]
        })
    }

    async fn list_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class> {
        sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes WHERE instructor_id = $1 ORDER BY start_time ASC"
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_classes_for_instructor error: {:?}", e);
            vec![]
        })
    }

    async fn active_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class> {
        sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS} FROM classes \
             WHERE instructor_id = $1 AND status IN ($2, $3) ORDER BY start_time ASC"
        ))
        .bind(instructor_id)
        .bind(ClassStatus::Upcoming)
        .bind(ClassStatus::Live)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("active_classes_for_instructor error: {:?}", e);
            vec![]
        })
    }

    /// create_class
    ///
    /// Inserts a new class in status `upcoming`. The caller has already resolved the
    /// instructor name and computed the end time.
    async fn create_class(&self, new: NewClass) -> Option<Class> {
        let query = format!(
            "INSERT INTO classes ({CLASS_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW()) \
             RETURNING {CLASS_COLUMNS}"
        );

        sqlx::query_as::<_, Class>(&query)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(new.instructor_id)
            .bind(&new.instructor_name)
            .bind(&new.description)
            .bind(new.duration)
            .bind(&new.meet_link)
            .bind(new.start_time)
            .bind(new.end_time)
            .bind(ClassStatus::Upcoming)
            .bind(new.target_gender)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("create_class error: {:?}", e);
                None
            })
    }

    /// update_class
    ///
    /// Uses the PostgreSQL `COALESCE` function to efficiently handle `Option<T>` fields,
    /// only updating a column if the corresponding field in `req` is `Some`. `end_time`
    /// is always rederived from the effective start time and duration, so a reschedule
    /// never leaves it describing the old slot.
    async fn update_class(&self, id: Uuid, req: UpdateClassRequest) -> Option<Class> {
        let query = format!(
            r#"
            UPDATE classes
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                duration = COALESCE($4, duration),
                meet_link = COALESCE($5, meet_link),
                start_time = COALESCE($6, start_time),
                status = COALESCE($7, status),
                target_gender = COALESCE($8, target_gender),
                end_time = COALESCE($6, start_time)
                    + COALESCE($4, duration) * interval '1 minute'
            WHERE id = $1
            RETURNING {CLASS_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Class>(&query)
            .bind(id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.duration)
            .bind(req.meet_link)
            .bind(req.start_time)
            .bind(req.status)
            .bind(req.target_gender)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("update_class error: {:?}", e);
                None
            })
    }

    async fn delete_class(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_class error: {:?}", e);
                false
            }
        }
    }

    /// get_stats
    ///
    /// Compiles all counters for the organization dashboard in a single call.
    async fn get_stats(&self) -> OrgDashboardStats {
        let log_zero = |e: sqlx::Error| {
            tracing::error!("get_stats error: {:?}", e);
            0
        };

        let total_students =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE role = $1")
                .bind(Role::Student)
                .fetch_one(&self.pool)
                .await
                .unwrap_or_else(log_zero);

        let total_teachers =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE role = $1")
                .bind(Role::Teacher)
                .fetch_one(&self.pool)
                .await
                .unwrap_or_else(log_zero);

        let pending_approvals =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE status = $1")
                .bind(ApprovalStatus::Pending)
                .fetch_one(&self.pool)
                .await
                .unwrap_or_else(log_zero);

        let total_classes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM classes")
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(log_zero);

        let upcoming_classes =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM classes WHERE status = $1")
                .bind(ClassStatus::Upcoming)
                .fetch_one(&self.pool)
                .await
                .unwrap_or_else(log_zero);

        OrgDashboardStats {
            total_students,
            total_teachers,
            pending_approvals,
            total_classes,
            upcoming_classes,
        }
    }
}

/// MockRepository
///
/// In-memory implementation used by the gate's unit tests and the integration suites.
/// Mirrors the Postgres semantics closely enough to exercise every handler without a
/// live database. The `failing()` variant makes profile lookups behave like a
/// database outage: queries resolve to `None` even when the row exists, matching
/// the Postgres implementation's logged-and-swallowed query errors.
#[derive(Default)]
pub struct MockRepository {
    profiles: Mutex<HashMap<Uuid, Profile>>,
    classes: Mutex<Vec<Class>>,
    fail_lookups: bool,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose profile lookups all fail, for fail-closed testing.
    pub fn failing() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    pub fn insert_class(&self, class: Class) {
        self.classes.lock().unwrap().push(class);
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        if self.fail_lookups {
            return None;
        }
        self.profiles.lock().unwrap().get(&id).cloned()
    }

    async fn get_profile_status(&self, id: Uuid) -> Option<ApprovalStatus> {
        if self.fail_lookups {
            return None;
        }
        self.profiles.lock().unwrap().get(&id).map(|p| p.status)
    }

    async fn list_profiles(&self, role: Role, status: Option<ApprovalStatus>) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self
            .profiles
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.role == role && status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        profiles
    }

    async fn upsert_profile(&self, profile: Profile) -> bool {
        self.profiles.lock().unwrap().insert(profile.id, profile);
        true
    }

    async fn update_teacher_profile(&self, id: Uuid, update: TeacherProfileUpdate) -> bool {
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.get_mut(&id) {
            Some(p) => {
                p.full_name = Some(update.full_name);
                p.specialization = Some(update.specialization);
                p.bio = Some(update.bio);
                p.slug = Some(update.slug);
                if let Some(status) = update.status {
                    p.status = status;
                }
                true
            }
            None => false,
        }
    }

    async fn set_member_name(&self, id: Uuid, full_name: String) -> bool {
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.get_mut(&id) {
            Some(p) => {
                p.full_name = Some(full_name);
                true
            }
            None => false,
        }
    }

    async fn set_profile_status(&self, id: Uuid, status: ApprovalStatus) -> bool {
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.get_mut(&id) {
            Some(p) => {
                p.status = status;
                true
            }
            None => false,
        }
    }

    async fn list_classes(&self) -> Vec<ScheduleEntry> {
        let profiles = self.profiles.lock().unwrap();
        let mut classes = self.classes.lock().unwrap().clone();
        classes.sort_by_key(|c| c.start_time);
        classes
            .into_iter()
            .map(|class| {
                let instructor_email =
                    profiles.get(&class.instructor_id).map(|p| p.email.clone());
                ScheduleEntry {
                    class,
                    instructor_email,
                }
            })
            .collect()
    }

    async fn list_upcoming_classes(&self) -> Vec<Class> {
        let mut classes: Vec<Class> = self
            .classes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.status == ClassStatus::Upcoming)
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.start_time);
        classes
    }

    async fn list_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class> {
        let mut classes: Vec<Class> = self
            .classes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect();
        classes.sort_by_key(|c| c.start_time);
        classes
    }

    async fn active_classes_for_instructor(&self, instructor_id: Uuid) -> Vec<Class> {
        self.classes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                c.instructor_id == instructor_id
                    && matches!(c.status, ClassStatus::Upcoming | ClassStatus::Live)
            })
            .cloned()
            .collect()
    }

    async fn create_class(&self, new: NewClass) -> Option<Class> {
        let class = Class {
            id: Uuid::new_v4(),
            title: new.title,
            instructor_id: new.instructor_id,
            instructor_name: new.instructor_name,
            description: new.description,
            duration: new.duration,
            meet_link: new.meet_link,
            start_time: new.start_time,
            end_time: Some(new.end_time),
            status: ClassStatus::Upcoming,
            target_gender: new.target_gender,
            created_at: Utc::now(),
        };
        self.classes.lock().unwrap().push(class.clone());
        Some(class)
    }

    async fn update_class(&self, id: Uuid, req: UpdateClassRequest) -> Option<Class> {
        let mut classes = self.classes.lock().unwrap();
        let class = classes.iter_mut().find(|c| c.id == id)?;
        if let Some(title) = req.title {
            class.title = title;
        }
        if let Some(description) = req.description {
            class.description = Some(description);
        }
        if let Some(duration) = req.duration {
            class.duration = duration;
        }
        if let Some(meet_link) = req.meet_link {
            class.meet_link = Some(meet_link);
        }
        if let Some(start_time) = req.start_time {
            class.start_time = start_time;
        }
        if let Some(status) = req.status {
            class.status = status;
        }
        if let Some(target_gender) = req.target_gender {
            class.target_gender = target_gender;
        }
        // Mirrors the SQL: end_time always follows the effective schedule.
        class.end_time = Some(class.start_time + Duration::minutes(class.duration as i64));
        Some(class.clone())
    }

    async fn delete_class(&self, id: Uuid) -> bool {
        let mut classes = self.classes.lock().unwrap();
        let before = classes.len();
        classes.retain(|c| c.id != id);
        classes.len() < before
    }

    async fn get_stats(&self) -> OrgDashboardStats {
        let profiles = self.profiles.lock().unwrap();
        let classes = self.classes.lock().unwrap();
        OrgDashboardStats {
            total_students: profiles.values().filter(|p| p.role == Role::Student).count() as i64,
            total_teachers: profiles.values().filter(|p| p.role == Role::Teacher).count() as i64,
            pending_approvals: profiles
                .values()
                .filter(|p| p.status == ApprovalStatus::Pending)
                .count() as i64,
            total_classes: classes.len() as i64,
            upcoming_classes: classes
                .iter()
                .filter(|c| c.status == ClassStatus::Upcoming)
                .count() as i64,
        }
    }
}
