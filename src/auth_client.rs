use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::Role;

// 1. AuthService Contract

/// AuthService
///
/// Defines the abstract contract for the external auth collaborator's admin API
/// (user create/update/delete). Session *validation* is not part of this trait —
/// it is local JWT decoding, see `auth::resolve_session`.
///
/// This trait allows us to swap the concrete implementation — the real Supabase
/// REST client in production and the in-memory Mock during testing — without
/// affecting the calling handlers.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an auth user with a pre-confirmed email, bypassing the normal
    /// verification mail. Used both for self sign-up and for admin provisioning
    /// (where the password is a generated temporary one).
    ///
    /// Returns the new user's canonical UUID on success, or a human-readable
    /// error message the caller can surface in an ActionResult.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<Uuid, String>;

    /// Updates the metadata blob (display name, role tag) on an existing auth user.
    async fn update_user(&self, id: Uuid, full_name: &str, role: Role) -> Result<(), String>;

    /// Deletes an auth user. The profiles row is removed by the database's
    /// ON DELETE CASCADE, so callers need no separate profile cleanup.
    async fn delete_user(&self, id: Uuid) -> Result<(), String>;
}

/// AuthState
///
/// The concrete type used to share the auth collaborator across the application state.
pub type AuthState = Arc<dyn AuthService>;

// 2. The Real Implementation (Supabase Admin REST API)

/// SupabaseAuthClient
///
/// Concrete implementation calling the provider's `/auth/v1/admin/users` endpoints
/// with the service-role key. All failures are flattened to message strings: the
/// handlers report them in structured action results rather than propagating faults.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

/// Minimal struct to deserialize the admin create-user response, capturing the
/// newly created user's UUID.
#[derive(Deserialize)]
struct CreatedUserResponse {
    id: Uuid,
}

impl SupabaseAuthClient {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn admin_users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<Uuid, String> {
        let response = self
            .http
            .post(self.admin_users_url())
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                // Bypasses email confirmation for admin-created accounts.
                "email_confirm": true,
                "user_metadata": {
                    "full_name": full_name,
                    "role": role.to_string(),
                },
            }))
            .send()
            .await
            .map_err(|e| format!("auth service unreachable: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "auth create_user failed");
            return Err(format!("auth provider rejected user creation ({})", status));
        }

        let created = response
            .json::<CreatedUserResponse>()
            .await
            .map_err(|e| format!("unexpected auth provider response: {}", e))?;

        Ok(created.id)
    }

    async fn update_user(&self, id: Uuid, full_name: &str, role: Role) -> Result<(), String> {
        let response = self
            .http
            .put(format!("{}/{}", self.admin_users_url(), id))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({
                "user_metadata": {
                    "full_name": full_name,
                    "role": role.to_string(),
                },
            }))
            .send()
            .await
            .map_err(|e| format!("auth service unreachable: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "auth update_user failed");
            return Err(format!("auth provider rejected user update ({})", status));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), String> {
        let response = self
            .http
            .delete(format!("{}/{}", self.admin_users_url(), id))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| format!("auth service unreachable: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "auth delete_user failed");
            return Err(format!("auth provider rejected user deletion ({})", status));
        }
        Ok(())
    }
}

// 3. The Mock Implementation (Testing)

/// Record of a user created through the mock, for assertions.
#[derive(Debug, Clone)]
pub struct MockCreatedUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// MockAuthService
///
/// In-memory stand-in for the auth collaborator. Records every admin call so tests
/// can assert on the provisioning flow (temporary password shape, metadata role).
/// `queue_user_id` lets a test predetermine the UUID the next create call returns,
/// mirroring how the real provider's trigger-created profile row shares the auth id.
#[derive(Default)]
pub struct MockAuthService {
    created: Mutex<Vec<MockCreatedUser>>,
    deleted: Mutex<Vec<Uuid>>,
    queued_ids: Mutex<Vec<Uuid>>,
    fail: bool,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that refuses every call, for failure-path testing.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queue_user_id(&self, id: Uuid) {
        self.queued_ids.lock().unwrap().push(id);
    }

    pub fn created_users(&self) -> Vec<MockCreatedUser> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted_users(&self) -> Vec<Uuid> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<Uuid, String> {
        if self.fail {
            return Err("auth service unavailable".to_string());
        }
        let id = self
            .queued_ids
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(Uuid::new_v4);
        self.created.lock().unwrap().push(MockCreatedUser {
            id,
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            role,
        });
        Ok(id)
    }

    async fn update_user(&self, _id: Uuid, _full_name: &str, _role: Role) -> Result<(), String> {
        if self.fail {
            return Err("auth service unavailable".to_string());
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), String> {
        if self.fail {
            return Err("auth service unavailable".to_string());
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}
