//! Account service seam and the profile's field-level update flow.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{Result, VoyagerError};
use crate::http;
use crate::types::{validate_email, AccountField, User, UserId, UserPatch};

// ---------------------------------------------------------------------------
// AccountService
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Apply `patch` and return the updated record.
    async fn update_user(&self, user_id: &UserId, patch: &UserPatch) -> Result<User>;

    /// Permanently delete the account and everything attached to it.
    async fn delete_account(&self, user_id: &UserId) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HttpAccountService
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
}

/// `AccountService` backed by the Voyager HTTP API.
#[derive(Clone)]
pub struct HttpAccountService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAccountService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: http::build_client(timeout)?,
        })
    }

    fn user_url(&self, user_id: &UserId) -> String {
        http::join_url(&self.base_url, &format!("api/user/{user_id}"))
    }

    pub async fn create_user(&self, email: &str, full_name: Option<&str>) -> Result<User> {
        let resp = self
            .client
            .post(http::join_url(&self.base_url, "api/user"))
            .json(&CreateUserBody { email, full_name })
            .send()
            .await?;
        Ok(http::check(resp).await?.json().await?)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
        let resp = self.client.get(self.user_url(user_id)).send().await?;
        Ok(http::check(resp).await?.json().await?)
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn update_user(&self, user_id: &UserId, patch: &UserPatch) -> Result<User> {
        let resp = self
            .client
            .patch(self.user_url(user_id))
            .json(patch)
            .send()
            .await?;
        Ok(http::check(resp).await?.json().await?)
    }

    async fn delete_account(&self, user_id: &UserId) -> Result<()> {
        let resp = self.client.delete(self.user_url(user_id)).send().await?;
        http::check(resp).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProfileEditor
// ---------------------------------------------------------------------------

struct EditorState {
    user: User,
    pending: HashSet<AccountField>,
    errors: HashMap<AccountField, String>,
}

/// Local copy of the signed-in user plus the in-flight bookkeeping the
/// profile controls need.
///
/// Updates are single-flight per field: while a request touching a field is
/// outstanding, another one touching it fails with `UpdateInFlight`. A
/// failed update leaves the local user untouched and records the message
/// under each field of the patch until the next attempt on that field. A
/// successful one copies back only the fields it patched.
pub struct ProfileEditor {
    account: Arc<dyn AccountService>,
    state: Mutex<EditorState>,
    updates: watch::Sender<User>,
}

impl ProfileEditor {
    pub fn new(account: Arc<dyn AccountService>, user: User) -> Self {
        let (updates, _) = watch::channel(user.clone());
        Self {
            account,
            state: Mutex::new(EditorState {
                user,
                pending: HashSet::new(),
                errors: HashMap::new(),
            }),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn user(&self) -> User {
        self.lock().user.clone()
    }

    /// Receives every user record that replaced the local copy.
    pub fn subscribe(&self) -> watch::Receiver<User> {
        self.updates.subscribe()
    }

    pub fn is_pending(&self, field: AccountField) -> bool {
        self.lock().pending.contains(&field)
    }

    pub fn last_error(&self, field: AccountField) -> Option<String> {
        self.lock().errors.get(&field).cloned()
    }

    pub async fn update_email(&self, email: &str) -> Result<User> {
        let email = email.trim();
        if let Err(e) = validate_email(email) {
            self.lock().errors.insert(AccountField::Email, e.to_string());
            return Err(e);
        }
        self.update_field(UserPatch::email(email)).await
    }

    pub async fn set_newsletter(&self, subscribed: bool) -> Result<User> {
        self.update_field(UserPatch::newsletter(subscribed)).await
    }

    pub async fn update_field(&self, patch: UserPatch) -> Result<User> {
        let fields = patch.fields();
        if fields.is_empty() {
            return Err(VoyagerError::InvalidPatch("no fields to update".into()));
        }

        let user_id = {
            let mut state = self.lock();
            if let Some(busy) = fields.iter().find(|f| state.pending.contains(*f)) {
                return Err(VoyagerError::UpdateInFlight(*busy));
            }
            for field in &fields {
                state.pending.insert(*field);
                state.errors.remove(field);
            }
            state.user.id.clone()
        };
        let _guard = PendingGuard {
            editor: self,
            fields: &fields,
        };

        match self.account.update_user(&user_id, &patch).await {
            Ok(remote) => {
                let merged = {
                    let mut state = self.lock();
                    merge_fields(&mut state.user, &remote, &fields);
                    state.user.clone()
                };
                self.updates.send_replace(merged.clone());
                tracing::debug!(user = %user_id, fields = ?fields, "account updated");
                Ok(merged)
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "account update failed");
                let mut state = self.lock();
                for field in &fields {
                    state.errors.insert(*field, e.to_string());
                }
                Err(e)
            }
        }
    }
}

/// Copy only `fields` from the server's record. A response that lands after
/// a newer update to another field must not roll that field back.
fn merge_fields(local: &mut User, remote: &User, fields: &[AccountField]) {
    for field in fields {
        match field {
            AccountField::Email => local.email = remote.email.clone(),
            AccountField::FullName => local.full_name = remote.full_name.clone(),
            AccountField::Newsletter => local.newsletter = remote.newsletter,
        }
    }
    local.updated_at = local.updated_at.max(remote.updated_at);
}

/// Clears the pending marks even if the update future is dropped mid-flight.
struct PendingGuard<'a> {
    editor: &'a ProfileEditor,
    fields: &'a [AccountField],
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.editor.lock();
        for field in self.fields {
            state.pending.remove(field);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
