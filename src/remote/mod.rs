//! Hosted backend seam: passwordless auth and owner-scoped task rows.

mod memory;
mod supabase;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;

use crate::model::{NewTask, OwnerId, Status, Task, TaskId, User};
use crate::storage::SessionLocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid or expired code for {0}")]
    InvalidCode(String),
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Row-level task persistence, always filtered by owner.
pub trait TaskBackend {
    /// Owner's tasks, newest first.
    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, RemoteError>;
    /// Returns the id the backend assigned.
    fn insert_task(&self, task: &NewTask) -> Result<TaskId, RemoteError>;
    fn update_task_status(
        &self,
        id: &TaskId,
        owner: &str,
        status: Status,
    ) -> Result<(), RemoteError>;
    fn delete_task(&self, id: &TaskId, owner: &str) -> Result<(), RemoteError>;

    /// Credentials for subsequent row requests.
    fn use_session(&mut self, _session: Option<&Session>) {}
}

/// Email one-time-code sign-in.
pub trait AuthBackend {
    fn request_code(&self, email: &str) -> Result<(), RemoteError>;
    fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError>;
    fn refresh(&self, session: &Session) -> Result<Session, RemoteError>;
    fn fetch_user(&self, session: &Session) -> Result<User, RemoteError>;
    fn sign_out(&self, session: &Session) -> Result<(), RemoteError>;
}

pub trait Backend: TaskBackend + AuthBackend {}

impl<T: TaskBackend + AuthBackend> Backend for T {}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
}

type AuthListener = Box<dyn FnMut(&AuthEvent)>;

/// Current session plus the subscribers told about every change.
/// When a cache location is set, the session is mirrored to disk.
#[derive(Default)]
pub struct AuthState {
    session: Option<Session>,
    listeners: Vec<AuthListener>,
    cache: Option<SessionLocation>,
}

impl AuthState {
    pub fn new(session: Option<Session>) -> Self {
        AuthState {
            session,
            listeners: Vec::new(),
            cache: None,
        }
    }

    /// Restores the cached session, if any.
    pub fn load(cache: SessionLocation) -> anyhow::Result<Self> {
        let session = crate::storage::load_session(&cache)?;
        Ok(AuthState {
            session,
            listeners: Vec::new(),
            cache: Some(cache),
        })
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn owner_id(&self) -> Option<&OwnerId> {
        self.current_user().map(|u| &u.id)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn on_auth_change(&mut self, listener: impl FnMut(&AuthEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn sign_in(&mut self, session: Session) {
        let user = session.user.clone();
        self.session = Some(session);
        self.persist();
        info!(user = %user.id, "signed in");
        self.emit(AuthEvent::SignedIn(user));
    }

    /// Swaps tokens for the same user without notifying subscribers.
    pub fn replace_tokens(&mut self, session: Session) {
        self.session = Some(session);
        self.persist();
    }

    pub fn sign_out(&mut self) -> Option<Session> {
        let previous = self.session.take();
        if previous.is_some() {
            self.persist();
            info!("signed out");
            self.emit(AuthEvent::SignedOut);
        }
        previous
    }

    fn emit(&mut self, event: AuthEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let result = match &self.session {
            Some(session) => crate::storage::save_session(cache, session),
            None => crate::storage::clear_session(cache),
        };
        if let Err(err) = result {
            warn!(error = %err, path = %cache.path.display(), "could not update session cache");
        }
    }
}
