use super::{AuthBackend, RemoteError, Session, TaskBackend};
use crate::model::{NewTask, Status, Task, TaskId, User};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use std::cell::RefCell;
use std::collections::HashMap;

/// Backend kept in process memory, for offline use and tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RefCell<Vec<Task>>,
    codes: RefCell<HashMap<String, String>>,
    sessions: RefCell<HashMap<String, User>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code most recently mailed to `email`.
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.codes.borrow().get(email).cloned()
    }

    /// Issues a session without the email round trip.
    pub fn open_session(&self, user: User) -> Session {
        let token = random_string(24);
        self.sessions.borrow_mut().insert(token.clone(), user.clone());
        Session {
            access_token: token,
            refresh_token: Some(random_string(24)),
            expires_at: None,
            user,
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

impl TaskBackend for MemoryBackend {
    fn list_tasks(&self, owner: &str) -> Result<Vec<Task>, RemoteError> {
        let mut tasks: Vec<Task> = self
            .rows
            .borrow()
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect();
        tasks.reverse();
        Ok(tasks)
    }

    fn insert_task(&self, task: &NewTask) -> Result<TaskId, RemoteError> {
        let id = TaskId::new(random_string(6));
        self.rows
            .borrow_mut()
            .push(task.clone().into_task(id.clone(), Utc::now()));
        Ok(id)
    }

    fn update_task_status(
        &self,
        id: &TaskId,
        owner: &str,
        status: Status,
    ) -> Result<(), RemoteError> {
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|t| &t.id == id && t.owner == owner)
            .ok_or_else(|| RemoteError::TaskNotFound(id.clone()))?;
        row.status = status;
        Ok(())
    }

    fn delete_task(&self, id: &TaskId, owner: &str) -> Result<(), RemoteError> {
        let mut rows = self.rows.borrow_mut();
        let before = rows.len();
        rows.retain(|t| !(&t.id == id && t.owner == owner));
        if rows.len() == before {
            return Err(RemoteError::TaskNotFound(id.clone()));
        }
        Ok(())
    }
}

impl AuthBackend for MemoryBackend {
    fn request_code(&self, email: &str) -> Result<(), RemoteError> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.codes.borrow_mut().insert(email.to_string(), code);
        Ok(())
    }

    fn verify_code(&self, email: &str, code: &str) -> Result<Session, RemoteError> {
        let expected = self.codes.borrow_mut().remove(email);
        if expected.as_deref() != Some(code.trim()) {
            return Err(RemoteError::InvalidCode(email.to_string()));
        }
        Ok(self.open_session(User {
            id: format!("user-{}", email.to_lowercase()),
            email: Some(email.to_string()),
        }))
    }

    fn refresh(&self, session: &Session) -> Result<Session, RemoteError> {
        let user = self.fetch_user(session)?;
        self.sessions.borrow_mut().remove(&session.access_token);
        Ok(self.open_session(user))
    }

    fn fetch_user(&self, session: &Session) -> Result<User, RemoteError> {
        self.sessions
            .borrow()
            .get(&session.access_token)
            .cloned()
            .ok_or(RemoteError::NotSignedIn)
    }

    fn sign_out(&self, session: &Session) -> Result<(), RemoteError> {
        self.sessions.borrow_mut().remove(&session.access_token);
        Ok(())
    }
}
