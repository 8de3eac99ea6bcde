use crate::model::{NewTask, Status, TaskDraft, TaskId, User};
use crate::remote::{Backend, RemoteError, Session, TaskBackend};
use crate::store::TaskStore;
use tracing::debug;

/// Binds the remote backend to the local [`TaskStore`] for the signed-in
/// user. Every mutation is a remote call followed by a full reload.
pub struct Tracker {
    backend: Box<dyn Backend>,
    store: TaskStore,
    user: Option<User>,
}

impl Tracker {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Tracker {
            backend,
            store: TaskStore::new(),
            user: None,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Switches to another session. The list is dropped so nothing of the
    /// previous user stays visible.
    pub fn set_session(&mut self, session: Option<&Session>) {
        self.backend.use_session(session);
        self.user = session.map(|s| s.user.clone());
        self.store.clear();
    }

    /// Installs refreshed tokens for the same user. The list and its
    /// notified flags are kept.
    pub fn renew_session(&mut self, session: &Session) {
        self.backend.use_session(Some(session));
    }

    fn owner(&self) -> Result<&str, RemoteError> {
        self.user
            .as_ref()
            .map(|u| u.id.as_str())
            .ok_or(RemoteError::NotSignedIn)
    }

    pub fn reload(&mut self) -> Result<(), RemoteError> {
        let owner = self.owner()?.to_string();
        let tasks = self.backend.list_tasks(&owner)?;
        debug!(count = tasks.len(), "reloaded tasks");
        self.store.replace_all(tasks);
        Ok(())
    }

    pub fn create(&mut self, draft: TaskDraft) -> Result<TaskId, RemoteError> {
        let task = NewTask::from_draft(draft, self.owner()?);
        let id = self.backend.insert_task(&task)?;
        self.reload()?;
        Ok(id)
    }

    pub fn set_status(&mut self, id: &TaskId, status: Status) -> Result<(), RemoteError> {
        let owner = self.owner()?.to_string();
        self.backend.update_task_status(id, &owner, status)?;
        self.reload()
    }

    pub fn delete(&mut self, id: &TaskId) -> Result<(), RemoteError> {
        let owner = self.owner()?.to_string();
        self.backend.delete_task(id, &owner)?;
        self.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::TaskForm;
    use crate::remote::MemoryBackend;

    fn signed_in() -> Tracker {
        let backend = MemoryBackend::new();
        let session = backend.open_session(User {
            id: "u-1".into(),
            email: None,
        });
        let mut tracker = Tracker::new(Box::new(backend));
        tracker.set_session(Some(&session));
        tracker
    }

    fn draft(title: &str) -> TaskDraft {
        let mut form = TaskForm {
            title: title.into(),
            date: "2024-06-11".into(),
            lead_days: Some(3),
            ..TaskForm::default()
        };
        form.submit().unwrap()
    }

    #[test]
    fn create_inserts_then_reloads_with_reminder() {
        let mut tracker = signed_in();
        let id = tracker.create(draft("Prepare Report")).unwrap();
        let task = &tracker.store().tasks()[0];
        assert_eq!(task.id, id);
        assert_eq!(task.title, "Prepare Report");
        assert_eq!(task.owner, "u-1");
        assert_eq!(task.status, Status::Todo);
        let expected = crate::reminder::reminder_timestamp(task.date, Some(3));
        assert_eq!(task.reminder_at, expected);
        assert!(!task.notified);
    }

    #[test]
    fn status_change_and_delete_reload_the_list() {
        let mut tracker = signed_in();
        let id = tracker.create(draft("a")).unwrap();
        let created = tracker.store().get(&id).unwrap().clone();
        assert!(created.reminder_at.is_some());
        tracker.set_status(&id, Status::Doing).unwrap();
        let moved = tracker.store().get(&id).unwrap();
        assert_eq!(moved.status, Status::Doing);
        assert_eq!(moved.reminder_at, created.reminder_at);
        assert_eq!(moved.lead_days, created.lead_days);
        tracker.delete(&id).unwrap();
        assert!(tracker.store().is_empty());
    }

    #[test]
    fn failed_call_leaves_the_list_stale() {
        let mut tracker = signed_in();
        tracker.create(draft("a")).unwrap();
        let missing = TaskId::new("missing");
        assert!(tracker.set_status(&missing, Status::Done).is_err());
        assert_eq!(tracker.store().len(), 1);
    }

    #[test]
    fn session_change_clears_and_requires_sign_in() {
        let mut tracker = signed_in();
        tracker.create(draft("a")).unwrap();
        tracker.set_session(None);
        assert!(tracker.store().is_empty());
        assert!(matches!(tracker.reload(), Err(RemoteError::NotSignedIn)));
        assert!(matches!(
            tracker.create(draft("b")),
            Err(RemoteError::NotSignedIn)
        ));
    }
}
