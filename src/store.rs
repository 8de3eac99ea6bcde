use crate::model::{Task, TaskId};
use std::collections::HashSet;

/// In-memory task list shared by the board and the reminder poller.
///
/// Reloads own every remote column; the notified flag is owned by the
/// poller and survives reloads for ids that are still present.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    notified: HashSet<TaskId>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Replaces the list with a fresh remote read, keeping remote order.
    pub fn replace_all(&mut self, mut tasks: Vec<Task>) {
        let present: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
        self.notified.retain(|id| present.contains(id));
        for task in tasks.iter_mut() {
            if task.notified {
                self.notified.insert(task.id.clone());
            } else if self.notified.contains(&task.id) {
                task.notified = true;
            }
        }
        self.tasks = tasks;
    }

    /// Raises the notified flag. Returns `false` when it was already set or
    /// the task is unknown, so callers fire at most once per task.
    pub fn mark_notified(&mut self, id: &TaskId) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        if task.notified {
            return false;
        }
        task.notified = true;
        self.notified.insert(id.clone());
        true
    }

    /// Drops everything, e.g. when the signed-in user changes.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.notified.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTask, TaskDraft};
    use chrono::{NaiveDate, Utc};

    fn task(id: &str) -> Task {
        let draft = TaskDraft {
            title: format!("task {}", id),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            time: None,
            lead_days: Some(1),
            priority: Default::default(),
            importance: Default::default(),
            urgent: false,
            recurrence: Default::default(),
        };
        NewTask::from_draft(draft, "u-1").into_task(TaskId::new(id), Utc::now())
    }

    #[test]
    fn mark_notified_fires_once() {
        let mut store = TaskStore::new();
        store.replace_all(vec![task("1")]);
        let id = TaskId::new("1");
        assert!(store.mark_notified(&id));
        assert!(!store.mark_notified(&id));
        assert!(store.get(&id).unwrap().notified);
        assert!(!store.mark_notified(&TaskId::new("missing")));
    }

    #[test]
    fn reload_keeps_locally_raised_flag() {
        let mut store = TaskStore::new();
        store.replace_all(vec![task("1"), task("2")]);
        store.mark_notified(&TaskId::new("1"));

        let mut reloaded = vec![task("2"), task("1")];
        reloaded[1].title = "renamed".into();
        store.replace_all(reloaded);

        let first = store.get(&TaskId::new("1")).unwrap();
        assert!(first.notified);
        assert_eq!(first.title, "renamed");
        assert!(!store.get(&TaskId::new("2")).unwrap().notified);
        assert_eq!(store.tasks()[0].id, TaskId::new("2"));
    }

    #[test]
    fn deleted_task_forgets_its_flag() {
        let mut store = TaskStore::new();
        store.replace_all(vec![task("1")]);
        store.mark_notified(&TaskId::new("1"));
        store.replace_all(vec![]);
        store.replace_all(vec![task("1")]);
        assert!(!store.get(&TaskId::new("1")).unwrap().notified);
    }

    #[test]
    fn clear_empties_the_list() {
        let mut store = TaskStore::new();
        store.replace_all(vec![task("1")]);
        store.clear();
        assert!(store.is_empty());
    }
}
