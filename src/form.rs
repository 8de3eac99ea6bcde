use crate::model::{Importance, Priority, Recurrence, TaskDraft};
use chrono::{NaiveDate, NaiveTime};

/// Lead time choices offered by the form, `None` meaning no reminder.
pub const LEAD_CHOICES: [Option<u32>; 4] = [None, Some(1), Some(2), Some(3)];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Merci de renseigner au minimum le titre et la date limite.")]
    MissingRequired,
    #[error("invalid due date (use YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("invalid due time (use HH:MM): {0}")]
    InvalidTime(String),
}

/// Raw new-task input. Text fields hold what was typed, choice fields hold
/// already-closed values.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub priority: Priority,
    pub urgent: bool,
    pub importance: Importance,
    pub lead_days: Option<u32>,
    pub recurrence: Recurrence,
}

impl Default for TaskForm {
    fn default() -> Self {
        TaskForm {
            title: String::new(),
            description: String::new(),
            date: String::new(),
            time: String::new(),
            priority: Priority::Normal,
            urgent: false,
            importance: Importance::Medium,
            lead_days: None,
            recurrence: Recurrence::Never,
        }
    }
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, then resets the form. On error the input is left untouched.
    pub fn submit(&mut self) -> Result<TaskDraft, FormError> {
        let draft = self.to_draft()?;
        self.reset();
        Ok(draft)
    }

    pub fn reset(&mut self) {
        *self = TaskForm::default();
    }

    pub fn to_draft(&self) -> Result<TaskDraft, FormError> {
        let title = self.title.trim();
        let date = self.date.trim();
        if title.is_empty() || date.is_empty() {
            return Err(FormError::MissingRequired);
        }
        let date = parse_date(date)?;
        let time = match self.time.trim() {
            "" => None,
            raw => Some(parse_time(raw)?),
        };
        let description = Some(self.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(TaskDraft {
            title: title.to_string(),
            description,
            date,
            time,
            lead_days: self.lead_days.filter(|n| *n > 0),
            priority: self.priority,
            importance: self.importance,
            urgent: self.urgent,
            recurrence: self.recurrence,
        })
    }

    pub fn cycle_priority(&mut self, delta: isize) {
        self.priority = cycle(Priority::ALL, self.priority, delta);
    }

    pub fn cycle_importance(&mut self, delta: isize) {
        self.importance = cycle(Importance::ALL, self.importance, delta);
    }

    pub fn cycle_recurrence(&mut self, delta: isize) {
        self.recurrence = cycle(Recurrence::ALL, self.recurrence, delta);
    }

    pub fn cycle_lead(&mut self, delta: isize) {
        self.lead_days = cycle(&LEAD_CHOICES, self.lead_days, delta);
    }
}

pub fn lead_label(lead: Option<u32>) -> String {
    match lead {
        None => "Aucun".to_string(),
        Some(1) => "1 jour avant".to_string(),
        Some(n) => format!("{} jours avant", n),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, FormError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FormError::InvalidDate(raw.to_string()))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, FormError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| FormError::InvalidTime(raw.to_string()))
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, delta: isize) -> T {
    let len = all.len() as isize;
    let idx = all.iter().position(|v| *v == current).unwrap_or(0) as isize;
    all[(idx + delta).rem_euclid(len) as usize]
}
