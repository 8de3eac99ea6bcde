//! Periodic reminder scan over the in-memory task list.

use crate::model::TaskId;
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(60);

pub const NOTIFICATION_TITLE: &str = "🔔 Rappel de tâche";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: TaskId,
    pub title: String,
    pub due_at: DateTime<Utc>,
}

/// Whether the desktop may be notified. Without it reminders fall back to
/// an alert the user has to acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    #[default]
    System,
    Alert,
}

pub trait Notifier {
    fn notify(&mut self, reminder: &Reminder);
}

/// Desktop notification through terminal escape sequences (OSC 777 for
/// VTE/urxvt style terminals, OSC 9 for iTerm2/kitty/Windows Terminal).
pub struct TerminalNotifier<W: Write> {
    out: W,
}

impl<W: Write> TerminalNotifier<W> {
    pub fn new(out: W) -> Self {
        TerminalNotifier { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Notifier for TerminalNotifier<W> {
    fn notify(&mut self, reminder: &Reminder) {
        let body = sanitize(&reminder.title);
        let result = write!(
            self.out,
            "\x1b]777;notify;{};{}\x07\x1b]9;{} : {}\x07\x07",
            NOTIFICATION_TITLE, body, NOTIFICATION_TITLE, body
        )
        .and_then(|_| self.out.flush());
        if let Err(err) = result {
            warn!(task = %reminder.task_id, error = %err, "desktop notification failed");
        }
    }
}

/// Collects reminders for a caller that shows them as blocking alerts.
#[derive(Debug, Default)]
pub struct AlertQueue {
    pending: VecDeque<Reminder>,
}

impl AlertQueue {
    pub fn pop(&mut self) -> Option<Reminder> {
        self.pending.pop_front()
    }

    pub fn front(&self) -> Option<&Reminder> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Notifier for AlertQueue {
    fn notify(&mut self, reminder: &Reminder) {
        self.pending.push_back(reminder.clone());
    }
}

impl<F: FnMut(&Reminder)> Notifier for F {
    fn notify(&mut self, reminder: &Reminder) {
        self(reminder)
    }
}

pub fn alert_text(reminder: &Reminder) -> String {
    format!("🔔 Rappel : {}", reminder.title)
}

/// Fixed-interval poller. Each task moves pending → notified at most once,
/// on the first tick that sees its reminder within the tolerance window.
#[derive(Debug, Clone)]
pub struct ReminderPoller {
    interval: Duration,
    tolerance: Duration,
    next_tick: Option<Instant>,
}

impl Default for ReminderPoller {
    fn default() -> Self {
        ReminderPoller::new(DEFAULT_INTERVAL, DEFAULT_TOLERANCE)
    }
}

impl ReminderPoller {
    pub fn new(interval: Duration, tolerance: Duration) -> Self {
        ReminderPoller {
            interval,
            tolerance,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms the timer; the first tick happens one interval after `at`.
    pub fn start(&mut self, at: Instant) {
        self.next_tick = Some(at + self.interval);
        debug!(interval_secs = self.interval.as_secs(), "reminder poller started");
    }

    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!("reminder poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn is_due(&self, at: Instant) -> bool {
        self.next_tick.is_some_and(|next| at >= next)
    }

    /// Time left before the next tick, if running.
    pub fn remaining(&self, at: Instant) -> Option<Duration> {
        self.next_tick.map(|next| next.saturating_duration_since(at))
    }

    /// Runs a scan when the timer has elapsed and re-arms it.
    pub fn poll(
        &mut self,
        at: Instant,
        now: DateTime<Utc>,
        store: &mut TaskStore,
        notifier: &mut dyn Notifier,
    ) -> usize {
        if !self.is_due(at) {
            return 0;
        }
        self.next_tick = Some(at + self.interval);
        self.tick(now, store, notifier)
    }

    /// One scan at `now`. Returns the number of reminders fired.
    pub fn tick(
        &self,
        now: DateTime<Utc>,
        store: &mut TaskStore,
        notifier: &mut dyn Notifier,
    ) -> usize {
        let due: Vec<Reminder> = store
            .tasks()
            .iter()
            .filter(|t| !t.notified)
            .filter_map(|t| {
                let at = t.reminder_at?;
                self.within_window(at, now).then(|| Reminder {
                    task_id: t.id.clone(),
                    title: t.title.clone(),
                    due_at: at,
                })
            })
            .collect();

        let mut fired = 0;
        for reminder in due {
            if store.mark_notified(&reminder.task_id) {
                info!(task = %reminder.task_id, title = %reminder.title, "reminder fired");
                notifier.notify(&reminder);
                fired += 1;
            }
        }
        debug!(fired, tasks = store.len(), "reminder tick");
        fired
    }

    fn within_window(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let gap = (at - now).num_milliseconds().unsigned_abs();
        gap < self.tolerance.as_millis() as u64
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() || c == ';' { ' ' } else { c })
        .collect()
}
