use crate::form::lead_label;
use crate::model::{Status, Task};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

/// Single sort key of the board. Anything unrecognised keeps list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Date,
    Priority,
    Importance,
    Unsorted,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Priority => "priorite",
            SortKey::Importance => "importance",
            SortKey::Unsorted => "aucun",
        }
    }

    pub fn next(&self) -> SortKey {
        match self {
            SortKey::Date => SortKey::Priority,
            SortKey::Priority => SortKey::Importance,
            SortKey::Importance | SortKey::Unsorted => SortKey::Date,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "date" => SortKey::Date,
            "priorite" | "priorité" | "priority" => SortKey::Priority,
            "importance" => SortKey::Importance,
            _ => SortKey::Unsorted,
        })
    }
}

pub fn matches_query(task: &Task, query: &str) -> bool {
    task.title.to_lowercase().contains(&query.to_lowercase())
}

/// Filters on title and sorts by `key`. The sort is stable, so ties and
/// [`SortKey::Unsorted`] keep the incoming order.
pub fn filter_and_sort<'a>(tasks: &'a [Task], query: &str, key: SortKey) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks.iter().filter(|t| matches_query(t, query)).collect();
    match key {
        SortKey::Date => view.sort_by_key(|t| t.date),
        SortKey::Priority => view.sort_by_key(|t| Reverse(t.priority.rank())),
        SortKey::Importance => view.sort_by_key(|t| Reverse(t.importance.rank())),
        SortKey::Unsorted => {}
    }
    view
}

/// The three fixed status lanes, each keeping the view order.
#[derive(Debug, Default)]
pub struct Lanes<'a> {
    lanes: [Vec<&'a Task>; 3],
}

impl<'a> Lanes<'a> {
    pub fn partition(view: Vec<&'a Task>) -> Self {
        let mut lanes: [Vec<&'a Task>; 3] = Default::default();
        for task in view {
            lanes[task.status.index()].push(task);
        }
        Lanes { lanes }
    }

    pub fn build(tasks: &'a [Task], query: &str, key: SortKey) -> Self {
        Self::partition(filter_and_sort(tasks, query, key))
    }

    pub fn lane(&self, status: Status) -> &[&'a Task] {
        &self.lanes[status.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Status, &[&'a Task])> + '_ {
        Status::ALL
            .iter()
            .map(move |status| (*status, self.lane(*status)))
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// "date à heure" as shown on a card.
pub fn due_line(task: &Task) -> String {
    let time = task
        .time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    format!("{} à {}", task.date.format("%Y-%m-%d"), time)
        .trim_end()
        .to_string()
}

pub fn classification_line(task: &Task) -> String {
    format!(
        "Priorité : {} | Urgence : {} | Importance : {}",
        task.priority,
        if task.urgent { "Oui" } else { "Non" },
        task.importance
    )
}

pub fn schedule_line(task: &Task) -> String {
    let reminder = match task.lead_days {
        Some(n) => format!("{} jour(s) avant à 08h00", n),
        None => lead_label(None),
    };
    format!("🔁 {} | 📌 Rappel : {}", task.recurrence, reminder)
}
