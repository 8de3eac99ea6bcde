use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Opaque row identifier. The backend may hand out integers or uuids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => TaskId(n.to_string()),
            RawId::Text(s) => TaskId(s),
        })
    }
}

pub type OwnerId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: OwnerId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "À faire")]
    Todo,
    #[serde(rename = "En cours")]
    Doing,
    #[serde(rename = "Terminé")]
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "Basse")]
    Low,
    #[default]
    #[serde(rename = "Normale")]
    Normal,
    #[serde(rename = "Haute")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Importance {
    #[serde(rename = "Faible")]
    Low,
    #[default]
    #[serde(rename = "Moyenne")]
    Medium,
    #[serde(rename = "Forte")]
    High,
}

/// Stored with the task, never expanded into future instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Recurrence {
    #[default]
    #[serde(rename = "Jamais")]
    Never,
    #[serde(rename = "Quotidienne")]
    Daily,
    #[serde(rename = "Hebdomadaire")]
    Weekly,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

/// Closed label set shared by the workflow enums: wire label, display and parsing.
macro_rules! labelled {
    ($ty:ident, $kind:literal, [$($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?]) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_lowercase();
                $(
                    if needle == $label.to_lowercase() $(|| needle == $alias)* {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ParseLabelError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

labelled!(Status, "status", [
    Todo => "À faire" | "todo" | "a faire",
    Doing => "En cours" | "doing",
    Done => "Terminé" | "done" | "termine",
]);

labelled!(Priority, "priority", [
    Low => "Basse" | "low",
    Normal => "Normale" | "normal",
    High => "Haute" | "high",
]);

labelled!(Importance, "importance", [
    Low => "Faible" | "low",
    Medium => "Moyenne" | "medium",
    High => "Forte" | "high",
]);

labelled!(Recurrence, "recurrence", [
    Never => "Jamais" | "never",
    Daily => "Quotidienne" | "daily",
    Weekly => "Hebdomadaire" | "weekly",
]);

impl Status {
    pub fn index(&self) -> usize {
        match self {
            Status::Todo => 0,
            Status::Doing => 1,
            Status::Done => 2,
        }
    }

    /// Neighbouring lane, clamped at both ends.
    pub fn shifted(&self, delta: isize) -> Status {
        let max = Status::ALL.len() as isize - 1;
        let idx = (self.index() as isize + delta).clamp(0, max) as usize;
        Status::ALL[idx]
    }
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
        }
    }
}

impl Importance {
    pub fn rank(&self) -> u8 {
        match self {
            Importance::Low => 1,
            Importance::Medium => 2,
            Importance::High => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    #[serde(rename = "titre")]
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(rename = "heure", default, with = "due_time")]
    pub time: Option<NaiveTime>,
    #[serde(rename = "rappelAvant", default, with = "lead_time")]
    pub lead_days: Option<u32>,
    #[serde(rename = "rappelDate", default)]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(rename = "priorite", default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_as_default")]
    pub importance: Importance,
    #[serde(rename = "urgence", default, deserialize_with = "null_as_default")]
    pub urgent: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recurrence: Recurrence,
    #[serde(rename = "statut", default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(rename = "alerteEnvoyee", default, deserialize_with = "null_as_default")]
    pub notified: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Validated form output, not yet bound to an owner.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub lead_days: Option<u32>,
    pub priority: Priority,
    pub importance: Importance,
    pub urgent: bool,
    pub recurrence: Recurrence,
}

/// Insert payload: every column except the server-assigned ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    #[serde(rename = "titre")]
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(rename = "heure", with = "due_time")]
    pub time: Option<NaiveTime>,
    #[serde(rename = "rappelAvant", with = "lead_time")]
    pub lead_days: Option<u32>,
    #[serde(rename = "rappelDate")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(rename = "priorite")]
    pub priority: Priority,
    pub importance: Importance,
    #[serde(rename = "urgence")]
    pub urgent: bool,
    pub recurrence: Recurrence,
    #[serde(rename = "statut")]
    pub status: Status,
    #[serde(rename = "alerteEnvoyee")]
    pub notified: bool,
}

impl NewTask {
    /// Binds a draft to its owner. The reminder is computed here, once.
    pub fn from_draft(draft: TaskDraft, owner: impl Into<OwnerId>) -> Self {
        let reminder_at = crate::reminder::reminder_timestamp(draft.date, draft.lead_days);
        NewTask {
            owner: owner.into(),
            title: draft.title,
            description: draft.description,
            date: draft.date,
            time: draft.time,
            lead_days: draft.lead_days,
            reminder_at,
            priority: draft.priority,
            importance: draft.importance,
            urgent: draft.urgent,
            recurrence: draft.recurrence,
            status: Status::Todo,
            notified: false,
        }
    }

    pub fn into_task(self, id: TaskId, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            owner: self.owner,
            title: self.title,
            description: self.description,
            date: self.date,
            time: self.time,
            lead_days: self.lead_days,
            reminder_at: self.reminder_at,
            priority: self.priority,
            importance: self.importance,
            urgent: self.urgent,
            recurrence: self.recurrence,
            status: self.status,
            notified: self.notified,
            created_at: Some(created_at),
        }
    }
}

/// PostgREST sends `null` for unset columns rather than omitting them.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

mod due_time {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveTime::parse_from_str(text, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid time: {}", text))),
        }
    }
}

mod lead_time {
    use super::de;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(days: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match days {
            Some(n) => s.serialize_u32(*n),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u32),
            Text(String),
        }
        let days = match Option::<Raw>::deserialize(d)? {
            None => None,
            Some(Raw::Int(n)) => Some(n),
            Some(Raw::Text(s)) if s.trim().is_empty() => None,
            Some(Raw::Text(s)) => Some(
                s.trim()
                    .parse::<u32>()
                    .map_err(|_| de::Error::custom(format!("invalid lead time: {}", s)))?,
            ),
        };
        Ok(days.filter(|n| *n > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_with_loose_columns_deserializes() {
        let row = json!({
            "id": 42,
            "user_id": "u-1",
            "titre": "Prepare Report",
            "description": "",
            "date": "2024-06-10",
            "heure": "14:30:00",
            "rappelAvant": "2",
            "rappelDate": "2024-06-06T06:00:00Z",
            "priorite": "Haute",
            "importance": "Forte",
            "urgence": true,
            "recurrence": "Hebdomadaire",
            "statut": "En cours",
            "alerteEnvoyee": false,
            "created_at": "2024-06-01T10:00:00+00:00"
        });
        let task: Task = serde_json::from_value(row).unwrap();
        assert_eq!(task.id.as_str(), "42");
        assert_eq!(task.description, None);
        assert_eq!(task.time, NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(task.lead_days, Some(2));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.importance, Importance::High);
        assert_eq!(task.recurrence, Recurrence::Weekly);
        assert_eq!(task.status, Status::Doing);
    }

    #[test]
    fn missing_optional_columns_take_defaults() {
        let row = json!({
            "id": "b7c1",
            "user_id": "u-1",
            "titre": "Call",
            "date": "2024-06-10",
            "heure": "",
            "rappelAvant": ""
        });
        let task: Task = serde_json::from_value(row).unwrap();
        assert_eq!(task.time, None);
        assert_eq!(task.lead_days, None);
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.importance, Importance::Medium);
        assert!(!task.notified);
    }

    #[test]
    fn null_columns_take_defaults() {
        let row = json!({
            "id": 7,
            "user_id": "u-1",
            "titre": "Call",
            "description": null,
            "date": "2024-06-10",
            "heure": null,
            "priorite": null,
            "urgence": null,
            "importance": null,
            "rappelAvant": null,
            "recurrence": null,
            "statut": null,
            "alerteEnvoyee": null,
            "rappelDate": null,
            "created_at": null
        });
        let task: Task = serde_json::from_value(row).unwrap();
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.importance, Importance::Medium);
        assert_eq!(task.recurrence, Recurrence::Never);
        assert_eq!(task.status, Status::Todo);
        assert!(!task.urgent);
        assert!(!task.notified);
        assert_eq!(task.time, None);
        assert_eq!(task.lead_days, None);
        assert_eq!(task.reminder_at, None);
    }

    #[test]
    fn unknown_status_label_is_rejected() {
        let row = json!({
            "id": 1,
            "user_id": "u-1",
            "titre": "x",
            "date": "2024-06-10",
            "statut": "Bloqué"
        });
        assert!(serde_json::from_value::<Task>(row).is_err());
    }

    #[test]
    fn new_task_serializes_wire_columns() {
        let draft = TaskDraft {
            title: "Rendre le rapport".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            time: NaiveTime::from_hms_opt(9, 15, 0),
            lead_days: Some(1),
            priority: Priority::High,
            importance: Importance::Low,
            urgent: true,
            recurrence: Recurrence::Never,
        };
        let value = serde_json::to_value(NewTask::from_draft(draft, "u-1")).unwrap();
        assert_eq!(value["user_id"], "u-1");
        assert_eq!(value["titre"], "Rendre le rapport");
        assert_eq!(value["date"], "2024-06-10");
        assert_eq!(value["heure"], "09:15");
        assert_eq!(value["rappelAvant"], 1);
        assert_eq!(value["priorite"], "Haute");
        assert_eq!(value["importance"], "Faible");
        assert_eq!(value["statut"], "À faire");
        assert_eq!(value["alerteEnvoyee"], false);
        assert!(value["rappelDate"].is_string());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn labels_parse_case_insensitively_with_aliases() {
        assert_eq!("terminé".parse::<Status>().unwrap(), Status::Done);
        assert_eq!("doing".parse::<Status>().unwrap(), Status::Doing);
        assert_eq!("HAUTE".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Importance>().is_err());
    }

    #[test]
    fn status_shift_clamps_at_lanes_edges() {
        assert_eq!(Status::Todo.shifted(-1), Status::Todo);
        assert_eq!(Status::Todo.shifted(1), Status::Doing);
        assert_eq!(Status::Doing.shifted(5), Status::Done);
    }

    #[test]
    fn ranks_follow_declared_order() {
        assert!(Priority::Low.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::High.rank());
        assert!(Importance::Low.rank() < Importance::Medium.rank());
        assert!(Importance::Medium.rank() < Importance::High.rank());
    }
}
