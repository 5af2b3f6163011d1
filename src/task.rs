//! Task data structure.
//!
//! This module defines the `Task` record as it is persisted: field names are
//! camelCase on the wire so the stored slot keeps its established layout.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fields::{Priority, Status};

/// Description given to subtasks produced by the suggestion service.
pub const GENERATED_DESCRIPTION: &str = "AI Generated subtask";
/// Label attached to subtasks produced by the suggestion service.
pub const GENERATED_LABEL: &str = "AI";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/// A unit of tracked work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Stored as `YYYY-MM-DD`; a cleared date is stored as `""`.
    #[serde(default, with = "due_date_format")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// A task with the given id and title and the same defaults the create form starts from.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Incomplete,
            priority: Priority::Medium,
            labels: Vec::new(),
            due_date: Some(today()),
            parent_id: None,
            created_at: Utc::now().trunc_subsecs(3),
        }
    }

    /// A subtask as proposed by the suggestion service.
    pub fn generated(id: impl Into<String>, title: impl Into<String>, parent_id: &str) -> Self {
        Task {
            description: GENERATED_DESCRIPTION.to_string(),
            labels: vec![GENERATED_LABEL.to_string()],
            parent_id: Some(parent_id.to_string()),
            ..Task::new(id, title)
        }
    }

    /// Append a label unless it is blank or already present.
    pub fn add_label(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.labels.iter().any(|l| l == label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    pub fn remove_label(&mut self, label: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| l != label.trim());
        before != self.labels.len()
    }
}

mod due_date_format {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(due: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match due {
            Some(date) => s.collect_str(date),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}

// Millisecond precision with a `Z` suffix, e.g. 2024-05-01T09:30:00.000Z
fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Random 9-character base-36 id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Split comma-separated label inputs, trimming and dropping blanks and repeats.
/// Insertion order is kept.
pub fn split_labels(inputs: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let label = part.trim();
            if !label.is_empty() && !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
    }
    labels
}
