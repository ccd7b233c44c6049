use chrono::{DateTime, Utc};
use diesel::{AsChangeset, Insertable, Queryable};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::schema::todos;

/// A persisted todo.
///
/// Serializes in the document-store shape the service has always answered
/// with: `_id` is `{"$oid": ..}` and timestamps are `{"$date": <millis>}`.
/// Unset optional fields are left out of the body.
#[derive(Serialize, Queryable, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(rename = "_id", serialize_with = "as_oid")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub done: bool,
    #[serde(serialize_with = "as_date")]
    pub created_at: DateTime<Utc>,
    #[serde(
        serialize_with = "as_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Todo {
    pub fn apply(&mut self, changes: &TodoChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(done) = changes.done {
            self.done = done;
        }
        if let Some(completed_at) = changes.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

#[derive(Serialize)]
struct ObjectId<'a> {
    #[serde(rename = "$oid")]
    oid: &'a str,
}

#[derive(Serialize)]
struct Date {
    #[serde(rename = "$date")]
    millis: i64,
}

fn as_oid<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
    ObjectId { oid: id }.serialize(serializer)
}

fn as_date<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    Date {
        millis: at.timestamp_millis(),
    }
    .serialize(serializer)
}

fn as_optional_date<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => as_date(at, serializer),
        None => serializer.serialize_none(),
    }
}

/// A validated todo, ready to be inserted. The store assigns the id.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = todos)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of a create request. Anything besides `title` and `description`,
/// `done` included, is ignored.
#[derive(Deserialize, Debug, Default)]
pub struct TodoPayload {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl TodoPayload {
    pub fn validate(self, now: DateTime<Utc>) -> Result<NewTodo, ValidationError> {
        match (non_empty(self.title), non_empty(self.description)) {
            (Some(title), Some(description)) => Ok(NewTodo {
                title,
                description,
                done: false,
                created_at: now,
            }),
            (title, description) => {
                let mut missing = Vec::new();
                if title.is_none() {
                    missing.push("title");
                }
                if description.is_none() {
                    missing.push("description");
                }
                Err(ValidationError::new(None, missing))
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Body of an update request. Absent and `null` fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: Option<bool>,
}

impl TodoPatch {
    /// Rejects a patch that would blank out a required field.
    pub fn validate(&self, id: &str) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.title.as_deref() == Some("") {
            missing.push("title");
        }
        if self.description.as_deref() == Some("") {
            missing.push("description");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(Some(id.to_owned()), missing))
        }
    }

    /// Setting `done` to true stamps `completed_at`, even when the todo was
    /// already done. Nothing ever clears it.
    pub fn into_changes(self, now: DateTime<Utc>) -> TodoChanges {
        TodoChanges {
            completed_at: (self.done == Some(true)).then_some(now),
            title: self.title,
            description: self.description,
            done: self.done,
        }
    }
}

/// Partial column update. `None` columns are skipped by diesel.
#[derive(AsChangeset, Debug, Clone, Default, PartialEq)]
#[diesel(table_name = todos)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: Option<bool>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TodoChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.done.is_none()
            && self.completed_at.is_none()
    }
}

/// A required field was missing or empty.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "ValidationError (Todo:{}) (Field is required: [{}])",
    .id.as_deref().unwrap_or("None"),
    quoted(.missing)
)]
pub struct ValidationError {
    id: Option<String>,
    missing: Vec<&'static str>,
}

impl ValidationError {
    fn new(id: Option<String>, missing: Vec<&'static str>) -> Self {
        Self { id, missing }
    }
}

fn quoted(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| format!("'{}'", field))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The `{"msg": ..}` body used for confirmations and handled errors.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub msg: String,
}

impl Message {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
