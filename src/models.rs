//! Data models for the project lookup protocol.
//!
//! These structs mirror the JSON objects written by the companion server.
//! Field names on the wire are matched case-insensitively, so `Id`, `id` and
//! `ID` all bind to [`AssociationRecord::project_id`].

use std::fmt;
use std::str::FromStr;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Employee identifier sent to the server as decimal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(u64);

impl Identifier {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator input that is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid employee ID: {input:?}")]
pub struct InvalidIdentifier {
    pub input: String,
}

impl FromStr for Identifier {
    type Err = InvalidIdentifier;

    /// Parses decimal text, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Identifier)
            .map_err(|_| InvalidIdentifier {
                input: s.to_string(),
            })
    }
}

/// One employee-to-project assignment.
///
/// Serializes with the server's PascalCase keys. Deserialization accepts any
/// key casing and ignores unknown fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationRecord {
    /// Employee the assignment belongs to. Never checked against the request.
    #[serde(rename = "EmployeeId", skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<i64>,
    #[serde(rename = "Id")]
    pub project_id: i64,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    /// The employee's role on the project.
    #[serde(rename = "Position")]
    pub position: Option<String>,
}

impl AssociationRecord {
    pub fn new(project_id: i64) -> Self {
        Self {
            employee_id: None,
            project_id,
            title: None,
            description: None,
            position: None,
        }
    }

    pub fn with_employee_id(mut self, employee_id: i64) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

/// Wire keys, compared after ASCII lowercasing.
enum RecordField {
    EmployeeId,
    ProjectId,
    Title,
    Description,
    Position,
    Other,
}

impl RecordField {
    fn from_key(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "employeeid" => RecordField::EmployeeId,
            "id" | "projectid" => RecordField::ProjectId,
            "title" => RecordField::Title,
            "description" => RecordField::Description,
            "position" => RecordField::Position,
            _ => RecordField::Other,
        }
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = AssociationRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an employee-project object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut employee_id = None;
        let mut project_id = None;
        let mut title = None;
        let mut description = None;
        let mut position = None;

        // Duplicate keys (e.g. "id" and "ID") resolve to the last occurrence.
        while let Some(key) = map.next_key::<String>()? {
            match RecordField::from_key(&key) {
                RecordField::EmployeeId => employee_id = map.next_value::<Option<i64>>()?,
                RecordField::ProjectId => project_id = Some(map.next_value::<i64>()?),
                RecordField::Title => title = map.next_value()?,
                RecordField::Description => description = map.next_value()?,
                RecordField::Position => position = map.next_value()?,
                RecordField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let project_id = project_id.ok_or_else(|| de::Error::missing_field("Id"))?;

        Ok(AssociationRecord {
            employee_id,
            project_id,
            title,
            description,
            position,
        })
    }
}

impl<'de> Deserialize<'de> for AssociationRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Ordered, immutable outcome of one lookup.
///
/// An empty result means the server reported no assignments. The protocol
/// does not say whether the employee exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupResult {
    records: Vec<AssociationRecord>,
}

impl LookupResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AssociationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssociationRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<AssociationRecord> {
        self.records
    }
}

impl From<Vec<AssociationRecord>> for LookupResult {
    fn from(records: Vec<AssociationRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for LookupResult {
    type Item = AssociationRecord;
    type IntoIter = std::vec::IntoIter<AssociationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a LookupResult {
    type Item = &'a AssociationRecord;
    type IntoIter = std::slice::Iter<'a, AssociationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
