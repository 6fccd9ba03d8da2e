//! Directory records.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::error::DirectoryError;
use crate::view::Searchable;

/// Identifier of a directory record.
///
/// Assigned from a monotonically increasing counter, starting at 1, and never
/// reused after deletion. `RecordId::PROVISIONAL` marks optimistic records the
/// backend has not numbered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub const PROVISIONAL: RecordId = RecordId(0);

    pub fn is_provisional(self) -> bool {
        self == Self::PROVISIONAL
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A person in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
}

impl Searchable for Record {
    fn search_fields(&self) -> SmallVec<[&str; 4]> {
        smallvec::smallvec![
            self.name.as_str(),
            self.role.as_str(),
            self.department.as_str(),
            self.email.as_str(),
        ]
    }
}

/// Fields for a record that has no id yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
}

impl NewRecord {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            ..Self::default()
        }
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Name and role are required and may not be blank.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if self.name.trim().is_empty() {
            return Err(DirectoryError::MissingField("name"));
        }
        if self.role.trim().is_empty() {
            return Err(DirectoryError::MissingField("role"));
        }
        Ok(())
    }

    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            name: self.name,
            role: self.role,
            department: self.department,
            email: self.email,
        }
    }
}

/// A partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

impl RecordPatch {
    pub fn apply(&self, record: &Record) -> Record {
        Record {
            id: record.id,
            name: self.name.clone().unwrap_or_else(|| record.name.clone()),
            role: self.role.clone().unwrap_or_else(|| record.role.clone()),
            department: self
                .department
                .clone()
                .unwrap_or_else(|| record.department.clone()),
            email: self.email.clone().unwrap_or_else(|| record.email.clone()),
        }
    }

    /// A patch may not blank out a required field.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DirectoryError::MissingField("name"));
        }
        if self.role.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(DirectoryError::MissingField("role"));
        }
        Ok(())
    }
}

/// Column a record list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Name,
    Role,
    Department,
}

impl SortKey {
    /// Case-insensitive ascending order on the chosen column.
    pub fn compare(self, a: &Record, b: &Record) -> Ordering {
        let (left, right) = match self {
            SortKey::Name => (&a.name, &b.name),
            SortKey::Role => (&a.role, &b.role),
            SortKey::Department => (&a.department, &b.department),
        };
        left.to_lowercase().cmp(&right.to_lowercase())
    }
}
