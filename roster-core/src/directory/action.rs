//! Directory actions.
//!
//! Inside the crate actions are the [`DirectoryAction`] enum. At the edge they
//! travel as an [`ActionEnvelope`], `{ "kind": ..., "payload": ... }`, the
//! shape a UI layer emits. Decoding an envelope never fails on an unknown
//! kind: it becomes [`DirectoryAction::Unrecognized`], which reduces to the
//! identity transition.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::DirectoryError;
use super::record::{NewRecord, RecordId};
use crate::store::Action;

pub const SELECT_RECORD: &str = "select-record";
pub const CLEAR_SELECTION: &str = "clear-selection";
pub const SET_FILTER_TEXT: &str = "set-filter-text";
pub const TOGGLE_VIEW_MODE: &str = "toggle-view-mode";
pub const RESET_FILTERS: &str = "reset-filters";
pub const ADD_RECORD: &str = "add-record";
pub const DELETE_RECORD: &str = "delete-record";

/// An intended change to the directory state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryAction {
    SelectRecord(RecordId),
    ClearSelection,
    SetFilterText(String),
    ToggleViewMode,
    ResetFilters,
    AddRecord(NewRecord),
    DeleteRecord(RecordId),
    /// Any kind the directory does not know. Carries the kind for logging.
    Unrecognized(String),
}

impl Action for DirectoryAction {
    fn kind(&self) -> &str {
        match self {
            DirectoryAction::SelectRecord(_) => SELECT_RECORD,
            DirectoryAction::ClearSelection => CLEAR_SELECTION,
            DirectoryAction::SetFilterText(_) => SET_FILTER_TEXT,
            DirectoryAction::ToggleViewMode => TOGGLE_VIEW_MODE,
            DirectoryAction::ResetFilters => RESET_FILTERS,
            DirectoryAction::AddRecord(_) => ADD_RECORD,
            DirectoryAction::DeleteRecord(_) => DELETE_RECORD,
            DirectoryAction::Unrecognized(kind) => kind,
        }
    }

    fn payload(&self) -> Option<serde_json::Value> {
        match self {
            DirectoryAction::SelectRecord(id) | DirectoryAction::DeleteRecord(id) => {
                Some(serde_json::json!(id))
            }
            DirectoryAction::SetFilterText(text) => Some(serde_json::json!(text)),
            DirectoryAction::AddRecord(record) => serde_json::to_value(record).ok(),
            DirectoryAction::ClearSelection
            | DirectoryAction::ToggleViewMode
            | DirectoryAction::ResetFilters
            | DirectoryAction::Unrecognized(_) => None,
        }
    }

    fn is_recognized(&self) -> bool {
        !matches!(self, DirectoryAction::Unrecognized(_))
    }
}

/// Wire form of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActionEnvelope {
    pub fn new(kind: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    fn payload_as<T: DeserializeOwned>(&self) -> Result<T, DirectoryError> {
        let value = self
            .payload
            .clone()
            .ok_or_else(|| DirectoryError::InvalidPayload {
                kind: self.kind.clone(),
                reason: "payload is required".to_string(),
            })?;

        serde_json::from_value(value).map_err(|e| DirectoryError::InvalidPayload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }
}

impl TryFrom<ActionEnvelope> for DirectoryAction {
    type Error = DirectoryError;

    fn try_from(envelope: ActionEnvelope) -> Result<Self, Self::Error> {
        let action = match envelope.kind.as_str() {
            SELECT_RECORD => DirectoryAction::SelectRecord(envelope.payload_as()?),
            CLEAR_SELECTION => DirectoryAction::ClearSelection,
            SET_FILTER_TEXT => DirectoryAction::SetFilterText(envelope.payload_as()?),
            TOGGLE_VIEW_MODE => DirectoryAction::ToggleViewMode,
            RESET_FILTERS => DirectoryAction::ResetFilters,
            ADD_RECORD => DirectoryAction::AddRecord(envelope.payload_as()?),
            DELETE_RECORD => DirectoryAction::DeleteRecord(envelope.payload_as()?),
            _ => DirectoryAction::Unrecognized(envelope.kind),
        };
        Ok(action)
    }
}

impl From<&DirectoryAction> for ActionEnvelope {
    fn from(action: &DirectoryAction) -> Self {
        ActionEnvelope::new(action.kind(), action.payload())
    }
}
