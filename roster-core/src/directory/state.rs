//! Directory state and its reducer.
//!
//! Snapshots are copy-on-write: a transition clones the small top-level
//! struct and shares every field it does not change. In particular the
//! `records` collection keeps its `Arc` across transitions that only touch
//! filters, selection or view mode, which is what lets derived views skip
//! recomputation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::action::DirectoryAction;
use super::error::DirectoryError;
use super::record::{Record, RecordId};
use crate::store::Reducer;

/// How the record collection is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::List => ViewMode::Grid,
            ViewMode::Grid => ViewMode::List,
        }
    }
}

/// One snapshot of the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryState {
    pub records: Arc<Vec<Record>>,
    pub filter_text: String,
    pub view_mode: ViewMode,
    pub selected: Option<RecordId>,
    /// Id handed to the next added record.
    pub next_id: u64,
}

impl DirectoryState {
    /// A state holding `records`, numbering new records after the highest id.
    pub fn new(records: Vec<Record>) -> Self {
        let next_id = records
            .iter()
            .map(|r| r.id.0)
            .max()
            .map_or(1, |highest| highest.saturating_add(1));
        Self {
            records: Arc::new(records),
            filter_text: String::new(),
            view_mode: ViewMode::default(),
            selected: None,
            next_id,
        }
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.selected.and_then(|id| self.record(id))
    }
}

impl Default for DirectoryState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Reducer for [`DirectoryState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryReducer;

impl Reducer for DirectoryReducer {
    type State = DirectoryState;
    type Action = DirectoryAction;
    type Error = DirectoryError;

    fn reduce(
        &self,
        state: &Arc<DirectoryState>,
        action: &DirectoryAction,
    ) -> Result<Arc<DirectoryState>, DirectoryError> {
        let unchanged = || Ok(Arc::clone(state));

        match action {
            DirectoryAction::SelectRecord(id) => {
                if state.record(*id).is_none() {
                    return Err(DirectoryError::UnknownRecord(*id));
                }
                if state.selected == Some(*id) {
                    return unchanged();
                }
                Ok(Arc::new(DirectoryState {
                    selected: Some(*id),
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::ClearSelection => {
                if state.selected.is_none() {
                    return unchanged();
                }
                Ok(Arc::new(DirectoryState {
                    selected: None,
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::SetFilterText(text) => {
                if state.filter_text == *text {
                    return unchanged();
                }
                Ok(Arc::new(DirectoryState {
                    filter_text: text.clone(),
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::ToggleViewMode => Ok(Arc::new(DirectoryState {
                view_mode: state.view_mode.toggled(),
                ..DirectoryState::clone(state)
            })),

            DirectoryAction::ResetFilters => {
                if state.filter_text.is_empty() {
                    return unchanged();
                }
                Ok(Arc::new(DirectoryState {
                    filter_text: String::new(),
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::AddRecord(new) => {
                new.validate()?;
                // The last id is never handed out, so a saturated seed cannot collide.
                let next_id = state
                    .next_id
                    .checked_add(1)
                    .ok_or(DirectoryError::IdsExhausted)?;

                let record = new.clone().into_record(RecordId(state.next_id));
                let mut records = Vec::with_capacity(state.records.len() + 1);
                records.extend(state.records.iter().cloned());
                records.push(record);

                Ok(Arc::new(DirectoryState {
                    records: Arc::new(records),
                    next_id,
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::DeleteRecord(id) => {
                if state.record(*id).is_none() {
                    return Err(DirectoryError::UnknownRecord(*id));
                }

                let records: Vec<Record> = state
                    .records
                    .iter()
                    .filter(|r| r.id != *id)
                    .cloned()
                    .collect();
                let selected = state.selected.filter(|selected| selected != id);

                Ok(Arc::new(DirectoryState {
                    records: Arc::new(records),
                    selected,
                    ..DirectoryState::clone(state)
                }))
            }

            DirectoryAction::Unrecognized(_) => unchanged(),
        }
    }
}
