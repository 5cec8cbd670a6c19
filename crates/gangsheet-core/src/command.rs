//! Closed command set for external callers.
//!
//! Commands arrive as JSON objects tagged by `action`, e.g.
//! `{"action": "align", "alignment": "left"}`. An action name outside the
//! known set is rejected with [`CommandError::UnknownAction`] instead of being
//! ignored.

use crate::canvas::{CanvasDocument, Placement};
use crate::duplicate::DuplicatePlacement;
use crate::elements::{Element, ElementId, ElementUpdate};
use crate::error::EditorError;
use crate::layout::{Length, TilingOutcome, TilingRequest};
use crate::scene::{Alignment, Axis, ZOrder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every operation a caller can request. Id lists left empty act on the
/// current selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditorCommand {
    AddElement {
        element: Element,
    },
    UpdateMany {
        updates: Vec<ElementUpdate>,
    },
    DuplicateSelection,
    DuplicateAt {
        placements: Vec<DuplicatePlacement>,
    },
    Delete {
        #[serde(default)]
        ids: Vec<ElementId>,
    },
    Group {
        #[serde(default)]
        ids: Vec<ElementId>,
    },
    Ungroup {
        #[serde(default)]
        id: Option<ElementId>,
    },
    Align {
        #[serde(default)]
        ids: Vec<ElementId>,
        alignment: Alignment,
    },
    Distribute {
        #[serde(default)]
        ids: Vec<ElementId>,
        axis: Axis,
    },
    Reorder {
        id: ElementId,
        order: ZOrder,
    },
    Select {
        ids: Vec<ElementId>,
    },
    Place {
        #[serde(default)]
        id: Option<ElementId>,
        placement: Placement,
    },
    Resize {
        #[serde(default)]
        id: Option<ElementId>,
        #[serde(default)]
        width: Option<Length>,
        #[serde(default)]
        height: Option<Length>,
    },
    Tile(TilingRequest),
    Clear,
    Undo,
    Redo,
}

/// Action names accepted by [`EditorCommand::from_json`].
pub const ACTIONS: &[&str] = &[
    "add_element",
    "update_many",
    "duplicate_selection",
    "duplicate_at",
    "delete",
    "group",
    "ungroup",
    "align",
    "distribute",
    "reorder",
    "select",
    "place",
    "resize",
    "tile",
    "clear",
    "undo",
    "redo",
];

/// Errors from parsing or running a command.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Malformed command: {0}")]
    Malformed(String),
    #[error(transparent)]
    Editor(#[from] EditorError),
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Elements created or now selected.
    Ids { ids: Vec<ElementId> },
    /// Number of elements affected.
    Count { count: usize },
    /// Whether anything changed.
    Changed { changed: bool },
    Tiled(TilingOutcome),
}

impl EditorCommand {
    /// Parse a single command.
    pub fn from_json(json: &str) -> Result<Self, CommandError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| CommandError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a command from an already decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CommandError> {
        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| CommandError::Malformed("missing \"action\"".to_string()))?;
        if !ACTIONS.contains(&action) {
            return Err(CommandError::UnknownAction(action.to_string()));
        }
        serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))
    }

    /// Parse a JSON array of commands. Each entry is parsed on its own so one
    /// bad entry does not hide the others.
    pub fn batch_from_json(json: &str) -> Result<Vec<Result<Self, CommandError>>, CommandError> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| CommandError::Malformed(e.to_string()))?;
        Ok(values.into_iter().map(Self::from_value).collect())
    }

    /// The `action` tag of this command.
    pub fn action(&self) -> &'static str {
        match self {
            EditorCommand::AddElement { .. } => "add_element",
            EditorCommand::UpdateMany { .. } => "update_many",
            EditorCommand::DuplicateSelection => "duplicate_selection",
            EditorCommand::DuplicateAt { .. } => "duplicate_at",
            EditorCommand::Delete { .. } => "delete",
            EditorCommand::Group { .. } => "group",
            EditorCommand::Ungroup { .. } => "ungroup",
            EditorCommand::Align { .. } => "align",
            EditorCommand::Distribute { .. } => "distribute",
            EditorCommand::Reorder { .. } => "reorder",
            EditorCommand::Select { .. } => "select",
            EditorCommand::Place { .. } => "place",
            EditorCommand::Resize { .. } => "resize",
            EditorCommand::Tile(_) => "tile",
            EditorCommand::Clear => "clear",
            EditorCommand::Undo => "undo",
            EditorCommand::Redo => "redo",
        }
    }
}

impl CanvasDocument {
    /// Run a command against this document.
    pub fn execute(&mut self, command: EditorCommand) -> Result<CommandOutput, CommandError> {
        log::debug!("executing {}", command.action());
        let output = match command {
            EditorCommand::AddElement { element } => CommandOutput::Ids {
                ids: vec![self.add_element(element)],
            },
            EditorCommand::UpdateMany { updates } => CommandOutput::Count {
                count: self.update_many(&updates),
            },
            EditorCommand::DuplicateSelection => CommandOutput::Ids {
                ids: self.duplicate_selection()?,
            },
            EditorCommand::DuplicateAt { placements } => CommandOutput::Ids {
                ids: self.duplicate_at(&placements)?,
            },
            EditorCommand::Delete { ids } => CommandOutput::Count {
                count: self.delete(&ids)?,
            },
            EditorCommand::Group { ids } => CommandOutput::Ids {
                ids: vec![self.group(&ids)?],
            },
            EditorCommand::Ungroup { id } => CommandOutput::Ids {
                ids: match id {
                    Some(id) => self.ungroup(id)?,
                    None => self.ungroup_selected()?,
                },
            },
            EditorCommand::Align { ids, alignment } => CommandOutput::Count {
                count: self.align(&ids, alignment)?,
            },
            EditorCommand::Distribute { ids, axis } => CommandOutput::Count {
                count: self.distribute(&ids, axis)?,
            },
            EditorCommand::Reorder { id, order } => CommandOutput::Changed {
                changed: self.reorder(id, order)?,
            },
            EditorCommand::Select { ids } => {
                self.select(&ids);
                CommandOutput::Ids {
                    ids: self.selection().ids().to_vec(),
                }
            }
            EditorCommand::Place { id, placement } => {
                self.place(id, placement)?;
                CommandOutput::Changed { changed: true }
            }
            EditorCommand::Resize { id, width, height } => CommandOutput::Changed {
                changed: self.resize(id, width, height)?,
            },
            EditorCommand::Tile(request) => CommandOutput::Tiled(self.tile(&request)?),
            EditorCommand::Clear => CommandOutput::Count { count: self.clear() },
            EditorCommand::Undo => CommandOutput::Changed { changed: self.undo() },
            EditorCommand::Redo => CommandOutput::Changed { changed: self.redo() },
        };
        Ok(output)
    }

    /// Parse and run a JSON command.
    pub fn execute_json(&mut self, json: &str) -> Result<CommandOutput, CommandError> {
        let command = EditorCommand::from_json(json)?;
        self.execute(command)
    }
}
