//! Errors surfaced by document-level operations.

use crate::duplicate::DuplicateDragError;
use crate::elements::{ElementId, ModelError};
use crate::layout::LayoutError;
use thiserror::Error;

/// Failures of editing operations. None of them leave the document changed.
#[derive(Debug, Error, PartialEq)]
pub enum EditorError {
    #[error("Element {0} does not exist")]
    MissingTarget(ElementId),
    #[error("Nothing is selected")]
    EmptySelection,
    #[error("Length must be positive, got {0}")]
    InvalidLength(f64),
    #[error("No drag in progress")]
    NoActiveDrag,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    DuplicateDrag(#[from] DuplicateDragError),
}

/// Result type for editing operations.
pub type EditorResult<T> = Result<T, EditorError>;
