//! Service-level error taxonomy.

use crate::draft::request::DraftError;
use crate::draft::selection::SelectionRejection;
use crate::model::placement::UnitId;
use crate::model::projection::ProjectionId;
use crate::placement::guard::OverloadPrompt;
use crate::placement::rules::PlacementRejection;
use crate::repo::projection_store::{RemoteRejection, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from projection and draft service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No projection has been loaded yet.
    NotLoaded,
    /// Local pre-network rejection; nothing was applied.
    Rejected(PlacementRejection),
    /// Draft failed submit-time validation; nothing was sent.
    Draft(DraftError),
    /// Caller must confirm the quarter overload before retrying.
    OverloadConfirmationRequired(OverloadPrompt),
    /// Same operation is still awaiting settlement.
    OperationInFlight(String),
    /// Store of record rejected the request; local state was rolled back.
    Remote(RemoteRejection),
    /// Request or fetch did not complete; safe to retry.
    Transport {
        stage: &'static str,
        message: String,
    },
    ProjectionNotFound(ProjectionId),
    /// The store accepted the mutation but the follow-up fetch failed; the
    /// view is stale until a successful `refresh`.
    Unreconciled {
        key: String,
        unit_id: Option<UnitId>,
        message: String,
    },
    /// A previous reconcile failed; refresh before mutating again.
    StaleView,
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Unreconciled { .. } | Self::StaleView
        )
    }

    pub(crate) fn from_store(err: StoreError, stage: &'static str) -> Self {
        match err {
            StoreError::Rejected(failure) => Self::Remote(failure.classify()),
            StoreError::Transport(message) => Self::Transport { stage, message },
            StoreError::NotFound(id) => Self::ProjectionNotFound(id),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "projection is not loaded"),
            Self::Rejected(rejection) => write!(f, "{rejection}"),
            Self::Draft(err) => write!(f, "{err}"),
            Self::OverloadConfirmationRequired(prompt) => {
                write!(f, "overload confirmation required: {prompt}")
            }
            Self::OperationInFlight(key) => write!(f, "operation already in flight: {key}"),
            Self::Remote(rejection) => write!(f, "rejected by store: {rejection}"),
            Self::Transport { stage, message } => {
                write!(f, "store unreachable during {stage}: {message}")
            }
            Self::ProjectionNotFound(id) => write!(f, "projection not found: {id}"),
            Self::Unreconciled { key, message, .. } => {
                write!(f, "{key} was saved but the refresh failed: {message}")
            }
            Self::StaleView => write!(f, "projection view is stale; refresh first"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Draft(err) => Some(err),
            Self::Remote(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<PlacementRejection> for ServiceError {
    fn from(value: PlacementRejection) -> Self {
        Self::Rejected(value)
    }
}

impl From<DraftError> for ServiceError {
    fn from(value: DraftError) -> Self {
        Self::Draft(value)
    }
}

impl From<SelectionRejection> for ServiceError {
    fn from(value: SelectionRejection) -> Self {
        Self::Draft(DraftError::Selection(value))
    }
}
