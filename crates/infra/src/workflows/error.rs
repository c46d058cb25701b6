use thiserror::Error;

use storeledger_core::DomainError;

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;
use crate::projections::ProjectionError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("{0} not found")]
    NotFound(String),

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A shop rule refuses the request in the current state.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        WorkflowError::Dispatch(value.into())
    }
}

impl From<EventStoreError> for WorkflowError {
    fn from(value: EventStoreError) -> Self {
        WorkflowError::Dispatch(value.into())
    }
}
