//! The protocol-error taxonomy of spec §7.1, mapped to `tonic::Status`.

use thiserror::Error;

use crate::project::DsnError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("request already cancelled")]
    Cancelled,
    #[error("metadata is empty")]
    MissingMetadata,
    #[error("uptrace-dsn header is required")]
    MissingDsn,
    #[error("invalid dsn: {0}")]
    InvalidDsn(String),
    #[error("project with token {0:?} not found")]
    UnknownProject(String),
}

impl From<DsnError> for IngestError {
    fn from(e: DsnError) -> Self {
        IngestError::InvalidDsn(e.to_string())
    }
}

impl From<IngestError> for tonic::Status {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Cancelled => tonic::Status::cancelled(e.to_string()),
            IngestError::MissingMetadata | IngestError::MissingDsn | IngestError::InvalidDsn(_) => {
                tonic::Status::invalid_argument(e.to_string())
            }
            IngestError::UnknownProject(_) => tonic::Status::not_found(e.to_string()),
        }
    }
}
