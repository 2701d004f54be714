//! Mapping of core errors onto HTTP responses.
//!
//! Handlers return `(StatusCode, String)` with a plain text message. Server-side failures
//! are logged in full and answered with a generic message.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use filing_files::FilesError;

pub type ApiError = (StatusCode, String);

/// Status code reported for a filestore failure.
pub fn status_for(error: &FilesError) -> StatusCode {
    match error {
        FilesError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        FilesError::NotFound(_) => StatusCode::NOT_FOUND,
        FilesError::InvalidBaseDirectory(_) | FilesError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        FilesError::ChecksumMismatch { .. }
        | FilesError::Conflict(_)
        | FilesError::BatchConflict(_)
        | FilesError::UnsupportedArchive(_)
        | FilesError::StagingWrite { .. }
        | FilesError::Move { .. }
        | FilesError::Extraction(_)
        | FilesError::Delete { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

pub(crate) fn files_error(error: FilesError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("Filestore error: {:?}", error);
        return (status, "Internal error".into());
    }

    tracing::warn!(status = status.as_u16(), "Request rejected: {}", error);
    (status, error.to_string())
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    let message = message.into();
    tracing::warn!("Bad request: {}", message);
    (StatusCode::BAD_REQUEST, message)
}

pub(crate) fn multipart_error(error: MultipartError) -> ApiError {
    tracing::warn!("Multipart error: {:?}", error);
    (error.status(), error.body_text())
}

pub(crate) fn join_error(error: tokio::task::JoinError) -> ApiError {
    tracing::error!("Blocking task failed: {:?}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal error".into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_files::RelativePath;
    use std::io;

    #[test]
    fn test_status_for_maps_every_class() {
        let path = RelativePath::parse("a.txt").unwrap();

        assert_eq!(
            status_for(&FilesError::InvalidPath("..".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&FilesError::NotFound(path.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&FilesError::Io(io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&FilesError::Conflict(path.clone())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&FilesError::BatchConflict(vec![path])),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&FilesError::UnsupportedArchive("a.tar".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let (status, message) = files_error(FilesError::Io(io::Error::other("secret path")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal error");
    }
}
