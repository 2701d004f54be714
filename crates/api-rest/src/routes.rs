//! Request handlers for the upload, download and health endpoints.

use crate::error::{bad_request, files_error, join_error, multipart_error, ApiError};
use crate::AppState;
use api_shared::{HealthRes, HealthService, UploadRes};
use axum::{
    body::Bytes,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use filing_files::{FileRecord, RelativePath};
use serde::Deserialize;
use utoipa::IntoParams;

const FILE_FIELD: &str = "file";
const SHA256_FIELD: &str = "sha256";
const UNPACK_FIELD: &str = "unpack";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload options. Each may also be sent as a multipart text field; the query string wins.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Expected SHA-256 of the uploaded bytes, hex encoded
    pub sha256: Option<String>,
    /// `true` to extract a zip archive instead of storing it
    pub unpack: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Upload directory is usable", body = HealthRes),
        (status = 503, description = "Upload directory is missing or read-only", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthRes>) {
    let res = HealthService::check(state.store.base_dir());
    if !res.ok {
        tracing::warn!(reason = %res.message, "health check failed");
    }
    let status = if res.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(res))
}

#[utoipa::path(
    put,
    path = "/upload/{path}",
    params(
        ("path" = String, Path, description = "Destination relative to the upload directory"),
        UploadParams
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Field `file` holds the bytes"),
    responses(
        (status = 201, description = "Files stored", body = UploadRes),
        (status = 400, description = "Missing field, malformed multipart or invalid path"),
        (status = 413, description = "Body exceeds the upload limit"),
        (status = 422, description = "Checksum mismatch, conflict or write failure")
    )
)]
/// Store an uploaded file, or unpack an uploaded zip archive
///
/// Also routed for `POST`.
///
/// # Returns
/// * `201` with `{ "<path>": [size, sha256] }` for every stored file
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the path is invalid,
/// - the `file` field or `sha256` is missing,
/// - `unpack` is not a boolean.
///
/// Returns `422 Unprocessable Entity` if the filestore refuses the upload.
#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    AxumPath(raw_path): AxumPath<String>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadRes>), ApiError> {
    let path = RelativePath::parse(&raw_path).map_err(files_error)?;

    let mut data: Option<Bytes> = None;
    let mut sha256 = params.sha256;
    let mut unpack = params.unpack;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => data = Some(field.bytes().await.map_err(multipart_error)?),
            Some(SHA256_FIELD) => {
                let value = field.text().await.map_err(multipart_error)?;
                sha256.get_or_insert(value);
            }
            Some(UNPACK_FIELD) => {
                let value = field.text().await.map_err(multipart_error)?;
                unpack.get_or_insert(value);
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| bad_request("Expecting upload 'file'"))?;
    let sha256 = sha256
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request("Expecting arg 'sha256'"))?;
    let unpack = match unpack.as_deref() {
        Some(value) => parse_flag(value)
            .ok_or_else(|| bad_request(format!("Invalid value for 'unpack': {value}")))?,
        None => false,
    };

    tracing::info!(path = %path, size = data.len(), unpack, "Upload received");

    let store = state.store.clone();
    let target = path.clone();
    let records: Vec<FileRecord> = tokio::task::spawn_blocking(move || {
        if unpack {
            store.unpack(&target, &data, &sha256)
        } else {
            store.put(&target, &data, &sha256).map(|record| vec![record])
        }
    })
    .await
    .map_err(join_error)?
    .map_err(files_error)?;

    state.spawn_rescan(path.parent());

    let res: UploadRes = records
        .into_iter()
        .map(|record| (record.path.to_string(), record.size, record.sha256.to_string()))
        .collect();
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    delete,
    path = "/upload/{path}",
    params(("path" = String, Path, description = "File relative to the upload directory")),
    responses(
        (status = 200, description = "File deleted"),
        (status = 400, description = "Invalid path"),
        (status = 404, description = "No such file"),
        (status = 422, description = "File could not be deleted")
    )
)]
/// Delete a stored file
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    AxumPath(raw_path): AxumPath<String>,
) -> Result<Json<()>, ApiError> {
    let path = RelativePath::parse(&raw_path).map_err(files_error)?;

    let store = state.store.clone();
    let target = path.clone();
    tokio::task::spawn_blocking(move || store.delete(&target))
        .await
        .map_err(join_error)?
        .map_err(files_error)?;

    state.spawn_rescan(path.parent());
    Ok(Json(()))
}

#[utoipa::path(
    get,
    path = "/download/{path}",
    params(("path" = String, Path, description = "File relative to the upload directory")),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Invalid path"),
        (status = 404, description = "No such file")
    )
)]
/// Download a stored file
///
/// The content type is sniffed from the file's leading bytes, falling back to
/// `application/octet-stream`.
#[axum::debug_handler]
pub async fn download(
    State(state): State<AppState>,
    AxumPath(raw_path): AxumPath<String>,
) -> Result<Response, ApiError> {
    let path = RelativePath::parse(&raw_path).map_err(files_error)?;

    let store = state.store.clone();
    let bytes = tokio::task::spawn_blocking(move || store.read(&path))
        .await
        .map_err(join_error)?
        .map_err(files_error)?;

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
