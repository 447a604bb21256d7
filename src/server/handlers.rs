//! Request handlers
//!
//! Upload routes stream the multipart field straight into the staging file;
//! nothing is buffered in memory beyond multer's chunking.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Request, Response, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::AppState;
use crate::db::Video;
use crate::media::UploadKind;
use crate::metrics;
use crate::router::{Route, RouterError};
use crate::upload::{IncomingUpload, StagingError, UploadError};

type HttpResponse = Response<Full<Bytes>>;

impl From<multer::Error> for StagingError {
    fn from(e: multer::Error) -> Self {
        match e {
            multer::Error::StreamSizeExceeded { limit }
            | multer::Error::FieldSizeExceeded { limit, .. } => StagingError::TooLarge { limit },
            other => StagingError::Body(format!("Malformed multipart body: {}", other)),
        }
    }
}

/// Dispatch one request
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<HttpResponse, Infallible> {
    let span = tracing::info_span!(
        "http.request",
        method = %req.method(),
        path = %req.uri().path()
    );

    async move {
        let route = match Route::parse(req.method(), req.uri().path()) {
            Ok(route) => route,
            Err(e) => return Ok(router_error_response(&e)),
        };

        let response = match route {
            Route::Health => text_response(StatusCode::OK, "ok"),
            Route::Asset { key } => serve_asset(&state, &key).await,
            Route::Upload { kind, video_id } => {
                upload_response(handle_upload(req, &state, kind, video_id).await)
            }
        };

        tracing::debug!(status = response.status().as_u16(), "Request complete");
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn handle_upload(
    req: Request<Incoming>,
    state: &AppState,
    kind: UploadKind,
    video_id: Uuid,
) -> Result<Video, UploadError> {
    let principal = state.authenticator.authenticate(req.headers()).await?;
    let video = state.pipeline.authorize(video_id, &principal).await?;
    state.pipeline.admit(kind, declared_length(req.headers()))?;

    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| UploadError::BadRequest("Expected a multipart/form-data body".into()))?;

    let limit = state.pipeline.limits().for_kind(kind);
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let mut multipart = Multipart::with_constraints(
        req.into_body().into_data_stream(),
        boundary,
        constraints,
    );

    let field = loop {
        match multipart.next_field().await.map_err(StagingError::from)? {
            Some(field) if field.name() == Some(kind.form_field()) => break field,
            Some(_) => continue,
            None => {
                return Err(UploadError::BadRequest(format!(
                    "Missing form field '{}'",
                    kind.form_field()
                )))
            }
        }
    };

    let upload = IncomingUpload::new(field.content_type().map(|m| m.to_string()), field);
    match kind {
        UploadKind::Thumbnail => state.pipeline.upload_thumbnail(video, upload).await,
        UploadKind::Video => state.pipeline.upload_video(video, upload).await,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn upload_response(result: Result<Video, UploadError>) -> HttpResponse {
    match result {
        Ok(video) => json_response(StatusCode::OK, &video),
        Err(e) => upload_error_response(&e),
    }
}

fn upload_error_response(e: &UploadError) -> HttpResponse {
    metrics::record_error(e.kind());
    let status = e.status_code();
    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
    } else {
        tracing::info!(error = %e, status = status.as_u16(), "Request rejected");
    }

    let mut response = json_error(status, &e.public_message());
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

fn router_error_response(e: &RouterError) -> HttpResponse {
    match e {
        RouterError::InvalidVideoId(_) => json_error(StatusCode::BAD_REQUEST, "Invalid video ID"),
        RouterError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "Not found"),
        RouterError::MethodNotAllowed(_) => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
    }
}

async fn serve_asset(state: &AppState, key: &str) -> HttpResponse {
    let Some(path) = state.assets.resolve(key) else {
        return json_error(StatusCode::NOT_FOUND, "Not found");
    };

    match tokio::fs::read(&path).await {
        Ok(content) => {
            let mut response = bytes_response(StatusCode::OK, content);
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(asset_content_type(key)));
            response
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            json_error(StatusCode::NOT_FOUND, "Not found")
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Failed to read asset");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read asset")
        }
    }
}

fn asset_content_type(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpeg" || ext == "jpg" => "image/jpeg",
        Some(ext) if ext == "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

fn bytes_response(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = bytes_response(status, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> HttpResponse {
    match serde_json::to_vec(data) {
        Ok(body) => {
            let mut response = bytes_response(status, body);
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode response")
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message });
    let mut response = bytes_response(status, body.to_string());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
