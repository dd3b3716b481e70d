use axum::body::Body;
use axum::http::header::{CONTENT_RANGE, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::io;
use thiserror::Error;

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Failures of a content request, each mapped to one HTTP status.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("not found")]
    NotFound,

    #[error("directory has no index")]
    Forbidden,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("range not satisfiable for length {length}")]
    RangeNotSatisfiable { length: u64 },

    #[error("no archive is mounted")]
    ArchiveUnavailable,

    #[error("internal error: {0}")]
    Internal(#[from] io::Error),
}

impl ServeError {
    /// Map an archive-layer I/O error onto the HTTP error classes.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::Forbidden,
            _ => Self::Internal(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ArchiveUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Public message for the error page. Never carries internal detail.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "404 page not found",
            Self::Forbidden => "403 Forbidden",
            Self::MethodNotAllowed => "405 Method Not Allowed",
            Self::RangeNotSatisfiable { .. } => "416 Requested Range Not Satisfiable",
            Self::ArchiveUnavailable => "503 Service Unavailable",
            Self::Internal(_) => "500 Internal Server Error",
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            tracing::error!("request failed: {}", err);
        }

        let mut response = plain_text(self.status(), self.message());
        match self {
            Self::RangeNotSatisfiable { length } => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{length}")) {
                    response.headers_mut().insert(CONTENT_RANGE, value);
                }
            }
            Self::MethodNotAllowed => {
                response
                    .headers_mut()
                    .insert(axum::http::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            }
            _ => {}
        }
        response
    }
}

/// A `text/plain` error page in the usual shape: message plus newline.
pub fn plain_text(status: StatusCode, message: &str) -> Response {
    let mut response = Response::new(Body::from(format!("{message}\n")));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Why an archive could not be opened for mounting.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("file not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("not a valid archive: {0}")]
    InvalidArchive(String),

    #[error("remote archive unavailable: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl OpenError {
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidArchive(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
