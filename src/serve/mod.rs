//! The request-serving engine.
//!
//! Per request: pin the current archive, resolve the path, negotiate the
//! representation, evaluate conditional headers, apply the range, and stream
//! the body while the archive stays pinned.

pub mod conditional;
pub mod encoding;
pub mod mime;
mod mount_api;
pub mod range;
pub mod resolve;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCEPT_ENCODING, ACCEPT_RANGES, ALLOW, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, ETAG, LOCATION, VARY,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServeConfig;
use crate::error::{ServeError, plain_text};
use crate::mount::{ArchiveHandle, MountRegistry};
use crate::store::{ByteSpan, ByteStream, Entry};

use conditional::Evaluation;
use encoding::Representation;
use mime::{GuessMime, MimeLookup};
use range::RangeOutcome;
use resolve::{Resolution, Resolver};

/// Serves files from whatever archive the registry currently holds.
pub struct FileServer {
    registry: Arc<MountRegistry>,
    config: ServeConfig,
    resolver: Resolver,
    mime: Arc<dyn MimeLookup>,
}

impl FileServer {
    pub fn new(registry: Arc<MountRegistry>, config: ServeConfig) -> Self {
        let resolver = Resolver::new(config.redirect_index, config.extensions.clone());
        Self {
            registry,
            config,
            resolver,
            mime: Arc::new(GuessMime),
        }
    }

    pub fn with_mime(mut self, mime: Arc<dyn MimeLookup>) -> Self {
        self.mime = mime;
        self
    }

    pub fn registry(&self) -> &Arc<MountRegistry> {
        &self.registry
    }

    /// Axum router sending every path through [`FileServer::serve`].
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(self))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn serve(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        if self.config.hot_mount
            && parts.uri.path().trim_start_matches('/') == self.config.mount_path()
        {
            if parts.method == Method::POST {
                return mount_api::handle(&self.registry, body).await;
            }
            let mut response = self.error_response(ServeError::MethodNotAllowed);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        if parts.method != Method::GET && parts.method != Method::HEAD {
            return self.error_response(ServeError::MethodNotAllowed);
        }

        match self.serve_file(&parts).await {
            Ok(response) => response,
            Err(err) => self.error_response(err),
        }
    }

    async fn serve_file(&self, parts: &Parts) -> Result<Response, ServeError> {
        let handle = self.registry.current()?;
        let path = self.config.strip_prefix(parts.uri.path());

        let entry = match self.resolver.resolve(handle.store(), path)? {
            Resolution::File(entry) => entry,
            Resolution::Redirect(location) => {
                tracing::debug!(path, %location, "redirect");
                return Ok(redirect(location, parts.uri.query()));
            }
        };

        let repr = encoding::negotiate(parts.headers.get(ACCEPT_ENCODING), &entry);
        let length = repr.length(&entry);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value(&self.mime.content_type(&entry.path))?);
        headers.insert(ETAG, header_value(&entry.etag())?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        if let Some(coding) = repr.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(coding));
        }
        if entry.precompressed {
            headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        }

        let range = match conditional::evaluate(
            &parts.method,
            &parts.headers,
            &mut headers,
            entry.mod_time,
        ) {
            Evaluation::NotModified => {
                return Ok(build(StatusCode::NOT_MODIFIED, headers, Body::empty()));
            }
            Evaluation::Proceed { range } => range,
        };

        let (status, span) = match range.map(|r| range::compute(&r, length)) {
            None | Some(RangeOutcome::Full) => (StatusCode::OK, ByteSpan::whole(length)),
            Some(RangeOutcome::Partial(span)) => {
                headers.insert(
                    CONTENT_RANGE,
                    header_value(&range::content_range(span, length))?,
                );
                headers.insert(CONTENT_LENGTH, HeaderValue::from(span.len));
                (StatusCode::PARTIAL_CONTENT, span)
            }
            Some(RangeOutcome::Unsatisfiable) => {
                return Err(ServeError::RangeNotSatisfiable { length });
            }
        };
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        if parts.method == Method::HEAD || span.len == 0 {
            return Ok(build(status, headers, Body::empty()));
        }

        let stream = match repr {
            Representation::Stored => handle.store().stored_bytes(&entry, span),
            Representation::Logical => handle.store().logical_bytes(&entry, span),
        }
        .map_err(ServeError::from_io)?;
        let body = pinned_body(stream, handle, &entry).await?;
        Ok(build(status, headers, body))
    }

    fn error_response(&self, err: ServeError) -> Response {
        if let Some(hook) = &self.config.error_hook
            && let Some(response) = hook(err.status(), err.message())
        {
            return response;
        }
        err.into_response()
    }
}

async fn dispatch(State(server): State<Arc<FileServer>>, request: Request) -> Response {
    server.serve(request).await
}

/// Wrap the entry stream so the archive stays pinned until the body is done.
///
/// The first chunk is read up front: a failure there still becomes a 500,
/// later failures can only abort the body.
async fn pinned_body(
    mut stream: ByteStream,
    handle: ArchiveHandle,
    entry: &Entry,
) -> Result<Body, ServeError> {
    let first = match stream.next().await {
        Some(Ok(chunk)) => chunk,
        Some(Err(err)) => {
            tracing::error!(path = %entry.path, "cannot read entry: {}", err);
            return Err(ServeError::from_io(err));
        }
        None => return Ok(Body::empty()),
    };

    let path = entry.path.clone();
    let rest = stream.inspect_err(move |err| {
        tracing::error!(
            path = %path,
            generation = handle.generation(),
            "body stream aborted: {}",
            err
        );
    });
    Ok(Body::from_stream(
        futures::stream::once(async move { Ok(first) }).chain(rest),
    ))
}

fn redirect(location: String, query: Option<&str>) -> Response {
    let location = match query {
        Some(query) if !query.is_empty() => format!("{location}?{query}"),
        _ => location,
    };
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            headers.insert(LOCATION, value);
        }
        Err(_) => return plain_text(StatusCode::NOT_FOUND, ServeError::NotFound.message()),
    }
    build(StatusCode::MOVED_PERMANENTLY, headers, Body::empty())
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn header_value(value: &str) -> Result<HeaderValue, ServeError> {
    HeaderValue::from_str(value).map_err(|e| ServeError::Internal(std::io::Error::other(e)))
}
