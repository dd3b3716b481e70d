use axum::Json;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::mount::MountRegistry;

/// Largest accepted mount request body.
const MAX_BODY: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct MountRequest {
    #[serde(rename = "filePath")]
    file_path: String,
}

/// `POST <api_path>mountZIP`: open the archive named in the body and make it current.
pub async fn handle(registry: &MountRegistry, body: Body) -> Response {
    let request = match axum::body::to_bytes(body, MAX_BODY)
        .await
        .map_err(|e| e.to_string())
        .and_then(|bytes| {
            serde_json::from_slice::<MountRequest>(&bytes).map_err(|e| e.to_string())
        }) {
        Ok(request) => request,
        Err(reason) => {
            tracing::warn!("rejected mount request: {}", reason);
            return failure(StatusCode::BAD_REQUEST, "invalid mount request");
        }
    };

    match registry.mount(&request.file_path).await {
        Ok(generation) => (
            StatusCode::OK,
            Json(json!({
                "status": "mounted",
                "generation": generation,
                "source": request.file_path,
            })),
        )
            .into_response(),
        Err(err) => failure(err.status(), &err.to_string()),
    }
}

fn failure(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({ "status": "error", "error": reason }))).into_response()
}
