use axum::{http::StatusCode, response::IntoResponse, Json};

pub async fn health_check() -> &'static str {
    "OK"
}

/// Landing page for signed-in users whose role does not admit the page they asked for.
pub async fn unauthorized() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "Unauthorized Access" })),
    )
}
