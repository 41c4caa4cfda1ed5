// Health check endpoint

use axum::{Json, response::IntoResponse};

use crate::types::HealthResponse;

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
