// Invitation handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{error::AppError, state::AppState, types::MembershipResponse};

pub(crate) async fn accept_invitation_handler(
    Path(invitation_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let membership = state
        .site_service
        .accept_invitation(&auth.user, &invitation_id)
        .await?;

    Ok(Json(MembershipResponse::from(membership)))
}

pub(crate) async fn delete_invitation_handler(
    Path(invitation_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    state
        .site_service
        .revoke_invitation(&auth.viewer, &invitation_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
