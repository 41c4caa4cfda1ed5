// Site directory handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use statwell_core::pagination::PaginationParams;

use crate::{
    error::AppError,
    site::service::SiteService,
    state::AppState,
    types::{
        CreateInvitationRequest, CreateSiteRequest, InvitationResponse, ListSitesQuery,
        SetPreferenceRequest, SiteListPageResponse, SitePreferenceResponse, SiteResponse,
        StatsStartDateResponse,
    },
    user::service::UserService,
};

pub(crate) async fn list_sites_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListSitesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let params = PaginationParams {
        page: query.page,
        page_size: query.page_size,
    };
    let page = state
        .site_service
        .list_sites(
            &auth.viewer,
            params,
            query.filter_by_domain.as_deref(),
            query.invitations.unwrap_or(false),
        )
        .await?;

    Ok(Json(SiteListPageResponse::from(page)))
}

pub(crate) async fn create_site_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSiteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let site = state
        .site_service
        .create_site(&auth.user, &payload.domain, payload.timezone.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(SiteResponse::from(site))))
}

pub(crate) async fn toggle_pin_handler(
    Path(site_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let preference = state
        .site_service
        .toggle_pin(&auth.viewer, &site_id)
        .await?;

    Ok(Json(SitePreferenceResponse::from(preference)))
}

pub(crate) async fn set_preference_handler(
    Path((site_id, option)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SetPreferenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let preference = state
        .site_service
        .set_option(&auth.viewer, &site_id, &option, payload.value)
        .await?;

    Ok(Json(SitePreferenceResponse::from(preference)))
}

pub(crate) async fn stats_start_date_handler(
    Path(site_id): Path<String>,
    State(users): State<Arc<UserService>>,
    State(sites): State<Arc<SiteService>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = users.authenticate_rest_request(&headers).await?;

    let stats_start_date = sites.stats_start_date(&auth.viewer, &site_id).await?;

    Ok(Json(StatsStartDateResponse {
        site_id,
        stats_start_date,
    }))
}

pub(crate) async fn create_invitation_handler(
    Path(site_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    let invitation = state
        .site_service
        .invite(&auth.viewer, &site_id, &payload.email, payload.role)
        .await?;

    Ok((StatusCode::CREATED, Json(InvitationResponse::from(invitation))))
}

pub(crate) async fn remove_member_handler(
    Path((site_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state
        .user_service
        .authenticate_rest_request(&headers)
        .await?;

    state
        .site_service
        .remove_member(&auth.viewer, &site_id, &user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
