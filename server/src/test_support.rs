#![allow(dead_code)]

use axum::{
    body::to_bytes,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use statwell_core::{config::AppConfig, db::Database, site::SiteRecord, user::UserRecord};
use tempfile::TempDir;

use crate::{
    state::{AppState, build_state},
    user::service::USER_ID_HEADER,
};

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    setup_state_with(AppConfig::default()).await
}

pub(crate) async fn setup_state_with(mut config: AppConfig) -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let db_path = temp_dir.path().join("test.db");
    config.database_path = db_path.to_string_lossy().into_owned();

    let database = Database::connect(&config).await.expect("connect database");
    let state = build_state(&database, &config);

    (temp_dir, database, state)
}

pub(crate) async fn seed_user(state: &AppState, email: &str) -> UserRecord {
    state
        .user_store
        .create(email, None)
        .await
        .expect("create user")
}

pub(crate) async fn seed_site(state: &AppState, domain: &str, owner: &UserRecord) -> SiteRecord {
    state
        .site_store
        .create(domain, None, &owner.id)
        .await
        .expect("create site")
}

pub(crate) fn auth_headers(user: &UserRecord) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_ID_HEADER,
        HeaderValue::from_str(&user.id).expect("user id header"),
    );
    headers
}

pub(crate) async fn response_json(response: impl IntoResponse) -> (StatusCode, serde_json::Value) {
    let response: Response = response.into_response();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (parts.status, json)
}
