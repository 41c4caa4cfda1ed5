use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderMap};
use statwell_core::{
    config::AppConfig,
    user::{UserRecord, UserStore, Viewer},
};

use crate::{AppError, observability, state::AppState};

pub const USER_ID_HEADER: &str = "x-statwell-user-id";

/// The caller of a REST request, resolved from [`USER_ID_HEADER`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: UserRecord,
    pub viewer: Viewer,
}

pub struct UserService {
    user_store: UserStore,
    config: Arc<AppConfig>,
}

impl UserService {
    pub fn new(user_store: UserStore, config: Arc<AppConfig>) -> Self {
        Self { user_store, config }
    }

    pub async fn fetch_user_with<F>(
        &self,
        user_id: &str,
        not_found: F,
    ) -> Result<UserRecord, AppError>
    where
        F: FnOnce() -> AppError,
    {
        self.user_store
            .find_by_id(user_id)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(not_found)
    }

    pub async fn authenticate_rest_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedUser, AppError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("authentication required"))?;

        let user = self
            .fetch_user_with(user_id, || AppError::unauthorized("authentication required"))
            .await?;
        observability::record_authenticated_identity(user.id.as_str());

        let viewer = Viewer::for_user(&user, &self.config);
        Ok(AuthenticatedUser { user, viewer })
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Arc<UserService> {
        Arc::clone(&state.user_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    use crate::test_support::{seed_user, setup_state};

    #[tokio::test]
    async fn missing_or_unknown_user_header_is_unauthorized() {
        let (_dir, _database, state) = setup_state().await;

        let err = state
            .user_service
            .authenticate_rest_request(&HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.into_payload().0, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("nobody"));
        let err = state
            .user_service
            .authenticate_rest_request(&headers)
            .await
            .unwrap_err();
        assert_eq!(err.into_payload().0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn known_user_resolves_to_viewer() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "Someone@Example.com").await;

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&user.id).unwrap());

        let auth = state
            .user_service
            .authenticate_rest_request(&headers)
            .await
            .expect("authenticated");
        assert_eq!(auth.user.id, user.id);
        assert_eq!(auth.viewer.email, "someone@example.com");
        assert!(!auth.viewer.super_admin);
    }
}
