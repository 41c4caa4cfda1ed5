// Router configuration

use axum::{
    Router,
    http::Method,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{health_handlers::*, invitation_handlers::*, site_handlers::*},
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Sites
        .route(
            "/api/sites",
            get(list_sites_handler).post(create_site_handler),
        )
        .route("/api/sites/{site_id}/pin", post(toggle_pin_handler))
        .route(
            "/api/sites/{site_id}/preferences/{option}",
            put(set_preference_handler),
        )
        .route(
            "/api/sites/{site_id}/stats-start-date",
            get(stats_start_date_handler),
        )
        .route(
            "/api/sites/{site_id}/invitations",
            post(create_invitation_handler),
        )
        .route(
            "/api/sites/{site_id}/members/{user_id}",
            delete(remove_member_handler),
        )
        // Invitations
        .route(
            "/api/invitations/{invitation_id}/accept",
            post(accept_invitation_handler),
        )
        .route(
            "/api/invitations/{invitation_id}",
            delete(delete_invitation_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_context_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::test_support::{auth_headers, seed_site, seed_user, setup_state};

    #[tokio::test]
    async fn health_route_accepts_client_request_id() {
        let (_dir, _database, state) = setup_state().await;
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_requires_identity_header() {
        let (_dir, _database, state) = setup_state().await;
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/sites")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn pin_then_list_through_router() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        seed_site(&state, "alpha.example", &owner).await;
        let pinned = seed_site(&state, "beta.example", &owner).await;
        let router = build_router(state);

        let mut pin = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/sites/{}/pin", pinned.id.as_str()))
            .body(Body::empty())
            .unwrap();
        pin.headers_mut().extend(auth_headers(&owner));
        let response = router.clone().oneshot(pin).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut list = Request::builder()
            .uri("/api/sites?page=1&page_size=10")
            .body(Body::empty())
            .unwrap();
        list.headers_mut().extend(auth_headers(&owner));
        let response = router.oneshot(list).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        let domains: Vec<&str> = json["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["site"]["domain"].as_str().unwrap())
            .collect();
        assert_eq!(domains, vec!["beta.example", "alpha.example"]);
        assert_eq!(json["entries"][0]["type"], "pinned_site");
    }
}
