//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, metrics, body limit)
//! - Bind the server to a listener and serve until shutdown

use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::handlers::{
    create_user, delete_user, get_user, health, list_users, not_found, search_users, update_user,
};
use crate::http::request_id::{request_id_of, MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::observability::metrics::track_metrics;
use crate::store::UserStore;

/// Path prefix the user routes are mounted under.
pub const USERS_PREFIX: &str = "/api/users";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

/// User routes, relative to [`USERS_PREFIX`].
///
/// `/search` must stay registered before `/{id}` so a search is never read
/// as a lookup of the id "search".
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/search", get(search_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

/// Build the full application router with all middleware layers.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .nest(USERS_PREFIX, users_router())
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(track_metrics))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id_of(request),
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}

/// HTTP server for the users API.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server over the given store.
    pub fn new(config: AppConfig, store: Arc<dyn UserStore>) -> Self {
        let router = build_router(AppState::new(store), config.server.max_body_bytes);
        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener until
    /// a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::http::error::MessageBody;
    use crate::http::handlers::UserPage;
    use crate::store::MemoryUserStore;
    use axum::http::{Method, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::new(Arc::new(MemoryUserStore::new())), 1024 * 1024)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn create(app: &Router, name: &str, city: Option<&str>) -> User {
        let mut body = json!({ "name": name, "email": format!("{}@x.com", name.to_lowercase()) });
        if let Some(city) = city {
            body["addresses"] = json!([{
                "street": "Calle 1", "city": city, "country": "PE", "postal_code": "15001"
            }]);
        }
        let (status, bytes) = call(app, Method::POST, "/api/users", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        parse(&bytes)
    }

    #[tokio::test]
    async fn test_create_returns_201_with_generated_id() {
        let app = app();
        let body = json!({ "name": "Ana", "email": "ana@x.com" });
        let (status, bytes) = call(&app, Method::POST, "/api/users", Some(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        let user: Value = parse(&bytes);
        assert_eq!(user["name"], "Ana");
        assert_eq!(user["addresses"], json!([]));
        assert_eq!(user["id"].as_str().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_create_missing_email_is_400() {
        let (status, bytes) =
            call(&app(), Method::POST, "/api/users", Some(json!({ "name": "Ana" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Name and email are required.");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/users")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_500() {
        let app = app();
        create(&app, "Ana", None).await;
        let body = json!({ "name": "Ana Two", "email": "ana@x.com" });
        let (status, bytes) = call(&app, Method::POST, "/api/users", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Error creating user");
    }

    #[tokio::test]
    async fn test_list_second_page_sorted_by_name() {
        let app = app();
        let names = [
            "Lucia", "Bruno", "Karla", "Ana", "Hugo", "Diego", "Jorge", "Carla", "Elena", "Ivan",
            "Fabio", "Gina",
        ];
        for name in names {
            create(&app, name, None).await;
        }

        let (status, bytes) = call(&app, Method::GET, "/api/users?page=2&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        let page: UserPage = parse(&bytes);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_users, 12);
        let listed: Vec<_> = page.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(listed, ["Fabio", "Gina", "Hugo", "Ivan", "Jorge"]);
    }

    #[tokio::test]
    async fn test_list_rejects_non_positive_and_defaults_non_numeric() {
        let app = app();
        let (status, bytes) = call(&app, Method::GET, "/api/users?limit=-5", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Page and limit must be positive integers");

        let (status, bytes) = call(&app, Method::GET, "/api/users?page=abc&limit=abc", None).await;
        assert_eq!(status, StatusCode::OK);
        let page: UserPage = parse(&bytes);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_list_sort_by_email() {
        let app = app();
        create(&app, "Zoe", None).await;
        let body = json!({ "name": "Adam", "email": "zz@x.com" });
        call(&app, Method::POST, "/api/users", Some(body)).await;

        let (_, bytes) = call(&app, Method::GET, "/api/users?sortBy=email", None).await;
        let page: UserPage = parse(&bytes);
        let listed: Vec<_> = page.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(listed, ["Zoe", "Adam"]);
    }

    #[tokio::test]
    async fn test_search_is_routed_before_id_lookup() {
        let app = app();
        create(&app, "Ana", Some("Lima")).await;
        create(&app, "Bruno", Some("Cusco")).await;

        let (status, bytes) = call(&app, Method::GET, "/api/users/search?city=Lima", None).await;
        assert_eq!(status, StatusCode::OK);
        let users: Vec<User> = parse(&bytes);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_search_errors() {
        let app = app();
        let (status, bytes) = call(&app, Method::GET, "/api/users/search", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            parse::<MessageBody>(&bytes).message,
            "You must provide a city as a query parameter"
        );

        let (status, bytes) = call(&app, Method::GET, "/api/users/search?city=Quito", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(parse::<MessageBody>(&bytes).message, "No users found in this city");
    }

    #[tokio::test]
    async fn test_get_update_delete_lifecycle() {
        let app = app();
        let user = create(&app, "Ana", None).await;
        let path = format!("/api/users/{}", user.id);

        let (status, bytes) = call(&app, Method::GET, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<User>(&bytes), user);

        let patch = json!({ "age": 31, "id": "000000000000000000000000" });
        let (status, bytes) = call(&app, Method::PUT, &path, Some(patch)).await;
        assert_eq!(status, StatusCode::OK);
        let updated: User = parse(&bytes);
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.age, Some(31.0));

        let (status, bytes) = call(&app, Method::DELETE, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<MessageBody>(&bytes).message, "User deleted");

        let (status, bytes) = call(&app, Method::DELETE, &path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(parse::<MessageBody>(&bytes).message, "User not found");

        let (status, _) = call(&app, Method::PUT, &path, Some(json!({ "age": 1 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_500() {
        let app = app();
        let cases = [
            (Method::GET, None, "Error fetching user"),
            (Method::PUT, Some(json!({ "age": 1 })), "Error updating user"),
            (Method::DELETE, None, "Error deleting user"),
        ];
        for (method, body, message) in cases {
            let (status, bytes) = call(&app, method, "/api/users/not-an-id", body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(parse::<MessageBody>(&bytes).message, message);
        }
    }

    #[tokio::test]
    async fn test_bodyless_post_reports_missing_fields() {
        let (status, bytes) = call(&app(), Method::POST, "/api/users", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Name and email are required.");
    }

    #[tokio::test]
    async fn test_bodyless_put_returns_current_record() {
        let app = app();
        let user = create(&app, "Ana", None).await;
        let path = format!("/api/users/{}", user.id);

        let (status, bytes) = call(&app, Method::PUT, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<User>(&bytes), user);

        // A non-JSON content type is read as an empty object too.
        let request = Request::builder()
            .method(Method::PUT)
            .uri(&path)
            .header("content-type", "text/plain")
            .body(Body::from("name=Eve"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_validates_input() {
        let app = app();
        let user = create(&app, "Ana", Some("Lima")).await;
        let path = format!("/api/users/{}", user.id);

        let bad_address = json!({ "addresses": [{ "street": "Calle 1", "city": "Lima" }] });
        let (status, bytes) = call(&app, Method::PUT, &path, Some(bad_address)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            parse::<MessageBody>(&bytes).message,
            "Each address must be an object with valid fields (street, city, country, postal_code)."
        );

        let (status, bytes) = call(&app, Method::PUT, &path, Some(json!({ "addresses": "Lima" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<MessageBody>(&bytes).message, "The 'addresses' field must be an array.");

        let (status, bytes) = call(&app, Method::PUT, &path, Some(json!({ "name": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse::<MessageBody>(&bytes).message, "The 'name' field must not be empty.");

        let (_, bytes) = call(&app, Method::GET, &path, None).await;
        assert_eq!(parse::<User>(&bytes), user);
    }

    #[tokio::test]
    async fn test_update_to_taken_email_is_500() {
        let app = app();
        let ana = create(&app, "Ana", None).await;
        create(&app, "Bruno", None).await;

        let path = format!("/api/users/{}", ana.id);
        let patch = json!({ "email": "bruno@x.com" });
        let (status, bytes) = call(&app, Method::PUT, &path, Some(patch)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Error updating user");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let app = build_router(AppState::new(Arc::new(MemoryUserStore::new())), 32);
        let body = json!({ "name": "Ana", "email": "ana@x.com", "age": 30, "addresses": [] });
        let (status, bytes) = call(&app, Method::POST, "/api/users", Some(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!parse::<MessageBody>(&bytes).message.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let app = app();
        let (status, bytes) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<Value>(&bytes)["status"], "ok");

        let (status, bytes) = call(&app, Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(parse::<MessageBody>(&bytes).message, "Not found");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");

        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }
}
