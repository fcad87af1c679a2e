//! User API handlers.
//!
//! Each handler validates its input, makes its store call(s) and maps the
//! outcome to a status code and JSON body.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    parse_addresses, validate_pagination_params, NewUser, User, UserPatch, ValidationError,
};
use crate::http::body::LenientJson;
use crate::http::error::{ApiError, MessageBody};
use crate::http::server::AppState;
use crate::store::{ListQuery, SortKey};

const USER_NOT_FOUND: &str = "User not found";

/// Body of `POST /api/users`. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<f64>,
    /// Kept untyped so the address validator sees exactly what was sent.
    pub addresses: Option<Value>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> Result<NewUser, ValidationError> {
        let (Some(name), Some(email)) = (non_empty(self.name), non_empty(self.email)) else {
            return Err(ValidationError::MissingNameOrEmail);
        };
        let addresses = match self.addresses {
            Some(value) => parse_addresses(&value)?,
            None => Vec::new(),
        };

        Ok(NewUser {
            name,
            email,
            age: self.age,
            addresses,
        })
    }
}

/// Body of `PUT /api/users/{id}`. Only these fields can be changed.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<f64>,
    pub addresses: Option<Value>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> Result<UserPatch, ValidationError> {
        if self.name.as_deref() == Some("") {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.email.as_deref() == Some("") {
            return Err(ValidationError::EmptyField("email"));
        }
        let addresses = self.addresses.as_ref().map(parse_addresses).transpose()?;

        Ok(UserPatch {
            name: self.name,
            email: self.email,
            age: self.age,
            addresses,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_users: u64,
    pub users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub city: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// `POST /api/users`
pub async fn create_user(
    State(state): State<AppState>,
    LenientJson(request): LenientJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let new_user = request.into_new_user()?;

    let user = state
        .store
        .insert(new_user)
        .await
        .map_err(ApiError::internal("Error creating user"))?;

    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users?page=&limit=&sortBy=`
///
/// The page and the total are fetched by two separate store calls.
pub async fn list_users(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<UserPage>, ApiError> {
    let Query(params) = params?;
    let pagination = validate_pagination_params(params.page.as_deref(), params.limit.as_deref())?;
    let sort = non_empty(params.sort_by).map(SortKey::new).unwrap_or_default();

    let query = ListQuery {
        skip: pagination.skip(),
        limit: pagination.limit,
        sort,
    };
    let users = state
        .store
        .list(&query)
        .await
        .map_err(ApiError::internal("Error fetching users"))?;
    let total_users = state
        .store
        .count()
        .await
        .map_err(ApiError::internal("Error fetching users"))?;

    Ok(Json(UserPage {
        current_page: pagination.page,
        total_pages: pagination.total_pages(total_users),
        total_users,
        users,
    }))
}

/// `GET /api/users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .store
        .find_by_id(&id)
        .await
        .map_err(ApiError::internal("Error fetching user"))?
        .map(Json)
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))
}

/// `PUT /api/users/{id}`
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LenientJson(request): LenientJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let patch = request.into_patch()?;

    let user = state
        .store
        .update(&id, patch)
        .await
        .map_err(ApiError::internal("Error updating user"))?
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))?;

    tracing::info!(user_id = %user.id, "User updated");
    Ok(Json(user))
}

/// `DELETE /api/users/{id}`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let removed = state
        .store
        .delete(&id)
        .await
        .map_err(ApiError::internal("Error deleting user"))?
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))?;

    tracing::info!(user_id = %removed.id, "User deleted");
    Ok(Json(MessageBody::new("User deleted")))
}

/// `GET /api/users/search?city=`
pub async fn search_users(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<User>>, ApiError> {
    let Query(params) = params?;
    let city = non_empty(params.city).ok_or(ValidationError::MissingCity)?;

    let users = state
        .store
        .find_by_city(&city)
        .await
        .map_err(ApiError::internal("Error searching users"))?;

    if users.is_empty() {
        return Err(ApiError::NotFound("No users found in this city"));
    }
    Ok(Json(users))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let version = env!("CARGO_PKG_VERSION");
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthStatus { status: "ok", version })),
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus { status: "degraded", version }),
            )
        }
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found")
}
