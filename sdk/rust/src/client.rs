use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::models::{CreateUser, ListUsers, Message, UpdateUser, User, UserPage};

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status and a `{message}` body.
    #[error("API returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl SdkError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            SdkError::Http(e) => e.status(),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Typed client for the users API.
#[derive(Clone)]
pub struct UsersClient {
    client: Client,
    base_url: String,
}

impl UsersClient {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn users_url(&self, suffix: &str) -> String {
        format!("{}/api/users{}", self.base_url, suffix)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> SdkResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        let message = serde_json::from_str::<Message>(&text)
            .map(|m| m.message)
            .unwrap_or(text);
        Err(SdkError::Api { status, message })
    }

    pub async fn create_user(&self, user: &CreateUser) -> SdkResult<User> {
        Self::send(self.client.post(self.users_url("")).json(user)).await
    }

    /// Create from an arbitrary JSON body, bypassing client-side typing.
    pub async fn create_user_raw(&self, body: &serde_json::Value) -> SdkResult<User> {
        Self::send(self.client.post(self.users_url("")).json(body)).await
    }

    pub async fn list_users(&self, query: &ListUsers) -> SdkResult<UserPage> {
        Self::send(self.client.get(self.users_url("")).query(query)).await
    }

    pub async fn get_user(&self, id: &str) -> SdkResult<User> {
        Self::send(self.client.get(self.users_url(&format!("/{id}")))).await
    }

    pub async fn update_user(&self, id: &str, patch: &UpdateUser) -> SdkResult<User> {
        Self::send(self.client.put(self.users_url(&format!("/{id}"))).json(patch)).await
    }

    /// Returns the server's confirmation message.
    pub async fn delete_user(&self, id: &str) -> SdkResult<String> {
        let message: Message = Self::send(self.client.delete(self.users_url(&format!("/{id}")))).await?;
        Ok(message.message)
    }

    pub async fn search_by_city(&self, city: &str) -> SdkResult<Vec<User>> {
        Self::send(self.client.get(self.users_url("/search")).query(&[("city", city)])).await
    }

    pub async fn health(&self) -> SdkResult<serde_json::Value> {
        Self::send(self.client.get(format!("{}/health", self.base_url))).await
    }
}
