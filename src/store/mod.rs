//! Persistence port for user documents.
//!
//! # Responsibilities
//! - Define the `UserStore` trait handlers talk to
//! - Provide a MongoDB adapter (mongo.rs) and an in-process adapter (memory.rs)
//! - Enforce email uniqueness and id immutability at the store boundary
//!
//! Every method is a single document operation. Listing and counting are two
//! separate calls, so a page and its total may disagree under concurrent writes.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::domain::{NewUser, User, UserId, UserPatch};

pub use memory::MemoryUserStore;
pub use mongo::MongoUserStore;

/// Error raised by a store adapter. Never shown to API clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid user id '{0}'")]
    InvalidId(String),

    #[error("email '{0}' is already registered")]
    DuplicateEmail(String),

    #[error("database error: {0}")]
    Backend(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ascending sort key for listings.
///
/// Any field name is accepted. Adapters sort by the named document field;
/// `id` is an alias for the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey(String);

impl SortKey {
    pub fn new(field: impl Into<String>) -> Self {
        Self(field.into())
    }

    pub fn field(&self) -> &str {
        &self.0
    }
}

impl Default for SortKey {
    fn default() -> Self {
        Self::new("name")
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub skip: u64,
    pub limit: u64,
    pub sort: SortKey,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return the stored record.
    async fn insert(&self, new_user: NewUser) -> StoreResult<User>;

    /// Fetch a page of users, sorted ascending.
    async fn list(&self, query: &ListQuery) -> StoreResult<Vec<User>>;

    /// Count every stored user.
    async fn count(&self) -> StoreResult<u64>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// Apply `patch` and return the updated record, or `None` if absent.
    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>>;

    /// Remove a user and return the removed record, or `None` if absent.
    async fn delete(&self, id: &str) -> StoreResult<Option<User>>;

    /// Users with at least one address in exactly `city`.
    async fn find_by_city(&self, city: &str) -> StoreResult<Vec<User>>;

    /// Liveness probe used by the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

/// Parse a path id, mapping a malformed value to `StoreError::InvalidId`.
pub(crate) fn parse_id(id: &str) -> StoreResult<UserId> {
    id.parse().map_err(|_| StoreError::InvalidId(id.to_string()))
}
