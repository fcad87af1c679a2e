//! MongoDB adapter.
//!
//! Users live in one collection. Addresses are embedded sub-documents, the
//! primary key is an `ObjectId` under `_id`, and a unique index on `email`
//! is created at startup.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::domain::{Address, NewUser, User, UserPatch};
use crate::store::{parse_id, ListQuery, StoreError, StoreResult, UserStore};

const DUPLICATE_KEY: i32 = 11000;

/// On-disk shape of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age: Option<f64>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    addresses: Vec<Address>,
}

impl From<User> for UserDocument {
    fn from(u: User) -> Self {
        Self {
            id: u.id.as_object_id(),
            name: u.name,
            email: u.email,
            age: u.age,
            created_at: u.created_at,
            addresses: u.addresses,
        }
    }
}

impl From<UserDocument> for User {
    fn from(d: UserDocument) -> Self {
        Self {
            id: d.id.into(),
            name: d.name,
            email: d.email,
            age: d.age,
            created_at: d.created_at,
            addresses: d.addresses,
        }
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn sort_field(field: &str) -> &str {
    match field {
        "id" => "_id",
        other => other,
    }
}

fn patch_to_set(patch: UserPatch) -> StoreResult<Document> {
    let mut set = Document::new();
    if let Some(name) = patch.name {
        set.insert("name", name);
    }
    if let Some(email) = patch.email {
        set.insert("email", email);
    }
    if let Some(age) = patch.age {
        set.insert("age", age);
    }
    if let Some(addresses) = patch.addresses {
        let value = bson::to_bson(&addresses).map_err(|e| StoreError::Backend(e.to_string()))?;
        set.insert("addresses", value);
    }
    Ok(set)
}

/// User store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoUserStore {
    db: Database,
    users: Collection<UserDocument>,
}

impl MongoUserStore {
    /// Connect using the configured URI and ensure indexes exist.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let client = Client::with_uri_str(&config.uri).await?;
        let db = client.database(&config.name);
        let store = Self {
            users: db.collection(&config.collection),
            db,
        };
        store.ensure_indexes().await?;

        tracing::info!(
            database = %config.name,
            collection = %config.collection,
            "Connected to MongoDB"
        );
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users.create_index(unique_email).await?;
        Ok(())
    }

    fn map_write_error(e: mongodb::error::Error, email: &str) -> StoreError {
        if is_duplicate_key(&e) {
            StoreError::DuplicateEmail(email.to_string())
        } else {
            e.into()
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, new_user: NewUser) -> StoreResult<User> {
        let user = User::from_new(new_user);
        let document = UserDocument::from(user.clone());

        self.users
            .insert_one(&document)
            .await
            .map_err(|e| Self::map_write_error(e, &user.email))?;
        Ok(user)
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<Vec<User>> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let mut sort = Document::new();
        sort.insert(sort_field(query.sort.field()), 1);

        let cursor = self
            .users
            .find(doc! {})
            .sort(sort)
            .skip(query.skip)
            .limit(limit)
            .await?;

        let documents: Vec<UserDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.users.count_documents(doc! {}).await?)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let oid = parse_id(id)?.as_object_id();
        let found = self.users.find_one(doc! { "_id": oid }).await?;
        Ok(found.map(User::from))
    }

    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>> {
        let oid = parse_id(id)?.as_object_id();
        if patch.is_empty() {
            let found = self.users.find_one(doc! { "_id": oid }).await?;
            return Ok(found.map(User::from));
        }
        let email = patch.email.clone().unwrap_or_default();
        let set = patch_to_set(patch)?;

        let updated = self
            .users
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| Self::map_write_error(e, &email))?;
        Ok(updated.map(User::from))
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<User>> {
        let oid = parse_id(id)?.as_object_id();
        let removed = self.users.find_one_and_delete(doc! { "_id": oid }).await?;
        Ok(removed.map(User::from))
    }

    async fn find_by_city(&self, city: &str) -> StoreResult<Vec<User>> {
        let cursor = self.users.find(doc! { "addresses.city": city }).await?;
        let documents: Vec<UserDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
