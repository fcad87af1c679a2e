//! User and address records.

use std::fmt;
use std::str::FromStr;

use bson::oid::ObjectId;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Server-generated identifier of a user (24 hex characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct UserId(ObjectId);

impl UserId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectId> for UserId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl FromStr for UserId {
    type Err = bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s).map(Self)
    }
}

impl TryFrom<String> for UserId {
    type Error = bson::oid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0.to_hex()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Postal address embedded in a user. Has no identity of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_age"
    )]
    pub age: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// Largest integer a JSON client can hold without losing precision.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Whole ages go out as integers (`30`, not `30.0`).
fn serialize_age<S: Serializer>(age: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match age {
        Some(a) if a.fract() == 0.0 && a.abs() <= MAX_SAFE_INTEGER => {
            serializer.serialize_some(&(*a as i64))
        }
        Some(a) => serializer.serialize_some(a),
        None => serializer.serialize_none(),
    }
}

impl User {
    /// Materialize a new record, assigning its id and creation time.
    ///
    /// The timestamp is truncated to milliseconds, the precision the
    /// database keeps.
    pub fn from_new(new_user: NewUser) -> Self {
        Self {
            id: UserId::new(),
            name: new_user.name,
            email: new_user.email,
            age: new_user.age,
            created_at: Utc::now().trunc_subsecs(3),
            addresses: new_user.addresses,
        }
    }

    /// Apply a partial update in place. `id` and `created_at` never change.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        if let Some(addresses) = patch.addresses {
            self.addresses = addresses;
        }
    }

    pub fn lives_in(&self, city: &str) -> bool {
        self.addresses.iter().any(|a| a.city == city)
    }
}

/// Validated input for user creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: Option<f64>,
    pub addresses: Vec<Address>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<f64>,
    pub addresses: Option<Vec<Address>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.age.is_none() && self.addresses.is_none()
    }
}
