//! In-process user store backed by `DashMap`.
//!
//! Used by tests and by `--in-memory` runs. Mirrors the MongoDB adapter's
//! observable behavior: unique emails, ascending sorts by any field name
//! (unknown fields keep insertion order) and `InvalidId` for malformed ids.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{NewUser, User, UserId, UserPatch};
use crate::store::{parse_id, ListQuery, SortKey, StoreError, StoreResult, UserStore};

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    user: User,
}

/// A thread-safe, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<DashMap<UserId, Slot>>,
    /// email -> owner, used to reserve emails atomically.
    emails: Arc<DashMap<String, UserId>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn reserve_email(&self, email: &str, owner: UserId) -> StoreResult<()> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(e) if *e.get() != owner => {
                Err(StoreError::DuplicateEmail(email.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(owner);
                Ok(())
            }
        }
    }

    fn release_email(&self, email: &str, owner: UserId) {
        self.emails.remove_if(email, |_, holder| *holder == owner);
    }
}

fn compare_by(sort: &SortKey, a: &Slot, b: &Slot) -> CmpOrdering {
    let (ua, ub) = (&a.user, &b.user);
    let primary = match sort.field() {
        "name" => ua.name.cmp(&ub.name),
        "email" => ua.email.cmp(&ub.email),
        // Missing ages sort first, as a null would in the database.
        "age" => match (ua.age, ub.age) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (x, y) => x.is_some().cmp(&y.is_some()),
        },
        "created_at" => ua.created_at.cmp(&ub.created_at),
        "id" | "_id" => ua.id.cmp(&ub.id),
        _ => CmpOrdering::Equal,
    };
    primary.then(a.seq.cmp(&b.seq))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new_user: NewUser) -> StoreResult<User> {
        let user = User::from_new(new_user);
        self.reserve_email(&user.email, user.id)?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.users.insert(user.id, Slot { seq, user: user.clone() });
        tracing::debug!(user_id = %user.id, "User inserted");
        Ok(user)
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<Vec<User>> {
        let mut slots: Vec<Slot> = self.users.iter().map(|e| e.value().clone()).collect();
        slots.sort_by(|a, b| compare_by(&query.sort, a, b));

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(slots.into_iter().skip(skip).take(limit).map(|s| s.user).collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.users.len() as u64)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let id = parse_id(id)?;
        Ok(self.users.get(&id).map(|slot| slot.user.clone()))
    }

    async fn update(&self, id: &str, patch: UserPatch) -> StoreResult<Option<User>> {
        let id = parse_id(id)?;
        let Some(mut slot) = self.users.get_mut(&id) else {
            return Ok(None);
        };

        let old_email = slot.user.email.clone();
        if let Some(email) = patch.email.as_deref() {
            if email != old_email {
                self.reserve_email(email, id)?;
            }
        }

        slot.user.apply(patch);
        if slot.user.email != old_email {
            self.release_email(&old_email, id);
        }
        Ok(Some(slot.user.clone()))
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<User>> {
        let id = parse_id(id)?;
        let removed = self.users.remove(&id).map(|(_, slot)| slot.user);
        if let Some(user) = &removed {
            self.release_email(&user.email, user.id);
        }
        Ok(removed)
    }

    async fn find_by_city(&self, city: &str) -> StoreResult<Vec<User>> {
        let mut matches: Vec<Slot> = self
            .users
            .iter()
            .filter(|e| e.value().user.lives_in(city))
            .map(|e| e.value().clone())
            .collect();
        matches.sort_by_key(|s| s.seq);
        Ok(matches.into_iter().map(|s| s.user).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
