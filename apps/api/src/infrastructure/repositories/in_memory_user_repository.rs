use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::repositories::user_repository::{
    RepositoryError, RepositoryResult, UserRepository, UserTransaction,
};
use crate::domain::user::{NewUserRecord, User, UserFilter};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

impl Store {
    fn email_owner(&self, email: &str) -> Option<i64> {
        self.users
            .values()
            .find(|u| u.email.as_str() == email)
            .map(|u| u.id)
    }

    fn materialize(&mut self, record: NewUserRecord) -> User {
        self.next_id += 1;
        let now = Utc::now();
        User {
            id: self.next_id,
            email: record.email,
            name: record.name,
            phone: record.phone,
            password_hash: record.password_hash,
            role: record.role,
            status: record.status,
            avatar: record.avatar,
            address: record.address,
            billing_address: record.billing_address,
            wallet_balance: record.wallet_balance,
            is_verified: record.is_verified,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn matches_filter(user: &User, filter: &UserFilter) -> bool {
    let contains = |field: Option<&str>, needle: &Option<String>| match needle {
        Some(needle) => field
            .map(|f| f.to_lowercase().contains(needle.as_str()))
            .unwrap_or(false),
        None => true,
    };

    contains(user.name.as_deref(), &filter.name)
        && contains(Some(user.email.as_str()), &filter.email)
        && filter
            .phone
            .as_ref()
            .map_or(true, |p| user.phone.as_ref() == Some(p))
        && filter.status.map_or(true, |s| user.status == s)
        && filter.role.map_or(true, |r| user.role == r)
}

/// Process-local user store
///
/// Enforces the same unique-email rule as the database and supports the
/// transactional contract: writes made through a [`UserTransaction`] stay
/// invisible until commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.store.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .email_owner(email)
            .and_then(|id| store.users.get(&id).cloned()))
    }

    async fn find_page(&self, filter: &UserFilter) -> RepositoryResult<(Vec<User>, u64)> {
        let filter = filter.normalized();
        let store = self.store.read().await;
        let matching: Vec<&User> = store
            .users
            .values()
            .filter(|u| matches_filter(u, &filter))
            .collect();

        let page = matching
            .iter()
            .skip(filter.offset() as usize)
            .take(filter.size as usize)
            .map(|u| (*u).clone())
            .collect();

        Ok((page, matching.len() as u64))
    }

    async fn find_existing_emails(&self, emails: &[String]) -> RepositoryResult<Vec<String>> {
        let store = self.store.read().await;
        Ok(emails
            .iter()
            .filter(|e| store.email_owner(e).is_some())
            .cloned()
            .collect())
    }

    async fn insert(&self, record: NewUserRecord) -> RepositoryResult<User> {
        let mut store = self.store.write().await;
        if store.email_owner(record.email.as_str()).is_some() {
            return Err(RepositoryError::UniqueViolation(Some(record.email.to_string())));
        }

        let user = store.materialize(record);
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn insert_many(&self, records: &[NewUserRecord]) -> RepositoryResult<u64> {
        let mut store = self.store.write().await;

        let mut seen = std::collections::HashSet::new();
        for record in records {
            let email = record.email.as_str();
            if store.email_owner(email).is_some() || !seen.insert(email) {
                return Err(RepositoryError::UniqueViolation(Some(email.to_string())));
            }
        }

        for record in records {
            let user = store.materialize(record.clone());
            store.users.insert(user.id, user);
        }
        Ok(records.len() as u64)
    }

    async fn update(&self, user: &User) -> RepositoryResult<Option<User>> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&user.id) {
            return Ok(None);
        }
        if matches!(store.email_owner(user.email.as_str()), Some(owner) if owner != user.id) {
            return Err(RepositoryError::UniqueViolation(Some(user.email.to_string())));
        }

        let mut saved = user.clone();
        saved.updated_at = Utc::now();
        store.users.insert(saved.id, saved.clone());
        Ok(Some(saved))
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        Ok(self.store.write().await.users.remove(&id).is_some())
    }

    async fn update_last_login(&self, id: i64) -> RepositoryResult<()> {
        if let Some(user) = self.store.write().await.users.get_mut(&id) {
            let now = Utc::now();
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn UserTransaction>> {
        Ok(Box::new(InMemoryUserTransaction {
            store: Arc::clone(&self.store),
            staged: BTreeMap::new(),
        }))
    }
}

/// Staged writes over the shared store; `None` marks a deletion
pub struct InMemoryUserTransaction {
    store: Arc<RwLock<Store>>,
    staged: BTreeMap<i64, Option<User>>,
}

impl InMemoryUserTransaction {
    /// Current view of a user: staged state first, then the shared store
    async fn visible(&self, id: i64) -> Option<User> {
        match self.staged.get(&id) {
            Some(staged) => staged.clone(),
            None => self.store.read().await.users.get(&id).cloned(),
        }
    }

    async fn visible_email_owner(&self, email: &str) -> Option<i64> {
        let staged_owner = self.staged.iter().find_map(|(id, user)| match user {
            Some(u) if u.email.as_str() == email => Some(*id),
            _ => None,
        });
        if staged_owner.is_some() {
            return staged_owner;
        }

        // Committed owner, unless this transaction already moved or removed it
        let committed = self.store.read().await.email_owner(email)?;
        match self.staged.get(&committed) {
            Some(Some(u)) if u.email.as_str() == email => Some(committed),
            Some(_) => None,
            None => Some(committed),
        }
    }
}

#[async_trait]
impl UserTransaction for InMemoryUserTransaction {
    async fn find_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>> {
        Ok(self.visible(id).await)
    }

    async fn find_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>> {
        match self.visible_email_owner(email).await {
            Some(id) => Ok(self.visible(id).await),
            None => Ok(None),
        }
    }

    async fn update(&mut self, user: &User) -> RepositoryResult<Option<User>> {
        if self.visible(user.id).await.is_none() {
            return Ok(None);
        }
        if matches!(self.visible_email_owner(user.email.as_str()).await, Some(owner) if owner != user.id)
        {
            return Err(RepositoryError::UniqueViolation(Some(user.email.to_string())));
        }

        let mut saved = user.clone();
        saved.updated_at = Utc::now();
        self.staged.insert(saved.id, Some(saved.clone()));
        Ok(Some(saved))
    }

    async fn delete(&mut self, id: i64) -> RepositoryResult<bool> {
        if self.visible(id).await.is_none() {
            return Ok(false);
        }
        self.staged.insert(id, None);
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let InMemoryUserTransaction { store, staged } = *self;
        let mut store = store.write().await;

        // Rows committed by others since staging may now hold a staged email
        for user in staged.values().flatten() {
            let taken = store
                .users
                .values()
                .any(|u| u.email == user.email && !staged.contains_key(&u.id));
            if taken {
                return Err(RepositoryError::UniqueViolation(Some(user.email.to_string())));
            }
        }

        for (id, staged) in staged {
            match staged {
                // An update of a row deleted elsewhere affects nothing
                Some(user) if store.users.contains_key(&id) => {
                    store.users.insert(id, user);
                }
                Some(_) => {}
                None => {
                    store.users.remove(&id);
                }
            }
        }
        Ok(())
    }
}
