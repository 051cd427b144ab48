use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{Email, UserRole, UserStatus};

/// User account as persisted
///
/// Carries the password digest, so it is only ever handed to the store and
/// the cache. Anything leaving the service goes through [`UserView`].
///
/// # Invariants
/// - `id` is assigned by the store and never changes
/// - `email` is unique across all users (compared lowercased)
/// - `wallet_balance` is never negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: Email,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
    pub wallet_balance: Decimal,
    pub is_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Applies the fields present in `patch`, leaving the rest untouched
    ///
    /// `password_hash` is the digest of `patch.password`, computed by the
    /// caller. Returns `true` if any field actually changed.
    pub fn merge(&mut self, patch: UserPatch, password_hash: Option<String>) -> bool {
        let mut changed = false;

        fn set<T: PartialEq>(slot: &mut T, value: Option<T>, changed: &mut bool) {
            if let Some(value) = value {
                if *slot != value {
                    *slot = value;
                    *changed = true;
                }
            }
        }

        set(&mut self.email, patch.email, &mut changed);
        set(&mut self.name, patch.name.map(Some), &mut changed);
        set(&mut self.phone, patch.phone.map(Some), &mut changed);
        set(&mut self.password_hash, password_hash, &mut changed);
        set(&mut self.role, patch.role, &mut changed);
        set(&mut self.status, patch.status, &mut changed);
        set(&mut self.avatar, patch.avatar.map(Some), &mut changed);
        set(&mut self.address, patch.address.map(Some), &mut changed);
        set(
            &mut self.billing_address,
            patch.billing_address.map(Some),
            &mut changed,
        );
        set(&mut self.wallet_balance, patch.wallet_balance, &mut changed);
        set(&mut self.is_verified, patch.is_verified, &mut changed);

        changed
    }
}

/// Command for creating a single account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
}

impl NewUser {
    /// Creates a command with default role/status and no optional fields
    pub fn new(email: Email, password: impl Into<String>) -> Self {
        Self {
            email,
            password: password.into(),
            name: None,
            phone: None,
            role: UserRole::default(),
            status: UserStatus::default(),
            avatar: None,
            address: None,
            billing_address: None,
        }
    }

    /// Builds the insert record once the password has been hashed
    ///
    /// New accounts always start unverified, with an empty wallet and no
    /// recorded login.
    pub fn into_record(self, password_hash: String) -> NewUserRecord {
        NewUserRecord {
            email: self.email,
            password_hash,
            name: self.name,
            phone: self.phone,
            role: self.role,
            status: self.status,
            avatar: self.avatar,
            address: self.address,
            billing_address: self.billing_address,
            wallet_balance: Decimal::ZERO,
            is_verified: false,
        }
    }
}

/// Row data handed to the store for insertion
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: Email,
    pub password_hash: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
    pub wallet_balance: Decimal,
    pub is_verified: bool,
}

/// Partial update; `None` means "leave as is"
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<Email>,
    pub name: Option<String>,
    pub phone: Option<String>,
    /// New plaintext password, hashed before merge
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
    pub wallet_balance: Option<Decimal>,
    pub is_verified: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.phone.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.status.is_none()
            && self.avatar.is_none()
            && self.address.is_none()
            && self.billing_address.is_none()
            && self.wallet_balance.is_none()
            && self.is_verified.is_none()
    }
}

/// Outward representation of a user, without the password digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
    pub wallet_balance: Decimal,
    pub is_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.as_str().to_string(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            role: user.role,
            status: user.status,
            avatar: user.avatar.clone(),
            address: user.address.clone(),
            billing_address: user.billing_address.clone(),
            wallet_balance: user.wallet_balance,
            is_verified: user.is_verified,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView::from(&user)
    }
}
