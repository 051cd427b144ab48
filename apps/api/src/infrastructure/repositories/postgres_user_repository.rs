use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgExecutor;
use sqlx::{Acquire, PgPool, Postgres, QueryBuilder, Transaction};

use crate::domain::repositories::user_repository::{
    RepositoryError, RepositoryResult, UserRepository, UserTransaction,
};
use crate::domain::user::{Email, NewUserRecord, User, UserFilter, UserRole, UserStatus};

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

macro_rules! user_columns {
    () => {
        "id, email, name, phone, password_hash, role, status, avatar, address, \
         billing_address, wallet_balance, is_verified, last_login_at, created_at, updated_at"
    };
}

const SELECT_BY_ID: &str = concat!("SELECT ", user_columns!(), " FROM users WHERE id = $1");

const SELECT_BY_EMAIL: &str = concat!("SELECT ", user_columns!(), " FROM users WHERE email = $1");

const INSERT_USER: &str = concat!(
    "INSERT INTO users (email, password_hash, name, phone, role, status, avatar, address, \
     billing_address, wallet_balance, is_verified) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING ",
    user_columns!()
);

const UPDATE_USER: &str = concat!(
    "UPDATE users SET email = $2, name = $3, phone = $4, password_hash = $5, role = $6, \
     status = $7, avatar = $8, address = $9, billing_address = $10, wallet_balance = $11, \
     is_verified = $12, updated_at = NOW() WHERE id = $1 RETURNING ",
    user_columns!()
);

const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";

/// Row shape of the `users` table
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: Option<String>,
    phone: Option<String>,
    password_hash: String,
    role: UserRole,
    status: UserStatus,
    avatar: Option<String>,
    address: Option<String>,
    billing_address: Option<String>,
    wallet_balance: Decimal,
    is_verified: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let email = Email::new(&r.email)
            .map_err(|e| RepositoryError::Corrupt(format!("Invalid email from database: {}", e)))?;

        Ok(User {
            id: r.id,
            email,
            name: r.name,
            phone: r.phone,
            password_hash: r.password_hash,
            role: r.role,
            status: r.status,
            avatar: r.avatar,
            address: r.address,
            billing_address: r.billing_address,
            wallet_balance: r.wallet_balance,
            is_verified: r.is_verified,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn read_error(context: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(format!("{}: {}", context, err))
}

/// Translates unique-constraint violations; everything else is opaque
///
/// `email` names the offending address for single-row writes.
fn write_error(context: &str, err: sqlx::Error, email: Option<&Email>) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return RepositoryError::UniqueViolation(email.map(|e| e.to_string()));
        }
    }
    RepositoryError::Database(format!("{}: {}", context, err))
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// `{select} FROM users WHERE ...` with the filter's predicates bound
fn filtered_query(select: &str, filter: &UserFilter) -> QueryBuilder<'static, Postgres> {
    let filter = filter.normalized();
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM users WHERE TRUE");

    if let Some(name) = filter.name {
        qb.push(" AND LOWER(name) LIKE ").push_bind(like_pattern(&name));
    }
    if let Some(email) = filter.email {
        qb.push(" AND LOWER(email) LIKE ").push_bind(like_pattern(&email));
    }
    if let Some(phone) = filter.phone {
        qb.push(" AND phone = ").push_bind(phone);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role);
    }

    qb
}

async fn fetch_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> RepositoryResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(SELECT_BY_ID)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| read_error("Failed to find user by id", e))?
        .map(User::try_from)
        .transpose()
}

async fn fetch_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> RepositoryResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(SELECT_BY_EMAIL)
        .bind(email.to_string())
        .fetch_optional(executor)
        .await
        .map_err(|e| read_error("Failed to find user by email", e))?
        .map(User::try_from)
        .transpose()
}

async fn update_row<'e, E: PgExecutor<'e>>(executor: E, user: &User) -> RepositoryResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(UPDATE_USER)
        .bind(user.id)
        .bind(user.email.as_str().to_string())
        .bind(user.name.clone())
        .bind(user.phone.clone())
        .bind(user.password_hash.clone())
        .bind(user.role)
        .bind(user.status)
        .bind(user.avatar.clone())
        .bind(user.address.clone())
        .bind(user.billing_address.clone())
        .bind(user.wallet_balance)
        .bind(user.is_verified)
        .fetch_optional(executor)
        .await
        .map_err(|e| write_error("Failed to update user", e, Some(&user.email)))?
        .map(User::try_from)
        .transpose()
}

async fn delete_row<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> RepositoryResult<bool> {
    let result = sqlx::query(DELETE_USER)
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| write_error("Failed to delete user", e, None))?;

    Ok(result.rows_affected() > 0)
}

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a new PostgresUserRepository
    ///
    /// # Arguments
    /// * `pool` - SQLx connection pool for PostgreSQL
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        fetch_by_id(&self.pool, id).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        fetch_by_email(&self.pool, email).await
    }

    async fn find_page(&self, filter: &UserFilter) -> RepositoryResult<(Vec<User>, u64)> {
        let total: i64 = filtered_query("SELECT COUNT(*)", filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_error("Failed to count users", e))?;

        let mut qb = filtered_query(concat!("SELECT ", user_columns!()), filter);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(i64::from(filter.size))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to list users", e))?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total.max(0) as u64))
    }

    async fn find_existing_emails(&self, emails: &[String]) -> RepositoryResult<Vec<String>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE email = ANY($1)")
            .bind(emails.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error("Failed to check existing emails", e))
    }

    async fn insert(&self, record: NewUserRecord) -> RepositoryResult<User> {
        let email = record.email.clone();
        let row = sqlx::query_as::<_, UserRow>(INSERT_USER)
            .bind(email.as_str().to_string())
            .bind(record.password_hash)
            .bind(record.name)
            .bind(record.phone)
            .bind(record.role)
            .bind(record.status)
            .bind(record.avatar)
            .bind(record.address)
            .bind(record.billing_address)
            .bind(record.wallet_balance)
            .bind(record.is_verified)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error("Failed to create user", e, Some(&email)))?;

        User::try_from(row)
    }

    async fn insert_many(&self, records: &[NewUserRecord]) -> RepositoryResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO users (email, password_hash, name, phone, role, status, avatar, \
             address, billing_address, wallet_balance, is_verified) ",
        );
        qb.push_values(records, |mut row, r| {
            row.push_bind(r.email.as_str().to_string())
                .push_bind(r.password_hash.clone())
                .push_bind(r.name.clone())
                .push_bind(r.phone.clone())
                .push_bind(r.role)
                .push_bind(r.status)
                .push_bind(r.avatar.clone())
                .push_bind(r.address.clone())
                .push_bind(r.billing_address.clone())
                .push_bind(r.wallet_balance)
                .push_bind(r.is_verified);
        });

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| write_error("Failed to insert users", e, None))?;

        Ok(result.rows_affected())
    }

    async fn update(&self, user: &User) -> RepositoryResult<Option<User>> {
        update_row(&self.pool, user).await
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        delete_row(&self.pool, id).await
    }

    async fn update_last_login(&self, id: i64) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| read_error("Failed to update last login", e))?;

        Ok(())
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn UserTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| read_error("Failed to begin transaction", e))?;

        Ok(Box::new(PostgresUserTransaction { tx }))
    }
}

/// Transaction over the `users` table; writes run under per-call savepoints
pub struct PostgresUserTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserTransaction for PostgresUserTransaction {
    async fn find_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>> {
        fetch_by_id(&mut *self.tx, id).await
    }

    async fn find_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>> {
        fetch_by_email(&mut *self.tx, email).await
    }

    async fn update(&mut self, user: &User) -> RepositoryResult<Option<User>> {
        let mut savepoint = (&mut self.tx)
            .begin()
            .await
            .map_err(|e| read_error("Failed to open savepoint", e))?;

        match update_row(&mut *savepoint, user).await {
            Ok(updated) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| read_error("Failed to release savepoint", e))?;
                Ok(updated)
            }
            Err(err) => {
                savepoint
                    .rollback()
                    .await
                    .map_err(|e| read_error("Failed to roll back savepoint", e))?;
                Err(err)
            }
        }
    }

    async fn delete(&mut self, id: i64) -> RepositoryResult<bool> {
        let mut savepoint = (&mut self.tx)
            .begin()
            .await
            .map_err(|e| read_error("Failed to open savepoint", e))?;

        match delete_row(&mut *savepoint, id).await {
            Ok(removed) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| read_error("Failed to release savepoint", e))?;
                Ok(removed)
            }
            Err(err) => {
                savepoint
                    .rollback()
                    .await
                    .map_err(|e| read_error("Failed to roll back savepoint", e))?;
                Err(err)
            }
        }
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| read_error("Failed to commit transaction", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn filtered_query_adds_only_present_predicates() {
        let filter = UserFilter {
            name: Some("Ann".to_string()),
            role: Some(UserRole::Seller),
            ..Default::default()
        };
        let qb = filtered_query("SELECT COUNT(*)", &filter);

        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM users WHERE TRUE AND LOWER(name) LIKE $1 AND role = $2"
        );
    }

    #[test]
    fn column_list_is_shared_by_statements() {
        assert!(SELECT_BY_ID.contains("billing_address, wallet_balance"));
        assert!(INSERT_USER.ends_with("created_at, updated_at"));
        assert!(UPDATE_USER.contains("updated_at = NOW()"));
    }
}
