//! Postgres-backed repositories.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    AccountRepository, ConsumeOutcome, NewUser, SessionRepository, StoreError, StoreHealth,
    UniqueKey, UserChanges, UserRepository, VerificationTokenRepository,
};
use crate::auth::models::{Account, AuthMethod, NewAccount, SessionRecord, User, UserRole};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, email, password_hash, display_name, avatar_url, role, \
     auth_method, is_verified, is_two_factor_enabled, created_at, updated_at";

const ACCOUNT_COLUMNS: &str = "id, user_id, type, provider, external_id, access_token, \
     refresh_token, expires_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `sql/schema.sql`. Every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn apply_schema(&self) -> anyhow::Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

const USERS_EMAIL_KEY: &str = "users_email_key";
const ACCOUNTS_PROVIDER_KEY: &str = "accounts_provider_external_id_key";

/// The key behind a `23505` error, `None` for anything else.
fn unique_violation(err: &sqlx::Error) -> Option<UniqueKey> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.code().is_some_and(|code| code.as_ref() == "23505") {
        return None;
    }
    Some(match db_err.constraint() {
        Some(USERS_EMAIL_KEY) => UniqueKey::Email,
        Some(ACCOUNTS_PROVIDER_KEY) => UniqueKey::ProviderAccount,
        _ => UniqueKey::Other,
    })
}

fn map_write_error(err: sqlx::Error, context: &'static str) -> StoreError {
    match unique_violation(&err) {
        Some(key) => StoreError::UniqueViolation(key),
        None => StoreError::Backend(anyhow::Error::new(err).context(context)),
    }
}

fn map_read_error(err: sqlx::Error, context: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err).context(context))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(|e| map_read_error(e, "user role"))?;
    let method: String = row
        .try_get("auth_method")
        .map_err(|e| map_read_error(e, "user auth method"))?;

    Ok(User {
        id: row.try_get("id").map_err(|e| map_read_error(e, "user id"))?,
        email: row.try_get("email").map_err(|e| map_read_error(e, "user email"))?,
        password_hash: row
            .try_get("password_hash")
            .map_err(|e| map_read_error(e, "user password hash"))?,
        display_name: row
            .try_get("display_name")
            .map_err(|e| map_read_error(e, "user display name"))?,
        avatar_url: row
            .try_get("avatar_url")
            .map_err(|e| map_read_error(e, "user avatar"))?,
        role: role.parse::<UserRole>().map_err(|err| anyhow!(err))?,
        method: method.parse::<AuthMethod>().map_err(|err| anyhow!(err))?,
        is_verified: row
            .try_get("is_verified")
            .map_err(|e| map_read_error(e, "user verified flag"))?,
        is_two_factor_enabled: row
            .try_get("is_two_factor_enabled")
            .map_err(|e| map_read_error(e, "user two-factor flag"))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| map_read_error(e, "user created_at"))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| map_read_error(e, "user updated_at"))?,
        accounts: Vec::new(),
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let read = |e| map_read_error(e, "account row");
    Ok(Account {
        id: row.try_get("id").map_err(read)?,
        user_id: row.try_get("user_id").map_err(read)?,
        kind: row.try_get("type").map_err(read)?,
        provider: row.try_get("provider").map_err(read)?,
        external_id: row.try_get("external_id").map_err(read)?,
        access_token: row.try_get("access_token").map_err(read)?,
        refresh_token: row.try_get("refresh_token").map_err(read)?,
        expires_at: row.try_get("expires_at").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}

fn session_from_row(row: &PgRow) -> Result<SessionRecord, StoreError> {
    let read = |e| map_read_error(e, "session row");
    Ok(SessionRecord {
        session_hash: row.try_get("session_hash").map_err(read)?,
        user_id: row.try_get("user_id").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        last_saved: row.try_get("last_saved_at").map_err(read)?,
        expires_at: row.try_get("expires_at").map_err(read)?,
    })
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|e| map_read_error(e, "failed to lookup user by id"))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|e| map_read_error(e, "failed to lookup user by email"))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            r"
            INSERT INTO users
                (id, email, password_hash, display_name, avatar_url, role, auth_method, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.display_name)
            .bind(&user.avatar_url)
            .bind(user.role.as_str())
            .bind(user.method.as_str())
            .bind(user.is_verified)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|e| map_write_error(e, "failed to insert user"))?;

        user_from_row(&row)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            r"
            UPDATE users
            SET email = COALESCE($2, email),
                display_name = COALESCE($3, display_name),
                is_two_factor_enabled = COALESCE($4, is_two_factor_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(changes.email)
            .bind(changes.display_name)
            .bind(changes.is_two_factor_enabled)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await
            .map_err(|e| map_write_error(e, "failed to update user"))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn find_account(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE provider = $1 AND external_id = $2"
        );
        let row = sqlx::query(&query)
            .bind(provider)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|e| map_read_error(e, "failed to lookup account"))?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            r"
            INSERT INTO accounts
                (id, user_id, provider, external_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(account.user_id)
            .bind(&account.provider)
            .bind(&account.external_id)
            .bind(&account.access_token)
            .bind(&account.refresh_token)
            .bind(account.expires_at)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await
            .map_err(|e| map_write_error(e, "failed to insert account"))?;

        account_from_row(&row)
    }

    async fn relink_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            r"
            UPDATE accounts
            SET user_id = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(account_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await
            .map_err(|e| map_write_error(e, "failed to relink account"))?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY created_at"
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .map_err(|e| map_read_error(e, "failed to list accounts"))?;

        rows.iter().map(account_from_row).collect()
    }
}

#[async_trait]
impl VerificationTokenRepository for PgStore {
    async fn replace_token(
        &self,
        email: &str,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // One row per email: the upsert drops whatever token was pending.
        let query = r"
            INSERT INTO email_verification_tokens (email, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
        ";
        sqlx::query(query)
            .bind(email)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|e| map_write_error(e, "failed to store verification token"))?;
        Ok(())
    }

    async fn consume_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_read_error(e, "begin consume transaction"))?;

        let query = r"
            DELETE FROM email_verification_tokens
            WHERE token_hash = $1
            RETURNING email, expires_at
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(|e| map_read_error(e, "failed to consume verification token"))?;

        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_read_error(e, "rollback consume transaction"))?;
            return Ok(ConsumeOutcome::Missing);
        };

        let email: String = row
            .try_get("email")
            .map_err(|e| map_read_error(e, "token email"))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| map_read_error(e, "token expiry"))?;

        // Expired rows are still deleted so they cannot linger.
        if expires_at <= now {
            tx.commit()
                .await
                .map_err(|e| map_read_error(e, "commit expired token removal"))?;
            return Ok(ConsumeOutcome::Expired);
        }

        let query = r"
            UPDATE users
            SET is_verified = TRUE,
                updated_at = NOW()
            WHERE email = $1
        ";
        let result = sqlx::query(query)
            .bind(&email)
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|e| map_read_error(e, "failed to mark user verified"))?;

        tx.commit()
            .await
            .map_err(|e| map_read_error(e, "commit consume transaction"))?;

        if result.rows_affected() == 0 {
            Ok(ConsumeOutcome::UserMissing(email))
        } else {
            Ok(ConsumeOutcome::Verified(email))
        }
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO user_sessions (session_hash, user_id, created_at, last_saved_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        sqlx::query(query)
            .bind(&session.session_hash)
            .bind(session.user_id)
            .bind(session.created_at)
            .bind(session.last_saved)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|e| map_write_error(e, "failed to insert session"))?;
        Ok(())
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<bool, StoreError> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let result = sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .map_err(|e| map_write_error(e, "failed to delete session"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let query = r"
            SELECT session_hash, user_id, created_at, last_saved_at, expires_at
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > $2
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(session_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .map_err(|e| map_read_error(e, "failed to lookup session"))?;

        row.as_ref().map(session_from_row).transpose()
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .map_err(|e| map_read_error(e, "failed to acquire database connection"))?;

        let ping_span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .map_err(|e| map_read_error(e, "failed to ping database"))
    }
}
