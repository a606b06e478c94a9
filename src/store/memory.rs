//! In-process store used by tests and local runs without Postgres.
//!
//! All state sits behind a single mutex so token consumption and the user
//! verification flip happen under one lock, mirroring the Postgres transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AccountRepository, ConsumeOutcome, NewUser, SessionRepository, StoreError, StoreHealth,
    UniqueKey, UserChanges, UserRepository, VerificationTokenRepository,
};
use crate::auth::models::{Account, NewAccount, SessionRecord, User, ACCOUNT_TYPE_OAUTH};

#[derive(Clone, Debug)]
struct TokenRow {
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    accounts: Vec<Account>,
    tokens: HashMap<Vec<u8>, TokenRow>,
    sessions: HashMap<Vec<u8>, SessionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unconsumed verification tokens held for `email`.
    pub async fn pending_tokens_for(&self, email: &str) -> usize {
        let state = self.state.lock().await;
        state
            .tokens
            .values()
            .filter(|row| row.email == email)
            .count()
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Drop a user without touching its accounts, like an out-of-band delete.
    pub async fn remove_user(&self, id: Uuid) -> bool {
        self.state.lock().await.users.remove(&id).is_some()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::UniqueViolation(UniqueKey::Email));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            role: user.role,
            method: user.method,
            is_verified: user.is_verified,
            is_two_factor_enabled: false,
            created_at: now,
            updated_at: now,
            accounts: Vec::new(),
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(email) = &changes.email {
            if state
                .users
                .values()
                .any(|other| other.id != id && &other.email == email)
            {
                return Err(StoreError::UniqueViolation(UniqueKey::Email));
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(display_name) = changes.display_name {
            user.display_name = display_name;
        }
        if let Some(enabled) = changes.is_two_factor_enabled {
            user.is_two_factor_enabled = enabled;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_account(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|account| account.provider == provider && account.external_id == external_id)
            .cloned())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut state = self.state.lock().await;
        if state.accounts.iter().any(|existing| {
            existing.provider == account.provider && existing.external_id == account.external_id
        }) {
            return Err(StoreError::UniqueViolation(UniqueKey::ProviderAccount));
        }

        let now = Utc::now();
        let record = Account {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            kind: ACCOUNT_TYPE_OAUTH.to_string(),
            provider: account.provider,
            external_id: account.external_id,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            expires_at: account.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.accounts.push(record.clone());
        Ok(record)
    }

    async fn relink_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(account) = state
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
        else {
            return Ok(None);
        };
        account.user_id = user_id;
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .filter(|account| account.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VerificationTokenRepository for MemoryStore {
    async fn replace_token(
        &self,
        email: &str,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.tokens.retain(|_, row| row.email != email);
        state.tokens.insert(
            token_hash.to_vec(),
            TokenRow {
                email: email.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn consume_token(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let Some(row) = state.tokens.remove(token_hash) else {
            return Ok(ConsumeOutcome::Missing);
        };

        if row.expires_at <= now {
            return Ok(ConsumeOutcome::Expired);
        }

        match state.users.values_mut().find(|user| user.email == row.email) {
            Some(user) => {
                user.is_verified = true;
                user.updated_at = now;
                Ok(ConsumeOutcome::Verified(row.email))
            }
            None => Ok(ConsumeOutcome::UserMissing(row.email)),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(&session.session_hash) {
            return Err(StoreError::UniqueViolation(UniqueKey::Other));
        }
        state.sessions.insert(session.session_hash.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<bool, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .sessions
            .remove(session_hash)
            .is_some())
    }

    async fn lookup_session(
        &self,
        session_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(session_hash)
            .filter(|session| session.expires_at > now)
            .cloned())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
