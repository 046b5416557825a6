//! Identity provider: accounts, Argon2id password hashing and session tokens.
//!
//! The economy core never sees credentials. It receives an [`AccountContext`]
//! produced by an [`Authenticator`] and trusts its account id as the acting
//! principal.

pub mod validation;

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::economy::types::{AccountContext, AccountId};
use crate::errors::{EngineError, StoreError};
use crate::logutil::{escape_log, mask_token};
use crate::store::AccountStore;

use validation::{validate_display_name, validate_password, validate_user_id};

/// Stored account record. The password hash is a PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: String,
    pub password_hash: String,
    pub name: String,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            age: self.age,
            created_at: self.created_at,
        }
    }

    pub fn context(&self) -> AccountContext {
        AccountContext {
            account_id: self.id,
            user_id: self.user_id.clone(),
        }
    }
}

/// Public account view, without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub user_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Account awaiting an id from the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub password_hash: String,
    pub name: String,
    pub age: Option<u32>,
}

impl NewAccount {
    pub fn into_account(self, id: AccountId) -> Account {
        let now = Utc::now();
        Account {
            id,
            user_id: self.user_id,
            password_hash: self.password_hash,
            name: self.name,
            age: self.age,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub account_id: AccountId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Sign-up request as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUp {
    pub user_id: String,
    pub password: String,
    pub password_check: Option<String>,
    pub name: String,
    pub age: Option<u32>,
}

/// Resolves a request credential to the acting account.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<AccountContext, EngineError>;
}

/// Account registration, sign-in and token verification over an [`AccountStore`].
pub struct AccountService<S> {
    store: Arc<S>,
    argon2: Argon2<'static>,
    session_ttl: Duration,
}

impl<S: AccountStore + Send + Sync> AccountService<S> {
    pub fn new(store: Arc<S>, security: &SecurityConfig) -> Result<Self, EngineError> {
        let argon2 = match &security.argon2 {
            Some(a) => {
                let defaults = Params::DEFAULT;
                let params = Params::new(
                    a.memory_kib.unwrap_or(defaults.m_cost()),
                    a.time_cost.unwrap_or(defaults.t_cost()),
                    a.parallelism.unwrap_or(defaults.p_cost()),
                    None,
                )
                .map_err(|e| EngineError::invalid(format!("argon2 parameters: {}", e)))?;
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            }
            None => Argon2::default(),
        };
        Ok(Self {
            store,
            argon2,
            session_ttl: Duration::minutes(i64::from(security.session_ttl_minutes)),
        })
    }

    pub fn sign_up(&self, request: SignUp) -> Result<AccountView, EngineError> {
        let user_id = validate_user_id(&request.user_id)?;
        validate_password(&request.password, request.password_check.as_deref())?;
        let name = validate_display_name(&request.name)?;

        if self.store.account_by_user_id(user_id)?.is_some() {
            return Err(EngineError::conflict(format!(
                "user id '{}' already exists",
                user_id
            )));
        }

        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(request.password.as_bytes(), &salt)
            .map_err(|e| StoreError::Credential(format!("password hash failure: {}", e)))?;

        let account = self.store.insert_account(NewAccount {
            user_id: user_id.to_string(),
            password_hash: hash.to_string(),
            name,
            age: request.age,
        })?;
        info!(
            "account {} registered as '{}'",
            account.id,
            escape_log(&account.user_id)
        );
        Ok(account.view())
    }

    /// Verify credentials and issue a session token.
    pub fn sign_in(&self, user_id: &str, password: &str) -> Result<Session, EngineError> {
        let Some(account) = self.store.account_by_user_id(user_id)? else {
            warn!(target: "security", "sign-in for unknown user id '{}'", escape_log(user_id));
            return Err(Self::bad_credentials());
        };
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| StoreError::Credential(format!("corrupt password hash: {}", e)))?;
        if self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            warn!(target: "security", "wrong password for '{}'", escape_log(user_id));
            return Err(Self::bad_credentials());
        }

        let now = Utc::now();
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            account_id: account.id,
            issued_at: now,
            expires_at: now + self.session_ttl,
        };
        self.store.put_session(&session)?;
        info!(
            "account {} signed in (session {})",
            account.id,
            mask_token(&session.token)
        );
        Ok(session)
    }

    fn bad_credentials() -> EngineError {
        EngineError::Unauthorized("invalid user id or password".to_string())
    }
}

impl<S: AccountStore + Send + Sync> Authenticator for AccountService<S> {
    fn authenticate(&self, token: &str) -> Result<AccountContext, EngineError> {
        let token = token.trim();
        if uuid::Uuid::parse_str(token).is_err() {
            return Err(EngineError::Unauthorized("malformed token".to_string()));
        }
        let Some(session) = self.store.session(token)? else {
            return Err(EngineError::Unauthorized("unknown token".to_string()));
        };
        if session.is_expired(Utc::now()) {
            self.store.remove_session(token)?;
            return Err(EngineError::Unauthorized("token expired".to_string()));
        }
        match self.store.account(session.account_id)? {
            Some(account) => Ok(account.context()),
            None => {
                warn!(
                    target: "security",
                    "session {} refers to missing account {}",
                    mask_token(token),
                    session.account_id
                );
                Err(EngineError::Unauthorized("account no longer exists".to_string()))
            }
        }
    }
}
