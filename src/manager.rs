//! User registration, credential management and the token lifecycle.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cluster::ReplicationQueue;
use crate::config::{TokenConfig, MAX_EXPIRE_PERIOD_SECONDS};
use crate::error::AuthError;
use crate::storage::models::{TokenList, UserRecord};
use crate::storage::{load_json, save_json, KvStore, StorageError, TOKENS_KEY, USERS_KEY};
use crate::tokens::{TokenClaims, TokenRecord, TokenSigner, TokenStore};
use crate::users::{Provider, User, UserStore};
use crate::version::Version;

/// Owns the user registry, the token map and the version counter.
///
/// Every mutating call that changes state bumps the version exactly once,
/// persists what it changed and, when tokens changed, schedules a push of
/// the token list to the primary proxy. Replication never blocks callers.
pub struct UserManager {
    expire_period: Duration,
    replication: ReplicationQueue,
    signer: TokenSigner,
    storage: Arc<dyn KvStore>,
    tokens: TokenStore,
    tokens_save: Mutex<()>,
    users: UserStore,
    users_save: Mutex<()>,
    version: Version,
}

impl UserManager {
    /// Restore users and tokens from `storage`.
    ///
    /// A users file that cannot be decoded is fatal. A broken tokens file
    /// only costs the tokens: every user has to log in again.
    pub fn open(
        storage: Arc<dyn KvStore>,
        config: &TokenConfig,
        replication: ReplicationQueue,
    ) -> Result<Self, AuthError> {
        let signer = TokenSigner::new(config.secret.as_bytes());
        let users = load_users(storage.as_ref())?;
        let (tokens, version) = load_tokens(storage.as_ref(), &signer, &users, Utc::now());

        info!(
            users = users.len(),
            tokens = tokens.len(),
            version,
            "Restored authentication state"
        );

        Ok(Self {
            expire_period: Duration::seconds(
                config.expire_period_seconds.min(MAX_EXPIRE_PERIOD_SECONDS) as i64,
            ),
            replication,
            signer,
            storage,
            tokens: TokenStore::new(tokens),
            tokens_save: Mutex::new(()),
            users: UserStore::new(users),
            users_save: Mutex::new(()),
            version: Version::new(version),
        })
    }

    pub fn add_user(&self, user_id: &str, secret: &str) -> Result<(), AuthError> {
        if user_id.is_empty() || secret.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        self.users
            .insert(User::new(user_id.to_string(), secret.to_string()))?;
        // A token left over from an earlier user with the same id must not
        // authenticate the new one.
        let stale_token = self.tokens.purge_user(user_id, &self.version);
        info!(user_id, "User registered");

        self.save_users()?;
        if stale_token {
            self.replication.schedule();
            self.save_tokens()?;
        }
        Ok(())
    }

    pub fn delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        self.users.remove(user_id)?;
        let had_token = self.tokens.purge_user(user_id, &self.version);
        info!(user_id, had_token, "User deleted");

        self.save_users()?;
        if had_token {
            self.replication.schedule();
            self.save_tokens()?;
        }
        Ok(())
    }

    /// Install or overwrite the user's credential for `provider`.
    ///
    /// Returns false when the stored value was already identical.
    pub fn update_credentials(
        &self,
        user_id: &str,
        provider: &str,
        value: &str,
    ) -> Result<bool, AuthError> {
        let provider: Provider = provider.parse()?;
        if value.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let changed = self
            .users
            .update_credential(user_id, provider, value, &self.version)?;
        if changed {
            debug!(user_id, %provider, "Credentials updated");
            self.save_users()?;
        }
        Ok(changed)
    }

    /// Remove the user's credential for `provider`.
    ///
    /// Returns false when the user had none.
    pub fn delete_credentials(&self, user_id: &str, provider: &str) -> Result<bool, AuthError> {
        let provider: Provider = provider.parse()?;

        let changed = self
            .users
            .delete_credential(user_id, provider, &self.version)?;
        if changed {
            debug!(user_id, %provider, "Credentials removed");
            self.save_users()?;
        }
        Ok(changed)
    }

    /// Authenticate a user and hand out their token.
    ///
    /// A still-valid token is returned as is; otherwise a new one is signed
    /// with the user's current credentials embedded.
    pub fn issue_token(&self, user_id: &str, secret: &str) -> Result<String, AuthError> {
        let user = self
            .users
            .get(user_id)
            .filter(|user| user.verify_secret(secret))
            .ok_or(AuthError::InvalidCredentials)?;

        let now = Utc::now().trunc_subsecs(0);
        if let Some(token) = self.tokens.active_token(user_id, now) {
            debug!(user_id, "Returning active token");
            return Ok(token);
        }

        let expires = now + self.expire_period;
        let claims = TokenClaims::new(user_id, now, expires, &user.credentials);
        let record = TokenRecord {
            expires,
            issued: now,
            token: self.signer.sign(&claims)?,
            user_id: user_id.to_string(),
        };

        let (token, minted) = self.tokens.insert_unless_active(record, now, &self.version);
        if !minted {
            return Ok(token);
        }
        if self.drop_orphan_token(user_id, &token)? {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id, %expires, "Token issued");
        self.replication.schedule();
        self.save_tokens()?;
        Ok(token)
    }

    /// Take back a token minted for a user deleted while it was being
    /// signed. Returns true when the user is gone.
    fn drop_orphan_token(&self, user_id: &str, token: &str) -> Result<bool, AuthError> {
        if self.users.get(user_id).is_some() {
            return Ok(false);
        }

        warn!(user_id, "User deleted during token issue, discarding token");
        if self.tokens.revoke(token, &self.version) {
            self.replication.schedule();
            self.save_tokens()?;
        }
        Ok(true)
    }

    /// Resolve a token to its owner.
    ///
    /// Matching is by the exact signed string. An expired token is removed
    /// on the way out; that cleanup does not bump the version.
    pub fn user_by_token(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.tokens.find_owner(token, Utc::now())?;
        self.users.get(&user_id).ok_or(AuthError::InvalidToken)
    }

    /// Revoke a token. Unknown tokens are ignored and return false.
    pub fn revoke_token(&self, token: &str) -> Result<bool, AuthError> {
        if !self.tokens.revoke(token, &self.version) {
            return Ok(false);
        }

        info!("Token revoked");
        self.replication.schedule();
        self.save_tokens()?;
        Ok(true)
    }

    /// The valid tokens, ordered by owner, at the current version
    pub fn token_list(&self) -> TokenList {
        self.tokens.token_list(Utc::now(), &self.version)
    }

    /// Drop expired tokens without touching the version
    pub fn sweep_expired(&self) -> usize {
        self.tokens.sweep_expired(Utc::now())
    }

    /// Write the current token list to disk
    pub fn save_tokens(&self) -> Result<(), AuthError> {
        let _guard = self.tokens_save.lock();
        let list = self.token_list();
        save_json(self.storage.as_ref(), TOKENS_KEY, &list)?;
        Ok(())
    }

    fn save_users(&self) -> Result<(), AuthError> {
        let _guard = self.users_save.lock();
        let records = self.users.records();
        save_json(self.storage.as_ref(), USERS_KEY, &records)?;
        Ok(())
    }

    pub fn version(&self) -> i64 {
        self.version.current()
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    #[cfg(test)]
    pub(crate) fn token_store(&self) -> &TokenStore {
        &self.tokens
    }
}

fn load_users(storage: &dyn KvStore) -> Result<HashMap<String, User>, StorageError> {
    let records: BTreeMap<String, UserRecord> = load_json(storage, USERS_KEY)?.unwrap_or_default();

    records
        .into_values()
        .map(|record| record.into_user().map(|user| (user.id.clone(), user)))
        .collect()
}

fn load_tokens(
    storage: &dyn KvStore,
    signer: &TokenSigner,
    users: &HashMap<String, User>,
    now: DateTime<Utc>,
) -> (HashMap<String, TokenRecord>, i64) {
    let list: TokenList = match load_json(storage, TOKENS_KEY) {
        Ok(Some(list)) => list,
        Ok(None) => return (HashMap::new(), 1),
        Err(e) => {
            warn!(error = %e, "Failed to load saved tokens, starting without any");
            return (HashMap::new(), 1);
        }
    };

    let mut tokens = HashMap::new();
    for token in list.tokens {
        let record = match signer.verify(&token) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Dropping saved token that failed verification");
                continue;
            }
        };
        if record.is_expired_at(now) {
            debug!(user_id = %record.user_id, "Dropping expired saved token");
            continue;
        }
        if !users.contains_key(&record.user_id) {
            warn!(user_id = %record.user_id, "Dropping saved token of unregistered user");
            continue;
        }
        tokens.insert(record.user_id.clone(), record);
    }

    (tokens, list.version.max(1))
}
