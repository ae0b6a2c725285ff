use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::AuthError;
use crate::storage::models::TokenList;
use crate::version::Version;

/// A token held by the authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub expires: DateTime<Utc>,
    pub issued: DateTime<Utc>,
    /// The signed value handed to the client; lookups match it literally
    pub token: String,
    pub user_id: String,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Active tokens keyed by owning user id (at most one per user).
///
/// Removing an expired token is passive cleanup and never bumps the
/// version. Every other removal or insertion does, under the lock.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl TokenStore {
    pub fn new(tokens: HashMap<String, TokenRecord>) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }

    /// The user's token if it is still valid. An expired one is dropped.
    pub fn active_token(&self, user_id: &str, now: DateTime<Utc>) -> Option<String> {
        let mut tokens = self.tokens.lock();
        match tokens.get(user_id) {
            Some(record) if !record.is_expired_at(now) => Some(record.token.clone()),
            Some(_) => {
                tokens.remove(user_id);
                None
            }
            None => None,
        }
    }

    /// Install a freshly minted token unless another valid one appeared in
    /// the meantime. Returns the token the user should get and whether the
    /// new one was installed.
    pub fn insert_unless_active(
        &self,
        record: TokenRecord,
        now: DateTime<Utc>,
        version: &Version,
    ) -> (String, bool) {
        let mut tokens = self.tokens.lock();
        if let Some(existing) = tokens.get(&record.user_id) {
            if !existing.is_expired_at(now) {
                return (existing.token.clone(), false);
            }
        }
        let token = record.token.clone();
        tokens.insert(record.user_id.clone(), record);
        version.bump();
        (token, true)
    }

    /// Final step of a user registration or removal: drop any token the
    /// user holds and take the single version bump for the whole call.
    /// Returns whether a token was removed.
    pub fn purge_user(&self, user_id: &str, version: &Version) -> bool {
        let mut tokens = self.tokens.lock();
        let removed = tokens.remove(user_id).is_some();
        version.bump();
        removed
    }

    /// Resolve a signed token to its owner
    pub fn find_owner(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut tokens = self.tokens.lock();
        let (user_id, expired) = tokens
            .iter()
            .find(|(_, record)| record.token == token)
            .map(|(id, record)| (id.clone(), record.is_expired_at(now)))
            .ok_or(AuthError::TokenNotFound)?;

        if expired {
            tokens.remove(&user_id);
            return Err(AuthError::TokenExpired);
        }
        Ok(user_id)
    }

    /// Remove a token by its signed value. Unknown tokens are ignored.
    pub fn revoke(&self, token: &str, version: &Version) -> bool {
        let mut tokens = self.tokens.lock();
        let owner = tokens
            .iter()
            .find(|(_, record)| record.token == token)
            .map(|(id, _)| id.clone());

        match owner {
            Some(user_id) => {
                tokens.remove(&user_id);
                version.bump();
                true
            }
            None => false,
        }
    }

    /// Snapshot the valid tokens, dropping expired ones on the way
    pub fn token_list(&self, now: DateTime<Utc>, version: &Version) -> TokenList {
        let mut tokens = self.tokens.lock();
        tokens.retain(|_, record| !record.is_expired_at(now));

        let mut records: Vec<_> = tokens.values().collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        TokenList {
            tokens: records.into_iter().map(|r| r.token.clone()).collect(),
            version: version.current(),
        }
    }

    /// Drop every expired token, returning how many were removed
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired_at(now));
        before - tokens.len()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, user_id: &str) -> Option<TokenRecord> {
        self.tokens.lock().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn insert_record(&self, record: TokenRecord) {
        self.tokens.lock().insert(record.user_id.clone(), record);
    }

    #[cfg(test)]
    pub(crate) fn set_expiry(&self, user_id: &str, expires: DateTime<Utc>) -> bool {
        match self.tokens.lock().get_mut(user_id) {
            Some(record) => {
                record.expires = expires;
                true
            }
            None => false,
        }
    }
}
