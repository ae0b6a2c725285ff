use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::models::{Provider, User};
use crate::error::AuthError;
use crate::storage::models::UserRecord;
use crate::version::Version;

/// The user registry.
///
/// The lock is held only for the map access itself. Credential edits bump
/// the version under the lock; registration and removal leave the bump to
/// the caller because they cascade into the token map.
#[derive(Debug, Default)]
pub struct UserStore {
    users: Mutex<HashMap<String, User>>,
}

impl UserStore {
    pub fn new(users: HashMap<String, User>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }

    /// Register a new user
    pub fn insert(&self, user: User) -> Result<(), AuthError> {
        let mut users = self.users.lock();
        if users.contains_key(&user.id) {
            return Err(AuthError::AlreadyRegistered(user.id));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Remove a user, returning the removed record
    pub fn remove(&self, user_id: &str) -> Result<User, AuthError> {
        self.users
            .lock()
            .remove(user_id)
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.users.lock().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install or overwrite a credential. Returns false when the stored
    /// value is already identical.
    pub fn update_credential(
        &self,
        user_id: &str,
        provider: Provider,
        value: &str,
        version: &Version,
    ) -> Result<bool, AuthError> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;

        if user.credentials.get(&provider).map(String::as_str) == Some(value) {
            return Ok(false);
        }
        user.credentials.insert(provider, value.to_string());
        version.bump();
        Ok(true)
    }

    /// Remove a credential. Returns false when there was nothing to remove.
    pub fn delete_credential(
        &self,
        user_id: &str,
        provider: Provider,
        version: &Version,
    ) -> Result<bool, AuthError> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;

        if user.credentials.remove(&provider).is_none() {
            return Ok(false);
        }
        version.bump();
        Ok(true)
    }

    /// Serializable copy of the registry, ordered by user id
    pub fn records(&self) -> BTreeMap<String, UserRecord> {
        self.users
            .lock()
            .iter()
            .map(|(id, user)| (id.clone(), UserRecord::from(user)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> UserStore {
        let store = UserStore::default();
        for id in ids {
            store
                .insert(User::new(id.to_string(), format!("{id}-pw")))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let store = store_with(&["alice"]);

        let err = store
            .insert(User::new("alice".to_string(), "other".to_string()))
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered(_)));
        assert!(store.get("alice").unwrap().verify_secret("alice-pw"));
    }

    #[test]
    fn test_remove_unknown_user() {
        let store = store_with(&["alice"]);

        assert!(matches!(store.remove("bob"), Err(AuthError::UnknownUser(_))));
        assert_eq!(store.remove("alice").unwrap().id, "alice");
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_credential_bumps_only_on_change() {
        let store = store_with(&["alice"]);
        let version = Version::default();

        assert!(store
            .update_credential("alice", Provider::Aws, "k1", &version)
            .unwrap());
        assert_eq!(version.current(), 2);

        assert!(!store
            .update_credential("alice", Provider::Aws, "k1", &version)
            .unwrap());
        assert_eq!(version.current(), 2);

        assert!(store
            .update_credential("alice", Provider::Aws, "k2", &version)
            .unwrap());
        assert_eq!(version.current(), 3);
    }

    #[test]
    fn test_credential_edits_on_unknown_user_do_not_bump() {
        let store = store_with(&["alice"]);
        let version = Version::default();

        assert!(store
            .update_credential("nobody", Provider::Gcp, "g", &version)
            .is_err());
        assert!(store
            .delete_credential("nobody", Provider::Gcp, &version)
            .is_err());
        assert_eq!(version.current(), 1);
    }

    #[test]
    fn test_delete_credential_is_idempotent() {
        let store = store_with(&["alice"]);
        let version = Version::default();
        store
            .update_credential("alice", Provider::Gcp, "g", &version)
            .unwrap();

        assert!(store
            .delete_credential("alice", Provider::Gcp, &version)
            .unwrap());
        let after_first = version.current();
        assert!(!store
            .delete_credential("alice", Provider::Gcp, &version)
            .unwrap());
        assert_eq!(version.current(), after_first);
    }

    #[test]
    fn test_records_are_sorted_by_id() {
        let store = store_with(&["carol", "alice", "bob"]);
        let ids: Vec<_> = store.records().into_keys().collect();
        assert_eq!(ids, vec!["alice", "bob", "carol"]);
    }
}
