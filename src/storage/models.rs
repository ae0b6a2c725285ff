use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::StorageError;
use crate::users::{Credentials, User};

/// A registered user as stored in `users.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Cloud credentials, omitted when the user has none
    #[serde(default, skip_serializing_if = "Credentials::is_empty")]
    pub creds: Credentials,
    pub name: String,
    /// Base64 of the user's secret
    pub password: String,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            creds: user.credentials.clone(),
            name: user.id.clone(),
            password: STANDARD.encode(user.secret().as_bytes()),
        }
    }
}

impl UserRecord {
    /// Decode the stored password material back into a [`User`]
    pub fn into_user(self) -> Result<User, StorageError> {
        let bytes = STANDARD.decode(self.password.as_bytes())?;
        let secret = String::from_utf8(bytes).map_err(|_| StorageError::Utf8(self.name.clone()))?;
        let mut user = User::new(self.name, secret);
        user.credentials = self.creds;
        Ok(user)
    }
}

/// The set of valid tokens plus the version it was taken at.
///
/// Pushed to the primary proxy after every token change and saved as
/// `tokens.json` for recovery. Receivers treat it as a full replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenList {
    pub tokens: Vec<String>,
    #[serde(default)]
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Provider;

    #[test]
    fn test_user_record_encodes_secret() {
        let user = User::new("alice".to_string(), "s3cret".to_string());
        let record = UserRecord::from(&user);

        assert_eq!(record.name, "alice");
        assert_eq!(record.password, "czNjcmV0");
        assert_ne!(record.password, "s3cret");
    }

    #[test]
    fn test_user_record_round_trip_keeps_credentials() {
        let mut user = User::new("bob".to_string(), "pw".to_string());
        user.credentials.insert(Provider::Aws, "aws-key".to_string());

        let restored = UserRecord::from(&user).into_user().unwrap();
        assert_eq!(restored, user);
        assert!(restored.verify_secret("pw"));
    }

    #[test]
    fn test_empty_credentials_are_omitted() {
        let user = User::new("carol".to_string(), "pw".to_string());
        let json = serde_json::to_value(UserRecord::from(&user)).unwrap();

        assert!(json.get("creds").is_none());
        assert_eq!(json["name"], "carol");
    }

    #[test]
    fn test_invalid_base64_password_fails_to_decode() {
        let record = UserRecord {
            creds: Credentials::new(),
            name: "dave".to_string(),
            password: "***".to_string(),
        };
        assert!(matches!(record.into_user(), Err(StorageError::Encoding(_))));
    }

    #[test]
    fn test_token_list_wire_shape() {
        let list = TokenList {
            tokens: vec!["t1".to_string()],
            version: 3,
        };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json, serde_json::json!({"tokens": ["t1"], "version": 3}));
    }
}
