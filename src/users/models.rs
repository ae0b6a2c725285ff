use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Cloud provider a user can hold credentials for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Dfc,
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Dfc, Provider::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Dfc => "dfc",
            Provider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthError::UnsupportedProvider(s.to_string()))
    }
}

/// Per-provider credential strings
pub type Credentials = BTreeMap<Provider, String>;

/// A registered user
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub credentials: Credentials,
    pub id: String,
    secret: String,
}

impl User {
    pub fn new(id: String, secret: String) -> Self {
        Self {
            credentials: Credentials::new(),
            id,
            secret,
        }
    }

    /// Exact comparison against the registered secret
    pub fn verify_secret(&self, candidate: &str) -> bool {
        self.secret == candidate
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets stay out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
