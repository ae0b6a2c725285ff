//! HS256 signing and verification of session tokens.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::store::TokenRecord;
use crate::error::AuthError;
use crate::users::Credentials;

/// Claims carried by a signed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Snapshot of the owner's cloud credentials at issue time
    #[serde(default)]
    pub creds: Credentials,
    /// RFC 3339 expiry timestamp
    pub expires: String,
    /// RFC 3339 issue timestamp
    pub issued: String,
    pub username: String,
}

impl TokenClaims {
    pub fn new(
        user_id: &str,
        issued: DateTime<Utc>,
        expires: DateTime<Utc>,
        creds: &Credentials,
    ) -> Self {
        Self {
            creds: creds.clone(),
            expires: format_timestamp(expires),
            issued: format_timestamp(issued),
            username: user_id.to_string(),
        }
    }
}

/// Signs claims with the shared server secret and verifies tokens signed
/// the same way. Any algorithm other than HS256 is rejected.
pub struct TokenSigner {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in our own `expires` claim and is enforced by the
        // token map, not by the JWT layer.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Check the signature and return the raw claims
    pub fn decode_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        Ok(decode::<TokenClaims>(token, &self.decoding, &self.validation)?.claims)
    }

    /// Check the signature and the claim shape, producing the token map entry
    pub fn verify(&self, token: &str) -> Result<TokenRecord, AuthError> {
        let claims = self.decode_claims(token)?;
        if claims.username.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(TokenRecord {
            expires: parse_timestamp(&claims.expires)?,
            issued: parse_timestamp(&claims.issued)?,
            token: token.to_string(),
            user_id: claims.username,
        })
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| AuthError::InvalidToken)
}
