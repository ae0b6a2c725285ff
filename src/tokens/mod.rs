pub mod signer;
pub mod store;

pub use signer::{TokenClaims, TokenSigner};
pub use store::{TokenRecord, TokenStore};
