mod models;
mod store;

pub use models::{Credentials, Provider, User};
pub use store::UserStore;
