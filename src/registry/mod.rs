//! Container registry authentication.

pub mod credentials;
pub mod ecr;
pub mod login;

pub use credentials::{decode_basic_auth, CredentialError, CredentialObtainer, Credentials};
pub use login::{login_to_registry, LoginCache, TagParseFailure};
