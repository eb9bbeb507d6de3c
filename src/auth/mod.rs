//! Authentication module
//!
//! Supports: static token, username/password, Azure identity
//!
//! The `Authenticator` resolves exactly one strategy from configuration and
//! manages the cached identity and workspace tokens of the Azure strategy.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub(crate) use authenticator::normalize_host;
pub use types::{
    AuthConfig, AuthState, AzureAuth, CachedToken, Credential, DEFAULT_LOGIN_ENDPOINT,
    DEFAULT_MANAGEMENT_ENDPOINT, DEFAULT_MSI_ENDPOINT, DEFAULT_TOKEN_RESOURCE,
};

#[cfg(test)]
mod tests;
