// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # dbx-provider
//!
//! A declarative resource provider for workspace control-plane APIs.
//!
//! ## Features
//!
//! - **Schema engine**: resource schemas generated from entity descriptors
//! - **Flat state**: `path.#` / `path.N` lists and `path.%` / `path.KEY` maps
//! - **Conversion**: typed entities to and from state, with explicit presence
//! - **Validation and diff**: enum, regex and conflict checks before any call;
//!   attribute diffs that know which changes force a replacement
//! - **Authentication**: personal access token, basic auth, or Azure identity
//!   exchanged for a workspace token, cached and refreshed once per expiry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbx_provider::{config::ProviderConfig, http::ApiClient, resources::Registry, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ProviderConfig::load(None)?;
//!     let client = ApiClient::new(config.client_config(), config.auth_config())?;
//!
//!     let registry = Registry::new()?;
//!     let lists = registry.get("databricks_ip_access_list")?;
//!     let desired = serde_json::json!({
//!         "label": "office",
//!         "list_type": "ALLOW",
//!         "ip_addresses": ["10.0.0.0/16"]
//!     });
//!     let state = lists.apply(&client, None, &desired).await?;
//!     println!("created {}", state.id());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       CLI / orchestrator                        │
//! │   plan()   apply()   read()   import()   destroy()              │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┴──────────────────────────────────┐
//! │  Resource adapter: validate → create/read/update/delete → state │
//! └──────────────────────────────┬──────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴───┬──────────────┬───────────────┐
//! │    Schema    │     Resources     │     HTTP     │     Auth      │
//! ├──────────────┼───────────────────┼──────────────┼───────────────┤
//! │ Descriptors  │ IP access lists   │ Retry        │ Token         │
//! │ Flat state   │ SQL queries       │ Backoff      │ Basic         │
//! │ Validation   │ Permissions       │ Rate limit   │ Azure AAD     │
//! │ Diff         │ Instance profiles │ API errors   │ Token cache   │
//! └──────────────┴───────────────────┴──────────────┴───────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credential resolution and request signing
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Provider configuration from file and environment
pub mod config;

/// Schema generation, flat state, conversion, validation and diff
pub mod schema;

/// Resource adapter around typed CRUD handlers
pub mod resource;

/// Concrete resource types
pub mod resources;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{AuthConfig, Authenticator};
pub use config::ProviderConfig;
pub use http::{ApiClient, ClientConfig};
pub use resource::{PairId, Plan, Resource, ResourceHandler};
pub use resources::Registry;
pub use schema::{ResourceData, Schema};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
