//! CLI module
//!
//! A thin orchestrator around the resource registry. Managed instances live in
//! a local JSON state file keyed by `TYPE.NAME` address.
//!
//! # Commands
//!
//! - `resources` - List resource types
//! - `schema` - Print the schema of a resource type
//! - `validate` - Check a resource configuration offline
//! - `plan` - Compare configuration with state
//! - `apply` - Create, update or replace to match configuration
//! - `read` - Refresh state from the API
//! - `import` - Adopt an existing object
//! - `destroy` - Delete an object and forget it

mod commands;
mod runner;
mod state_file;

pub use commands::{Address, Cli, Commands, OutputFormat};
pub use runner::Runner;
pub use state_file::StateFile;

#[cfg(test)]
mod tests;
