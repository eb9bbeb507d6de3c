//! CLI commands and argument parsing

use crate::error::{Error, Result};
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Workspace resource provider CLI
#[derive(Parser, Debug)]
#[command(name = "dbx-provider")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Provider configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON)
    #[arg(short, long, global = true, default_value = "dbx-state.json")]
    pub state: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List resource types
    Resources,

    /// Print the schema of a resource type
    Schema {
        /// Resource type, e.g. databricks_ip_access_list
        resource: String,
    },

    /// Validate a resource configuration without calling the API
    Validate {
        /// Resource address (TYPE.NAME)
        address: Address,

        /// Resource configuration file (YAML or JSON)
        #[arg(short = 'r', long)]
        resource_config: PathBuf,
    },

    /// Show what apply would do
    Plan {
        /// Resource address (TYPE.NAME)
        address: Address,

        /// Resource configuration file (YAML or JSON)
        #[arg(short = 'r', long)]
        resource_config: PathBuf,
    },

    /// Create, update or replace a resource to match its configuration
    Apply {
        /// Resource address (TYPE.NAME)
        address: Address,

        /// Resource configuration file (YAML or JSON)
        #[arg(short = 'r', long)]
        resource_config: PathBuf,
    },

    /// Refresh a resource from the API
    Read {
        /// Resource address (TYPE.NAME)
        address: Address,
    },

    /// Bring an existing object under management
    Import {
        /// Resource address (TYPE.NAME)
        address: Address,

        /// Object identifier
        id: String,
    },

    /// Delete a resource and drop it from state
    Destroy {
        /// Resource address (TYPE.NAME)
        address: Address,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// `TYPE.NAME` address of a resource instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub resource: String,
    pub name: String,
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((resource, name)) if !resource.is_empty() && !name.is_empty() => Ok(Self {
                resource: resource.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Error::config(format!(
                "invalid resource address '{s}', expected TYPE.NAME"
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.name)
    }
}
