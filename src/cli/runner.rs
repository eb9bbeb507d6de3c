//! CLI runner - executes commands

use crate::cli::commands::{Address, Cli, Commands, OutputFormat};
use crate::cli::state_file::StateFile;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::resource::Resource;
use crate::resources::Registry;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
    client: OnceLock<ApiClient>,
}

impl Runner {
    /// Create a new runner; the API client is built from provider config on first use
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            client: OnceLock::new(),
        }
    }

    /// Create a runner that talks through an existing client
    pub fn with_client(cli: Cli, client: ApiClient) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(client);
        Self { cli, client: cell }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let registry = Registry::new()?;
        match &self.cli.command {
            Commands::Resources => self.list_resources(&registry),
            Commands::Schema { resource } => self.schema(registry.get(resource)?),
            Commands::Validate {
                address,
                resource_config,
            } => self.validate(&registry, address, resource_config),
            Commands::Plan {
                address,
                resource_config,
            } => self.plan(&registry, address, resource_config),
            Commands::Apply {
                address,
                resource_config,
            } => self.apply(&registry, address, resource_config).await,
            Commands::Read { address } => self.read(&registry, address).await,
            Commands::Import { address, id } => self.import(&registry, address, id).await,
            Commands::Destroy { address } => self.destroy(&registry, address).await,
        }
    }

    fn client(&self) -> Result<&ApiClient> {
        if self.client.get().is_none() {
            let config = ProviderConfig::load(self.cli.config.as_deref())?;
            let client = ApiClient::new(config.client_config(), config.auth_config())?;
            let _ = self.client.set(client);
        }
        self.client
            .get()
            .ok_or_else(|| Error::config("API client is not available"))
    }

    fn load_state(&self) -> Result<StateFile> {
        StateFile::from_file(&self.cli.state)
    }

    /// Load a resource configuration; YAML is a superset of JSON so one parser covers both
    fn load_resource_config(path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read resource config: {e}")))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("Invalid resource config: {e}")))
    }

    fn list_resources(&self, registry: &Registry) -> Result<()> {
        let resources: Vec<&str> = registry.names().collect();
        self.output_message(&json!({
            "type": "RESOURCES",
            "resources": resources
        }));
        Ok(())
    }

    fn schema(&self, resource: &Resource) -> Result<()> {
        self.output_message(&json!({
            "type": "SCHEMA",
            "resource": resource.name(),
            "schema": resource.schema()
        }));
        Ok(())
    }

    fn validate(&self, registry: &Registry, address: &Address, path: &Path) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let config = Self::load_resource_config(path)?;
        let desired = resource.desired_state(&config)?;
        resource.validate(&desired)?;

        self.log("INFO", &format!("{address} is valid"));
        Ok(())
    }

    fn plan(&self, registry: &Registry, address: &Address, path: &Path) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let config = Self::load_resource_config(path)?;
        let state = self.load_state()?;

        let desired = resource.desired_state(&config)?;
        resource.validate(&desired)?;
        let plan = resource.plan(state.get(&address.to_string()), &desired);

        self.output_message(&json!({
            "type": "PLAN",
            "address": address.to_string(),
            "plan": plan
        }));
        Ok(())
    }

    async fn apply(&self, registry: &Registry, address: &Address, path: &Path) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let config = Self::load_resource_config(path)?;
        let mut state = self.load_state()?;
        let key = address.to_string();

        let client = self.client()?;
        let prior = state.get(&key).cloned();
        let data = resource.apply(client, prior, &config).await?;

        info!(%address, id = data.id(), "Applied");
        state.put(&key, data.clone());
        state.save(&self.cli.state).await?;
        self.output_state(address, &data);
        Ok(())
    }

    async fn read(&self, registry: &Registry, address: &Address) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let mut state = self.load_state()?;
        let key = address.to_string();
        let mut data = state
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::config(format!("{address} is not in state")))?;

        let client = self.client()?;
        resource.read(client, &mut data).await?;
        if !data.has_id() {
            warn!(%address, "Object is gone, dropping it from state");
        }

        state.put(&key, data.clone());
        state.save(&self.cli.state).await?;
        self.output_state(address, &data);
        Ok(())
    }

    async fn import(&self, registry: &Registry, address: &Address, id: &str) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let mut state = self.load_state()?;
        let key = address.to_string();
        if state.get(&key).is_some() {
            return Err(Error::config(format!("{address} is already in state")));
        }

        let client = self.client()?;
        let data = resource.import(client, id).await?;

        info!(%address, id, "Imported");
        state.put(&key, data.clone());
        state.save(&self.cli.state).await?;
        self.output_state(address, &data);
        Ok(())
    }

    async fn destroy(&self, registry: &Registry, address: &Address) -> Result<()> {
        let resource = registry.get(&address.resource)?;
        let mut state = self.load_state()?;
        let key = address.to_string();
        let Some(mut data) = state.get(&key).cloned() else {
            self.log("INFO", &format!("{address} is not in state, nothing to destroy"));
            return Ok(());
        };

        let client = self.client()?;
        resource.delete(client, &mut data).await?;

        info!(%address, "Destroyed");
        state.remove(&key);
        state.save(&self.cli.state).await?;
        self.output_message(&json!({
            "type": "DESTROYED",
            "address": key
        }));
        Ok(())
    }

    fn output_state(&self, address: &Address, data: &crate::schema::ResourceData) {
        self.output_message(&json!({
            "type": "STATE",
            "address": address.to_string(),
            "state": data
        }));
    }

    fn log(&self, level: &str, message: &str) {
        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": level,
                "message": message
            }
        }));
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
