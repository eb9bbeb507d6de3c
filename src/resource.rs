//! Resource adapter
//!
//! A [`ResourceHandler`] knows how to talk to the API for one kind of object.
//! [`Resource`] wraps it with the generated schema and the lifecycle rules the
//! orchestrator relies on: configuration is validated before any request is
//! sent, Create and Update finish with a Read, and a Read of an object that no
//! longer exists clears the identifier instead of failing.

use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::schema::{config_to_data, diff, validate_config, ResourceData, ResourceDiff, Schema};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Separator of the two halves of a pair identifier
pub const PAIR_SEPARATOR: &str = "|";

// ============================================================================
// Handler trait
// ============================================================================

/// API calls for one resource type
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name, e.g. `databricks_sql_query`
    fn name(&self) -> &'static str;

    /// Schema of the resource configuration
    fn schema(&self) -> Result<Schema>;

    /// Whether the remote object can be changed in place.
    /// When it cannot, every field forces a replacement.
    fn updatable(&self) -> bool {
        true
    }

    /// Checks that need more than the schema can express
    fn validate(&self, _schema: &Schema, _data: &ResourceData) -> Result<()> {
        Ok(())
    }

    /// Create the remote object and set the identifier
    async fn create(&self, client: &ApiClient, schema: &Schema, data: &mut ResourceData)
        -> Result<()>;

    /// Refresh state from the remote object
    async fn read(&self, client: &ApiClient, schema: &Schema, data: &mut ResourceData)
        -> Result<()>;

    /// Push changed configuration to the remote object
    async fn update(
        &self,
        _client: &ApiClient,
        _schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        Err(Error::Other(format!(
            "{} cannot be updated in place (id {})",
            self.name(),
            data.id()
        )))
    }

    /// Delete the remote object
    async fn delete(&self, client: &ApiClient, schema: &Schema, data: &mut ResourceData)
        -> Result<()>;
}

// ============================================================================
// Plan
// ============================================================================

/// What an apply cycle will do to one resource instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Plan {
    Create,
    Update { diff: ResourceDiff },
    Replace { diff: ResourceDiff },
    NoOp,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::NoOp)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plan::Create => write!(f, "create"),
            Plan::Update { diff } => write!(f, "update ({} changes)", diff.len()),
            Plan::Replace { diff } => write!(f, "replace ({} changes)", diff.len()),
            Plan::NoOp => write!(f, "no changes"),
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A resource type: handler plus its generated schema
pub struct Resource {
    handler: Box<dyn ResourceHandler>,
    schema: Schema,
}

impl Resource {
    /// Generate the handler's schema and wrap it
    pub fn new(handler: impl ResourceHandler + 'static) -> Result<Self> {
        let mut schema = handler.schema()?;
        if !handler.updatable() {
            schema.force_new_all();
        }
        Ok(Self {
            handler: Box::new(handler),
            schema,
        })
    }

    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Turn orchestrator configuration into desired state
    pub fn desired_state(&self, config: &Value) -> Result<ResourceData> {
        config_to_data(config, &self.schema)
    }

    /// Validate desired state without touching the network
    pub fn validate(&self, data: &ResourceData) -> Result<()> {
        validate_config(&self.schema, data)?;
        self.handler.validate(&self.schema, data)
    }

    /// Create the object described by `data`, then read it back
    pub async fn create(&self, client: &ApiClient, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        self.handler.create(client, &self.schema, data).await?;
        if !data.has_id() {
            return Err(Error::Other(format!(
                "{}: create returned no identifier",
                self.name()
            )));
        }
        info!(resource = self.name(), id = data.id(), "Created");
        self.read(client, data).await
    }

    /// Refresh state. A missing object clears the identifier.
    pub async fn read(&self, client: &ApiClient, data: &mut ResourceData) -> Result<()> {
        if !data.has_id() {
            return Ok(());
        }
        match self.handler.read(client, &self.schema, data).await {
            Ok(()) => {
                debug!(resource = self.name(), id = data.id(), "Read");
                Ok(())
            }
            Err(e) if e.is_missing() => {
                warn!(
                    resource = self.name(),
                    id = data.id(),
                    "Object is gone, removing from state: {e}"
                );
                data.set_id("");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Update the object in place, then read it back
    pub async fn update(&self, client: &ApiClient, data: &mut ResourceData) -> Result<()> {
        self.validate(data)?;
        self.handler.update(client, &self.schema, data).await?;
        info!(resource = self.name(), id = data.id(), "Updated");
        self.read(client, data).await
    }

    /// Delete the object and clear the state
    pub async fn delete(&self, client: &ApiClient, data: &mut ResourceData) -> Result<()> {
        if !data.has_id() {
            return Ok(());
        }
        self.handler.delete(client, &self.schema, data).await?;
        info!(resource = self.name(), id = data.id(), "Deleted");
        data.reset();
        Ok(())
    }

    /// Read an existing object by identifier
    pub async fn import(&self, client: &ApiClient, id: &str) -> Result<ResourceData> {
        let mut data = ResourceData::with_id(id);
        self.read(client, &mut data).await?;
        if !data.has_id() {
            return Err(Error::not_found(format!("{} {id} does not exist", self.name())));
        }
        Ok(data)
    }

    /// Compare prior state with desired state
    pub fn plan(&self, prior: Option<&ResourceData>, desired: &ResourceData) -> Plan {
        let Some(prior) = prior.filter(|p| p.has_id()) else {
            return Plan::Create;
        };
        let changes = diff(&self.schema, prior, desired);
        if changes.is_empty() {
            Plan::NoOp
        } else if changes.requires_replace() {
            Plan::Replace { diff: changes }
        } else {
            Plan::Update { diff: changes }
        }
    }

    /// Run one apply cycle and return the new state
    pub async fn apply(
        &self,
        client: &ApiClient,
        prior: Option<ResourceData>,
        config: &Value,
    ) -> Result<ResourceData> {
        let mut desired = self.desired_state(config)?;
        self.validate(&desired)?;

        match self.plan(prior.as_ref(), &desired) {
            Plan::NoOp => Ok(prior.unwrap_or(desired)),
            Plan::Create => {
                self.create(client, &mut desired).await?;
                Ok(desired)
            }
            Plan::Replace { .. } => {
                if let Some(mut old) = prior {
                    self.delete(client, &mut old).await?;
                }
                self.create(client, &mut desired).await?;
                Ok(desired)
            }
            Plan::Update { .. } => {
                if let Some(old) = &prior {
                    desired.set_id(old.id());
                }
                self.update(client, &mut desired).await?;
                Ok(desired)
            }
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .field("fields", &self.schema.len())
            .finish()
    }
}

// ============================================================================
// Pair identifiers
// ============================================================================

/// Identifier made of two fields joined with `|`, e.g. `user|role`
#[derive(Debug, Clone, Copy)]
pub struct PairId {
    left: &'static str,
    right: &'static str,
}

impl PairId {
    pub const fn new(left: &'static str, right: &'static str) -> Self {
        Self { left, right }
    }

    pub fn fields(&self) -> (&'static str, &'static str) {
        (self.left, self.right)
    }

    /// Build the identifier from the two fields in state
    pub fn pack(&self, data: &mut ResourceData) -> Result<()> {
        let left = required_part(data, self.left)?;
        let right = required_part(data, self.right)?;
        data.set_id(format!("{left}{PAIR_SEPARATOR}{right}"));
        Ok(())
    }

    /// Split the identifier and write both halves back into state
    pub fn unpack(&self, data: &mut ResourceData) -> Result<(String, String)> {
        let id = data.id().to_string();
        let (left, right) = id
            .split_once(PAIR_SEPARATOR)
            .filter(|(l, r)| !l.is_empty() && !r.is_empty())
            .ok_or_else(|| {
                Error::validation(
                    "id",
                    format!("invalid ID {id:?}, expected {}|{}", self.left, self.right),
                )
            })?;
        data.set(self.left, left);
        data.set(self.right, right);
        Ok((left.to_string(), right.to_string()))
    }
}

fn required_part(data: &ResourceData, field: &str) -> Result<String> {
    data.get(field)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::validation(field, "required field is not set"))
}

#[cfg(test)]
mod resource_tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::http::ClientConfig;
    use crate::schema::{struct_to_schema, Entity, FieldDescriptor, FieldType, StructDescriptor};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct Widget {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    }

    impl Entity for Widget {
        fn descriptor() -> StructDescriptor {
            StructDescriptor::new("Widget")
                .field(FieldDescriptor::new("name", FieldType::String))
                .field(FieldDescriptor::new("size", FieldType::optional(FieldType::Int)))
                .field(
                    FieldDescriptor::new("kind", FieldType::optional(FieldType::String))
                        .one_of(&["small", "large"])
                        .force_new(),
                )
        }
    }

    /// Handler that never touches the network and counts calls
    #[derive(Default)]
    struct Fake {
        calls: Arc<AtomicUsize>,
        gone: bool,
        updatable: bool,
    }

    #[async_trait]
    impl ResourceHandler for Fake {
        fn name(&self) -> &'static str {
            "fake_widget"
        }

        fn schema(&self) -> Result<Schema> {
            struct_to_schema::<Widget, _>(|_| Ok(()))
        }

        fn updatable(&self) -> bool {
            self.updatable
        }

        async fn create(&self, _: &ApiClient, _: &Schema, data: &mut ResourceData) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            data.set_id("w-1");
            Ok(())
        }

        async fn read(&self, _: &ApiClient, _: &Schema, _: &mut ResourceData) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gone {
                return Err(Error::api(404, "RESOURCE_DOES_NOT_EXIST", "gone"));
            }
            Ok(())
        }

        async fn update(&self, _: &ApiClient, _: &Schema, _: &mut ResourceData) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete(&self, _: &ApiClient, _: &Schema, _: &mut ResourceData) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn client() -> ApiClient {
        let auth = AuthConfig {
            host: Some("https://example.cloud.databricks.com".to_string()),
            token: Some("dapi-test".to_string()),
            ..AuthConfig::default()
        };
        ApiClient::new(ClientConfig::builder().no_rate_limit().build(), auth).unwrap()
    }

    fn updatable() -> Fake {
        Fake {
            updatable: true,
            ..Fake::default()
        }
    }

    #[tokio::test]
    async fn test_create_validates_before_calling_handler() {
        let fake = updatable();
        let calls = fake.calls.clone();
        let resource = Resource::new(fake).unwrap();

        let mut data = resource.desired_state(&json!({"kind": "tiny"})).unwrap();
        let err = resource.create(&client(), &mut data).await.unwrap_err();

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!data.has_id());
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let fake = updatable();
        let calls = fake.calls.clone();
        let resource = Resource::new(fake).unwrap();

        let mut data = resource.desired_state(&json!({"name": "w"})).unwrap();
        resource.create(&client(), &mut data).await.unwrap();

        assert_eq!(data.id(), "w-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_missing_clears_id() {
        let resource = Resource::new(Fake {
            gone: true,
            ..updatable()
        })
        .unwrap();

        let mut data = ResourceData::with_id("w-1");
        resource.read(&client(), &mut data).await.unwrap();
        assert_eq!(data.id(), "");

        let err = resource.import(&client(), "w-1").await.unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_plan() {
        let resource = Resource::new(updatable()).unwrap();
        let desired = resource
            .desired_state(&json!({"name": "w", "size": 2, "kind": "small"}))
            .unwrap();

        assert_eq!(resource.plan(None, &desired), Plan::Create);

        let mut prior = desired.clone();
        prior.set_id("w-1");
        assert!(resource.plan(Some(&prior), &desired).is_noop());

        prior.set("size", "1");
        assert!(matches!(
            resource.plan(Some(&prior), &desired),
            Plan::Update { .. }
        ));

        prior.set("kind", "large");
        assert!(matches!(
            resource.plan(Some(&prior), &desired),
            Plan::Replace { .. }
        ));
    }

    #[test]
    fn test_not_updatable_forces_replace() {
        let resource = Resource::new(Fake::default()).unwrap();
        assert!(resource.schema().get("name").unwrap().force_new);

        let desired = resource.desired_state(&json!({"name": "b"})).unwrap();
        let mut prior = resource.desired_state(&json!({"name": "a"})).unwrap();
        prior.set_id("w-1");
        assert!(matches!(
            resource.plan(Some(&prior), &desired),
            Plan::Replace { .. }
        ));
    }

    #[tokio::test]
    async fn test_apply_update_keeps_id() {
        let resource = Resource::new(updatable()).unwrap();
        let mut prior = resource.desired_state(&json!({"name": "a"})).unwrap();
        prior.set_id("w-9");

        let state = resource
            .apply(&client(), Some(prior), &json!({"name": "b"}))
            .await
            .unwrap();
        assert_eq!(state.id(), "w-9");
        assert_eq!(state.get("name"), Some("b"));
    }

    #[tokio::test]
    async fn test_delete_clears_state() {
        let resource = Resource::new(updatable()).unwrap();
        let mut data = resource.desired_state(&json!({"name": "a"})).unwrap();
        data.set_id("w-1");

        resource.delete(&client(), &mut data).await.unwrap();
        assert!(!data.has_id());
        assert!(data.is_empty());
    }

    #[test]
    fn test_pair_id() {
        let pair = PairId::new("user_id", "instance_profile_id");
        let mut data = ResourceData::new();
        data.set("user_id", "123");
        data.set("instance_profile_id", "arn:aws:iam::999999999999:instance-profile/x");
        pair.pack(&mut data).unwrap();
        assert_eq!(
            data.id(),
            "123|arn:aws:iam::999999999999:instance-profile/x"
        );

        let mut imported = ResourceData::with_id(data.id());
        let (user, role) = pair.unpack(&mut imported).unwrap();
        assert_eq!(user, "123");
        assert_eq!(imported.get("instance_profile_id"), Some(role.as_str()));

        for bad in ["123", "|x", "x|"] {
            let mut data = ResourceData::with_id(bad);
            assert!(pair.unpack(&mut data).is_err(), "{bad}");
        }
    }
}
