//! Instance profile roles of a workspace user
//!
//! The binding has no object of its own: it is a role entry on the SCIM user,
//! identified as `user_id|instance_profile_id`. Nothing can be changed in
//! place, so every field forces a replacement.

use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::resource::{PairId, ResourceHandler};
use crate::schema::{
    data_to_structure, struct_to_schema, structure_to_data, Entity, FieldDescriptor, FieldType, ResourceData, Schema,
    StructDescriptor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const USERS_PATH: &str = "/preview/scim/v2/Users";

const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// AWS instance profile ARN
pub const INSTANCE_PROFILE_ARN: &str = r"^arn:aws:iam::\d{12}:instance-profile/\S+$";

const PAIR: PairId = PairId::new("user_id", "instance_profile_id");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInstanceProfile {
    pub user_id: String,
    pub instance_profile_id: String,
}

impl Entity for UserInstanceProfile {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("UserInstanceProfile")
            .field(FieldDescriptor::new("user_id", FieldType::String))
            .field(
                FieldDescriptor::new("instance_profile_id", FieldType::String)
                    .matches(INSTANCE_PROFILE_ARN),
            )
    }
}

// ============================================================================
// SCIM wire format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ComplexValue {
    value: String,
}

#[derive(Debug, Serialize)]
struct PatchRequest {
    schemas: Vec<&'static str>,
    #[serde(rename = "Operations")]
    operations: Vec<PatchOperation>,
}

#[derive(Debug, Serialize)]
struct PatchOperation {
    op: &'static str,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Vec<ComplexValue>>,
}

impl PatchRequest {
    fn new(operation: PatchOperation) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA],
            operations: vec![operation],
        }
    }

    fn add_role(arn: &str) -> Self {
        Self::new(PatchOperation {
            op: "add",
            path: "roles".to_string(),
            value: Some(vec![ComplexValue {
                value: arn.to_string(),
            }]),
        })
    }

    fn remove_role(arn: &str) -> Self {
        Self::new(PatchOperation {
            op: "remove",
            path: format!("roles[value eq \"{arn}\"]"),
            value: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ScimUser {
    #[serde(default)]
    roles: Vec<ComplexValue>,
}

// ============================================================================
// Handler
// ============================================================================

/// `databricks_user_instance_profile`
#[derive(Debug, Default)]
pub struct UserInstanceProfileResource;

impl UserInstanceProfileResource {
    async fn patch_user(
        &self,
        client: &ApiClient,
        user_id: &str,
        request: &PatchRequest,
    ) -> Result<()> {
        let _: serde_json::Value = client
            .patch(&format!("{USERS_PATH}/{user_id}"), request)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for UserInstanceProfileResource {
    fn name(&self) -> &'static str {
        "databricks_user_instance_profile"
    }

    fn schema(&self) -> Result<Schema> {
        struct_to_schema::<UserInstanceProfile, _>(|_| Ok(()))
    }

    fn updatable(&self) -> bool {
        false
    }

    async fn create(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let binding: UserInstanceProfile = data_to_structure(data, schema)?;
        let request = PatchRequest::add_role(&binding.instance_profile_id);
        self.patch_user(client, &binding.user_id, &request).await?;
        PAIR.pack(data)
    }

    async fn read(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let (user_id, arn) = PAIR.unpack(data)?;
        let user: ScimUser = client.get(&format!("{USERS_PATH}/{user_id}"), &[]).await?;
        if !user.roles.iter().any(|role| role.value == arn) {
            return Err(Error::not_found("User has no role"));
        }
        let binding = UserInstanceProfile {
            user_id,
            instance_profile_id: arn,
        };
        structure_to_data(&binding, schema, data)
    }

    async fn delete(
        &self,
        client: &ApiClient,
        _schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let (user_id, arn) = PAIR.unpack(data)?;
        self.patch_user(client, &user_id, &PatchRequest::remove_role(&arn))
            .await
    }
}
