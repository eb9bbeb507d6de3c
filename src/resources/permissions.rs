//! Object permissions
//!
//! The identifier is the object path, e.g. `/clusters/0123-abc`, and all calls
//! go to `/preview/permissions{object}`. Writes replace the whole access
//! control list. Reads drop entries that are only inherited and the implicit
//! `admins` group.

use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::resource::ResourceHandler;
use crate::schema::{
    data_to_structure, struct_to_schema, structure_to_data, Entity, FieldDescriptor, FieldType,
    ResourceData, Schema, StructDescriptor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const PERMISSIONS_PATH: &str = "/preview/permissions";

const ADMINS_GROUP: &str = "admins";

/// Object identifier fields and the path prefix of each
const OBJECT_TYPES: [(&str, &str); 6] = [
    ("cluster_id", "/clusters/"),
    ("cluster_policy_id", "/cluster-policies/"),
    ("instance_pool_id", "/instance-pools/"),
    ("job_id", "/jobs/"),
    ("directory_id", "/directories/"),
    ("notebook_id", "/notebooks/"),
];

const PERMISSION_LEVELS: [&str; 10] = [
    "CAN_MANAGE",
    "CAN_RESTART",
    "CAN_ATTACH_TO",
    "IS_OWNER",
    "CAN_MANAGE_RUN",
    "CAN_VIEW",
    "CAN_READ",
    "CAN_RUN",
    "CAN_EDIT",
    "CAN_USE",
];

const PRINCIPALS: [&str; 3] = ["user_name", "group_name", "service_principal_name"];

// ============================================================================
// State entities
// ============================================================================

/// Permissions of one workspace object as kept in state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    pub access_control: Vec<AccessControl>,
}

impl Entity for ObjectPermissions {
    fn descriptor() -> StructDescriptor {
        let object_names: Vec<&str> = OBJECT_TYPES.iter().map(|(name, _)| *name).collect();
        let mut descriptor = StructDescriptor::new("ObjectPermissions");
        for name in &object_names {
            descriptor = descriptor.field(
                FieldDescriptor::new(*name, FieldType::optional(FieldType::String)).force_new(),
            );
        }
        descriptor
            .field(FieldDescriptor::new("object_type", FieldType::String).computed())
            .field(
                FieldDescriptor::new("access_control", FieldType::set(FieldType::entity::<AccessControl>()))
                    .min_items(1),
            )
            .exclusive(&object_names)
    }
}

/// One principal and its permission level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
    pub permission_level: String,
}

impl Entity for AccessControl {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("AccessControl")
            .field(FieldDescriptor::new("user_name", FieldType::optional(FieldType::String)))
            .field(FieldDescriptor::new("group_name", FieldType::optional(FieldType::String)))
            .field(FieldDescriptor::new(
                "service_principal_name",
                FieldType::optional(FieldType::String),
            ))
            .field(
                FieldDescriptor::new("permission_level", FieldType::String)
                    .one_of(&PERMISSION_LEVELS),
            )
            .exclusive(&PRINCIPALS)
    }
}

impl AccessControl {
    fn principal_count(&self) -> usize {
        [
            &self.user_name,
            &self.group_name,
            &self.service_principal_name,
        ]
        .iter()
        .filter(|p| p.is_some())
        .count()
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// Request body replacing an access control list
#[derive(Debug, Serialize)]
struct AccessControlChangeList<'a> {
    access_control_list: &'a [AccessControl],
}

/// Access control list of an object, inherited entries included
#[derive(Debug, Deserialize)]
struct ObjectAcl {
    #[serde(default)]
    object_type: Option<String>,
    #[serde(default)]
    access_control_list: Vec<AclEntry>,
}

#[derive(Debug, Deserialize)]
struct AclEntry {
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    service_principal_name: Option<String>,
    #[serde(default)]
    all_permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
struct Permission {
    permission_level: String,
    #[serde(default)]
    inherited: bool,
}

impl AclEntry {
    /// Directly granted access of this entry, if any
    fn direct(self) -> Option<AccessControl> {
        if self.group_name.as_deref() == Some(ADMINS_GROUP) {
            return None;
        }
        let level = self
            .all_permissions
            .into_iter()
            .find(|p| !p.inherited)?
            .permission_level;
        Some(AccessControl {
            user_name: self.user_name,
            group_name: self.group_name,
            service_principal_name: self.service_principal_name,
            permission_level: level,
        })
    }
}

// ============================================================================
// Object identifiers
// ============================================================================

/// Object path from whichever identifier field is set
fn object_path(permissions: &ObjectPermissions) -> Result<String> {
    let ids = [
        &permissions.cluster_id,
        &permissions.cluster_policy_id,
        &permissions.instance_pool_id,
        &permissions.job_id,
        &permissions.directory_id,
        &permissions.notebook_id,
    ];
    OBJECT_TYPES
        .iter()
        .zip(ids)
        .find_map(|((_, prefix), id)| id.as_ref().map(|id| format!("{prefix}{id}")))
        .ok_or_else(no_object_error)
}

/// Identifier field and value encoded in an object path
fn parse_object_path(path: &str) -> Result<(&'static str, &str)> {
    OBJECT_TYPES
        .iter()
        .find_map(|(field, prefix)| path.strip_prefix(prefix).map(|id| (*field, id)))
        .filter(|(_, id)| !id.is_empty())
        .ok_or_else(|| Error::validation("id", format!("unsupported object path {path:?}")))
}

fn no_object_error() -> Error {
    let names: Vec<&str> = OBJECT_TYPES.iter().map(|(name, _)| *name).collect();
    Error::validation("", format!("one of {} must be set", names.join(", ")))
}

// ============================================================================
// Handler
// ============================================================================

/// `databricks_permissions`
#[derive(Debug, Default)]
pub struct PermissionsResource;

impl PermissionsResource {
    async fn put(&self, client: &ApiClient, object: &str, acl: &[AccessControl]) -> Result<()> {
        let body = AccessControlChangeList {
            access_control_list: acl,
        };
        let _: serde_json::Value = client
            .put(&format!("{PERMISSIONS_PATH}{object}"), &body)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for PermissionsResource {
    fn name(&self) -> &'static str {
        "databricks_permissions"
    }

    fn schema(&self) -> Result<Schema> {
        struct_to_schema::<ObjectPermissions, _>(|_| Ok(()))
    }

    fn validate(&self, schema: &Schema, data: &ResourceData) -> Result<()> {
        let permissions: ObjectPermissions = data_to_structure(data, schema)?;
        object_path(&permissions)?;
        for (i, entry) in permissions.access_control.iter().enumerate() {
            if entry.principal_count() != 1 {
                return Err(Error::validation(
                    format!("access_control.{i}"),
                    format!("exactly one of {} must be set", PRINCIPALS.join(", ")),
                ));
            }
        }
        Ok(())
    }

    async fn create(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let permissions: ObjectPermissions = data_to_structure(data, schema)?;
        let object = object_path(&permissions)?;
        self.put(client, &object, &permissions.access_control).await?;
        data.set_id(object);
        Ok(())
    }

    async fn read(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let (field, object_id) = parse_object_path(data.id())?;
        let acl: ObjectAcl = client
            .get(&format!("{PERMISSIONS_PATH}{}", data.id()), &[])
            .await?;

        let access_control: Vec<AccessControl> = acl
            .access_control_list
            .into_iter()
            .filter_map(AclEntry::direct)
            .collect();
        if access_control.is_empty() {
            return Err(Error::not_found(format!(
                "{} has no permissions managed outside of defaults",
                data.id()
            )));
        }

        let mut permissions = ObjectPermissions {
            object_type: acl.object_type,
            access_control,
            ..ObjectPermissions::default()
        };
        let slot = match field {
            "cluster_id" => &mut permissions.cluster_id,
            "cluster_policy_id" => &mut permissions.cluster_policy_id,
            "instance_pool_id" => &mut permissions.instance_pool_id,
            "job_id" => &mut permissions.job_id,
            "directory_id" => &mut permissions.directory_id,
            _ => &mut permissions.notebook_id,
        };
        *slot = Some(object_id.to_string());
        structure_to_data(&permissions, schema, data)
    }

    async fn update(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let permissions: ObjectPermissions = data_to_structure(data, schema)?;
        let object = data.id().to_string();
        self.put(client, &object, &permissions.access_control).await
    }

    async fn delete(
        &self,
        client: &ApiClient,
        _schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let object = data.id().to_string();
        self.put(client, &object, &[]).await
    }
}
