//! Workspace IP access lists
//!
//! `POST /preview/ip-access-lists` creates a list, the other calls address
//! `/preview/ip-access-lists/{list_id}`. Responses wrap the list in an
//! `ip_access_list` object.

use crate::error::Result;
use crate::http::ApiClient;
use crate::resource::ResourceHandler;
use crate::schema::{
    data_to_structure, struct_to_schema, structure_to_data, Entity, FieldDescriptor, FieldType,
    ResourceData, Schema, StructDescriptor,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const LIST_PATH: &str = "/preview/ip-access-lists";

/// Whether addresses on the list are let in or kept out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListType {
    Allow,
    Block,
}

/// IP access list as kept in state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAccessList {
    pub label: String,
    pub list_type: ListType,
    pub ip_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<i64>,
}

impl Entity for IpAccessList {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("IpAccessList")
            .field(FieldDescriptor::new("label", FieldType::String))
            .field(
                FieldDescriptor::new("list_type", FieldType::String).one_of(&["ALLOW", "BLOCK"]),
            )
            .field(
                FieldDescriptor::new("ip_addresses", FieldType::set(FieldType::String))
                    .min_items(1)
                    .description("IP addresses and CIDR ranges"),
            )
            .field(FieldDescriptor::new("enabled", FieldType::optional(FieldType::Bool)).default(true))
            .field(FieldDescriptor::new("address_count", FieldType::Int).computed())
            .field(FieldDescriptor::new("created_at", FieldType::Int).computed())
            .field(FieldDescriptor::new("created_by", FieldType::Int).computed())
            .field(FieldDescriptor::new("updated_at", FieldType::Int).computed())
            .field(FieldDescriptor::new("updated_by", FieldType::Int).computed())
    }
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    label: &'a str,
    list_type: ListType,
    ip_addresses: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
}

impl<'a> From<&'a IpAccessList> for ListRequest<'a> {
    fn from(list: &'a IpAccessList) -> Self {
        Self {
            label: &list.label,
            list_type: list.list_type,
            ip_addresses: &list.ip_addresses,
            enabled: list.enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListStatus {
    list_id: String,
    #[serde(flatten)]
    list: IpAccessList,
}

#[derive(Debug, Deserialize)]
struct ListWrapper {
    ip_access_list: ListStatus,
}

/// `databricks_ip_access_list`
#[derive(Debug, Default)]
pub struct IpAccessListResource;

#[async_trait]
impl ResourceHandler for IpAccessListResource {
    fn name(&self) -> &'static str {
        "databricks_ip_access_list"
    }

    fn schema(&self) -> Result<Schema> {
        struct_to_schema::<IpAccessList, _>(|_| Ok(()))
    }

    async fn create(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let list: IpAccessList = data_to_structure(data, schema)?;
        let created: ListWrapper = client.post(LIST_PATH, &ListRequest::from(&list)).await?;
        data.set_id(created.ip_access_list.list_id);
        Ok(())
    }

    async fn read(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let path = format!("{LIST_PATH}/{}", data.id());
        let status: ListWrapper = client.get(&path, &[]).await?;
        structure_to_data(&status.ip_access_list.list, schema, data)
    }

    async fn update(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let list: IpAccessList = data_to_structure(data, schema)?;
        let path = format!("{LIST_PATH}/{}", data.id());
        let _: serde_json::Value = client.put(&path, &ListRequest::from(&list)).await?;
        Ok(())
    }

    async fn delete(
        &self,
        client: &ApiClient,
        _schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let path = format!("{LIST_PATH}/{}", data.id());
        client.delete::<()>(&path, None).await
    }
}
