//! Resource types served by the provider
//!
//! | Resource | API |
//! |----------|-----|
//! | `databricks_ip_access_list` | `/preview/ip-access-lists` |
//! | `databricks_sql_query` | `/preview/sql/queries` |
//! | `databricks_permissions` | `/preview/permissions/{object}` |
//! | `databricks_user_instance_profile` | `/preview/scim/v2/Users` |

mod ip_access_list;
mod permissions;
mod sql_query;
mod user_instance_profile;

pub use ip_access_list::{IpAccessList, IpAccessListResource, ListType};
pub use permissions::{AccessControl, ObjectPermissions, PermissionsResource};
pub use sql_query::{
    ContinuousSchedule, DailySchedule, EnumParameter, MultipleValues, NumberParameter,
    ParameterKind, QueryBackedParameter, QueryParameter, QuerySchedule, SqlQuery,
    SqlQueryResource, ValueParameter, WeeklySchedule,
};
pub use user_instance_profile::{
    UserInstanceProfile, UserInstanceProfileResource, INSTANCE_PROFILE_ARN,
};

use crate::error::{Error, Result};
use crate::resource::Resource;
use std::collections::BTreeMap;

/// All resource types by name
#[derive(Debug)]
pub struct Registry {
    resources: BTreeMap<&'static str, Resource>,
}

impl Registry {
    /// Build every resource type and its schema
    pub fn new() -> Result<Self> {
        let mut registry = Self {
            resources: BTreeMap::new(),
        };
        registry.register(Resource::new(IpAccessListResource)?);
        registry.register(Resource::new(SqlQueryResource)?);
        registry.register(Resource::new(PermissionsResource)?);
        registry.register(Resource::new(UserInstanceProfileResource)?);
        Ok(registry)
    }

    fn register(&mut self, resource: Resource) {
        self.resources.insert(resource.name(), resource);
    }

    /// Look up a resource type by name
    pub fn get(&self, name: &str) -> Result<&Resource> {
        self.resources.get(name).ok_or_else(|| {
            Error::config(format!(
                "unknown resource type '{name}', expected one of: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Resource type names in alphabetical order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }
}
