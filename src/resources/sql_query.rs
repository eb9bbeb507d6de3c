//! SQL queries
//!
//! State keeps schedules and parameters as tagged unions: exactly one of
//! `continuous`, `daily` or `weekly` per schedule and exactly one value kind
//! per parameter. The API flattens both. A schedule is a single interval in
//! seconds, and parameters carry a `type` discriminator with enum options
//! joined by newlines.

use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::resource::ResourceHandler;
use crate::schema::{
    data_to_structure, struct_to_schema, structure_to_data, Entity, FieldDescriptor, FieldType,
    Presence, ResourceData, Schema, StructDescriptor, Validator,
};
use crate::types::OptionStringExt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const QUERIES_PATH: &str = "/preview/sql/queries";

const SECONDS_IN_DAY: i64 = 24 * 60 * 60;
const SECONDS_IN_WEEK: i64 = 7 * SECONDS_IN_DAY;

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const SCHEDULE_KINDS: [&str; 3] = ["continuous", "daily", "weekly"];

const PARAMETER_KINDS: [&str; 10] = [
    "text",
    "number",
    "enum",
    "query",
    "date",
    "datetime",
    "datetimesec",
    "date_range",
    "datetime_range",
    "datetimesec_range",
];

// ============================================================================
// State entities
// ============================================================================

/// SQL query as kept in state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub data_source_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<QuerySchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Vec<QueryParameter>>,
}

impl Entity for SqlQuery {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("SqlQuery")
            .field(FieldDescriptor::new("data_source_id", FieldType::String))
            .field(FieldDescriptor::new("name", FieldType::String))
            .field(FieldDescriptor::new(
                "description",
                FieldType::optional(FieldType::String),
            ))
            .field(FieldDescriptor::new("query", FieldType::String))
            .field(FieldDescriptor::new(
                "schedule",
                FieldType::optional_entity::<QuerySchedule>(),
            ))
            .field(FieldDescriptor::new(
                "tags",
                FieldType::optional(FieldType::list(FieldType::String)),
            ))
            .field(FieldDescriptor::new(
                "parameter",
                FieldType::optional(FieldType::list_of::<QueryParameter>()),
            ))
    }
}

/// When the query refreshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySchedule {
    Continuous(ContinuousSchedule),
    Daily(DailySchedule),
    Weekly(WeeklySchedule),
}

impl Entity for QuerySchedule {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("QuerySchedule")
            .field(FieldDescriptor::new(
                "continuous",
                FieldType::optional_entity::<ContinuousSchedule>(),
            ))
            .field(FieldDescriptor::new(
                "daily",
                FieldType::optional_entity::<DailySchedule>(),
            ))
            .field(FieldDescriptor::new(
                "weekly",
                FieldType::optional_entity::<WeeklySchedule>(),
            ))
            .exclusive(&SCHEDULE_KINDS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSchedule {
    pub interval_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until_date: Option<String>,
}

impl Entity for ContinuousSchedule {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("ContinuousSchedule")
            .field(FieldDescriptor::new("interval_seconds", FieldType::Int))
            .field(FieldDescriptor::new(
                "until_date",
                FieldType::optional(FieldType::String),
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub interval_days: i64,
    pub time_of_day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until_date: Option<String>,
}

impl Entity for DailySchedule {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("DailySchedule")
            .field(FieldDescriptor::new("interval_days", FieldType::Int))
            .field(FieldDescriptor::new("time_of_day", FieldType::String))
            .field(FieldDescriptor::new(
                "until_date",
                FieldType::optional(FieldType::String),
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub interval_weeks: i64,
    pub day_of_week: String,
    pub time_of_day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until_date: Option<String>,
}

impl Entity for WeeklySchedule {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("WeeklySchedule")
            .field(FieldDescriptor::new("interval_weeks", FieldType::Int))
            .field(FieldDescriptor::new("day_of_week", FieldType::String))
            .field(FieldDescriptor::new("time_of_day", FieldType::String))
            .field(FieldDescriptor::new(
                "until_date",
                FieldType::optional(FieldType::String),
            ))
    }
}

/// Query parameter: a name plus exactly one value kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl Entity for QueryParameter {
    fn descriptor() -> StructDescriptor {
        let value = FieldType::entity::<ValueParameter>;
        StructDescriptor::new("QueryParameter")
            .field(FieldDescriptor::new("name", FieldType::String))
            .field(FieldDescriptor::new(
                "title",
                FieldType::optional(FieldType::String),
            ))
            .field(FieldDescriptor::new(
                "text",
                FieldType::optional(value()),
            ))
            .field(FieldDescriptor::new(
                "number",
                FieldType::optional_entity::<NumberParameter>(),
            ))
            .field(FieldDescriptor::new(
                "enum",
                FieldType::optional_entity::<EnumParameter>(),
            ))
            .field(FieldDescriptor::new(
                "query",
                FieldType::optional_entity::<QueryBackedParameter>(),
            ))
            .field(FieldDescriptor::new("date", FieldType::optional(value())))
            .field(FieldDescriptor::new("datetime", FieldType::optional(value())))
            .field(FieldDescriptor::new(
                "datetimesec",
                FieldType::optional(value()),
            ))
            .field(FieldDescriptor::new("date_range", FieldType::optional(value())))
            .field(FieldDescriptor::new(
                "datetime_range",
                FieldType::optional(value()),
            ))
            .field(FieldDescriptor::new(
                "datetimesec_range",
                FieldType::optional(value()),
            ))
            .exclusive(&PARAMETER_KINDS)
    }
}

/// Value kind of a query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Text(ValueParameter),
    Number(NumberParameter),
    Enum(EnumParameter),
    Query(QueryBackedParameter),
    Date(ValueParameter),
    Datetime(ValueParameter),
    Datetimesec(ValueParameter),
    DateRange(ValueParameter),
    DatetimeRange(ValueParameter),
    DatetimesecRange(ValueParameter),
}

/// Parameter holding a single string value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueParameter {
    pub value: String,
}

impl Entity for ValueParameter {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("ValueParameter")
            .field(FieldDescriptor::new("value", FieldType::String))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberParameter {
    pub value: f64,
}

impl Entity for NumberParameter {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("NumberParameter")
            .field(FieldDescriptor::new("value", FieldType::Float))
    }
}

/// Pick from a fixed list. `values` is used iff `multiple` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<MultipleValues>,
}

impl Entity for EnumParameter {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("EnumParameter")
            .field(
                FieldDescriptor::new("value", FieldType::optional(FieldType::String))
                    .conflicts_with(&["values"]),
            )
            .field(FieldDescriptor::new(
                "values",
                FieldType::optional(FieldType::list(FieldType::String)),
            ))
            .field(FieldDescriptor::new("options", FieldType::list(FieldType::String)))
            .field(FieldDescriptor::new(
                "multiple",
                FieldType::optional_entity::<MultipleValues>(),
            ))
    }
}

/// Pick from the results of another query. `values` is used iff `multiple` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBackedParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    pub query_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<MultipleValues>,
}

impl Entity for QueryBackedParameter {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("QueryBackedParameter")
            .field(
                FieldDescriptor::new("value", FieldType::optional(FieldType::String))
                    .conflicts_with(&["values"]),
            )
            .field(FieldDescriptor::new(
                "values",
                FieldType::optional(FieldType::list(FieldType::String)),
            ))
            .field(FieldDescriptor::new("query_id", FieldType::String))
            .field(FieldDescriptor::new(
                "multiple",
                FieldType::optional_entity::<MultipleValues>(),
            ))
    }
}

/// How multiple selected values are quoted and joined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

impl Entity for MultipleValues {
    fn descriptor() -> StructDescriptor {
        StructDescriptor::new("MultipleValues")
            .field(FieldDescriptor::new("prefix", FieldType::optional(FieldType::String)))
            .field(FieldDescriptor::new("suffix", FieldType::optional(FieldType::String)))
            .field(FieldDescriptor::new(
                "separator",
                FieldType::optional(FieldType::String),
            ))
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ApiQuery {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub data_source_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub query: String,
    /// Sent as `null` to remove a schedule
    #[serde(default)]
    pub schedule: Option<ApiSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ApiQueryOptions>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ApiSchedule {
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ApiQueryOptions {
    #[serde(default)]
    pub parameters: Vec<ApiParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ApiParameter {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub kind: ApiParameterKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ApiParameterKind {
    #[serde(rename = "text")]
    Text { value: String },
    #[serde(rename = "number")]
    Number { value: f64 },
    #[serde(rename = "enum")]
    Enum {
        #[serde(rename = "enumOptions", default)]
        options: String,
        #[serde(default)]
        value: ApiValues,
        #[serde(
            rename = "multiValuesOptions",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        multi: Option<ApiMultiValues>,
    },
    #[serde(rename = "query")]
    Query {
        #[serde(rename = "queryId")]
        query_id: String,
        #[serde(default)]
        value: ApiValues,
        #[serde(
            rename = "multiValuesOptions",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        multi: Option<ApiMultiValues>,
    },
    #[serde(rename = "date")]
    Date { value: String },
    #[serde(rename = "datetime-local")]
    Datetime { value: String },
    #[serde(rename = "datetime-with-seconds")]
    Datetimesec { value: String },
    #[serde(rename = "date-range")]
    DateRange { value: String },
    #[serde(rename = "datetime-range")]
    DatetimeRange { value: String },
    #[serde(rename = "datetime-range-with-seconds")]
    DatetimesecRange { value: String },
}

/// A single selection, or a list when multiple values are allowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiValues {
    One(String),
    Many(Vec<String>),
}

impl Default for ApiValues {
    fn default() -> Self {
        ApiValues::Many(Vec::new())
    }
}

impl ApiValues {
    fn into_vec(self) -> Vec<String> {
        match self {
            ApiValues::One(value) => vec![value],
            ApiValues::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ApiMultiValues {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub separator: String,
}

// ============================================================================
// State <-> wire
// ============================================================================

impl From<&QuerySchedule> for ApiSchedule {
    fn from(schedule: &QuerySchedule) -> Self {
        match schedule {
            QuerySchedule::Continuous(s) => ApiSchedule {
                interval: s.interval_seconds,
                time: None,
                day_of_week: None,
                until: s.until_date.clone(),
            },
            QuerySchedule::Daily(s) => ApiSchedule {
                interval: s.interval_days * SECONDS_IN_DAY,
                time: Some(s.time_of_day.clone()),
                day_of_week: None,
                until: s.until_date.clone(),
            },
            QuerySchedule::Weekly(s) => ApiSchedule {
                interval: s.interval_weeks * SECONDS_IN_WEEK,
                time: Some(s.time_of_day.clone()),
                day_of_week: Some(s.day_of_week.clone()),
                until: s.until_date.clone(),
            },
        }
    }
}

impl From<ApiSchedule> for QuerySchedule {
    /// The interval decides the kind: whole weeks, then whole days, else seconds
    fn from(s: ApiSchedule) -> Self {
        if s.interval % SECONDS_IN_WEEK == 0 {
            QuerySchedule::Weekly(WeeklySchedule {
                interval_weeks: s.interval / SECONDS_IN_WEEK,
                day_of_week: s.day_of_week.unwrap_or_default(),
                time_of_day: s.time.unwrap_or_default(),
                until_date: s.until,
            })
        } else if s.interval % SECONDS_IN_DAY == 0 {
            QuerySchedule::Daily(DailySchedule {
                interval_days: s.interval / SECONDS_IN_DAY,
                time_of_day: s.time.unwrap_or_default(),
                until_date: s.until,
            })
        } else {
            QuerySchedule::Continuous(ContinuousSchedule {
                interval_seconds: s.interval,
                until_date: s.until,
            })
        }
    }
}

impl From<&MultipleValues> for ApiMultiValues {
    fn from(m: &MultipleValues) -> Self {
        Self {
            prefix: m.prefix.clone().unwrap_or_default(),
            suffix: m.suffix.clone().unwrap_or_default(),
            separator: m.separator.clone().unwrap_or_default(),
        }
    }
}

impl From<ApiMultiValues> for MultipleValues {
    fn from(m: ApiMultiValues) -> Self {
        Self {
            prefix: m.prefix.none_if_empty(),
            suffix: m.suffix.none_if_empty(),
            separator: m.separator.none_if_empty(),
        }
    }
}

/// Wire value of a selection parameter
fn selection_to_api(
    value: &Option<String>,
    values: &Option<Vec<String>>,
    multiple: &Option<MultipleValues>,
) -> (ApiValues, Option<ApiMultiValues>) {
    match multiple {
        Some(m) => (
            ApiValues::Many(values.clone().unwrap_or_default()),
            Some(m.into()),
        ),
        None => (ApiValues::One(value.clone().unwrap_or_default()), None),
    }
}

/// State value of a selection parameter: `(value, values, multiple)`
fn selection_from_api(
    value: ApiValues,
    multi: Option<ApiMultiValues>,
) -> (Option<String>, Option<Vec<String>>, Option<MultipleValues>) {
    let values = value.into_vec();
    match multi {
        Some(m) => (None, Some(values), Some(m.into())),
        None => (values.into_iter().next(), None, None),
    }
}

impl From<&QueryParameter> for ApiParameter {
    fn from(p: &QueryParameter) -> Self {
        let kind = match &p.kind {
            ParameterKind::Text(v) => ApiParameterKind::Text {
                value: v.value.clone(),
            },
            ParameterKind::Number(v) => ApiParameterKind::Number { value: v.value },
            ParameterKind::Enum(e) => {
                let (value, multi) = selection_to_api(&e.value, &e.values, &e.multiple);
                ApiParameterKind::Enum {
                    options: e.options.join("\n"),
                    value,
                    multi,
                }
            }
            ParameterKind::Query(q) => {
                let (value, multi) = selection_to_api(&q.value, &q.values, &q.multiple);
                ApiParameterKind::Query {
                    query_id: q.query_id.clone(),
                    value,
                    multi,
                }
            }
            ParameterKind::Date(v) => ApiParameterKind::Date {
                value: v.value.clone(),
            },
            ParameterKind::Datetime(v) => ApiParameterKind::Datetime {
                value: v.value.clone(),
            },
            ParameterKind::Datetimesec(v) => ApiParameterKind::Datetimesec {
                value: v.value.clone(),
            },
            ParameterKind::DateRange(v) => ApiParameterKind::DateRange {
                value: v.value.clone(),
            },
            ParameterKind::DatetimeRange(v) => ApiParameterKind::DatetimeRange {
                value: v.value.clone(),
            },
            ParameterKind::DatetimesecRange(v) => ApiParameterKind::DatetimesecRange {
                value: v.value.clone(),
            },
        };
        ApiParameter {
            name: p.name.clone(),
            title: p.title.clone().unwrap_or_default(),
            kind,
        }
    }
}

impl From<ApiParameter> for QueryParameter {
    fn from(p: ApiParameter) -> Self {
        let plain = |value: String| ValueParameter { value };
        let kind = match p.kind {
            ApiParameterKind::Text { value } => ParameterKind::Text(plain(value)),
            ApiParameterKind::Number { value } => ParameterKind::Number(NumberParameter { value }),
            ApiParameterKind::Enum {
                options,
                value,
                multi,
            } => {
                let (value, values, multiple) = selection_from_api(value, multi);
                ParameterKind::Enum(EnumParameter {
                    value,
                    values,
                    options: options.split('\n').map(str::to_string).collect(),
                    multiple,
                })
            }
            ApiParameterKind::Query {
                query_id,
                value,
                multi,
            } => {
                let (value, values, multiple) = selection_from_api(value, multi);
                ParameterKind::Query(QueryBackedParameter {
                    value,
                    values,
                    query_id,
                    multiple,
                })
            }
            ApiParameterKind::Date { value } => ParameterKind::Date(plain(value)),
            ApiParameterKind::Datetime { value } => ParameterKind::Datetime(plain(value)),
            ApiParameterKind::Datetimesec { value } => ParameterKind::Datetimesec(plain(value)),
            ApiParameterKind::DateRange { value } => ParameterKind::DateRange(plain(value)),
            ApiParameterKind::DatetimeRange { value } => ParameterKind::DatetimeRange(plain(value)),
            ApiParameterKind::DatetimesecRange { value } => {
                ParameterKind::DatetimesecRange(plain(value))
            }
        };
        QueryParameter {
            name: p.name,
            title: p.title.none_if_empty(),
            kind,
        }
    }
}

impl SqlQuery {
    pub(crate) fn to_api(&self, id: &str) -> ApiQuery {
        let parameters: Vec<ApiParameter> = self
            .parameter
            .iter()
            .flatten()
            .map(ApiParameter::from)
            .collect();
        ApiQuery {
            id: id.to_string(),
            data_source_id: self.data_source_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            query: self.query.clone(),
            schedule: self.schedule.as_ref().map(ApiSchedule::from),
            options: Some(ApiQueryOptions { parameters }),
            tags: self.tags.clone().unwrap_or_default(),
        }
    }

    /// Build state from the wire form. Empty collections stay unset unless
    /// `prior` holds them as explicitly empty.
    pub(crate) fn from_api(query: ApiQuery, prior: &ResourceData) -> Self {
        let parameters: Vec<QueryParameter> = query
            .options
            .map(|o| o.parameters)
            .unwrap_or_default()
            .into_iter()
            .map(QueryParameter::from)
            .collect();
        SqlQuery {
            data_source_id: query.data_source_id,
            name: query.name,
            description: query.description.none_if_empty(),
            query: query.query,
            schedule: query.schedule.map(QuerySchedule::from),
            tags: collection(query.tags, prior, "tags"),
            parameter: collection(parameters, prior, "parameter"),
        }
    }
}

fn collection<T>(items: Vec<T>, prior: &ResourceData, path: &str) -> Option<Vec<T>> {
    if items.is_empty() && prior.presence(path) != Presence::Empty {
        None
    } else {
        Some(items)
    }
}

/// Number of tagged-union kinds set under `prefix`
fn kinds_set(data: &ResourceData, prefix: &str, kinds: &[&str]) -> usize {
    kinds
        .iter()
        .filter(|kind| data.is_set(&format!("{prefix}.{kind}")))
        .count()
}

// ============================================================================
// Handler
// ============================================================================

/// `databricks_sql_query`
#[derive(Debug, Default)]
pub struct SqlQueryResource;

#[async_trait]
impl ResourceHandler for SqlQueryResource {
    fn name(&self) -> &'static str {
        "databricks_sql_query"
    }

    fn schema(&self) -> Result<Schema> {
        struct_to_schema::<SqlQuery, _>(|s| {
            s.node_mut("schedule.weekly.day_of_week")?
                .add_validator(Validator::OneOf(
                    WEEKDAYS.iter().map(|d| (*d).to_string()).collect(),
                ));
            Ok(())
        })
    }

    /// Every schedule and every parameter needs exactly one kind
    fn validate(&self, _schema: &Schema, data: &ResourceData) -> Result<()> {
        if data.count("schedule") == Some(1) && kinds_set(data, "schedule.0", &SCHEDULE_KINDS) == 0
        {
            return Err(Error::validation(
                "schedule.0",
                format!("one of {} must be set", SCHEDULE_KINDS.join(", ")),
            ));
        }
        for i in 0..data.count("parameter").unwrap_or(0) {
            let prefix = format!("parameter.{i}");
            if kinds_set(data, &prefix, &PARAMETER_KINDS) == 0 {
                return Err(Error::validation(
                    prefix,
                    format!("one of {} must be set", PARAMETER_KINDS.join(", ")),
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
        let query: SqlQuery = data_to_structure(data, schema)?;
        let created: ApiQuery = client.post(QUERIES_PATH, &query.to_api("")).await?;
        debug!(id = %created.id, "SQL query created");
        data.set_id(created.id);
        Ok(())
    }

    async fn read(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let remote: ApiQuery = client
            .get(&format!("{QUERIES_PATH}/{}", data.id()), &[])
            .await?;
        let query = SqlQuery::from_api(remote, data);
        structure_to_data(&query, schema, data)
    }

    async fn update(
        &self,
        client: &ApiClient,
        schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        let query: SqlQuery = data_to_structure(data, schema)?;
        let path = format!("{QUERIES_PATH}/{}", data.id());
        let _: serde_json::Value = client.post(&path, &query.to_api(data.id())).await?;
        Ok(())
    }

    async fn delete(
        &self,
        client: &ApiClient,
        _schema: &Schema,
        data: &mut ResourceData,
    ) -> Result<()> {
        client
            .delete::<()>(&format!("{QUERIES_PATH}/{}", data.id()), None)
            .await
    }
}
