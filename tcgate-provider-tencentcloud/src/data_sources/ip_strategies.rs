//! tencentcloud_api_gateway_ip_strategies
//!
//! Strategies of one service, each with the apis it is bound to across all
//! environments.

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::{Attributes, Context, Outputs, fail};
use crate::services::apigateway::{BindApi, ENVIRONMENTS, IpStrategy, OauthConfig};

pub const TYPE: &str = "tencentcloud_api_gateway_ip_strategies";

const API_FIELDS: [&str; 13] = [
    "service_id",
    "api_id",
    "api_name",
    "api_desc",
    "path",
    "method",
    "protocol",
    "auth_type",
    "api_type",
    "api_business_type",
    "auth_relation_api_id",
    "uniq_vpc_id",
    "modify_time",
];

pub fn schema() -> ResourceSchema {
    let mut api: Vec<AttributeSchema> = API_FIELDS
        .into_iter()
        .map(|name| AttributeSchema::new(name, AttributeType::String))
        .collect();
    api.push(AttributeSchema::new("vpc_id", AttributeType::Int));
    api.push(AttributeSchema::new("tags", types::string_list()));
    api.push(AttributeSchema::new(
        "relation_business_api_ids",
        types::string_list(),
    ));
    api.push(AttributeSchema::new(
        "oauth_config",
        AttributeType::Map(Box::new(AttributeType::String)),
    ));
    api.push(AttributeSchema::new("create_time", AttributeType::String));

    let item = vec![
        AttributeSchema::new("strategy_id", AttributeType::String),
        AttributeSchema::new("strategy_name", AttributeType::String),
        AttributeSchema::new("strategy_type", AttributeType::String),
        AttributeSchema::new("ip_list", AttributeType::String),
        AttributeSchema::new("service_id", AttributeType::String),
        AttributeSchema::new("bind_api_total_count", AttributeType::Int),
        AttributeSchema::new("modify_time", AttributeType::String),
        AttributeSchema::new("create_time", AttributeType::String),
        AttributeSchema::new("attach_list", types::block_list(api)),
    ];

    ResourceSchema::new(TYPE)
        .with_description("IP strategies of a service")
        .attribute(AttributeSchema::new("service_id", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("strategy_name", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

fn api_value(api: BindApi) -> Value {
    Value::Map(
        Outputs::new()
            .set("service_id", api.service_id)
            .set("api_id", api.api_id)
            .set("api_name", api.api_name)
            .set("api_desc", api.api_desc)
            .set("path", api.path)
            .set("method", api.method)
            .set("protocol", api.protocol)
            .set("auth_type", api.auth_type)
            .set("api_type", api.api_type)
            .set("api_business_type", api.api_business_type)
            .set("auth_relation_api_id", api.auth_relation_api_id)
            .set("tags", api.tags)
            .set("relation_business_api_ids", api.relation_business_api_ids)
            .set("oauth_config", api.oauth_config.map(oauth_value))
            .set("vpc_id", api.vpc_id)
            .set("uniq_vpc_id", api.uniq_vpc_id)
            .set("modify_time", api.modified_time)
            .set("create_time", api.created_time)
            .into_map(),
    )
}

fn oauth_value(config: OauthConfig) -> Outputs {
    Outputs::new()
        .set("public_key", config.public_key)
        .set("token_location", config.token_location)
        .set("login_redirect_url", config.login_redirect_url)
}

fn item(strategy: IpStrategy, attach_list: Vec<Value>) -> Value {
    Value::Map(
        Outputs::new()
            .set("strategy_id", strategy.strategy_id)
            .set("strategy_name", strategy.strategy_name)
            .set("strategy_type", strategy.strategy_type)
            .set("ip_list", strategy.strategy_data)
            .set("service_id", strategy.service_id)
            .set("bind_api_total_count", strategy.bind_api_total_count)
            .set("modify_time", strategy.modified_time)
            .set("create_time", strategy.created_time)
            .set("attach_list", attach_list)
            .into_map(),
    )
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let service_id = attrs.required_str("service_id")?;
    let strategy_name = attrs.str_or("strategy_name", "");

    let strategies = retry("DescribeIPStrategysStatus", ctx.read_policy, move || {
        ctx.apigateway
            .describe_ip_strategies_status(service_id, strategy_name)
    })
    .await
    .map_err(fail(&resource.id))?;

    let mut ids = Vec::new();
    let mut items = Vec::new();
    for strategy in strategies {
        let strategy_id = strategy.strategy_id.clone().unwrap_or_default();
        let mut attach_list = Vec::new();
        for env in ENVIRONMENTS {
            let sid = strategy_id.as_str();
            let detail = retry("DescribeIPStrategy", ctx.read_policy, move || {
                ctx.apigateway.describe_ip_strategy(service_id, sid, env)
            })
            .await
            .map_err(fail(&resource.id))?;
            let apis = detail.and_then(|d| d.bind_apis).unwrap_or_default();
            attach_list.extend(apis.into_iter().map(api_value));
        }
        items.push(item(strategy, attach_list));
        ids.push(strategy_id);
    }

    finish(resource, "list", items, &ids).await
}
