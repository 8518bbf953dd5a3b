//! tencentcloud_api_gateway_throttling_api
//!
//! Per-api quota inside one environment. Identifier:
//! `serviceId#environmentName`.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::throttling_service::DEFAULT_QUOTA;
use super::{Attributes, Context, Outputs, fail};
use crate::services::apigateway::ApiEnvironmentStrategy;

pub const TYPE: &str = "tencentcloud_api_gateway_throttling_api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlingApiKey {
    pub service_id: String,
    pub environment_name: String,
}

impl CompositeKey for ThrottlingApiKey {
    fn to_id(&self) -> String {
        join(&[&self.service_id, &self.environment_name])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [service_id, environment_name] = split::<2>(id)?;
        Ok(Self {
            service_id,
            environment_name,
        })
    }
}

pub(crate) fn strategy_fields() -> Vec<AttributeSchema> {
    let quota = vec![
        AttributeSchema::new("environment_name", AttributeType::String),
        AttributeSchema::new("quota", AttributeType::Int),
    ];
    vec![
        AttributeSchema::new("api_id", AttributeType::String),
        AttributeSchema::new("api_name", AttributeType::String),
        AttributeSchema::new("path", AttributeType::String),
        AttributeSchema::new("method", AttributeType::String),
        AttributeSchema::new("strategy_list", types::block_list(quota)),
    ]
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Throttling of individual apis in one environment")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("strategy", AttributeType::Int).required())
        .attribute(
            AttributeSchema::new("environment_name", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("api_ids", types::string_list()).required())
        .attribute(
            AttributeSchema::new("api_environment_strategies", types::block_list(strategy_fields()))
                .computed(),
        )
        .importable()
}

pub(crate) fn strategy_value(api: ApiEnvironmentStrategy) -> Value {
    let quotas: Vec<Value> = api
        .environment_strategy_set
        .unwrap_or_default()
        .into_iter()
        .map(|q| {
            Value::Map(
                Outputs::new()
                    .set("environment_name", q.environment_name)
                    .set("quota", q.quota)
                    .into_map(),
            )
        })
        .collect();
    Value::Map(
        Outputs::new()
            .set("api_id", api.api_id)
            .set("api_name", api.api_name)
            .set("path", api.path)
            .set("method", api.method)
            .set("strategy_list", quotas)
            .into_map(),
    )
}

async fn apply(
    ctx: &Context,
    id: &ResourceId,
    key: &ThrottlingApiKey,
    attrs: &Attributes<'_>,
) -> ProviderResult<()> {
    let strategy = attrs.required_int("strategy")?;
    let api_ids = attrs.string_list("api_ids");
    let (api_ids, k) = (api_ids.as_slice(), key);

    retry("ModifyApiEnvironmentStrategy", ctx.write_policy, move || {
        ctx.apigateway.modify_api_environment_strategy(
            &k.service_id,
            strategy,
            &k.environment_name,
            api_ids,
        )
    })
    .await
    .map_err(fail(id))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let key = ThrottlingApiKey {
        service_id: attrs.required_str("service_id")?.to_string(),
        environment_name: attrs.required_str("environment_name")?.to_string(),
    };
    apply(ctx, &resource.id, &key, &attrs).await?;
    let state = read(ctx, &resource.id, &key.to_id()).await?;
    Ok(with_inputs(state, &attrs))
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = ThrottlingApiKey::parse_id(identifier) else {
        log::warn!("{id}: malformed throttling api id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };
    let k = &key;
    let environments = [key.environment_name.clone()];
    let environments = environments.as_slice();

    let apis = retry("DescribeApiEnvironmentStrategy", ctx.read_policy, move || {
        ctx.apigateway
            .describe_api_environment_strategies(&k.service_id, environments)
    })
    .await
    .map_err(fail(id))?;

    let values: Vec<Value> = apis.into_iter().map(strategy_value).collect();
    Ok(Outputs::new()
        .set("service_id", key.service_id.as_str())
        .set("environment_name", key.environment_name.as_str())
        .set("api_environment_strategies", values)
        .into_state(id, identifier))
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    _from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let key = ThrottlingApiKey::parse_id(identifier).map_err(fail(id))?;
    let attrs = Attributes::of(to);
    apply(ctx, id, &key, &attrs).await?;
    let state = read(ctx, id, identifier).await?;
    Ok(with_inputs(state, &attrs))
}

fn with_inputs(mut state: State, attrs: &Attributes<'_>) -> State {
    if let Some(strategy) = attrs.int("strategy") {
        state
            .attributes
            .insert("strategy".to_string(), Value::Int(strategy));
    }
    let api_ids = attrs.string_list("api_ids");
    state.attributes.insert(
        "api_ids".to_string(),
        Value::List(api_ids.into_iter().map(Value::String).collect()),
    );
    state
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = ThrottlingApiKey::parse_id(identifier) else {
        return Ok(());
    };
    let k = &key;
    let environments = [key.environment_name.clone()];
    let environments = environments.as_slice();

    let apis = retry("DescribeApiEnvironmentStrategy", ctx.read_policy, move || {
        ctx.apigateway
            .describe_api_environment_strategies(&k.service_id, environments)
    })
    .await
    .map_err(fail(id))?;

    let api_ids: Vec<String> = apis.into_iter().filter_map(|api| api.api_id).collect();
    if api_ids.is_empty() {
        return Ok(());
    }
    let api_ids = api_ids.as_slice();

    retry("ModifyApiEnvironmentStrategy", ctx.write_policy, move || {
        ctx.apigateway.modify_api_environment_strategy(
            &k.service_id,
            DEFAULT_QUOTA,
            &k.environment_name,
            api_ids,
        )
    })
    .await
    .map_err(fail(id))
}
