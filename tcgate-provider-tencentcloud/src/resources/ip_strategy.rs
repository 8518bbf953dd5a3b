//! tencentcloud_api_gateway_ip_strategy
//!
//! Identifier: `serviceId#strategyId`.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::services::apigateway::IpStrategy;

pub const TYPE: &str = "tencentcloud_api_gateway_ip_strategy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpStrategyKey {
    pub service_id: String,
    pub strategy_id: String,
}

impl CompositeKey for IpStrategyKey {
    fn to_id(&self) -> String {
        join(&[&self.service_id, &self.strategy_id])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [service_id, strategy_id] = split::<2>(id)?;
        Ok(Self {
            service_id,
            strategy_id,
        })
    }
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("IP allow or deny list attached to apis of a service")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("strategy_name", types::non_empty_string())
                .required()
                .force_new()
                .with_description("User defined strategy name."),
        )
        .attribute(
            AttributeSchema::new("strategy_type", types::non_empty_string())
                .required()
                .force_new()
                .with_description("Blacklist or whitelist: `BLACK` or `WHITE`."),
        )
        .attribute(
            AttributeSchema::new("strategy_data", types::non_empty_string())
                .required()
                .with_description("IP address data, comma separated."),
        )
        .attribute(AttributeSchema::new("strategy_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("create_time", AttributeType::String).computed())
        .importable()
}

fn outputs(key: &IpStrategyKey, strategy: IpStrategy) -> Outputs {
    Outputs::new()
        .set("service_id", key.service_id.as_str())
        .set("strategy_name", strategy.strategy_name)
        .set("strategy_type", strategy.strategy_type)
        .set("strategy_data", strategy.strategy_data)
        .set("strategy_id", key.strategy_id.as_str())
        .set("create_time", strategy.created_time)
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let service_id = attrs.required_str("service_id")?;
    let strategy_name = attrs.required_str("strategy_name")?;
    let strategy_type = attrs.required_str("strategy_type")?;
    let strategy_data = attrs.required_str("strategy_data")?;

    let strategy_id = retry("CreateIPStrategy", ctx.write_policy, move || {
        ctx.apigateway
            .create_ip_strategy(service_id, strategy_name, strategy_type, strategy_data)
    })
    .await
    .map_err(fail(&resource.id))?;

    let key = IpStrategyKey {
        service_id: service_id.to_string(),
        strategy_id,
    };
    let strategy_id = key.strategy_id.as_str();
    poll_until(&format!("ip strategy {}", key.to_id()), ctx.read_policy, move || {
        ctx.apigateway.describe_ip_strategy_status(service_id, strategy_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, &key.to_id()).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = IpStrategyKey::parse_id(identifier) else {
        log::warn!("{id}: malformed ip strategy id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };

    let (service_id, strategy_id) = (key.service_id.as_str(), key.strategy_id.as_str());
    let strategy = retry("DescribeIPStrategysStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_ip_strategy_status(service_id, strategy_id)
    })
    .await
    .map_err(fail(id))?;

    Ok(match strategy {
        Some(strategy) => outputs(&key, strategy).into_state(id, identifier),
        None => State::not_found(id.clone()),
    })
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = Attributes::of(to);
    let Ok(key) = IpStrategyKey::parse_id(identifier) else {
        return Err(attrs.error("ip strategy is not create,can't update"));
    };

    let strategy_data = attrs.required_str("strategy_data")?;
    let current = Attributes::new(id, &from.attributes).str("strategy_data");
    if current != Some(strategy_data) {
        let (service_id, strategy_id) = (key.service_id.as_str(), key.strategy_id.as_str());
        retry("ModifyIPStrategy", ctx.write_policy, move || {
            ctx.apigateway
                .modify_ip_strategy(service_id, strategy_id, strategy_data)
        })
        .await
        .map_err(fail(id))?;
    }

    read(ctx, id, identifier).await
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = IpStrategyKey::parse_id(identifier) else {
        return Ok(());
    };

    let (service_id, strategy_id) = (key.service_id.as_str(), key.strategy_id.as_str());
    let result = retry("DeleteIPStrategy", ctx.write_policy, move || {
        ctx.apigateway.delete_ip_strategy(service_id, strategy_id)
    })
    .await;
    gone_is_ok("DeleteIPStrategy", result).map_err(fail(id))
}
