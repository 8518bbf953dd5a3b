//! tencentcloud_api_gateway_strategy_attachment
//!
//! Binds an IP strategy to one api in one environment. Identifier:
//! `serviceId#strategyId#bindApiId#environmentName`.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State};
use tcgate_core::schema::{AttributeSchema, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;
use crate::services::apigateway::ENVIRONMENTS;

pub const TYPE: &str = "tencentcloud_api_gateway_strategy_attachment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttachmentKey {
    pub service_id: String,
    pub strategy_id: String,
    pub bind_api_id: String,
    pub environment_name: String,
}

impl CompositeKey for StrategyAttachmentKey {
    fn to_id(&self) -> String {
        join(&[
            &self.service_id,
            &self.strategy_id,
            &self.bind_api_id,
            &self.environment_name,
        ])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [service_id, strategy_id, bind_api_id, environment_name] = split::<4>(id)?;
        Ok(Self {
            service_id,
            strategy_id,
            bind_api_id,
            environment_name,
        })
    }
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Binding of an IP strategy to an api")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("strategy_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("environment_name", types::string_enum(&ENVIRONMENTS))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("bind_api_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .importable()
}

/// Whether the api shows up among the strategy's bindings
async fn is_bound(ctx: &Context, key: &StrategyAttachmentKey) -> Result<Option<bool>, ApiError> {
    let strategy = ctx
        .apigateway
        .describe_ip_strategy(&key.service_id, &key.strategy_id, &key.environment_name)
        .await?;
    Ok(strategy.map(|s| {
        s.bind_apis
            .unwrap_or_default()
            .iter()
            .any(|api| api.api_id.as_deref() == Some(key.bind_api_id.as_str()))
    }))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let key = StrategyAttachmentKey {
        service_id: attrs.required_str("service_id")?.to_string(),
        strategy_id: attrs.required_str("strategy_id")?.to_string(),
        bind_api_id: attrs.required_str("bind_api_id")?.to_string(),
        environment_name: attrs.required_str("environment_name")?.to_string(),
    };

    let k = &key;
    retry("BindIPStrategy", ctx.write_policy, move || {
        ctx.apigateway.bind_ip_strategy(
            &k.service_id,
            &k.strategy_id,
            &k.environment_name,
            &k.bind_api_id,
        )
    })
    .await
    .map_err(fail(&resource.id))?;

    let what = format!("strategy attachment {}", key.to_id());
    poll_until(&what, ctx.read_policy, move || async move {
        Ok::<_, ApiError>(is_bound(ctx, k).await?.filter(|bound| *bound))
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, &key.to_id()).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = StrategyAttachmentKey::parse_id(identifier) else {
        log::warn!("{id}: malformed strategy attachment id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };

    let k = &key;
    let bound = retry("DescribeIPStrategy", ctx.read_policy, move || is_bound(ctx, k))
        .await
        .map_err(fail(id))?;
    if bound != Some(true) {
        return Ok(State::not_found(id.clone()));
    }

    Ok(Outputs::new()
        .set("service_id", key.service_id.as_str())
        .set("strategy_id", key.strategy_id.as_str())
        .set("bind_api_id", key.bind_api_id.as_str())
        .set("environment_name", key.environment_name.as_str())
        .into_state(id, identifier))
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = StrategyAttachmentKey::parse_id(identifier) else {
        return Ok(());
    };

    let k = &key;
    let result = retry("UnBindIPStrategy", ctx.write_policy, move || {
        ctx.apigateway.unbind_ip_strategy(
            &k.service_id,
            &k.strategy_id,
            &k.environment_name,
            &k.bind_api_id,
        )
    })
    .await;
    gone_is_ok("UnBindIPStrategy", result).map_err(fail(id))
}
