//! tencentcloud_api_gateway_throttling_service
//!
//! Service-level request quota per environment. Identifier: the service id.
//! Deleting resets every environment to [`DEFAULT_QUOTA`].

use tcgate_core::poll::{PollError, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail};
use crate::services::apigateway::ServiceEnvironmentStrategy;

pub const TYPE: &str = "tencentcloud_api_gateway_throttling_service";

/// Quota a fresh environment starts with
pub const DEFAULT_QUOTA: i64 = 5000;

pub(crate) fn environment_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("environment_name", AttributeType::String),
        AttributeSchema::new("url", AttributeType::String),
        AttributeSchema::new("status", AttributeType::Int),
        AttributeSchema::new("version_name", AttributeType::String),
        AttributeSchema::new("strategy", AttributeType::Int),
    ]
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Throttling of a whole service per environment")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("strategy", AttributeType::Int)
                .required()
                .with_description("Requests per second allowed in each listed environment."),
        )
        .attribute(AttributeSchema::new("environment_names", types::string_list()).required())
        .attribute(
            AttributeSchema::new("environments", types::block_list(environment_fields())).computed(),
        )
        .importable()
}

pub(crate) fn environment_value(env: ServiceEnvironmentStrategy) -> Value {
    Value::Map(
        Outputs::new()
            .set("environment_name", env.environment_name)
            .set("url", env.url)
            .set("status", env.status)
            .set("version_name", env.version_name)
            .set("strategy", env.strategy)
            .into_map(),
    )
}

async fn apply(ctx: &Context, id: &ResourceId, attrs: &Attributes<'_>) -> ProviderResult<()> {
    let service_id = attrs.required_str("service_id")?;
    let strategy = attrs.required_int("strategy")?;
    let names = attrs.string_list("environment_names");
    if names.is_empty() {
        return Err(attrs.error("`environment_names` is required"));
    }
    let names = names.as_slice();

    retry("ModifyServiceEnvironmentStrategy", ctx.write_policy, move || {
        ctx.apigateway
            .modify_service_environment_strategy(service_id, strategy, names)
    })
    .await
    .map_err(fail(id))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    apply(ctx, &resource.id, &attrs).await?;
    let state = read(ctx, &resource.id, attrs.required_str("service_id")?).await?;
    Ok(with_inputs(state, &attrs))
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let result = retry("DescribeServiceEnvironmentStrategy", ctx.read_policy, move || {
        ctx.apigateway
            .describe_service_environment_strategies(identifier)
    })
    .await;
    let environments = match result {
        Ok(environments) => environments,
        Err(PollError::Failed(e)) if e.is_not_found() => {
            return Ok(State::not_found(id.clone()));
        }
        Err(e) => return Err(fail(id)(e)),
    };

    let values: Vec<Value> = environments.into_iter().map(environment_value).collect();
    Ok(Outputs::new()
        .set("service_id", identifier)
        .set("environments", values)
        .into_state(id, identifier))
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    _from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = Attributes::of(to);
    apply(ctx, id, &attrs).await?;
    let state = read(ctx, id, identifier).await?;
    Ok(with_inputs(state, &attrs))
}

/// Inputs the describe call does not echo back
fn with_inputs(mut state: State, attrs: &Attributes<'_>) -> State {
    if state.exists {
        if let Some(strategy) = attrs.int("strategy") {
            state
                .attributes
                .insert("strategy".to_string(), Value::Int(strategy));
        }
        let names = attrs.string_list("environment_names");
        state.attributes.insert(
            "environment_names".to_string(),
            Value::List(names.into_iter().map(Value::String).collect()),
        );
    }
    state
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let environments = retry("DescribeServiceEnvironmentStrategy", ctx.read_policy, move || {
        ctx.apigateway
            .describe_service_environment_strategies(identifier)
    })
    .await
    .map_err(fail(id))?;

    let names: Vec<String> = environments
        .into_iter()
        .filter_map(|env| env.environment_name)
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    let names = names.as_slice();

    retry("ModifyServiceEnvironmentStrategy", ctx.write_policy, move || {
        ctx.apigateway
            .modify_service_environment_strategy(identifier, DEFAULT_QUOTA, names)
    })
    .await
    .map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    fn strategy_backend(envs: &'static [&'static str]) -> std::sync::Arc<MockTransport> {
        let strategy = Mutex::new(DEFAULT_QUOTA);
        MockTransport::new(move |action, payload| {
            let mut strategy = strategy.lock().unwrap();
            match action {
                "ModifyServiceEnvironmentStrategy" => {
                    *strategy = payload["Strategy"].as_i64().unwrap();
                    Ok(json!({"Result": true}))
                }
                "DescribeServiceEnvironmentStrategy" => {
                    let list: Vec<_> = envs
                        .iter()
                        .map(|env| {
                            json!({
                                "EnvironmentName": env,
                                "Url": format!("http://{env}.example.com"),
                                "Status": 1,
                                "VersionName": "20200922",
                                "Strategy": *strategy,
                            })
                        })
                        .collect();
                    Ok(json!({"Result": {"EnvironmentList": list}}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    fn desired(strategy: i64) -> Resource {
        resource(
            TYPE,
            &[
                ("service_id", s("service-1")),
                ("strategy", Value::Int(strategy)),
                ("environment_names", Value::List(vec![s("release")])),
            ],
        )
    }

    #[tokio::test]
    async fn create_sets_strategy() {
        let mock = strategy_backend(&["release"]);
        let ctx = context(&mock);

        let state = create(&ctx, &desired(400)).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("service-1"));
        let sent = &mock.payloads("ModifyServiceEnvironmentStrategy")[0];
        assert_eq!(sent["EnvironmentNames"], json!(["release"]));
        let envs = state.attributes["environments"].as_list().unwrap();
        assert_eq!(envs[0].as_map().unwrap()["strategy"], Value::Int(400));
        assert_eq!(state.attributes["strategy"], Value::Int(400));
    }

    #[tokio::test]
    async fn delete_resets_every_environment() {
        let mock = strategy_backend(&["test", "release"]);
        let ctx = context(&mock);
        let state = create(&ctx, &desired(400)).await.unwrap();

        delete(&ctx, &state.id, "service-1").await.unwrap();

        let reset = mock.payloads("ModifyServiceEnvironmentStrategy").pop().unwrap();
        assert_eq!(reset["Strategy"], json!(5000));
        assert_eq!(reset["EnvironmentNames"], json!(["test", "release"]));
    }

    #[tokio::test]
    async fn delete_without_environments_is_ok() {
        let mock = strategy_backend(&[]);
        let ctx = context(&mock);

        delete(&ctx, &ResourceId::new(TYPE, "test"), "service-1").await.unwrap();
        assert_eq!(mock.actions(), vec!["DescribeServiceEnvironmentStrategy".to_string()]);
    }

    #[tokio::test]
    async fn missing_result_counts_as_failure() {
        let mock = MockTransport::new(|_, _| Ok(json!({"RequestId": "r"})));
        let ctx = context(&mock);

        let err = create(&ctx, &desired(10)).await.unwrap_err();
        assert!(err.to_string().ends_with("ModifyServiceEnvironmentStrategy failed"));
    }
}
