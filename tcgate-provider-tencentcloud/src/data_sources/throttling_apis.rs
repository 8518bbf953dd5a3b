//! tencentcloud_api_gateway_throttling_apis

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file, service_ids};
use crate::resources::throttling_api::{strategy_fields, strategy_value};
use crate::resources::{Attributes, Context, Outputs, fail};

pub const TYPE: &str = "tencentcloud_api_gateway_throttling_apis";

pub fn schema() -> ResourceSchema {
    let item = vec![
        AttributeSchema::new("service_id", AttributeType::String),
        AttributeSchema::new("api_environment_strategies", types::block_list(strategy_fields())),
    ];

    ResourceSchema::new(TYPE)
        .with_description("Api throttling per environment; every service when no id is given")
        .attribute(AttributeSchema::new("service_id", AttributeType::String))
        .attribute(AttributeSchema::new("environment_names", types::string_list()))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let environments = attrs.string_list("environment_names");
    let environments = environments.as_slice();
    let ids = service_ids(ctx, resource, attrs.str("service_id")).await?;

    let mut items = Vec::new();
    for service_id in &ids {
        let sid = service_id.as_str();
        let apis = retry("DescribeApiEnvironmentStrategy", ctx.read_policy, move || {
            ctx.apigateway
                .describe_api_environment_strategies(sid, environments)
        })
        .await
        .map_err(fail(&resource.id))?;
        let apis: Vec<Value> = apis.into_iter().map(strategy_value).collect();
        items.push(Value::Map(
            Outputs::new()
                .set("service_id", sid)
                .set("api_environment_strategies", apis)
                .into_map(),
        ));
    }

    finish(resource, "list", items, &ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;

    #[tokio::test]
    async fn given_service_skips_listing() {
        let mock = MockTransport::new(|action, _| match action {
            "DescribeApiEnvironmentStrategy" => Ok(json!({"Result": {"ApiEnvironmentStrategySet": [{
                "ApiId": "api-1",
                "EnvironmentStrategySet": [{"EnvironmentName": "test", "Quota": 10}]
            }]}})),
            other => panic!("unexpected action {other}"),
        });
        let ctx = context(&mock);

        let state = read(
            &ctx,
            &resource(
                TYPE,
                &[
                    ("service_id", s("service-1")),
                    ("environment_names", Value::List(vec![s("test")])),
                ],
            ),
        )
        .await
        .unwrap();

        assert_eq!(mock.actions(), vec!["DescribeApiEnvironmentStrategy".to_string()]);
        let sent = &mock.payloads("DescribeApiEnvironmentStrategy")[0];
        assert_eq!(sent["EnvironmentNames"], json!(["test"]));
        let list = state.attributes["list"].as_list().unwrap();
        let apis = list[0].as_map().unwrap()["api_environment_strategies"]
            .as_list()
            .unwrap();
        assert_eq!(apis[0].as_map().unwrap()["api_id"], s("api-1"));
    }
}
