//! tencentcloud_api_gateway_services

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::service::{computed_attributes, outputs, usage_plan_list};
use crate::resources::{Attributes, Context, fail};

pub const TYPE: &str = "tencentcloud_api_gateway_services";

pub fn schema() -> ResourceSchema {
    let mut item = vec![
        AttributeSchema::new("service_id", AttributeType::String),
        AttributeSchema::new("service_name", AttributeType::String),
        AttributeSchema::new("protocol", AttributeType::String),
        AttributeSchema::new("service_desc", AttributeType::String),
        AttributeSchema::new("exclusive_set_name", AttributeType::String),
        AttributeSchema::new("ip_version", AttributeType::String),
        AttributeSchema::new("net_type", types::string_list()),
    ];
    item.extend(computed_attributes());

    ResourceSchema::new(TYPE)
        .with_description("Services filtered by name or id")
        .attribute(AttributeSchema::new("service_name", AttributeType::String))
        .attribute(AttributeSchema::new("service_id", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let service_name = attrs.str_or("service_name", "");
    let service_id = attrs.str_or("service_id", "");

    let services = retry("DescribeServicesStatus", ctx.read_policy, move || {
        ctx.apigateway
            .describe_services_status(service_id, service_name)
    })
    .await
    .map_err(fail(&resource.id))?;

    let mut ids = Vec::new();
    let mut items = Vec::new();
    for summary in services {
        let Some(id) = summary.service_id else {
            continue;
        };
        let sid = id.as_str();
        let Some(service) = retry("DescribeService", ctx.read_policy, move || {
            ctx.apigateway.describe_service(sid)
        })
        .await
        .map_err(fail(&resource.id))?
        else {
            log::debug!("{}: service {id} vanished while listing", resource.id);
            continue;
        };
        let plans = retry("DescribeServiceUsagePlan", ctx.read_policy, move || {
            usage_plan_list(ctx, sid)
        })
        .await
        .map_err(fail(&resource.id))?;

        items.push(Value::Map(
            outputs(service)
                .set("service_id", sid)
                .set("usage_plan_list", plans)
                .into_map(),
        ));
        ids.push(id);
    }

    finish(resource, "list", items, &ids).await
}
