//! tencentcloud_api_gateway_usage_plans

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::usage_plan::{attach_list, environment_fields, outputs};
use crate::resources::{Attributes, Context, fail};

pub const TYPE: &str = "tencentcloud_api_gateway_usage_plans";

pub fn schema() -> ResourceSchema {
    let item = vec![
        AttributeSchema::new("usage_plan_id", AttributeType::String),
        AttributeSchema::new("usage_plan_name", AttributeType::String),
        AttributeSchema::new("usage_plan_desc", AttributeType::String),
        AttributeSchema::new("max_request_num", AttributeType::Int),
        AttributeSchema::new("max_request_num_pre_sec", AttributeType::Int),
        AttributeSchema::new("modify_time", AttributeType::String),
        AttributeSchema::new("create_time", AttributeType::String),
        AttributeSchema::new("attach_list", types::block_list(environment_fields())),
    ];

    ResourceSchema::new(TYPE)
        .with_description("Usage plans filtered by name or id")
        .attribute(AttributeSchema::new("usage_plan_id", AttributeType::String))
        .attribute(AttributeSchema::new("usage_plan_name", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let plan_id = attrs.str_or("usage_plan_id", "");
    let plan_name = attrs.str_or("usage_plan_name", "");

    let plans = retry("DescribeUsagePlansStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_usage_plans_status(plan_id, plan_name)
    })
    .await
    .map_err(fail(&resource.id))?;

    let mut ids = Vec::new();
    let mut items = Vec::new();
    for plan in plans {
        let Some(id) = plan.usage_plan_id.clone() else {
            continue;
        };
        let pid = id.as_str();
        let attached = retry("DescribeUsagePlanEnvironments", ctx.read_policy, move || {
            attach_list(ctx, pid)
        })
        .await
        .map_err(fail(&resource.id))?;

        let mut fields = outputs(plan)
            .set("usage_plan_id", pid)
            .set("attach_list", attached)
            .into_map();
        fields.remove("attach_api_keys");
        items.push(Value::Map(fields));
        ids.push(id);
    }

    finish(resource, "list", items, &ids).await
}
