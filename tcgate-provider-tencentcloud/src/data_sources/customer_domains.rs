//! tencentcloud_api_gateway_customer_domains

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::custom_domain::domain_outputs;
use crate::resources::{Attributes, Context, Outputs, fail};

pub const TYPE: &str = "tencentcloud_api_gateway_customer_domains";

pub fn schema() -> ResourceSchema {
    let mapping = vec![
        AttributeSchema::new("path", AttributeType::String),
        AttributeSchema::new("environment", AttributeType::String),
    ];
    let item = vec![
        AttributeSchema::new("domain_name", AttributeType::String),
        AttributeSchema::new("status", AttributeType::Bool),
        AttributeSchema::new("certificate_id", AttributeType::String),
        AttributeSchema::new("is_default_mapping", AttributeType::Bool),
        AttributeSchema::new("protocol", AttributeType::String),
        AttributeSchema::new("net_type", AttributeType::String),
        AttributeSchema::new("path_mappings", types::block_list(mapping)),
    ];

    ResourceSchema::new(TYPE)
        .with_description("Custom domains bound to a service")
        .attribute(AttributeSchema::new("service_id", types::non_empty_string()).required())
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let service_id = attrs.required_str("service_id")?;

    let domains = retry("DescribeServiceSubDomains", ctx.read_policy, move || {
        ctx.apigateway.describe_service_sub_domains(service_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    let mut items = Vec::new();
    for domain in domains {
        let name = domain.domain_name.clone().unwrap_or_default();
        let custom_paths = domain.is_default_mapping == Some(false) && !name.is_empty();

        let mut mappings = Vec::new();
        if custom_paths {
            let sub_domain = name.as_str();
            let found = retry("DescribeServiceSubDomainMappings", ctx.read_policy, move || {
                ctx.apigateway
                    .describe_service_sub_domain_mappings(service_id, sub_domain)
            })
            .await
            .map_err(fail(&resource.id))?;
            mappings = found
                .and_then(|m| m.path_mapping_set)
                .unwrap_or_default()
                .into_iter()
                .map(|m| {
                    Value::Map(
                        Outputs::new()
                            .set("path", m.path)
                            .set("environment", m.environment)
                            .into_map(),
                    )
                })
                .collect();
        }

        let online = domain.status == Some(1);
        items.push(Value::Map(
            domain_outputs(domain)
                .set("domain_name", name)
                .set("status", online)
                .set("path_mappings", mappings)
                .into_map(),
        ));
    }

    finish(resource, "list", items, &[service_id.to_string()]).await
}
