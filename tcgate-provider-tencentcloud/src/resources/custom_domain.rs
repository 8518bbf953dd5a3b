//! tencentcloud_api_gateway_custom_domain
//!
//! Identifier: `serviceId#subDomain`. Path mappings are written as
//! `path#environment`.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;
use crate::services::apigateway::{DomainSet, PathMapping, SubDomainSpec};

pub const TYPE: &str = "tencentcloud_api_gateway_custom_domain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomDomainKey {
    pub service_id: String,
    pub sub_domain: String,
}

impl CompositeKey for CustomDomainKey {
    fn to_id(&self) -> String {
        join(&[&self.service_id, &self.sub_domain])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [service_id, sub_domain] = split::<2>(id)?;
        Ok(Self {
            service_id,
            sub_domain,
        })
    }
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Custom domain bound to a service")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("sub_domain", types::non_empty_string())
                .required()
                .with_description("Custom domain name to be bound."),
        )
        .attribute(
            AttributeSchema::new("protocol", types::non_empty_string())
                .required()
                .with_description("Protocol supported by service: `http`, `https`, `http&https`."),
        )
        .attribute(
            AttributeSchema::new("net_type", types::non_empty_string())
                .required()
                .with_description("Network type: `OUTER` or `INNER`."),
        )
        .attribute(
            AttributeSchema::new("is_default_mapping", AttributeType::Bool)
                .with_default(Value::Bool(true)),
        )
        .attribute(AttributeSchema::new("default_domain", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("certificate_id", AttributeType::String).optional_computed())
        .attribute(
            AttributeSchema::new("path_mappings", types::string_list())
                .optional_computed()
                .with_description("Custom path mappings, e.g. `/good#release`."),
        )
        .attribute(AttributeSchema::new("status", AttributeType::Int).computed())
}

/// Parse `path#environment` entries
fn path_mappings(attrs: &Attributes<'_>) -> ProviderResult<Vec<PathMapping>> {
    attrs
        .string_list("path_mappings")
        .iter()
        .map(|entry| {
            let [path, environment] = split::<2>(entry)
                .map_err(|_| attrs.error(format!("path mapping `{entry}` must be `path#environment`")))?;
            Ok(PathMapping { path, environment })
        })
        .collect()
}

fn sub_domain_spec(attrs: &Attributes<'_>, service_id: &str) -> ProviderResult<SubDomainSpec> {
    Ok(SubDomainSpec {
        service_id: service_id.to_string(),
        sub_domain: attrs.required_str("sub_domain")?.to_string(),
        protocol: attrs.required_str("protocol")?.to_string(),
        net_type: attrs.required_str("net_type")?.to_string(),
        net_sub_domain: attrs.string("default_domain"),
        is_default_mapping: attrs.bool_or("is_default_mapping", true),
        certificate_id: attrs.string("certificate_id"),
        path_mapping_set: path_mappings(attrs)?,
    })
}

/// Let the configured codes through with a warning
fn tolerate(ctx: &Context, id: &ResourceId, result: Result<(), ApiError>) -> Result<(), ApiError> {
    match result {
        Err(e) => match ctx.tolerated.reason(&e) {
            Some(reason) => {
                log::warn!("{id}: sub domain recorded but not serving yet: {reason} ({e})");
                Ok(())
            }
            None => Err(e),
        },
        ok => ok,
    }
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let service_id = attrs.required_str("service_id")?;
    let spec = sub_domain_spec(&attrs, service_id)?;
    let spec = &spec;
    let id = &resource.id;

    retry("BindSubDomain", ctx.write_policy, move || async move {
        tolerate(ctx, id, ctx.apigateway.bind_sub_domain(spec).await)
    })
    .await
    .map_err(fail(id))?;

    let key = CustomDomainKey {
        service_id: service_id.to_string(),
        sub_domain: spec.sub_domain.clone(),
    };
    let state = read(ctx, id, &key.to_id()).await?;
    Ok(with_default_domain(state, &attrs))
}

/// The default domain is not reported back by the cloud
fn with_default_domain(mut state: State, attrs: &Attributes<'_>) -> State {
    if let (true, Some(domain)) = (state.exists, attrs.string("default_domain")) {
        state
            .attributes
            .insert("default_domain".to_string(), Value::String(domain));
    }
    state
}

fn mapping_strings(mappings: Option<Vec<PathMapping>>) -> Vec<String> {
    mappings
        .unwrap_or_default()
        .into_iter()
        .map(|m| join(&[&m.path, &m.environment]))
        .collect()
}

pub(crate) fn domain_outputs(domain: DomainSet) -> Outputs {
    Outputs::new()
        .set("status", domain.status)
        .set("certificate_id", domain.certificate_id)
        .set("is_default_mapping", domain.is_default_mapping)
        .set("protocol", domain.protocol)
        .set("net_type", domain.net_type)
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = CustomDomainKey::parse_id(identifier) else {
        log::warn!("{id}: malformed custom domain id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };
    let (service_id, sub_domain) = (key.service_id.as_str(), key.sub_domain.as_str());

    let domains = retry("DescribeServiceSubDomains", ctx.read_policy, move || {
        ctx.apigateway.describe_service_sub_domains(service_id)
    })
    .await
    .map_err(fail(id))?;
    let Some(domain) = domains
        .into_iter()
        .find(|d| d.domain_name.as_deref() == Some(sub_domain))
    else {
        log::debug!("{id}: custom domain {sub_domain} not found on service {service_id}");
        return Ok(State::not_found(id.clone()));
    };

    let mappings = retry("DescribeServiceSubDomainMappings", ctx.read_policy, move || {
        ctx.apigateway
            .describe_service_sub_domain_mappings(service_id, sub_domain)
    })
    .await
    .map_err(fail(id))?;
    let paths = mapping_strings(mappings.and_then(|m| m.path_mapping_set));

    Ok(domain_outputs(domain)
        .set("service_id", service_id)
        .set("sub_domain", sub_domain)
        .set("path_mappings", paths)
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
    let key = CustomDomainKey::parse_id(identifier).map_err(|e| attrs.error(e.to_string()))?;
    let spec = sub_domain_spec(&attrs, &key.service_id)?;
    let spec = &spec;

    retry("ModifySubDomain", ctx.write_policy, move || ctx.apigateway.modify_sub_domain(spec))
        .await
        .map_err(fail(id))?;

    let renamed = CustomDomainKey {
        sub_domain: spec.sub_domain.clone(),
        ..key
    };
    let state = read(ctx, id, &renamed.to_id()).await?;
    Ok(with_default_domain(state, &attrs))
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = CustomDomainKey::parse_id(identifier) else {
        return Ok(());
    };
    let (service_id, sub_domain) = (key.service_id.as_str(), key.sub_domain.as_str());

    let result = retry("UnBindSubDomain", ctx.write_policy, move || {
        ctx.apigateway.unbind_sub_domain(service_id, sub_domain)
    })
    .await;
    gone_is_ok("UnBindSubDomain", result).map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    fn domain_backend(bind_error: Option<&'static str>) -> std::sync::Arc<MockTransport> {
        let bound = Mutex::new(None::<serde_json::Value>);
        MockTransport::new(move |action, payload| {
            let mut bound = bound.lock().unwrap();
            match action {
                "BindSubDomain" => {
                    *bound = Some(payload.clone());
                    match bind_error {
                        Some(code) => Err(ApiError::api(code, "rejected")),
                        None => Ok(json!({"Result": true})),
                    }
                }
                "ModifySubDomain" => {
                    *bound = Some(payload.clone());
                    Ok(json!({"Result": true}))
                }
                "DescribeServiceSubDomains" => {
                    let set: Vec<_> = bound
                        .iter()
                        .map(|b| {
                            json!({
                                "DomainName": b["SubDomain"],
                                "Status": 1,
                                "Protocol": b["Protocol"],
                                "NetType": b["NetType"],
                                "IsDefaultMapping": b["IsDefaultMapping"],
                            })
                        })
                        .collect();
                    Ok(json!({"Result": {"DomainSet": set}}))
                }
                "DescribeServiceSubDomainMappings" => {
                    let set = bound
                        .as_ref()
                        .and_then(|b| b.get("PathMappingSet").cloned())
                        .unwrap_or(json!([]));
                    Ok(json!({"Result": {"IsDefaultMapping": false, "PathMappingSet": set}}))
                }
                "UnBindSubDomain" => {
                    *bound = None;
                    Ok(json!({"Result": true}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    fn desired(mappings: &[&str]) -> Resource {
        resource(
            TYPE,
            &[
                ("service_id", s("service-1")),
                ("sub_domain", s("tic-test.dnsv1.com")),
                ("protocol", s("http")),
                ("net_type", s("OUTER")),
                ("is_default_mapping", Value::Bool(mappings.is_empty())),
                ("default_domain", s("service-1.gz.apigw.tencentcs.com")),
                (
                    "path_mappings",
                    Value::List(mappings.iter().map(|m| s(m)).collect()),
                ),
            ],
        )
    }

    #[tokio::test]
    async fn bind_with_path_mappings() {
        let mock = domain_backend(None);
        let ctx = context(&mock);

        let state = create(&ctx, &desired(&["/good#test", "/root#release"])).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("service-1#tic-test.dnsv1.com"));
        let sent = &mock.payloads("BindSubDomain")[0];
        assert_eq!(sent["NetSubDomain"], json!("service-1.gz.apigw.tencentcs.com"));
        assert_eq!(
            sent["PathMappingSet"],
            json!([{"Path": "/good", "Environment": "test"}, {"Path": "/root", "Environment": "release"}])
        );
        assert_eq!(
            state.attributes["path_mappings"],
            Value::List(vec![s("/good#test"), s("/root#release")])
        );
        assert_eq!(state.attributes["status"], Value::Int(1));
    }

    #[tokio::test]
    async fn tolerated_bind_error_still_records_domain() {
        let mock = domain_backend(Some("FailedOperation.DomainNeedBeian"));
        let ctx = context(&mock);

        let state = create(&ctx, &desired(&[])).await.unwrap();
        assert!(state.exists);
    }

    #[tokio::test]
    async fn other_bind_errors_fail() {
        let mock = domain_backend(Some("FailedOperation.SubDomainFormatError"));
        let ctx = context(&mock);

        let err = create(&ctx, &desired(&[])).await.unwrap_err();
        assert!(err.to_string().contains("SubDomainFormatError"));
    }

    #[tokio::test]
    async fn malformed_mapping_is_rejected() {
        let mock = MockTransport::new(|_, _| panic!("no call expected"));
        let ctx = context(&mock);

        let err = create(&ctx, &desired(&["/no-environment"])).await.unwrap_err();
        assert!(err.to_string().contains("must be `path#environment`"));
    }

    #[tokio::test]
    async fn unknown_domain_reads_as_not_found() {
        let mock = domain_backend(None);
        let ctx = context(&mock);
        let id = ResourceId::new(TYPE, "test");

        assert!(!read(&ctx, &id, "service-1#other.com").await.unwrap().exists);
        assert!(!read(&ctx, &id, "service-1").await.unwrap().exists);
    }

    #[tokio::test]
    async fn update_then_unbind() {
        let mock = domain_backend(None);
        let ctx = context(&mock);
        let current = create(&ctx, &desired(&[])).await.unwrap();

        let state = update(
            &ctx,
            &current.id,
            "service-1#tic-test.dnsv1.com",
            &current,
            &desired(&["/v1#prepub"]),
        )
        .await
        .unwrap();
        assert_eq!(state.attributes["path_mappings"], Value::List(vec![s("/v1#prepub")]));
        assert_eq!(
            state.attributes["default_domain"],
            s("service-1.gz.apigw.tencentcs.com")
        );

        delete(&ctx, &current.id, "service-1#tic-test.dnsv1.com").await.unwrap();
        assert!(mock.actions().contains(&"UnBindSubDomain".to_string()));
    }

    #[tokio::test]
    async fn rename_modifies_in_place() {
        let mock = domain_backend(None);
        let ctx = context(&mock);
        let current = create(&ctx, &desired(&[])).await.unwrap();

        let mut renamed = desired(&[]);
        renamed
            .attributes
            .insert("sub_domain".to_string(), s("api.example.com"));
        let state = update(
            &ctx,
            &current.id,
            "service-1#tic-test.dnsv1.com",
            &current,
            &renamed,
        )
        .await
        .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("service-1#api.example.com"));
        assert_eq!(state.attributes["sub_domain"], s("api.example.com"));
        let sent = &mock.payloads("ModifySubDomain")[0];
        assert_eq!(sent["SubDomain"], json!("api.example.com"));
        let actions = mock.actions();
        assert!(!actions.contains(&"UnBindSubDomain".to_string()));
        assert_eq!(actions.iter().filter(|a| *a == "BindSubDomain").count(), 1);
    }
}
