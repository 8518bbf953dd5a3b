//! tencentcloud_api_gateway_api
//!
//! One frontend path of a service and the backend it forwards to. Identifier:
//! `serviceId#apiId`.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::services::apigateway::{
    ApiInfo, ApiRequestConfig, ApiSpec, RequestParameter, ResponseErrorCode, ServiceConfig,
};

pub const TYPE: &str = "tencentcloud_api_gateway_api";

pub const AUTH_TYPES: [&str; 2] = ["SECRET", "NONE"];
pub const PROTOCOLS: [&str; 2] = ["HTTP", "WEBSOCKET"];
pub const METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "HEAD", "ANY"];
pub const RESPONSE_TYPES: [&str; 6] = ["HTML", "JSON", "TEXT", "BINARY", "XML", ""];

pub const SERVICE_TYPE_WEBSOCKET: &str = "WEBSOCKET";
pub const SERVICE_TYPE_HTTP: &str = "HTTP";
pub const SERVICE_TYPE_SCF: &str = "SCF";
pub const SERVICE_TYPE_MOCK: &str = "MOCK";
pub const SERVICE_TYPES: [&str; 4] = [
    SERVICE_TYPE_WEBSOCKET,
    SERVICE_TYPE_HTTP,
    SERVICE_TYPE_SCF,
    SERVICE_TYPE_MOCK,
];

const DEFAULT_SERVICE_TIMEOUT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiIdentifier {
    pub service_id: String,
    pub api_id: String,
}

impl CompositeKey for ApiIdentifier {
    fn to_id(&self) -> String {
        join(&[&self.service_id, &self.api_id])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [service_id, api_id] = split::<2>(id)?;
        Ok(Self { service_id, api_id })
    }
}

pub fn schema() -> ResourceSchema {
    let request_parameter = vec![
        AttributeSchema::new("name", types::non_empty_string()).required(),
        AttributeSchema::new("position", types::non_empty_string()).required(),
        AttributeSchema::new("type", types::non_empty_string()).required(),
        AttributeSchema::new("desc", AttributeType::String),
        AttributeSchema::new("default_value", AttributeType::String),
        AttributeSchema::new("required", AttributeType::Bool).with_default(Value::Bool(false)),
    ];
    let error_code = vec![
        AttributeSchema::new("code", AttributeType::Int).required(),
        AttributeSchema::new("msg", types::non_empty_string()).required(),
        AttributeSchema::new("desc", AttributeType::String),
        AttributeSchema::new("converted_code", AttributeType::Int),
        AttributeSchema::new("need_convert", AttributeType::Bool).with_default(Value::Bool(false)),
    ];

    let schema = ResourceSchema::new(TYPE)
        .with_description("API of an API gateway service")
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("api_name", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("api_desc", AttributeType::String))
        .attribute(
            AttributeSchema::new("auth_type", types::string_enum(&AUTH_TYPES))
                .with_default(Value::String("NONE".to_string()))
                .with_description("`SECRET` (key pair authentication) or `NONE`."),
        )
        .attribute(
            AttributeSchema::new("protocol", types::string_enum(&PROTOCOLS))
                .with_default(Value::String("HTTP".to_string()))
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("enable_cors", AttributeType::Bool).with_default(Value::Bool(true)),
        )
        .attribute(AttributeSchema::new("request_config_path", types::non_empty_string()).required())
        .attribute(
            AttributeSchema::new("request_config_method", types::string_enum(&METHODS))
                .with_default(Value::String("GET".to_string())),
        )
        .attribute(AttributeSchema::new(
            "request_parameters",
            types::block_list(request_parameter),
        ))
        .attribute(
            AttributeSchema::new("service_config_type", types::string_enum(&SERVICE_TYPES))
                .with_default(Value::String(SERVICE_TYPE_HTTP.to_string())),
        )
        .attribute(
            AttributeSchema::new("service_config_timeout", AttributeType::Int)
                .with_default(Value::Int(DEFAULT_SERVICE_TIMEOUT))
                .with_description("Backend timeout in seconds."),
        );

    [
        "service_config_product",
        "service_config_vpc_id",
        "service_config_url",
        "service_config_path",
        "service_config_method",
        "service_config_scf_function_name",
        "service_config_scf_function_namespace",
        "service_config_scf_function_qualifier",
        "service_config_mock_return_message",
    ]
    .into_iter()
    .map(|name| AttributeSchema::new(name, AttributeType::String))
    .fold(schema, ResourceSchema::attribute)
    .attribute(AttributeSchema::new(
        "response_type",
        types::string_enum(&RESPONSE_TYPES),
    ))
    .attribute(AttributeSchema::new("response_success_example", AttributeType::String))
    .attribute(AttributeSchema::new("response_fail_example", AttributeType::String))
    .attribute(AttributeSchema::new(
        "response_error_codes",
        types::block_list(error_code),
    ))
    .attribute(AttributeSchema::new("modify_time", AttributeType::String).computed())
    .attribute(AttributeSchema::new("create_time", AttributeType::String).computed())
}

fn request_parameters(attrs: &Attributes<'_>) -> ProviderResult<Vec<RequestParameter>> {
    attrs
        .blocks("request_parameters")
        .iter()
        .map(|param| {
            Ok(RequestParameter {
                name: Some(param.required_str("name")?.to_string()),
                position: Some(param.required_str("position")?.to_string()),
                param_type: Some(param.required_str("type")?.to_string()),
                desc: param.string("desc"),
                default_value: param.string("default_value"),
                required: Some(param.bool_or("required", false)),
            })
        })
        .collect()
}

fn response_error_codes(attrs: &Attributes<'_>) -> ProviderResult<Vec<ResponseErrorCode>> {
    attrs
        .blocks("response_error_codes")
        .iter()
        .map(|code| {
            let need_convert = code.bool_or("need_convert", false);
            let converted_code = code.int("converted_code");
            if need_convert && converted_code.is_none() {
                return Err(code.error("`need_convert` needs `converted_code` set"));
            }
            Ok(ResponseErrorCode {
                code: Some(code.required_int("code")?),
                msg: Some(code.required_str("msg")?.to_string()),
                desc: code.string("desc"),
                converted_code,
                need_convert: Some(need_convert),
            })
        })
        .collect()
}

/// Backend fields of the request, checked against the backend type
fn apply_backend(attrs: &Attributes<'_>, spec: &mut ApiSpec) -> ProviderResult<()> {
    match spec.service_type.as_str() {
        SERVICE_TYPE_HTTP | SERVICE_TYPE_WEBSOCKET => {
            let product = attrs.string("service_config_product");
            let vpc_id = attrs.string("service_config_vpc_id");
            if let Some(product) = &product {
                if product != "clb" {
                    return Err(attrs.error("`service_config_product` only support `clb` now"));
                }
                if vpc_id.is_none() {
                    return Err(
                        attrs.error("`service_config_product` need param `service_config_vpc_id`")
                    );
                }
            }
            let (Some(url), Some(path), Some(method)) = (
                attrs.string("service_config_url"),
                attrs.string("service_config_path"),
                attrs.string("service_config_method"),
            ) else {
                return Err(attrs.error(
                    "`service_config_url`,`service_config_path`,`service_config_method` is needed if `service_config_type` is `WEBSOCKET` or `HTTP`",
                ));
            };
            spec.service_config = Some(ServiceConfig {
                product,
                uniq_vpc_id: vpc_id,
                url: Some(url),
                path: Some(path),
                method: Some(method),
            });
        }
        SERVICE_TYPE_MOCK => {
            let Some(message) = attrs.string("service_config_mock_return_message") else {
                return Err(attrs.error(
                    "`service_config_mock_return_message` is needed if `service_config_type` is `MOCK`",
                ));
            };
            spec.service_mock_return_message = Some(message);
        }
        SERVICE_TYPE_SCF => {
            let (Some(name), Some(namespace), Some(qualifier)) = (
                attrs.string("service_config_scf_function_name"),
                attrs.string("service_config_scf_function_namespace"),
                attrs.string("service_config_scf_function_qualifier"),
            ) else {
                return Err(attrs.error(
                    "`service_config_scf_function_name`,`service_config_scf_function_namespace`,`service_config_scf_function_qualifier` is needed if `service_config_type` is `SCF`",
                ));
            };
            spec.service_scf_function_name = Some(name);
            spec.service_scf_function_namespace = Some(namespace);
            spec.service_scf_function_qualifier = Some(qualifier);
        }
        other => return Err(attrs.error(format!("unsupported `service_config_type` {other}"))),
    }
    Ok(())
}

/// Build the CreateApi/ModifyApi body, failing fast on invalid combinations
pub(crate) fn build_spec(attrs: &Attributes<'_>) -> ProviderResult<ApiSpec> {
    let mut spec = ApiSpec {
        service_id: attrs.required_str("service_id")?.to_string(),
        api_name: attrs.required_str("api_name")?.to_string(),
        api_desc: attrs.string("api_desc"),
        auth_type: attrs.str_or("auth_type", "NONE").to_string(),
        protocol: attrs.str_or("protocol", "HTTP").to_string(),
        enable_cors: attrs.bool_or("enable_cors", true),
        request_config: ApiRequestConfig {
            path: Some(attrs.required_str("request_config_path")?.to_string()),
            method: Some(attrs.str_or("request_config_method", "GET").to_string()),
        },
        request_parameters: request_parameters(attrs)?,
        service_type: attrs.str_or("service_config_type", SERVICE_TYPE_HTTP).to_string(),
        service_timeout: attrs.int_or("service_config_timeout", DEFAULT_SERVICE_TIMEOUT),
        response_type: attrs.str_or("response_type", "").to_string(),
        response_success_example: attrs.string("response_success_example"),
        response_fail_example: attrs.string("response_fail_example"),
        response_error_codes: response_error_codes(attrs)?,
        ..Default::default()
    };
    apply_backend(attrs, &mut spec)?;
    Ok(spec)
}

fn parameter_value(param: RequestParameter) -> Value {
    Value::Map(
        Outputs::new()
            .set("name", param.name)
            .set("position", param.position)
            .set("type", param.param_type)
            .set("desc", param.desc)
            .set("default_value", param.default_value)
            .set("required", param.required)
            .into_map(),
    )
}

fn error_code_value(code: ResponseErrorCode) -> Value {
    Value::Map(
        Outputs::new()
            .set("code", code.code)
            .set("msg", code.msg)
            .set("desc", code.desc)
            .set("converted_code", code.converted_code)
            .set("need_convert", code.need_convert)
            .into_map(),
    )
}

fn outputs(info: ApiInfo) -> Outputs {
    let request_config = info.request_config.unwrap_or_default();
    let service_config = info.service_config.unwrap_or_default();
    let parameters: Option<Vec<Value>> = info
        .request_parameters
        .map(|params| params.into_iter().map(parameter_value).collect());
    let error_codes: Option<Vec<Value>> = info
        .response_error_codes
        .map(|codes| codes.into_iter().map(error_code_value).collect());

    Outputs::new()
        .set("service_id", info.service_id)
        .set("api_name", info.api_name)
        .set("api_desc", info.api_desc)
        .set("auth_type", info.auth_type)
        .set("protocol", info.protocol)
        .set("enable_cors", info.enable_cors)
        .set("request_config_path", request_config.path)
        .set("request_config_method", request_config.method)
        .set("request_parameters", parameters)
        .set("service_config_type", info.service_type)
        .set("service_config_timeout", info.service_timeout)
        .set("service_config_product", service_config.product)
        .set("service_config_vpc_id", service_config.uniq_vpc_id)
        .set("service_config_url", service_config.url)
        .set("service_config_path", service_config.path)
        .set("service_config_method", service_config.method)
        .set("service_config_scf_function_name", info.service_scf_function_name)
        .set("service_config_scf_function_namespace", info.service_scf_function_namespace)
        .set("service_config_scf_function_qualifier", info.service_scf_function_qualifier)
        .set("service_config_mock_return_message", info.service_mock_return_message)
        .set("response_type", info.response_type)
        .set("response_success_example", info.response_success_example)
        .set("response_fail_example", info.response_fail_example)
        .set("response_error_codes", error_codes)
        .set("modify_time", info.modified_time)
        .set("create_time", info.created_time)
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let spec = build_spec(&attrs)?;
    let spec = &spec;
    let service_id = spec.service_id.as_str();

    let service = retry("DescribeService", ctx.read_policy, move || {
        ctx.apigateway.describe_service(service_id)
    })
    .await
    .map_err(fail(&resource.id))?;
    if service.is_none() {
        return Err(attrs.error(format!("service {service_id} not exist on server")));
    }

    let api_id = retry("CreateApi", ctx.write_policy, move || ctx.apigateway.create_api(spec))
        .await
        .map_err(fail(&resource.id))?;

    let key = ApiIdentifier {
        service_id: service_id.to_string(),
        api_id,
    };
    read(ctx, &resource.id, &key.to_id()).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = ApiIdentifier::parse_id(identifier) else {
        log::warn!("{id}: malformed api id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };
    let (service_id, api_id) = (key.service_id.as_str(), key.api_id.as_str());

    let info = retry("DescribeApi", ctx.read_policy, move || {
        ctx.apigateway.describe_api(service_id, api_id)
    })
    .await
    .map_err(fail(id))?;

    Ok(match info {
        Some(info) => outputs(info)
            .set("service_id", service_id)
            .into_state(id, identifier),
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
    let key = ApiIdentifier::parse_id(identifier).map_err(|e| attrs.error(e.to_string()))?;

    let had_codes = from
        .attributes
        .get("response_error_codes")
        .and_then(Value::as_list)
        .is_some_and(|codes| !codes.is_empty());
    let spec = build_spec(&attrs)?;
    if had_codes && spec.response_error_codes.is_empty() {
        return Err(attrs.error("`response_error_codes` must keep at least one after set"));
    }
    let spec = &spec;
    let api_id = key.api_id.as_str();

    retry("ModifyApi", ctx.write_policy, move || ctx.apigateway.modify_api(api_id, spec))
        .await
        .map_err(fail(id))?;

    read(ctx, id, identifier).await
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = ApiIdentifier::parse_id(identifier) else {
        return Ok(());
    };
    let (service_id, api_id) = (key.service_id.as_str(), key.api_id.as_str());

    let result = retry("DeleteApi", ctx.write_policy, move || {
        ctx.apigateway.delete_api(service_id, api_id)
    })
    .await;
    gone_is_ok("DeleteApi", result).map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, not_found, resource, s};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn api_backend() -> std::sync::Arc<MockTransport> {
        let api = Mutex::new(None::<serde_json::Value>);
        MockTransport::new(move |action, payload| {
            let mut api = api.lock().unwrap();
            match action {
                "DescribeService" => Ok(json!({"ServiceId": "service-1"})),
                "CreateApi" | "ModifyApi" => {
                    let mut stored = payload.clone();
                    stored["ApiId"] = json!("api-1");
                    stored["CreatedTime"] = json!("2020-09-22T00:00:00Z");
                    *api = Some(stored);
                    Ok(json!({"Result": {"ApiId": "api-1"}}))
                }
                "DescribeApi" => match api.as_ref() {
                    Some(stored) => Ok(json!({"Result": stored})),
                    None => Err(not_found("ResourceNotFound.InvalidApi")),
                },
                "DeleteApi" => {
                    *api = None;
                    Ok(json!({"Result": true}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    fn block(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn http_api(extra: &[(&str, Value)]) -> Resource {
        let mut attrs = vec![
            ("service_id", s("service-1")),
            ("api_name", s("hello")),
            ("request_config_path", s("/user/info")),
            ("service_config_url", s("http://www.qq.com")),
            ("service_config_path", s("/user")),
            ("service_config_method", s("GET")),
        ];
        attrs.extend(extra.iter().cloned());
        resource(TYPE, &attrs)
    }

    fn error_codes() -> Value {
        Value::List(vec![block(&[
            ("code", Value::Int(100)),
            ("msg", s("system error msg")),
            ("converted_code", Value::Int(-100)),
            ("need_convert", Value::Bool(true)),
        ])])
    }

    #[tokio::test]
    async fn create_http_api() {
        let mock = api_backend();
        let ctx = context(&mock);
        let params = Value::List(vec![block(&[
            ("name", s("name")),
            ("position", s("QUERY")),
            ("type", s("string")),
        ])]);

        let state = create(
            &ctx,
            &http_api(&[("request_parameters", params), ("response_error_codes", error_codes())]),
        )
        .await
        .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("service-1#api-1"));
        let sent = &mock.payloads("CreateApi")[0];
        assert_eq!(sent["EnableCORS"], json!(true));
        assert_eq!(sent["ServiceType"], json!("HTTP"));
        assert_eq!(sent["ServiceTimeout"], json!(5));
        assert_eq!(sent["RequestConfig"], json!({"Path": "/user/info", "Method": "GET"}));
        assert_eq!(sent["RequestParameters"][0]["Required"], json!(false));
        assert_eq!(sent["ServiceConfig"]["Url"], json!("http://www.qq.com"));
        assert!(sent["ServiceConfig"].get("Product").is_none());
        assert_eq!(state.attributes["service_config_url"], s("http://www.qq.com"));
        assert_eq!(state.attributes["response_error_codes"].as_list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn validation_fails_without_calls() {
        let mock = MockTransport::new(|_, _| panic!("no call expected"));
        let ctx = context(&mock);

        let cases: Vec<(Resource, &str)> = vec![
            (
                http_api(&[("service_config_product", s("elb"))]),
                "`service_config_product` only support `clb` now",
            ),
            (
                http_api(&[("service_config_product", s("clb"))]),
                "`service_config_product` need param `service_config_vpc_id`",
            ),
            (
                resource(
                    TYPE,
                    &[
                        ("service_id", s("service-1")),
                        ("api_name", s("hello")),
                        ("request_config_path", s("/")),
                        ("service_config_type", s("MOCK")),
                    ],
                ),
                "is needed if `service_config_type` is `MOCK`",
            ),
            (
                resource(
                    TYPE,
                    &[
                        ("service_id", s("service-1")),
                        ("api_name", s("hello")),
                        ("request_config_path", s("/")),
                        ("service_config_type", s("SCF")),
                        ("service_config_scf_function_name", s("fn")),
                    ],
                ),
                "is needed if `service_config_type` is `SCF`",
            ),
            (
                http_api(&[(
                    "response_error_codes",
                    Value::List(vec![block(&[
                        ("code", Value::Int(1)),
                        ("msg", s("m")),
                        ("need_convert", Value::Bool(true)),
                    ])]),
                )]),
                "`need_convert` needs `converted_code` set",
            ),
        ];

        for (desired, message) in cases {
            let err = create(&ctx, &desired).await.unwrap_err();
            assert!(err.to_string().ends_with(message), "{err}");
        }
    }

    #[tokio::test]
    async fn missing_service_fails_create() {
        let mock = MockTransport::new(|_, _| Err(not_found("ResourceNotFound.InvalidService")));
        let ctx = context(&mock);

        let err = create(&ctx, &http_api(&[])).await.unwrap_err();
        assert!(err.to_string().ends_with("service service-1 not exist on server"));
    }

    #[tokio::test]
    async fn error_codes_cannot_be_emptied() {
        let mock = api_backend();
        let ctx = context(&mock);
        let current = create(&ctx, &http_api(&[("response_error_codes", error_codes())]))
            .await
            .unwrap();

        let err = update(&ctx, &current.id, "service-1#api-1", &current, &http_api(&[]))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .ends_with("`response_error_codes` must keep at least one after set"));
        assert!(mock.payloads("ModifyApi").is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let mock = api_backend();
        let ctx = context(&mock);
        let current = create(&ctx, &http_api(&[])).await.unwrap();

        let state = update(
            &ctx,
            &current.id,
            "service-1#api-1",
            &current,
            &http_api(&[("api_desc", s("changed"))]),
        )
        .await
        .unwrap();
        assert_eq!(state.attributes["api_desc"], s("changed"));
        assert_eq!(mock.payloads("ModifyApi")[0]["ApiId"], json!("api-1"));

        delete(&ctx, &current.id, "service-1#api-1").await.unwrap();
        assert!(!read(&ctx, &current.id, "service-1#api-1").await.unwrap().exists);
    }
}
