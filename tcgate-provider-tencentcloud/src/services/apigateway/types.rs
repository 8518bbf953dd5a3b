//! API Gateway request and response payloads
//!
//! Response fields are optional because the API returns `null` for anything
//! that was never set.

use serde::{Deserialize, Serialize};

// ============ API keys ============

/// Item of `DescribeApiKeysStatus` and `DescribeUsagePlanSecretIds`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiKey {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub secret_name: Option<String>,
    /// 1 enabled, 0 disabled
    pub status: Option<i64>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

// ============ Usage plans ============

/// Body shared by `CreateUsagePlan` and `ModifyUsagePlan`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsagePlanSpec {
    pub usage_plan_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_plan_desc: Option<String>,
    pub max_request_num: i64,
    pub max_request_num_pre_sec: i64,
}

/// `DescribeUsagePlan` result and `DescribeUsagePlansStatus` item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UsagePlan {
    pub usage_plan_id: Option<String>,
    pub usage_plan_name: Option<String>,
    pub usage_plan_desc: Option<String>,
    pub max_request_num: Option<i64>,
    pub max_request_num_pre_sec: Option<i64>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub bind_secret_ids: Option<Vec<String>>,
    pub bind_environments: Option<Vec<UsagePlanBindEnvironment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UsagePlanBindEnvironment {
    pub environment_name: Option<String>,
    pub service_id: Option<String>,
}

/// Item of `DescribeUsagePlanEnvironments`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UsagePlanEnvironment {
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub environment: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

/// Item of `DescribeServiceUsagePlan` and `DescribeApiUsagePlan`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UsagePlanBinding {
    pub service_id: Option<String>,
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub usage_plan_id: Option<String>,
    pub usage_plan_name: Option<String>,
    pub usage_plan_desc: Option<String>,
    pub environment: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

// ============ Services ============

/// `CreateService` body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
    pub service_name: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_set_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_server_name: Option<String>,
    pub net_types: Vec<String>,
}

/// `DescribeService` response and `DescribeServicesStatus` item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Service {
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub service_desc: Option<String>,
    pub protocol: Option<String>,
    pub exclusive_set_name: Option<String>,
    pub ip_version: Option<String>,
    pub net_types: Option<Vec<String>>,
    pub internal_sub_domain: Option<String>,
    pub outer_sub_domain: Option<String>,
    pub inner_http_port: Option<i64>,
    pub inner_https_port: Option<i64>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub api_id_status_set: Option<Vec<ApiStatus>>,
}

// ============ APIs ============

/// Item of `DescribeApisStatus` and `Service.ApiIdStatusSet`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiStatus {
    pub service_id: Option<String>,
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub api_desc: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub protocol: Option<String>,
    pub auth_type: Option<String>,
    pub api_type: Option<String>,
    pub uniq_vpc_id: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiRequestConfig {
    pub path: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestParameter {
    pub name: Option<String>,
    pub position: Option<String>,
    #[serde(rename = "Type")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub required: Option<bool>,
}

/// Backend of an HTTP or WEBSOCKET api
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uniq_vpc_id: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResponseErrorCode {
    pub code: Option<i64>,
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub need_convert: Option<bool>,
}

/// Body shared by `CreateApi` and `ModifyApi`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiSpec {
    pub service_id: String,
    pub api_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_desc: Option<String>,
    pub auth_type: String,
    pub protocol: String,
    #[serde(rename = "EnableCORS")]
    pub enable_cors: bool,
    pub request_config: ApiRequestConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub request_parameters: Vec<RequestParameter>,
    pub service_type: String,
    pub service_timeout: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_config: Option<ServiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_mock_return_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_scf_function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_scf_function_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_scf_function_qualifier: Option<String>,
    pub response_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_success_example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_fail_example: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_error_codes: Vec<ResponseErrorCode>,
}

/// `DescribeApi` result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiInfo {
    pub service_id: Option<String>,
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub api_desc: Option<String>,
    pub auth_type: Option<String>,
    pub protocol: Option<String>,
    #[serde(rename = "EnableCORS")]
    pub enable_cors: Option<bool>,
    pub request_config: Option<ApiRequestConfig>,
    pub request_parameters: Option<Vec<RequestParameter>>,
    pub service_type: Option<String>,
    pub service_timeout: Option<i64>,
    pub service_config: Option<ServiceConfig>,
    pub service_mock_return_message: Option<String>,
    pub service_scf_function_name: Option<String>,
    pub service_scf_function_namespace: Option<String>,
    pub service_scf_function_qualifier: Option<String>,
    pub response_type: Option<String>,
    pub response_success_example: Option<String>,
    pub response_fail_example: Option<String>,
    pub response_error_codes: Option<Vec<ResponseErrorCode>>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

// ============ Throttling ============

/// Item of `DescribeServiceEnvironmentStrategy`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceEnvironmentStrategy {
    pub environment_name: Option<String>,
    pub url: Option<String>,
    pub status: Option<i64>,
    pub version_name: Option<String>,
    pub strategy: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentStrategy {
    pub environment_name: Option<String>,
    pub quota: Option<i64>,
}

/// Item of `DescribeApiEnvironmentStrategy`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApiEnvironmentStrategy {
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub environment_strategy_set: Option<Vec<EnvironmentStrategy>>,
}

// ============ Custom domains ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PathMapping {
    pub path: String,
    pub environment: String,
}

/// Body shared by `BindSubDomain` and `ModifySubDomain`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubDomainSpec {
    pub service_id: String,
    pub sub_domain: String,
    pub protocol: String,
    pub net_type: String,
    /// Default domain of the service; only sent on bind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_sub_domain: Option<String>,
    pub is_default_mapping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path_mapping_set: Vec<PathMapping>,
}

/// Item of `DescribeServiceSubDomains`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DomainSet {
    pub domain_name: Option<String>,
    pub status: Option<i64>,
    pub certificate_id: Option<String>,
    pub is_default_mapping: Option<bool>,
    pub protocol: Option<String>,
    pub net_type: Option<String>,
}

/// `DescribeServiceSubDomainMappings` result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubDomainMappings {
    pub is_default_mapping: Option<bool>,
    pub path_mapping_set: Option<Vec<PathMapping>>,
}

// ============ IP strategies ============

/// `DescribeIPStrategy` result and `DescribeIPStrategysStatus` item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IpStrategy {
    pub strategy_id: Option<String>,
    pub strategy_name: Option<String>,
    pub strategy_type: Option<String>,
    pub strategy_data: Option<String>,
    pub service_id: Option<String>,
    pub bind_api_total_count: Option<i64>,
    pub bind_apis: Option<Vec<BindApi>>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

/// Api bound to an IP strategy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BindApi {
    pub service_id: Option<String>,
    pub api_id: Option<String>,
    pub api_name: Option<String>,
    pub api_desc: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub protocol: Option<String>,
    pub auth_type: Option<String>,
    pub api_type: Option<String>,
    pub api_business_type: Option<String>,
    pub auth_relation_api_id: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(rename = "RelationBuniessApiIds")]
    pub relation_business_api_ids: Option<Vec<String>>,
    pub oauth_config: Option<OauthConfig>,
    pub vpc_id: Option<i64>,
    pub uniq_vpc_id: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
}

/// OAuth settings of an api with `AuthType` `OAUTH`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OauthConfig {
    pub public_key: Option<String>,
    pub token_location: Option<String>,
    pub login_redirect_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_fields_deserialize_as_none() {
        let key: ApiKey = serde_json::from_value(json!({
            "AccessKeyId": "AKID1",
            "AccessKeySecret": null,
            "Status": 1
        }))
        .unwrap();
        assert_eq!(key.access_key_id.as_deref(), Some("AKID1"));
        assert_eq!(key.access_key_secret, None);
        assert_eq!(key.status, Some(1));
    }

    #[test]
    fn api_spec_wire_names() {
        let spec = ApiSpec {
            service_id: "service-1".to_string(),
            api_name: "hello".to_string(),
            enable_cors: true,
            request_parameters: vec![RequestParameter {
                name: Some("name".to_string()),
                param_type: Some("string".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let wire = serde_json::to_value(&spec).unwrap();
        assert_eq!(wire["EnableCORS"], json!(true));
        assert_eq!(wire["RequestParameters"][0]["Type"], json!("string"));
        assert!(wire.get("ResponseErrorCodes").is_none());
        assert!(wire.get("ServiceConfig").is_none());
    }

    #[test]
    fn sub_domain_spec_omits_unset_fields() {
        let spec = SubDomainSpec {
            service_id: "service-1".to_string(),
            sub_domain: "api.example.com".to_string(),
            protocol: "http".to_string(),
            net_type: "OUTER".to_string(),
            is_default_mapping: true,
            ..Default::default()
        };
        let wire = serde_json::to_value(&spec).unwrap();
        assert!(wire.get("NetSubDomain").is_none());
        assert!(wire.get("CertificateId").is_none());
        assert!(wire.get("PathMappingSet").is_none());
        assert_eq!(wire["IsDefaultMapping"], json!(true));
    }
}
