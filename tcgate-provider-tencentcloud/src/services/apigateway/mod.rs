//! API Gateway facade

mod types;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use types::*;

use super::{Filter, ServiceClient, filters, found};
use crate::client::{ApiError, ApiTransport, Endpoint};

pub const ENV_TEST: &str = "test";
pub const ENV_RELEASE: &str = "release";
pub const ENV_PREPUB: &str = "prepub";
/// Every environment a service can be released to
pub const ENVIRONMENTS: [&str; 3] = [ENV_TEST, ENV_RELEASE, ENV_PREPUB];

pub const KEY_STATUS_ON: i64 = 1;
pub const KEY_STATUS_OFF: i64 = 0;

pub const BIND_TYPE_SERVICE: &str = "SERVICE";
pub const BIND_TYPE_API: &str = "API";
pub const BIND_TYPES: [&str; 2] = [BIND_TYPE_SERVICE, BIND_TYPE_API];

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccessKeyRequest<'a> {
    access_key_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRequest<'a> {
    service_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UsagePlanRequest<'a> {
    usage_plan_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    service_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<Vec<Filter>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecretIdsRequest<'a> {
    usage_plan_id: &'a str,
    access_key_ids: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvironmentBindingRequest<'a> {
    service_id: &'a str,
    usage_plan_ids: [&'a str; 1],
    environment: &'a str,
    bind_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_ids: Option<[&'a str; 1]>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IpStrategyRequest<'a> {
    service_id: &'a str,
    strategy_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IpStrategyBindingRequest<'a> {
    service_id: &'a str,
    strategy_id: &'a str,
    environment_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind_api_ids: Option<[&'a str; 1]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    un_bind_api_ids: Option<[&'a str; 1]>,
}

/// Typed access to the API Gateway actions
#[derive(Clone)]
pub struct ApiGatewayService {
    client: ServiceClient,
}

impl ApiGatewayService {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            client: ServiceClient::new(transport, Endpoint::ApiGateway),
        }
    }

    // ============ API keys ============

    pub async fn create_api_key(&self, secret_name: &str) -> Result<String, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            secret_name: &'a str,
        }

        let key: ApiKey = self
            .client
            .invoke_result("CreateApiKey", &Request { secret_name })
            .await?;
        key.access_key_id
            .ok_or_else(|| ApiError::empty_response("CreateApiKey"))
    }

    /// Look up one key by id
    pub async fn describe_api_key(&self, access_key_id: &str) -> Result<Option<ApiKey>, ApiError> {
        let keys = self.describe_api_keys_status("", access_key_id).await?;
        Ok(keys
            .into_iter()
            .find(|k| k.access_key_id.as_deref() == Some(access_key_id)))
    }

    pub async fn describe_api_keys_status(
        &self,
        secret_name: &str,
        access_key_id: &str,
    ) -> Result<Vec<ApiKey>, ApiError> {
        let request = StatusRequest {
            service_id: None,
            filters: filters(&[("SecretName", secret_name), ("AccessKeyId", access_key_id)]),
        };
        self.client
            .paginate("DescribeApiKeysStatus", &request, "ApiKeySet", false)
            .await
    }

    pub async fn enable_api_key(&self, access_key_id: &str) -> Result<(), ApiError> {
        self.client
            .invoke_flag("EnableApiKey", &AccessKeyRequest { access_key_id }, || {
                "enable api key fail".to_string()
            })
            .await
    }

    pub async fn disable_api_key(&self, access_key_id: &str) -> Result<(), ApiError> {
        self.client
            .invoke_flag("DisableApiKey", &AccessKeyRequest { access_key_id }, || {
                "disable api key fail".to_string()
            })
            .await
    }

    pub async fn delete_api_key(&self, access_key_id: &str) -> Result<(), ApiError> {
        self.client
            .invoke_flag("DeleteApiKey", &AccessKeyRequest { access_key_id }, || {
                "delete api key fail".to_string()
            })
            .await
    }

    // ============ Usage plans ============

    pub async fn create_usage_plan(&self, spec: &UsagePlanSpec) -> Result<String, ApiError> {
        let plan: UsagePlan = self.client.invoke_result("CreateUsagePlan", spec).await?;
        plan.usage_plan_id
            .ok_or_else(|| ApiError::empty_response("CreateUsagePlan"))
    }

    pub async fn describe_usage_plan(&self, usage_plan_id: &str) -> Result<Option<UsagePlan>, ApiError> {
        found(
            self.client
                .invoke_result("DescribeUsagePlan", &UsagePlanRequest { usage_plan_id })
                .await,
        )
    }

    pub async fn modify_usage_plan(
        &self,
        usage_plan_id: &str,
        spec: &UsagePlanSpec,
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            usage_plan_id: &'a str,
            #[serde(flatten)]
            spec: &'a UsagePlanSpec,
        }

        let _: serde_json::Value = self
            .client
            .invoke_result("ModifyUsagePlan", &Request { usage_plan_id, spec })
            .await?;
        Ok(())
    }

    pub async fn delete_usage_plan(&self, usage_plan_id: &str) -> Result<(), ApiError> {
        self.client
            .invoke_flag("DeleteUsagePlan", &UsagePlanRequest { usage_plan_id }, || {
                "delete usage plan fail".to_string()
            })
            .await
    }

    pub async fn describe_usage_plans_status(
        &self,
        usage_plan_id: &str,
        usage_plan_name: &str,
    ) -> Result<Vec<UsagePlan>, ApiError> {
        let request = StatusRequest {
            service_id: None,
            filters: filters(&[("UsagePlanId", usage_plan_id), ("UsagePlanName", usage_plan_name)]),
        };
        self.client
            .paginate("DescribeUsagePlansStatus", &request, "UsagePlanStatusSet", false)
            .await
    }

    /// Services or apis a plan is bound to, per bind type
    pub async fn describe_usage_plan_environments(
        &self,
        usage_plan_id: &str,
        bind_type: &str,
    ) -> Result<Vec<UsagePlanEnvironment>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            usage_plan_id: &'a str,
            bind_type: &'a str,
        }

        self.client
            .paginate(
                "DescribeUsagePlanEnvironments",
                &Request {
                    usage_plan_id,
                    bind_type,
                },
                "EnvironmentList",
                false,
            )
            .await
    }

    /// Keys bound to a plan; `None` when the plan is gone
    pub async fn describe_usage_plan_secret_ids(
        &self,
        usage_plan_id: &str,
    ) -> Result<Option<Vec<ApiKey>>, ApiError> {
        found(
            self.client
                .paginate(
                    "DescribeUsagePlanSecretIds",
                    &UsagePlanRequest { usage_plan_id },
                    "AccessKeyList",
                    false,
                )
                .await,
        )
    }

    pub async fn bind_secret_id(&self, usage_plan_id: &str, access_key_id: &str) -> Result<(), ApiError> {
        let request = SecretIdsRequest {
            usage_plan_id,
            access_key_ids: [access_key_id],
        };
        self.client
            .invoke_flag("BindSecretIds", &request, || {
                "bind api key to usage plan fail".to_string()
            })
            .await
    }

    pub async fn unbind_secret_id(&self, usage_plan_id: &str, access_key_id: &str) -> Result<(), ApiError> {
        let request = SecretIdsRequest {
            usage_plan_id,
            access_key_ids: [access_key_id],
        };
        self.client
            .invoke_flag("UnBindSecretIds", &request, || {
                "unbind api key to usage plan fail".to_string()
            })
            .await
    }

    // ============ Services ============

    pub async fn create_service(&self, spec: &ServiceSpec) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            service_id: Option<String>,
        }

        let response: Response = self.client.invoke("CreateService", spec).await?;
        response
            .service_id
            .ok_or_else(|| ApiError::empty_response("CreateService"))
    }

    pub async fn describe_service(&self, service_id: &str) -> Result<Option<Service>, ApiError> {
        found(
            self.client
                .invoke("DescribeService", &ServiceRequest { service_id })
                .await,
        )
    }

    pub async fn modify_service(
        &self,
        service_id: &str,
        service_name: &str,
        protocol: &str,
        service_desc: &str,
        net_types: &[String],
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            service_name: &'a str,
            protocol: &'a str,
            service_desc: &'a str,
            net_types: &'a [String],
        }

        let request = Request {
            service_id,
            service_name,
            protocol,
            service_desc,
            net_types,
        };
        let _: serde_json::Value = self.client.invoke("ModifyService", &request).await?;
        Ok(())
    }

    pub async fn delete_service(&self, service_id: &str) -> Result<(), ApiError> {
        self.client
            .invoke_flag("DeleteService", &ServiceRequest { service_id }, || {
                "delete service fail".to_string()
            })
            .await
    }

    pub async fn unrelease_service(&self, service_id: &str, environment: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            environment_name: &'a str,
        }

        let request = Request {
            service_id,
            environment_name: environment,
        };
        self.client
            .invoke_flag("UnReleaseService", &request, || {
                format!("unrelease service {service_id}.{environment} fail")
            })
            .await
    }

    pub async fn describe_services_status(
        &self,
        service_id: &str,
        service_name: &str,
    ) -> Result<Vec<Service>, ApiError> {
        let request = StatusRequest {
            service_id: None,
            filters: filters(&[("ServiceId", service_id), ("ServiceName", service_name)]),
        };
        self.client
            .paginate("DescribeServicesStatus", &request, "ServiceSet", false)
            .await
    }

    /// Plans bound at service level
    pub async fn describe_service_usage_plans(
        &self,
        service_id: &str,
    ) -> Result<Vec<UsagePlanBinding>, ApiError> {
        self.client
            .paginate(
                "DescribeServiceUsagePlan",
                &ServiceRequest { service_id },
                "ServiceUsagePlanList",
                false,
            )
            .await
    }

    /// Plans bound to individual apis of a service
    pub async fn describe_api_usage_plans(
        &self,
        service_id: &str,
    ) -> Result<Vec<UsagePlanBinding>, ApiError> {
        self.client
            .paginate(
                "DescribeApiUsagePlan",
                &ServiceRequest { service_id },
                "ApiUsagePlanList",
                false,
            )
            .await
    }

    pub async fn bind_environment(
        &self,
        usage_plan_id: &str,
        service_id: &str,
        environment: &str,
        bind_type: &str,
        api_id: &str,
    ) -> Result<(), ApiError> {
        let request = EnvironmentBindingRequest {
            service_id,
            usage_plan_ids: [usage_plan_id],
            environment,
            bind_type,
            api_ids: (bind_type == BIND_TYPE_API).then_some([api_id]),
        };
        self.client
            .invoke_flag("BindEnvironment", &request, || {
                format!("{usage_plan_id} attach to {service_id}.{api_id} fail")
            })
            .await
    }

    pub async fn unbind_environment(
        &self,
        usage_plan_id: &str,
        service_id: &str,
        environment: &str,
        bind_type: &str,
        api_id: &str,
    ) -> Result<(), ApiError> {
        let request = EnvironmentBindingRequest {
            service_id,
            usage_plan_ids: [usage_plan_id],
            environment,
            bind_type,
            api_ids: (bind_type == BIND_TYPE_API).then_some([api_id]),
        };
        self.client
            .invoke_flag("UnBindEnvironment", &request, || {
                format!("{usage_plan_id} unattach to {service_id}.{api_id} fail")
            })
            .await
    }

    // ============ APIs ============

    pub async fn create_api(&self, spec: &ApiSpec) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Created {
            api_id: Option<String>,
        }

        let created: Created = self.client.invoke_result("CreateApi", spec).await?;
        created
            .api_id
            .ok_or_else(|| ApiError::empty_response("CreateApi"))
    }

    pub async fn describe_api(&self, service_id: &str, api_id: &str) -> Result<Option<ApiInfo>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            api_id: &'a str,
        }

        found(
            self.client
                .invoke_result("DescribeApi", &Request { service_id, api_id })
                .await,
        )
    }

    pub async fn modify_api(&self, api_id: &str, spec: &ApiSpec) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            api_id: &'a str,
            #[serde(flatten)]
            spec: &'a ApiSpec,
        }

        let _: serde_json::Value = self
            .client
            .invoke("ModifyApi", &Request { api_id, spec })
            .await?;
        Ok(())
    }

    pub async fn delete_api(&self, service_id: &str, api_id: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            api_id: &'a str,
        }

        self.client
            .invoke_flag("DeleteApi", &Request { service_id, api_id }, || {
                "delete api fail".to_string()
            })
            .await
    }

    pub async fn describe_apis_status(
        &self,
        service_id: &str,
        api_id: &str,
        api_name: &str,
    ) -> Result<Vec<ApiStatus>, ApiError> {
        let request = StatusRequest {
            service_id: Some(service_id),
            filters: filters(&[("ApiId", api_id), ("ApiName", api_name)]),
        };
        self.client
            .paginate("DescribeApisStatus", &request, "ApiIdStatusSet", false)
            .await
    }

    // ============ Throttling ============

    pub async fn describe_service_environment_strategies(
        &self,
        service_id: &str,
    ) -> Result<Vec<ServiceEnvironmentStrategy>, ApiError> {
        if service_id.is_empty() {
            return Err(ApiError::Operation("serviceId is must not empty.".to_string()));
        }
        self.client
            .paginate(
                "DescribeServiceEnvironmentStrategy",
                &ServiceRequest { service_id },
                "EnvironmentList",
                true,
            )
            .await
    }

    pub async fn describe_api_environment_strategies(
        &self,
        service_id: &str,
        environment_names: &[String],
    ) -> Result<Vec<ApiEnvironmentStrategy>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            environment_names: Option<&'a [String]>,
        }

        if service_id.is_empty() {
            return Err(ApiError::Operation("serviceId is must not empty.".to_string()));
        }
        self.client
            .paginate(
                "DescribeApiEnvironmentStrategy",
                &Request {
                    service_id,
                    environment_names: (!environment_names.is_empty()).then_some(environment_names),
                },
                "ApiEnvironmentStrategySet",
                true,
            )
            .await
    }

    pub async fn modify_service_environment_strategy(
        &self,
        service_id: &str,
        strategy: i64,
        environment_names: &[String],
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            strategy: i64,
            environment_names: &'a [String],
        }

        let request = Request {
            service_id,
            strategy,
            environment_names,
        };
        self.modify_strategy("ModifyServiceEnvironmentStrategy", &request)
            .await
    }

    pub async fn modify_api_environment_strategy(
        &self,
        service_id: &str,
        strategy: i64,
        environment_name: &str,
        api_ids: &[String],
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            strategy: i64,
            environment_name: &'a str,
            api_ids: &'a [String],
        }

        let request = Request {
            service_id,
            strategy,
            environment_name,
            api_ids,
        };
        self.modify_strategy("ModifyApiEnvironmentStrategy", &request)
            .await
    }

    /// Strategy updates answer with an optional bool; absence counts as failure
    async fn modify_strategy<R: Serialize>(&self, action: &str, request: &R) -> Result<(), ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            result: Option<bool>,
        }

        let response: Response = self.client.invoke(action, request).await?;
        if response.result.unwrap_or(false) {
            Ok(())
        } else {
            Err(ApiError::Operation(format!("{action} failed")))
        }
    }

    // ============ Custom domains ============

    pub async fn bind_sub_domain(&self, spec: &SubDomainSpec) -> Result<(), ApiError> {
        self.client
            .invoke_flag("BindSubDomain", spec, || "BindSubDomain failed".to_string())
            .await
    }

    pub async fn modify_sub_domain(&self, spec: &SubDomainSpec) -> Result<(), ApiError> {
        self.client
            .invoke_flag("ModifySubDomain", spec, || "ModifySubDomain failed".to_string())
            .await
    }

    pub async fn unbind_sub_domain(&self, service_id: &str, sub_domain: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            sub_domain: &'a str,
        }

        self.client
            .invoke_flag("UnBindSubDomain", &Request { service_id, sub_domain }, || {
                "UnBindSubDomain failed".to_string()
            })
            .await
    }

    pub async fn describe_service_sub_domains(&self, service_id: &str) -> Result<Vec<DomainSet>, ApiError> {
        self.client
            .paginate(
                "DescribeServiceSubDomains",
                &ServiceRequest { service_id },
                "DomainSet",
                false,
            )
            .await
    }

    pub async fn describe_service_sub_domain_mappings(
        &self,
        service_id: &str,
        sub_domain: &str,
    ) -> Result<Option<SubDomainMappings>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            sub_domain: &'a str,
        }

        found(
            self.client
                .invoke_result(
                    "DescribeServiceSubDomainMappings",
                    &Request { service_id, sub_domain },
                )
                .await,
        )
    }

    // ============ IP strategies ============

    pub async fn create_ip_strategy(
        &self,
        service_id: &str,
        strategy_name: &str,
        strategy_type: &str,
        strategy_data: &str,
    ) -> Result<String, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            strategy_name: &'a str,
            strategy_type: &'a str,
            strategy_data: &'a str,
        }

        let request = Request {
            service_id,
            strategy_name,
            strategy_type,
            strategy_data,
        };
        let strategy: IpStrategy = self.client.invoke_result("CreateIPStrategy", &request).await?;
        strategy
            .strategy_id
            .ok_or_else(|| ApiError::empty_response("CreateIPStrategy"))
    }

    pub async fn describe_ip_strategies_status(
        &self,
        service_id: &str,
        strategy_name: &str,
    ) -> Result<Vec<IpStrategy>, ApiError> {
        let request = StatusRequest {
            service_id: Some(service_id),
            filters: filters(&[("StrategyName", strategy_name)]),
        };
        self.client
            .paginate("DescribeIPStrategysStatus", &request, "StrategySet", false)
            .await
    }

    /// Status entry of one strategy; `None` when it is not listed
    pub async fn describe_ip_strategy_status(
        &self,
        service_id: &str,
        strategy_id: &str,
    ) -> Result<Option<IpStrategy>, ApiError> {
        let Some(strategies) = found(self.describe_ip_strategies_status(service_id, "").await)? else {
            return Ok(None);
        };
        Ok(strategies
            .into_iter()
            .find(|s| s.strategy_id.as_deref() == Some(strategy_id)))
    }

    /// Strategy details with the apis bound in `environment`
    pub async fn describe_ip_strategy(
        &self,
        service_id: &str,
        strategy_id: &str,
        environment: &str,
    ) -> Result<Option<IpStrategy>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            strategy_id: &'a str,
            environment_name: &'a str,
        }

        let request = Request {
            service_id,
            strategy_id,
            environment_name: environment,
        };
        found(self.client.invoke_result("DescribeIPStrategy", &request).await)
    }

    pub async fn modify_ip_strategy(
        &self,
        service_id: &str,
        strategy_id: &str,
        strategy_data: &str,
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            service_id: &'a str,
            strategy_id: &'a str,
            strategy_data: &'a str,
        }

        let request = Request {
            service_id,
            strategy_id,
            strategy_data,
        };
        self.client
            .invoke_flag("ModifyIPStrategy", &request, || {
                "modify ip strategy fail".to_string()
            })
            .await
    }

    pub async fn delete_ip_strategy(&self, service_id: &str, strategy_id: &str) -> Result<(), ApiError> {
        let request = IpStrategyRequest {
            service_id,
            strategy_id,
        };
        self.client
            .invoke_flag("DeleteIPStrategy", &request, || {
                "delete ip strategy fail".to_string()
            })
            .await
    }

    pub async fn bind_ip_strategy(
        &self,
        service_id: &str,
        strategy_id: &str,
        environment: &str,
        api_id: &str,
    ) -> Result<(), ApiError> {
        let request = IpStrategyBindingRequest {
            service_id,
            strategy_id,
            environment_name: environment,
            bind_api_ids: Some([api_id]),
            un_bind_api_ids: None,
        };
        self.client
            .invoke_flag("BindIPStrategy", &request, || {
                "bind ip strategy fail".to_string()
            })
            .await
    }

    pub async fn unbind_ip_strategy(
        &self,
        service_id: &str,
        strategy_id: &str,
        environment: &str,
        api_id: &str,
    ) -> Result<(), ApiError> {
        let request = IpStrategyBindingRequest {
            service_id,
            strategy_id,
            environment_name: environment,
            bind_api_ids: None,
            un_bind_api_ids: Some([api_id]),
        };
        self.client
            .invoke_flag("UnBindIPStrategy", &request, || {
                "delete ip strategy is err".to_string()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, not_found};
    use serde_json::json;

    #[tokio::test]
    async fn describe_service_not_found_is_none() {
        let mock = MockTransport::new(|_, _| Err(not_found("ResourceNotFound.InvalidService")));
        let service = ApiGatewayService::new(mock.clone());
        assert!(service.describe_service("service-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_key_lookup_filters_by_id() {
        let mock = MockTransport::new(|_, _| {
            Ok(json!({"Result": {"ApiKeySet": [
                {"AccessKeyId": "AKID2", "Status": 1},
                {"AccessKeyId": "AKID1", "Status": 0}
            ]}}))
        });
        let service = ApiGatewayService::new(mock.clone());

        let key = service.describe_api_key("AKID1").await.unwrap().unwrap();
        assert_eq!(key.status, Some(KEY_STATUS_OFF));
        assert_eq!(
            mock.payloads("DescribeApiKeysStatus")[0]["Filters"],
            json!([{"Name": "AccessKeyId", "Values": ["AKID1"]}])
        );
    }

    #[tokio::test]
    async fn environment_binding_sends_api_ids_only_for_api_binds() {
        let mock = MockTransport::new(|_, _| Ok(json!({"Result": true})));
        let service = ApiGatewayService::new(mock.clone());

        service
            .bind_environment("plan-1", "service-1", "release", BIND_TYPE_SERVICE, "")
            .await
            .unwrap();
        service
            .bind_environment("plan-1", "service-1", "release", BIND_TYPE_API, "api-1")
            .await
            .unwrap();

        let payloads = mock.payloads("BindEnvironment");
        assert!(payloads[0].get("ApiIds").is_none());
        assert_eq!(payloads[1]["ApiIds"], json!(["api-1"]));
        assert_eq!(payloads[1]["UsagePlanIds"], json!(["plan-1"]));
    }

    #[tokio::test]
    async fn unbind_environment_failure_message() {
        let mock = MockTransport::new(|_, _| Ok(json!({"Result": false})));
        let service = ApiGatewayService::new(mock.clone());
        let err = service
            .unbind_environment("plan-1", "service-1", "test", BIND_TYPE_API, "api-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "plan-1 unattach to service-1.api-1 fail");
    }

    #[tokio::test]
    async fn strategy_update_without_result_fails() {
        let mock = MockTransport::new(|_, _| Ok(json!({"RequestId": "r"})));
        let service = ApiGatewayService::new(mock.clone());
        let err = service
            .modify_service_environment_strategy("service-1", 100, &["test".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ModifyServiceEnvironmentStrategy failed");
    }

    #[tokio::test]
    async fn empty_service_id_is_rejected_before_calling() {
        let mock = MockTransport::new(|_, _| Ok(json!({})));
        let service = ApiGatewayService::new(mock.clone());
        let err = service
            .describe_service_environment_strategies("")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "serviceId is must not empty.");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn create_service_reads_top_level_id() {
        let mock = MockTransport::new(|_, _| Ok(json!({"ServiceId": "service-abc"})));
        let service = ApiGatewayService::new(mock.clone());
        let spec = ServiceSpec {
            service_name: "svc".to_string(),
            protocol: "http".to_string(),
            service_desc: None,
            exclusive_set_name: None,
            ip_version: Some("IPv4".to_string()),
            app_id_type: None,
            set_server_name: None,
            net_types: vec!["OUTER".to_string()],
        };
        assert_eq!(service.create_service(&spec).await.unwrap(), "service-abc");
        let payload = &mock.payloads("CreateService")[0];
        assert_eq!(payload["NetTypes"], json!(["OUTER"]));
        assert!(payload.get("ServiceDesc").is_none());
    }
}
