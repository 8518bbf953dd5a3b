//! `Provider` implementation dispatching on the resource type name

use std::sync::Arc;

use tcgate_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceType,
};
use tcgate_core::resource::{Resource, ResourceId, State};
use tcgate_core::schema::ResourceSchema;

use crate::client::{ApiError, ApiTransport, TencentCloudClient};
use crate::data_sources::{
    api_keys, audits, customer_domains, ip_strategies, services, throttling_apis,
    throttling_services, usage_plan_environments, usage_plans,
};
use crate::resources::{
    Context, api, api_key, api_key_attachment, clb_redirection, custom_domain, ip_strategy,
    service, strategy_attachment, throttling_api, throttling_service, usage_plan,
    usage_plan_attachment,
};

macro_rules! resource_type {
    ($name:ident, $module:ident) => {
        pub struct $name;

        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $module::TYPE
            }

            fn schema(&self) -> ResourceSchema {
                $module::schema()
            }
        }
    };
}

resource_type!(ApiKeyType, api_key);
resource_type!(IpStrategyType, ip_strategy);
resource_type!(StrategyAttachmentType, strategy_attachment);
resource_type!(ApiKeyAttachmentType, api_key_attachment);
resource_type!(UsagePlanType, usage_plan);
resource_type!(UsagePlanAttachmentType, usage_plan_attachment);
resource_type!(ServiceType, service);
resource_type!(ApiType, api);
resource_type!(CustomDomainType, custom_domain);
resource_type!(ThrottlingServiceType, throttling_service);
resource_type!(ThrottlingApiType, throttling_api);
resource_type!(ClbRedirectionType, clb_redirection);

resource_type!(ApiKeysDataSource, api_keys);
resource_type!(IpStrategiesDataSource, ip_strategies);
resource_type!(ServicesDataSource, services);
resource_type!(UsagePlansDataSource, usage_plans);
resource_type!(UsagePlanEnvironmentsDataSource, usage_plan_environments);
resource_type!(CustomerDomainsDataSource, customer_domains);
resource_type!(ThrottlingServicesDataSource, throttling_services);
resource_type!(ThrottlingApisDataSource, throttling_apis);
resource_type!(AuditsDataSource, audits);

/// Every resource and data source type, usable without credentials
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ApiKeyType),
        Box::new(IpStrategyType),
        Box::new(StrategyAttachmentType),
        Box::new(ApiKeyAttachmentType),
        Box::new(UsagePlanType),
        Box::new(UsagePlanAttachmentType),
        Box::new(ServiceType),
        Box::new(ApiType),
        Box::new(CustomDomainType),
        Box::new(ThrottlingServiceType),
        Box::new(ThrottlingApiType),
        Box::new(ClbRedirectionType),
        Box::new(ApiKeysDataSource),
        Box::new(IpStrategiesDataSource),
        Box::new(ServicesDataSource),
        Box::new(UsagePlansDataSource),
        Box::new(UsagePlanEnvironmentsDataSource),
        Box::new(CustomerDomainsDataSource),
        Box::new(ThrottlingServicesDataSource),
        Box::new(ThrottlingApisDataSource),
        Box::new(AuditsDataSource),
    ]
}

/// Types whose identifier cannot be rebuilt from user input
const NOT_IMPORTABLE: [&str; 2] = [api::TYPE, custom_domain::TYPE];

fn unknown(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

/// Tencent Cloud provider
pub struct TencentCloudProvider {
    ctx: Context,
}

impl TencentCloudProvider {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self::with_context(Context::new(transport))
    }

    pub fn with_context(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Build a signed client from the environment
    pub fn from_env(region: Option<&str>) -> Result<Self, ApiError> {
        let client = TencentCloudClient::builder_from_env(region)?.build()?;
        log::debug!("tencentcloud client for region {}", client.region());
        Ok(Self::new(Arc::new(client)))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    async fn read_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let ctx = &self.ctx;
        match id.resource_type.as_str() {
            api_key::TYPE => api_key::read(ctx, id, identifier).await,
            ip_strategy::TYPE => ip_strategy::read(ctx, id, identifier).await,
            strategy_attachment::TYPE => strategy_attachment::read(ctx, id, identifier).await,
            api_key_attachment::TYPE => api_key_attachment::read(ctx, id, identifier).await,
            usage_plan::TYPE => usage_plan::read(ctx, id, identifier).await,
            usage_plan_attachment::TYPE => usage_plan_attachment::read(ctx, id, identifier).await,
            service::TYPE => service::read(ctx, id, identifier).await,
            api::TYPE => api::read(ctx, id, identifier).await,
            custom_domain::TYPE => custom_domain::read(ctx, id, identifier).await,
            throttling_service::TYPE => throttling_service::read(ctx, id, identifier).await,
            throttling_api::TYPE => throttling_api::read(ctx, id, identifier).await,
            clb_redirection::TYPE => clb_redirection::read(ctx, id, identifier).await,
            _ => Err(unknown(id)),
        }
    }

    async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let ctx = &self.ctx;
        match resource.id.resource_type.as_str() {
            api_key::TYPE => api_key::create(ctx, resource).await,
            ip_strategy::TYPE => ip_strategy::create(ctx, resource).await,
            strategy_attachment::TYPE => strategy_attachment::create(ctx, resource).await,
            api_key_attachment::TYPE => api_key_attachment::create(ctx, resource).await,
            usage_plan::TYPE => usage_plan::create(ctx, resource).await,
            usage_plan_attachment::TYPE => usage_plan_attachment::create(ctx, resource).await,
            service::TYPE => service::create(ctx, resource).await,
            api::TYPE => api::create(ctx, resource).await,
            custom_domain::TYPE => custom_domain::create(ctx, resource).await,
            throttling_service::TYPE => throttling_service::create(ctx, resource).await,
            throttling_api::TYPE => throttling_api::create(ctx, resource).await,
            clb_redirection::TYPE => clb_redirection::create(ctx, resource).await,
            _ => Err(unknown(&resource.id)),
        }
    }

    async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let ctx = &self.ctx;
        match id.resource_type.as_str() {
            api_key::TYPE => api_key::update(ctx, id, identifier, from, to).await,
            ip_strategy::TYPE => ip_strategy::update(ctx, id, identifier, from, to).await,
            usage_plan::TYPE => usage_plan::update(ctx, id, identifier, from, to).await,
            service::TYPE => service::update(ctx, id, identifier, from, to).await,
            api::TYPE => api::update(ctx, id, identifier, from, to).await,
            custom_domain::TYPE => custom_domain::update(ctx, id, identifier, from, to).await,
            throttling_service::TYPE => {
                throttling_service::update(ctx, id, identifier, from, to).await
            }
            throttling_api::TYPE => throttling_api::update(ctx, id, identifier, from, to).await,
            strategy_attachment::TYPE
            | api_key_attachment::TYPE
            | usage_plan_attachment::TYPE
            | clb_redirection::TYPE => Err(ProviderError::new(
                "every attribute forces replacement; nothing to update in place",
            )
            .for_resource(id.clone())),
            _ => Err(unknown(id)),
        }
    }

    async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let ctx = &self.ctx;
        match id.resource_type.as_str() {
            api_key::TYPE => api_key::delete(ctx, id, identifier).await,
            ip_strategy::TYPE => ip_strategy::delete(ctx, id, identifier).await,
            strategy_attachment::TYPE => strategy_attachment::delete(ctx, id, identifier).await,
            api_key_attachment::TYPE => api_key_attachment::delete(ctx, id, identifier).await,
            usage_plan::TYPE => usage_plan::delete(ctx, id, identifier).await,
            usage_plan_attachment::TYPE => usage_plan_attachment::delete(ctx, id, identifier).await,
            service::TYPE => service::delete(ctx, id, identifier).await,
            api::TYPE => api::delete(ctx, id, identifier).await,
            custom_domain::TYPE => custom_domain::delete(ctx, id, identifier).await,
            throttling_service::TYPE => throttling_service::delete(ctx, id, identifier).await,
            throttling_api::TYPE => throttling_api::delete(ctx, id, identifier).await,
            clb_redirection::TYPE => clb_redirection::delete(ctx, id, identifier).await,
            _ => Err(unknown(id)),
        }
    }

    async fn read_data(&self, resource: &Resource) -> ProviderResult<State> {
        let ctx = &self.ctx;
        match resource.id.resource_type.as_str() {
            api_keys::TYPE => api_keys::read(ctx, resource).await,
            ip_strategies::TYPE => ip_strategies::read(ctx, resource).await,
            services::TYPE => services::read(ctx, resource).await,
            usage_plans::TYPE => usage_plans::read(ctx, resource).await,
            usage_plan_environments::TYPE => usage_plan_environments::read(ctx, resource).await,
            customer_domains::TYPE => customer_domains::read(ctx, resource).await,
            throttling_services::TYPE => throttling_services::read(ctx, resource).await,
            throttling_apis::TYPE => throttling_apis::read(ctx, resource).await,
            audits::TYPE => audits::read(ctx, resource).await,
            _ => Err(unknown(&resource.id)),
        }
    }
}

impl Provider for TencentCloudProvider {
    fn name(&self) -> &'static str {
        "tencentcloud"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            match identifier.as_deref() {
                Some(identifier) if !identifier.is_empty() => {
                    self.read_resource(&id, identifier).await
                }
                _ => Ok(State::not_found(id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.read_data(&resource).await })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let import_id = import_id.to_string();
        Box::pin(async move {
            if NOT_IMPORTABLE.contains(&id.resource_type.as_str()) {
                return Err(ProviderError::new(format!(
                    "{} does not support import",
                    id.resource_type
                ))
                .for_resource(id));
            }
            let state = self.read_resource(&id, &import_id).await?;
            if !state.exists {
                return Err(ProviderError::new(format!("nothing found for import id '{import_id}'"))
                    .for_resource(id));
            }
            Ok(state)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;
    use std::collections::HashSet;

    fn provider(mock: &Arc<MockTransport>) -> TencentCloudProvider {
        TencentCloudProvider::with_context(context(mock))
    }

    #[test]
    fn type_names_are_unique_and_schemas_match() {
        let mock = MockTransport::new(|_, _| Ok(json!({})));
        let types = provider(&mock).resource_types();
        let names: HashSet<_> = types.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), types.len());
        assert_eq!(names.len(), 21);
        for t in &types {
            assert_eq!(t.schema().resource_type, t.name());
        }
    }

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let mock = MockTransport::new(|action, _| panic!("unexpected action {action}"));
        let id = ResourceId::new(api_key::TYPE, "key");

        let state = provider(&mock).read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn unknown_type_is_an_error() {
        let mock = MockTransport::new(|action, _| panic!("unexpected action {action}"));
        let err = provider(&mock)
            .create(&resource("tencentcloud_vpc", &[]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown resource type"));
    }

    #[tokio::test]
    async fn api_import_is_rejected() {
        let mock = MockTransport::new(|action, _| panic!("unexpected action {action}"));
        let id = ResourceId::new(api::TYPE, "hello");

        let err = provider(&mock).import(&id, "service-1#api-1").await.unwrap_err();
        assert!(err.to_string().contains("does not support import"));
    }

    #[tokio::test]
    async fn import_of_missing_key_fails() {
        let mock = MockTransport::new(|_, _| Ok(json!({"Result": {"ApiKeySet": []}})));
        let id = ResourceId::new(api_key::TYPE, "key");

        let err = provider(&mock).import(&id, "AKID-missing").await.unwrap_err();
        assert!(err.to_string().contains("AKID-missing"));
    }

    #[tokio::test]
    async fn data_source_dispatch() {
        let mock = MockTransport::new(|_, _| Ok(json!({"AuditSummarys": []})));
        let state = provider(&mock)
            .read_data_source(&resource(audits::TYPE, &[("name", s("trail"))]))
            .await
            .unwrap();
        assert_eq!(state.attributes["audit_list"].as_list().map(<[_]>::len), Some(0));
    }

    #[tokio::test]
    async fn attachments_have_no_update() {
        let mock = MockTransport::new(|action, _| panic!("unexpected action {action}"));
        let to = resource(clb_redirection::TYPE, &[]);
        let from = State::not_found(to.id.clone());

        let err = provider(&mock)
            .update(&to.id, "a#b#c#d#e", &from, &to)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("forces replacement"));
    }
}
