//! Service facades
//!
//! One struct per cloud product, one method per action. Facades validate the
//! response shape, follow `Limit`/`Offset` pagination and map "not found"
//! codes to `Ok(None)`.

pub mod apigateway;
pub mod audit;
pub mod clb;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::{ApiError, ApiTransport, Endpoint};

pub use apigateway::ApiGatewayService;
pub use audit::AuditService;
pub use clb::ClbService;

/// Page size for every paginated Describe call
pub const PAGE_LIMIT: usize = 20;

/// `Filters: [{Name, Values}]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

/// Filters for every non-empty value
pub(crate) fn filters(pairs: &[(&str, &str)]) -> Option<Vec<Filter>> {
    let filters: Vec<Filter> = pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| Filter {
            name: name.to_string(),
            values: vec![value.to_string()],
        })
        .collect();
    (!filters.is_empty()).then_some(filters)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WithResult<T> {
    result: Option<T>,
}

/// Transport bound to one endpoint
#[derive(Clone)]
pub(crate) struct ServiceClient {
    transport: Arc<dyn ApiTransport>,
    endpoint: Endpoint,
}

impl ServiceClient {
    pub(crate) fn new(transport: Arc<dyn ApiTransport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    async fn raw<R: Serialize>(&self, action: &str, request: &R) -> Result<serde_json::Value, ApiError> {
        let payload =
            serde_json::to_value(request).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.transport.call(self.endpoint, action, payload).await
    }

    /// Decode the whole `Response` object
    pub(crate) async fn invoke<R, T>(&self, action: &str, request: &R) -> Result<T, ApiError>
    where
        R: Serialize,
        T: DeserializeOwned,
    {
        let response = self.raw(action, request).await?;
        serde_json::from_value(response)
            .map_err(|e| ApiError::Parse(format!("{action}: {e}")))
    }

    /// Decode `Response.Result`, which must be present
    pub(crate) async fn invoke_result<R, T>(&self, action: &str, request: &R) -> Result<T, ApiError>
    where
        R: Serialize,
        T: DeserializeOwned,
    {
        let response: WithResult<T> = self.invoke(action, request).await?;
        response
            .result
            .ok_or_else(|| ApiError::empty_response(action))
    }

    /// Actions answering with `Result: bool`; `false` becomes `failure`
    pub(crate) async fn invoke_flag<R: Serialize>(
        &self,
        action: &str,
        request: &R,
        failure: impl FnOnce() -> String,
    ) -> Result<(), ApiError> {
        if self.invoke_result::<R, bool>(action, request).await? {
            Ok(())
        } else {
            Err(ApiError::Operation(failure()))
        }
    }

    /// Follow `Limit`/`Offset` until a short page
    ///
    /// `list_field` names the array inside `Response.Result`. A missing
    /// `Result` is an error unless `lenient` is set, in which case it ends the
    /// listing.
    pub(crate) async fn paginate<R, T>(
        &self,
        action: &str,
        request: &R,
        list_field: &str,
        lenient: bool,
    ) -> Result<Vec<T>, ApiError>
    where
        R: Serialize,
        T: DeserializeOwned,
    {
        let mut payload =
            serde_json::to_value(request).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("Limit".to_string(), PAGE_LIMIT.into());
                obj.insert("Offset".to_string(), offset.into());
            }
            let response = self
                .transport
                .call(self.endpoint, action, payload.clone())
                .await?;

            let result = match response.get("Result") {
                Some(result) if !result.is_null() => result,
                _ if lenient => return Ok(items),
                _ => return Err(ApiError::empty_response(action)),
            };
            let page: Vec<T> = match result.get(list_field) {
                Some(list) if !list.is_null() => serde_json::from_value(list.clone())
                    .map_err(|e| ApiError::Parse(format!("{action}: {e}")))?,
                _ => Vec::new(),
            };

            let count = page.len();
            items.extend(page);
            if count < PAGE_LIMIT {
                return Ok(items);
            }
            offset += PAGE_LIMIT;
        }
    }
}

/// Map "not found" errors to `None`
pub(crate) fn found<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
