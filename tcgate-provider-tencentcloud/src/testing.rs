//! In-memory transport for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;
use tcgate_core::poll::PollPolicy;
use tcgate_core::resource::{Resource, Value};

use crate::client::{ApiError, ApiTransport, Endpoint};
use crate::resources::Context;

type Handler = dyn Fn(&str, &Json) -> Result<Json, ApiError> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub endpoint: Endpoint,
    pub action: String,
    pub payload: Json,
}

/// Answers every call through a handler closure and records the call log
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&str, &Json) -> Result<Json, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    /// Payloads sent for one action
    pub(crate) fn payloads(&self, action: &str) -> Vec<Json> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == action)
            .map(|c| c.payload)
            .collect()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn call(&self, endpoint: Endpoint, action: &str, payload: Json) -> Result<Json, ApiError> {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            action: action.to_string(),
            payload: payload.clone(),
        });
        (self.handler)(action, &payload)
    }
}

/// Context with short poll budgets
pub(crate) fn context(mock: &Arc<MockTransport>) -> Context {
    let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_millis(30));
    Context::new(mock.clone())
        .with_read_policy(policy)
        .with_write_policy(policy)
}

pub(crate) fn not_found(code: &str) -> ApiError {
    ApiError::api(code, "not found")
}

pub(crate) fn resource(resource_type: &str, attrs: &[(&str, Value)]) -> Resource {
    let mut resource = Resource::new(resource_type, "test");
    resource.attributes = attrs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<HashMap<_, _>>();
    resource
}

pub(crate) fn s(v: &str) -> Value {
    Value::String(v.to_string())
}
