//! Resource handlers
//!
//! Each module exposes `TYPE`, `schema()` and async `create`/`read`/`update`/
//! `delete` functions over a shared [`Context`]. Handlers read typed
//! configuration out of the attribute map, call the service facades and
//! return a `State` carrying the cloud-side identifier.

pub mod api;
pub mod api_key;
pub mod api_key_attachment;
pub mod clb_redirection;
pub mod custom_domain;
pub mod ip_strategy;
pub mod service;
pub mod strategy_attachment;
pub mod throttling_api;
pub mod throttling_service;
pub mod usage_plan;
pub mod usage_plan_attachment;

use std::collections::HashMap;
use std::sync::Arc;

use tcgate_core::poll::{PollError, PollPolicy};
use tcgate_core::provider::{ProviderError, ProviderResult};
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tokio::sync::Mutex;

use crate::client::{ApiError, ApiTransport};
use crate::services::{ApiGatewayService, AuditService, ClbService};

/// Error codes that end a workflow without failing it
#[derive(Debug, Clone, Default)]
pub struct ToleratedCodes {
    codes: HashMap<String, String>,
}

impl ToleratedCodes {
    /// Codes `BindSubDomain` may answer with once the domain is recorded
    pub fn bind_sub_domain() -> Self {
        Self::default()
            .with("FailedOperation.CertificateIdExpired", "certificate has expired")
            .with("FailedOperation.CertificateIdUnderVerify", "certificate is under verification")
            .with("FailedOperation.DomainNeedBeian", "domain needs ICP filing")
            .with("LimitExceeded.ExceededDefineMappingLimit", "custom mapping limit exceeded")
            .with("FailedOperation.DomainResolveError", "domain does not resolve to the service")
    }

    pub fn with(mut self, code: impl Into<String>, reason: impl Into<String>) -> Self {
        self.codes.insert(code.into(), reason.into());
        self
    }

    /// Reason the error is tolerated, if it is
    pub fn reason(&self, err: &ApiError) -> Option<&str> {
        err.code()
            .and_then(|code| self.codes.get(code))
            .map(String::as_str)
    }
}

/// Everything a handler needs: facades, poll budgets and shared locks
#[derive(Clone)]
pub struct Context {
    pub apigateway: ApiGatewayService,
    pub clb: ClbService,
    pub audit: AuditService,
    pub read_policy: PollPolicy,
    pub write_policy: PollPolicy,
    /// Serializes CLB rewrite operations
    pub clb_lock: Arc<Mutex<()>>,
    pub tolerated: ToleratedCodes,
}

impl Context {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            apigateway: ApiGatewayService::new(transport.clone()),
            clb: ClbService::new(transport.clone()),
            audit: AuditService::new(transport),
            read_policy: PollPolicy::read(),
            write_policy: PollPolicy::write(),
            clb_lock: Arc::new(Mutex::new(())),
            tolerated: ToleratedCodes::bind_sub_domain(),
        }
    }

    pub fn with_read_policy(mut self, policy: PollPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: PollPolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_tolerated(mut self, tolerated: ToleratedCodes) -> Self {
        self.tolerated = tolerated;
        self
    }
}

/// Map any provider-convertible error onto a resource
pub(crate) fn fail<E: Into<ProviderError>>(id: &ResourceId) -> impl FnOnce(E) -> ProviderError + '_ {
    move |err| err.into().for_resource(id.clone())
}

/// Treat "already gone" as success on delete paths
pub(crate) fn gone_is_ok(
    what: &str,
    result: Result<(), PollError<ApiError>>,
) -> Result<(), PollError<ApiError>> {
    match result {
        Err(PollError::Failed(e)) if e.is_not_found() => {
            log::debug!("{what}: already gone ({e})");
            Ok(())
        }
        other => other,
    }
}

/// Typed access to an attribute map
#[derive(Clone, Copy)]
pub(crate) struct Attributes<'a> {
    id: &'a ResourceId,
    attrs: &'a HashMap<String, Value>,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(id: &'a ResourceId, attrs: &'a HashMap<String, Value>) -> Self {
        Self { id, attrs }
    }

    pub(crate) fn of(resource: &'a Resource) -> Self {
        Self::new(&resource.id, &resource.attributes)
    }

    /// Nested block sharing this map's resource id
    pub(crate) fn block(&self, attrs: &'a HashMap<String, Value>) -> Self {
        Self::new(self.id, attrs)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::new(message).for_resource(self.id.clone())
    }

    /// Non-empty string, or `None`
    pub(crate) fn str(&self, key: &str) -> Option<&'a str> {
        self.attrs
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn str_or(&self, key: &str, default: &'a str) -> &'a str {
        self.str(key).unwrap_or(default)
    }

    pub(crate) fn required_str(&self, key: &str) -> ProviderResult<&'a str> {
        self.str(key)
            .ok_or_else(|| self.error(format!("`{key}` is required")))
    }

    pub(crate) fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    pub(crate) fn int(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(Value::as_int)
    }

    pub(crate) fn int_or(&self, key: &str, default: i64) -> i64 {
        self.int(key).unwrap_or(default)
    }

    pub(crate) fn required_int(&self, key: &str) -> ProviderResult<i64> {
        self.int(key)
            .ok_or_else(|| self.error(format!("`{key}` is required")))
    }

    pub(crate) fn bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(Value::as_bool)
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> bool {
        self.bool(key).unwrap_or(default)
    }

    /// String items of a list, empty when unset
    pub(crate) fn string_list(&self, key: &str) -> Vec<String> {
        self.attrs
            .get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested blocks of a list attribute
    pub(crate) fn blocks(&self, key: &str) -> Vec<Attributes<'a>> {
        self.attrs
            .get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_map)
                    .map(|map| self.block(map))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }
}

/// Conversion of cloud fields into attribute values; `None` leaves the key unset
pub(crate) trait IntoValue {
    fn into_value(self) -> Option<Value>;
}

impl IntoValue for Value {
    fn into_value(self) -> Option<Value> {
        Some(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Option<Value> {
        Some(Value::String(self))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Option<Value> {
        Some(Value::String(self.to_string()))
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Option<Value> {
        Some(Value::Int(self))
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Option<Value> {
        Some(Value::Bool(self))
    }
}

impl IntoValue for Vec<String> {
    fn into_value(self) -> Option<Value> {
        Some(Value::List(self.into_iter().map(Value::String).collect()))
    }
}

impl IntoValue for Vec<Value> {
    fn into_value(self) -> Option<Value> {
        Some(Value::List(self))
    }
}

impl IntoValue for Outputs {
    fn into_value(self) -> Option<Value> {
        Some(Value::Map(self.0))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Option<Value> {
        self.and_then(IntoValue::into_value)
    }
}

/// Builder for the attribute map written back into a `State`
#[derive(Debug, Default)]
pub(crate) struct Outputs(HashMap<String, Value>);

impl Outputs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, key: &str, value: impl IntoValue) -> Self {
        if let Some(value) = value.into_value() {
            self.0.insert(key.to_string(), value);
        }
        self
    }

    /// Copy attributes the cloud does not report back
    pub(crate) fn keep(mut self, from: &HashMap<String, Value>, keys: &[&str]) -> Self {
        for key in keys {
            if let Some(value) = from.get(*key) {
                self.0.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }
        self
    }

    pub(crate) fn into_map(self) -> HashMap<String, Value> {
        self.0
    }

    pub(crate) fn into_state(self, id: &ResourceId, identifier: impl Into<String>) -> State {
        State::existing(id.clone(), self.0).with_identifier(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerated_codes_match_by_code() {
        let tolerated = ToleratedCodes::bind_sub_domain();
        assert!(tolerated
            .reason(&ApiError::api("FailedOperation.DomainNeedBeian", "x"))
            .is_some());
        assert!(tolerated
            .reason(&ApiError::api("FailedOperation.Other", "x"))
            .is_none());
        assert!(tolerated.reason(&ApiError::Network("x".to_string())).is_none());
    }

    #[test]
    fn attribute_readers() {
        let id = ResourceId::new("t", "n");
        let attrs: HashMap<String, Value> = [
            ("name".to_string(), Value::String("a".to_string())),
            ("empty".to_string(), Value::String(String::new())),
            ("count".to_string(), Value::Int(3)),
            (
                "tags".to_string(),
                Value::List(vec![Value::String("x".to_string()), Value::Int(1)]),
            ),
        ]
        .into_iter()
        .collect();
        let a = Attributes::new(&id, &attrs);

        assert_eq!(a.str("name"), Some("a"));
        assert_eq!(a.str("empty"), None);
        assert_eq!(a.str_or("empty", "dflt"), "dflt");
        assert_eq!(a.int_or("count", 0), 3);
        assert_eq!(a.string_list("tags"), vec!["x".to_string()]);
        let err = a.required_str("missing").unwrap_err();
        assert_eq!(err.to_string(), "[t.n] `missing` is required");
    }

    #[test]
    fn outputs_skip_none_and_keep_missing() {
        let from: HashMap<String, Value> =
            [("secret".to_string(), Value::String("s".to_string()))].into();
        let map = Outputs::new()
            .set("a", Some("x"))
            .set("b", None::<String>)
            .set("c", 5i64)
            .keep(&from, &["secret", "absent"])
            .into_map();
        assert_eq!(map.get("a"), Some(&Value::String("x".to_string())));
        assert!(!map.contains_key("b"));
        assert_eq!(map.get("c"), Some(&Value::Int(5)));
        assert_eq!(map.get("secret"), Some(&Value::String("s".to_string())));
        assert!(!map.contains_key("absent"));
    }
}
