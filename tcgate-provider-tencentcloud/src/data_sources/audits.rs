//! tencentcloud_audits

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::{Attributes, Context, Outputs, fail};
use crate::services::audit::AuditSummary;

pub const TYPE: &str = "tencentcloud_audits";

pub fn schema() -> ResourceSchema {
    let item = vec![
        AttributeSchema::new("id", AttributeType::String),
        AttributeSchema::new("name", AttributeType::String),
        AttributeSchema::new("cos_bucket", AttributeType::String),
        AttributeSchema::new("log_file_prefix", AttributeType::String),
        AttributeSchema::new("audit_switch", AttributeType::Bool),
    ];

    ResourceSchema::new(TYPE)
        .with_description("Cloud Audit trails, optionally filtered by name")
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("audit_list", types::block_list(item)).computed())
        .data_source()
}

fn item(audit: AuditSummary) -> Value {
    Value::Map(
        Outputs::new()
            .set("id", audit.audit_name.clone())
            .set("name", audit.audit_name)
            .set("cos_bucket", audit.cos_bucket_name)
            .set("log_file_prefix", audit.log_file_prefix)
            .set("audit_switch", audit.audit_status.unwrap_or_default() > 0)
            .into_map(),
    )
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let name = attrs.str_or("name", "");

    let audits = retry("ListAudits", ctx.read_policy, move || ctx.audit.list_audits())
        .await
        .map_err(fail(&resource.id))?;

    let audits: Vec<AuditSummary> = audits
        .into_iter()
        .filter(|a| name.is_empty() || a.audit_name.as_deref() == Some(name))
        .collect();
    let ids: Vec<String> = audits.iter().filter_map(|a| a.audit_name.clone()).collect();
    let items = audits.into_iter().map(item).collect();
    finish(resource, "audit_list", items, &ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;

    fn mock() -> std::sync::Arc<MockTransport> {
        MockTransport::new(|_, _| {
            Ok(json!({"AuditSummarys": [
                {"AuditName": "trail", "AuditStatus": 1, "CosBucketName": "logs", "LogFilePrefix": "ap"},
                {"AuditName": "other", "AuditStatus": 0, "CosBucketName": "logs2", "LogFilePrefix": "eu"}
            ]}))
        })
    }

    #[tokio::test]
    async fn name_filter_is_exact() {
        let mock = mock();
        let ctx = context(&mock);

        let state = read(&ctx, &resource(TYPE, &[("name", s("trail"))]))
            .await
            .unwrap();

        let list = state.attributes["audit_list"].as_list().unwrap();
        assert_eq!(list.len(), 1);
        let audit = list[0].as_map().unwrap();
        assert_eq!(audit["id"], s("trail"));
        assert_eq!(audit["audit_switch"], Value::Bool(true));
    }

    #[tokio::test]
    async fn result_file_receives_every_audit() {
        let mock = mock();
        let ctx = context(&mock);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audits.json");

        read(
            &ctx,
            &resource(TYPE, &[("result_output_file", s(path.to_str().unwrap()))]),
        )
        .await
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 2);
        assert_eq!(written[1]["audit_switch"], json!(false));
    }
}
