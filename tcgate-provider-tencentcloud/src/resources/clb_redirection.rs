//! tencentcloud_clb_redirection
//!
//! Forwarding from one CLB listener rule to another. Identifier:
//! `sourceRule#targetRule#sourceListener#targetListener#clbId`.
//!
//! Rewrite changes on one load balancer conflict with each other, so create
//! and delete hold `Context::clb_lock` until their task finishes.

use tcgate_core::composite_id::{CompositeKey, IdError, join, split};
use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State};
use tcgate_core::schema::{AttributeSchema, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail};
use crate::services::clb::{Rewrite, RuleOutput};

pub const TYPE: &str = "tencentcloud_clb_redirection";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectionKey(pub Rewrite);

impl CompositeKey for RedirectionKey {
    fn to_id(&self) -> String {
        let r = &self.0;
        join(&[
            &r.source_rule_id,
            &r.target_rule_id,
            &r.source_listener_id,
            &r.target_listener_id,
            &r.clb_id,
        ])
    }

    fn parse_id(id: &str) -> Result<Self, IdError> {
        let [source_rule_id, target_rule_id, source_listener_id, target_listener_id, clb_id] =
            split::<5>(id)?;
        Ok(Self(Rewrite {
            clb_id,
            source_listener_id,
            target_listener_id,
            source_rule_id,
            target_rule_id,
        }))
    }
}

const FIELDS: [&str; 5] = [
    "clb_id",
    "source_listener_id",
    "target_listener_id",
    "source_rule_id",
    "target_rule_id",
];

pub fn schema() -> ResourceSchema {
    FIELDS
        .into_iter()
        .map(|name| {
            AttributeSchema::new(name, types::non_empty_string())
                .required()
                .force_new()
        })
        .fold(
            ResourceSchema::new(TYPE).with_description("Redirection between two CLB rules"),
            ResourceSchema::attribute,
        )
        .importable()
}

fn rewrite_of(attrs: &Attributes<'_>) -> ProviderResult<Rewrite> {
    Ok(Rewrite {
        clb_id: attrs.required_str("clb_id")?.to_string(),
        source_listener_id: attrs.required_str("source_listener_id")?.to_string(),
        target_listener_id: attrs.required_str("target_listener_id")?.to_string(),
        source_rule_id: attrs.required_str("source_rule_id")?.to_string(),
        target_rule_id: attrs.required_str("target_rule_id")?.to_string(),
    })
}

fn points_at(rule: &RuleOutput, rewrite: &Rewrite) -> bool {
    rule.rewrite_target.as_ref().is_some_and(|target| {
        target.target_listener_id.as_deref() == Some(rewrite.target_listener_id.as_str())
            && target.target_location_id.as_deref() == Some(rewrite.target_rule_id.as_str())
    })
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let key = RedirectionKey(rewrite_of(&attrs)?);
    let id = &resource.id;

    {
        let _guard = ctx.clb_lock.lock().await;
        let rewrite = &key.0;
        let task = retry("ManualRewrite", ctx.write_policy, move || {
            ctx.clb.manual_rewrite(rewrite)
        })
        .await
        .map_err(fail(id))?;
        log::debug!("{id}: waiting for clb task {task}");
        ctx.clb
            .wait_for_task(&task, ctx.write_policy)
            .await
            .map_err(fail(id))?;
    }

    read(ctx, id, &key.to_id()).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let Ok(key) = RedirectionKey::parse_id(identifier) else {
        log::warn!("{id}: malformed clb redirection id '{identifier}'");
        return Ok(State::not_found(id.clone()));
    };
    let rewrite = &key.0;

    let rules = retry("DescribeRewrite", ctx.read_policy, move || {
        ctx.clb.describe_rewrite(
            &rewrite.clb_id,
            &rewrite.source_listener_id,
            &rewrite.source_rule_id,
        )
    })
    .await
    .map_err(fail(id))?;

    if !rules.iter().any(|rule| points_at(rule, rewrite)) {
        return Ok(State::not_found(id.clone()));
    }
    Ok(Outputs::new()
        .set("clb_id", rewrite.clb_id.as_str())
        .set("source_listener_id", rewrite.source_listener_id.as_str())
        .set("target_listener_id", rewrite.target_listener_id.as_str())
        .set("source_rule_id", rewrite.source_rule_id.as_str())
        .set("target_rule_id", rewrite.target_rule_id.as_str())
        .into_state(id, identifier))
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = RedirectionKey::parse_id(identifier) else {
        return Ok(());
    };
    let rewrite = &key.0;

    let _guard = ctx.clb_lock.lock().await;
    let task = retry("DeleteRewrite", ctx.write_policy, move || {
        ctx.clb.delete_rewrite(rewrite)
    })
    .await
    .map_err(fail(id))?;
    ctx.clb
        .wait_for_task(&task, ctx.write_policy)
        .await
        .map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    const ID: &str = "loc-src#loc-dst#lbl-src#lbl-dst#lb-1";

    fn desired() -> Resource {
        resource(
            TYPE,
            &[
                ("clb_id", s("lb-1")),
                ("source_listener_id", s("lbl-src")),
                ("target_listener_id", s("lbl-dst")),
                ("source_rule_id", s("loc-src")),
                ("target_rule_id", s("loc-dst")),
            ],
        )
    }

    fn backend() -> std::sync::Arc<MockTransport> {
        let rewritten = Mutex::new(false);
        MockTransport::new(move |action, _| {
            let mut rewritten = rewritten.lock().unwrap();
            match action {
                "ManualRewrite" => {
                    *rewritten = true;
                    Ok(json!({"RequestId": "task-1"}))
                }
                "DeleteRewrite" => {
                    *rewritten = false;
                    Ok(json!({"RequestId": "task-2"}))
                }
                "DescribeTaskStatus" => Ok(json!({"Status": 0})),
                "DescribeRewrite" => {
                    let target = (*rewritten).then(|| {
                        json!({"TargetListenerId": "lbl-dst", "TargetLocationId": "loc-dst"})
                    });
                    Ok(json!({"RewriteSet": [{
                        "LocationId": "loc-src",
                        "ListenerId": "lbl-src",
                        "Domain": "example.com",
                        "Url": "/",
                        "RewriteTarget": target,
                    }]}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    #[test]
    fn id_keeps_rule_first_order() {
        let key = RedirectionKey::parse_id(ID).unwrap();
        assert_eq!(key.0.clb_id, "lb-1");
        assert_eq!(key.0.source_rule_id, "loc-src");
        assert_eq!(key.to_id(), ID);
    }

    #[tokio::test]
    async fn create_waits_for_task() {
        let mock = backend();
        let ctx = context(&mock);

        let state = create(&ctx, &desired()).await.unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some(ID));
        assert_eq!(
            mock.actions(),
            vec!["ManualRewrite", "DescribeTaskStatus", "DescribeRewrite"]
        );
        let sent = &mock.payloads("ManualRewrite")[0];
        assert_eq!(sent["RewriteInfos"][0]["TargetLocationId"], json!("loc-dst"));
    }

    #[tokio::test]
    async fn short_id_reads_as_missing() {
        let mock = backend();
        let ctx = context(&mock);

        let state = read(&ctx, &ResourceId::new(TYPE, "test"), "loc-src#loc-dst")
            .await
            .unwrap();
        assert!(!state.exists);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn unmatched_rewrite_reads_as_missing() {
        let mock = backend();
        let ctx = context(&mock);

        let state = read(&ctx, &ResourceId::new(TYPE, "test"), ID).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn failed_task_surfaces() {
        let mock = MockTransport::new(|action, _| match action {
            "DeleteRewrite" => Ok(json!({"RequestId": "task-9"})),
            "DescribeTaskStatus" => Ok(json!({"Status": 1})),
            other => panic!("unexpected action {other}"),
        });
        let ctx = context(&mock);

        let err = delete(&ctx, &ResourceId::new(TYPE, "test"), ID)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("task-9 failed"));
    }
}
