//! CLB facade: listener rule redirection
//!
//! Rewrite actions are asynchronous. The request id they return doubles as a
//! task id for `DescribeTaskStatus`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tcgate_core::poll::{PollError, PollPolicy, poll_until};

use super::ServiceClient;
use crate::client::{ApiError, ApiTransport, Endpoint};

pub const TASK_SUCCEEDED: i64 = 0;
pub const TASK_FAILED: i64 = 1;
pub const TASK_RUNNING: i64 = 2;

/// Source and target of one redirection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub clb_id: String,
    pub source_listener_id: String,
    pub target_listener_id: String,
    pub source_rule_id: String,
    pub target_rule_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RewriteLocationMap<'a> {
    source_location_id: &'a str,
    target_location_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RewriteRequest<'a> {
    load_balancer_id: &'a str,
    source_listener_id: &'a str,
    target_listener_id: &'a str,
    rewrite_infos: [RewriteLocationMap<'a>; 1],
}

impl<'a> From<&'a Rewrite> for RewriteRequest<'a> {
    fn from(rewrite: &'a Rewrite) -> Self {
        Self {
            load_balancer_id: &rewrite.clb_id,
            source_listener_id: &rewrite.source_listener_id,
            target_listener_id: &rewrite.target_listener_id,
            rewrite_infos: [RewriteLocationMap {
                source_location_id: &rewrite.source_rule_id,
                target_location_id: &rewrite.target_rule_id,
            }],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskResponse {
    request_id: Option<String>,
}

/// Item of `DescribeRewrite.RewriteSet`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleOutput {
    pub location_id: Option<String>,
    pub listener_id: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub rewrite_target: Option<RewriteTarget>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RewriteTarget {
    pub target_listener_id: Option<String>,
    pub target_location_id: Option<String>,
}

#[derive(Clone)]
pub struct ClbService {
    client: ServiceClient,
}

impl ClbService {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            client: ServiceClient::new(transport, Endpoint::Clb),
        }
    }

    /// Start a `ManualRewrite`; returns the task id
    pub async fn manual_rewrite(&self, rewrite: &Rewrite) -> Result<String, ApiError> {
        self.start_task("ManualRewrite", rewrite).await
    }

    /// Start a `DeleteRewrite`; returns the task id
    pub async fn delete_rewrite(&self, rewrite: &Rewrite) -> Result<String, ApiError> {
        self.start_task("DeleteRewrite", rewrite).await
    }

    async fn start_task(&self, action: &str, rewrite: &Rewrite) -> Result<String, ApiError> {
        let response: TaskResponse = self
            .client
            .invoke(action, &RewriteRequest::from(rewrite))
            .await?;
        response
            .request_id
            .ok_or_else(|| ApiError::empty_response(action))
    }

    pub async fn describe_task_status(&self, task_id: &str) -> Result<i64, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            task_id: &'a str,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            status: Option<i64>,
        }

        let response: Response = self
            .client
            .invoke("DescribeTaskStatus", &Request { task_id })
            .await?;
        response
            .status
            .ok_or_else(|| ApiError::empty_response("DescribeTaskStatus"))
    }

    /// Poll a task until it leaves the running state
    pub async fn wait_for_task(&self, task_id: &str, policy: PollPolicy) -> Result<(), PollError<ApiError>> {
        let what = format!("clb task {task_id}");
        poll_until(&what, policy, || async {
            match self.describe_task_status(task_id).await {
                Err(e) => Err(e),
                Ok(TASK_SUCCEEDED) => Ok(Some(())),
                Ok(TASK_RUNNING) => Ok(None),
                Ok(TASK_FAILED) => Err(ApiError::Operation(format!("clb task {task_id} failed"))),
                Ok(other) => Err(ApiError::Operation(format!(
                    "clb task {task_id} returned unknown status {other}"
                ))),
            }
        })
        .await
    }

    /// Rewrite rules attached to one source rule
    pub async fn describe_rewrite(
        &self,
        clb_id: &str,
        source_listener_id: &str,
        source_rule_id: &str,
    ) -> Result<Vec<RuleOutput>, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Request<'a> {
            load_balancer_id: &'a str,
            source_listener_ids: [&'a str; 1],
            source_location_ids: [&'a str; 1],
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            rewrite_set: Option<Vec<RuleOutput>>,
        }

        let request = Request {
            load_balancer_id: clb_id,
            source_listener_ids: [source_listener_id],
            source_location_ids: [source_rule_id],
        };
        let response: Response = self.client.invoke("DescribeRewrite", &request).await?;
        Ok(response.rewrite_set.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn rewrite() -> Rewrite {
        Rewrite {
            clb_id: "lb-1".to_string(),
            source_listener_id: "lbl-src".to_string(),
            target_listener_id: "lbl-dst".to_string(),
            source_rule_id: "loc-src".to_string(),
            target_rule_id: "loc-dst".to_string(),
        }
    }

    #[tokio::test]
    async fn manual_rewrite_payload() {
        let mock = MockTransport::new(|_, _| Ok(json!({"RequestId": "task-1"})));
        let clb = ClbService::new(mock.clone());

        assert_eq!(clb.manual_rewrite(&rewrite()).await.unwrap(), "task-1");
        assert_eq!(
            mock.payloads("ManualRewrite")[0],
            json!({
                "LoadBalancerId": "lb-1",
                "SourceListenerId": "lbl-src",
                "TargetListenerId": "lbl-dst",
                "RewriteInfos": [{"SourceLocationId": "loc-src", "TargetLocationId": "loc-dst"}]
            })
        );
        assert_eq!(mock.calls()[0].endpoint, Endpoint::Clb);
    }

    #[tokio::test]
    async fn task_wait_follows_status() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let mock = MockTransport::new(move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let status = if n < 2 { TASK_RUNNING } else { TASK_SUCCEEDED };
            Ok(json!({"Status": status}))
        });
        let clb = ClbService::new(mock.clone());
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_secs(1));

        clb.wait_for_task("task-1", policy).await.unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_task_stops_polling() {
        let mock = MockTransport::new(|_, _| Ok(json!({"Status": TASK_FAILED})));
        let clb = ClbService::new(mock.clone());
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_secs(1));

        let err = clb.wait_for_task("task-9", policy).await.unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "clb task task-9 failed");
        assert_eq!(mock.calls().len(), 1);
    }
}
