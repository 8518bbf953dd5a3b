//! Cloud Audit facade (read-only)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ServiceClient;
use crate::client::{ApiError, ApiTransport, Endpoint};

/// Item of `ListAudits.AuditSummarys`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuditSummary {
    pub audit_name: Option<String>,
    /// 1 logging, 0 stopped
    pub audit_status: Option<i64>,
    pub cos_bucket_name: Option<String>,
    pub log_file_prefix: Option<String>,
}

#[derive(Clone)]
pub struct AuditService {
    client: ServiceClient,
}

impl AuditService {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            client: ServiceClient::new(transport, Endpoint::Audit),
        }
    }

    pub async fn list_audits(&self) -> Result<Vec<AuditSummary>, ApiError> {
        #[derive(Serialize)]
        struct Request {}
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Response {
            audit_summarys: Option<Vec<AuditSummary>>,
        }

        let response: Response = self.client.invoke("ListAudits", &Request {}).await?;
        response
            .audit_summarys
            .ok_or_else(|| ApiError::empty_response("ListAudits"))
    }
}
