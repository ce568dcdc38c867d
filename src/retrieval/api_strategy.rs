//! 接口策略：直接向条码接口提交报关单标识

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::RetrievalError;
use crate::models::{StrategyKind, WorkItem};
use crate::retrieval::strategy::{ensure_pdf, RetrievalStrategy};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BarcodeRequest<'a> {
    declaration_number: &'a str,
    tax_code: &'a str,
    /// dd/mm/yyyy
    declaration_date: String,
    customs_office_code: &'a str,
}

/// 接口策略
///
/// 持有本批次独占的 HTTP 会话
pub struct ApiStrategy {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl ApiStrategy {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RetrievalError> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::connection(&endpoint, e))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout(self.timeout)
        } else {
            RetrievalError::connection(&self.endpoint, err)
        }
    }
}

#[async_trait]
impl RetrievalStrategy for ApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, item: &WorkItem) -> Result<Vec<u8>, RetrievalError> {
        let request = BarcodeRequest {
            declaration_number: &item.declaration_number,
            tax_code: &item.tax_code,
            declaration_date: item.declaration_date.format("%d/%m/%Y").to_string(),
            customs_office_code: &item.customs_office_code,
        };
        debug!("接口请求: {} {:?}", self.endpoint, request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/pdf, application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(RetrievalError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: Some(status.as_u16()),
                message: crate::utils::truncate_text(&body, 120),
            });
        }

        ensure_pdf(bytes.to_vec())
    }
}
