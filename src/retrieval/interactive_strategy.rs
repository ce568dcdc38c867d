//! 页面策略：在海关查询页面上填写表单、提交并导出结果页
//!
//! 主站与备用站只是页面地址不同，共用同一套流程

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::RetrievalError;
use crate::infrastructure::FormDocument;
use crate::locator::{fields, FieldLocator};
use crate::models::{StrategyKind, WorkItem};
use crate::retrieval::strategy::{ensure_pdf, RetrievalStrategy};
use crate::services::DiagnosticSnapshot;

/// 等待结果区域出现的轮询间隔
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 策略超时中留给最后一次定位和导出的份额（分母）
const FINISH_SHARE: u32 = 5;

pub struct InteractiveStrategy {
    kind: StrategyKind,
    portal_url: String,
    timeout: Duration,
    document: Arc<dyn FormDocument>,
    locator: Arc<FieldLocator>,
}

impl InteractiveStrategy {
    pub fn new(
        kind: StrategyKind,
        portal_url: impl Into<String>,
        timeout: Duration,
        document: Arc<dyn FormDocument>,
        locator: Arc<FieldLocator>,
    ) -> Self {
        debug_assert!(kind.is_interactive());
        Self {
            kind,
            portal_url: portal_url.into(),
            timeout,
            document,
            locator,
        }
    }

    pub fn primary(
        portal_url: impl Into<String>,
        timeout: Duration,
        document: Arc<dyn FormDocument>,
        locator: Arc<FieldLocator>,
    ) -> Self {
        Self::new(StrategyKind::PrimaryInteractive, portal_url, timeout, document, locator)
    }

    pub fn backup(
        portal_url: impl Into<String>,
        timeout: Duration,
        document: Arc<dyn FormDocument>,
        locator: Arc<FieldLocator>,
    ) -> Self {
        Self::new(StrategyKind::BackupInteractive, portal_url, timeout, document, locator)
    }

    /// 表单字段对应的值
    fn field_value(item: &WorkItem, field: &str) -> String {
        match field {
            fields::DECLARATION_NUMBER => item.declaration_number.clone(),
            fields::TAX_CODE => item.tax_code.clone(),
            fields::DECLARATION_DATE => item.declaration_date.format("%d/%m/%Y").to_string(),
            fields::CUSTOMS_OFFICE_CODE => item.customs_office_code.clone(),
            _ => String::new(),
        }
    }

    /// 轮询结果区域直到 `deadline`，之后走一次完整定位以留下诊断快照
    async fn wait_for_result(&self, deadline: Instant) -> Result<(), RetrievalError> {
        let document = self.document.as_ref();
        loop {
            if self.locator.poll(fields::RESULT, document).await?.is_some() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(RESULT_POLL_INTERVAL.min(deadline - now)).await;
        }
        self.locator
            .locate(fields::RESULT, document)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl RetrievalStrategy for InteractiveStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn attempt(&self, item: &WorkItem) -> Result<Vec<u8>, RetrievalError> {
        let finish_by = Instant::now() + self.timeout;
        let result_deadline = finish_by - self.timeout / FINISH_SHARE;

        let document = self.document.as_ref();
        document.open(&self.portal_url).await?;

        for field in fields::INPUTS {
            let field_ref = self.locator.locate(field, document).await?;
            document
                .fill(&field_ref, &Self::field_value(item, field))
                .await?;
        }

        let submit = self.locator.locate(fields::SUBMIT, document).await?;
        document.click(&submit).await?;
        debug!("[{}] 表单已提交: {}", self.kind, item.identity());

        self.wait_for_result(result_deadline).await?;
        let remaining = finish_by.saturating_duration_since(Instant::now());
        ensure_pdf(document.capture_document(remaining).await?)
    }

    async fn diagnostic_snapshot(&self) -> Option<DiagnosticSnapshot> {
        Some(self.document.snapshot().await)
    }
}
