//! 浏览器表单页面 - 基础设施层
//!
//! 持有唯一的 page 资源，通过执行 JS 实现 `FormDocument`

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::RetrievalError;
use crate::infrastructure::FormDocument;
use crate::locator::{FieldRef, LookupMode};

/// 页面就绪检查间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 浏览器页面
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 把字段操作翻译成 JS
/// - 不认识报关单，不处理回退流程
pub struct BrowserDocument {
    page: Page,
    // 批次结束时随页面一起释放浏览器连接
    _browser: Option<Browser>,
}

impl BrowserDocument {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            _browser: None,
        }
    }

    /// 同时接管浏览器连接的所有权
    pub fn with_browser(browser: Browser, page: Page) -> Self {
        Self {
            page,
            _browser: Some(browser),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, RetrievalError> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, RetrievalError> {
        let json_value = self.eval(js_code).await?;
        Ok(serde_json::from_value(json_value)?)
    }

    /// 生成获取元素的 JS 表达式
    fn element_expr(identifier: &str, mode: LookupMode) -> Result<String, RetrievalError> {
        let quoted = serde_json::to_string(identifier)?;
        Ok(match mode {
            LookupMode::ById => format!("document.getElementById({})", quoted),
            LookupMode::ByName => format!("document.getElementsByName({})[0] || null", quoted),
        })
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), RetrievalError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state: String = self.eval_as("document.readyState").await?;
            if state == "complete" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RetrievalError::Timeout(timeout));
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl FormDocument for BrowserDocument {
    async fn open(&self, url: &str) -> Result<(), RetrievalError> {
        debug!("打开表单页面: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn has_field(&self, identifier: &str, mode: LookupMode) -> Result<bool, RetrievalError> {
        let js_code = format!("({}) !== null", Self::element_expr(identifier, mode)?);
        self.eval_as(js_code).await
    }

    async fn fill(&self, field: &FieldRef, value: &str) -> Result<(), RetrievalError> {
        let js_code = format!(
            r#"
            (() => {{
                const el = {};
                if (!el) return false;
                el.focus();
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            Self::element_expr(&field.identifier, field.mode)?,
            serde_json::to_string(value)?
        );

        if self.eval_as::<bool>(js_code).await? {
            Ok(())
        } else {
            Err(RetrievalError::field_not_found(&field.field))
        }
    }

    async fn click(&self, field: &FieldRef) -> Result<(), RetrievalError> {
        let js_code = format!(
            r#"
            (() => {{
                const el = {};
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            Self::element_expr(&field.identifier, field.mode)?
        );

        if self.eval_as::<bool>(js_code).await? {
            Ok(())
        } else {
            Err(RetrievalError::field_not_found(&field.field))
        }
    }

    async fn capture_document(&self, timeout: Duration) -> Result<Vec<u8>, RetrievalError> {
        self.wait_until_ready(timeout).await?;
        let bytes = self.page.pdf(PrintToPdfParams::default()).await?;
        if bytes.is_empty() {
            return Err(RetrievalError::InvalidPayload("结果页导出为空".to_string()));
        }
        Ok(bytes)
    }

    async fn title(&self) -> Result<String, RetrievalError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn location(&self) -> Result<String, RetrievalError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn field_identifiers(&self) -> Result<Vec<String>, RetrievalError> {
        self.eval_as(
            r#"
            Array.from(document.querySelectorAll('input, select, textarea, button'))
                .map(el => el.id || el.name)
                .filter(Boolean)
            "#,
        )
        .await
    }
}
