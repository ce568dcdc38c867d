//! 表单页面抽象 - 基础设施层
//!
//! 页面策略和字段定位器只通过这个接口操作页面，不直接接触浏览器

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RetrievalError;
use crate::locator::{FieldRef, LookupMode};
use crate::services::DiagnosticSnapshot;

/// 可以定位、填写、提交的表单页面
#[async_trait]
pub trait FormDocument: Send + Sync {
    /// 打开表单页面
    async fn open(&self, url: &str) -> Result<(), RetrievalError>;

    /// 页面上是否存在该字段
    async fn has_field(&self, identifier: &str, mode: LookupMode) -> Result<bool, RetrievalError>;

    async fn fill(&self, field: &FieldRef, value: &str) -> Result<(), RetrievalError>;

    async fn click(&self, field: &FieldRef) -> Result<(), RetrievalError>;

    /// 导出当前结果页为条码文件
    async fn capture_document(&self, timeout: Duration) -> Result<Vec<u8>, RetrievalError>;

    async fn title(&self) -> Result<String, RetrievalError>;

    async fn location(&self) -> Result<String, RetrievalError>;

    /// 页面上所有表单字段的 id / name
    async fn field_identifiers(&self) -> Result<Vec<String>, RetrievalError>;

    /// 采集诊断快照，单项失败时以空值代替
    async fn snapshot(&self) -> DiagnosticSnapshot {
        let title = self.title().await.unwrap_or_default();
        let location = self.location().await.unwrap_or_default();
        let fields = self.field_identifiers().await.unwrap_or_default();
        DiagnosticSnapshot::new(title, location, fields)
    }
}
