use async_trait::async_trait;
use std::time::Duration;

use crate::error::RetrievalError;
use crate::models::{StrategyKind, WorkItem};
use crate::services::DiagnosticSnapshot;

/// PDF 文件头
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// 一种获取条码文件的方式
///
/// 引擎按 `kind()` 的优先级依次调用，并用 `timeout()` 限制单次尝试
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn timeout(&self) -> Duration;

    /// 尝试获取一张报关单的条码文件，失败不在本策略内重试
    async fn attempt(&self, item: &WorkItem) -> Result<Vec<u8>, RetrievalError>;

    /// 失败后的页面快照，只有页面策略提供
    async fn diagnostic_snapshot(&self) -> Option<DiagnosticSnapshot> {
        None
    }
}

/// 检查返回内容是否为 PDF
pub fn ensure_pdf(bytes: Vec<u8>) -> Result<Vec<u8>, RetrievalError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(bytes)
    } else {
        let preview: String = String::from_utf8_lossy(&bytes[..bytes.len().min(80)]).into_owned();
        Err(RetrievalError::InvalidPayload(format!(
            "不是 PDF 文件 ({} 字节): {}",
            bytes.len(),
            preview
        )))
    }
}
