//! 诊断快照写入服务 - 业务能力层
//!
//! 页面策略失败时记录页面标题、地址和页面上所有表单字段，供运维排查。
//! 只写不读。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// 页面诊断快照
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSnapshot {
    pub captured_at: DateTime<Utc>,
    /// 触发快照的场景，例如 `primary` 或 `field:tax_code`
    pub context: String,
    /// 正在处理的报关单
    pub identity: Option<String>,
    pub title: String,
    pub location: String,
    /// 页面上出现的所有字段 id / name
    pub fields: Vec<String>,
}

impl DiagnosticSnapshot {
    pub fn new(title: String, location: String, fields: Vec<String>) -> Self {
        Self {
            captured_at: Utc::now(),
            context: String::new(),
            identity: None,
            title,
            location,
            fields,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// 诊断快照输出端
pub trait DiagnosticSink: Send + Sync {
    /// 写入失败只记日志，不影响取件流程
    fn record(&self, snapshot: &DiagnosticSnapshot);
}

/// 以 JSON Lines 追加写入文件
pub struct FileDiagnosticSink {
    path: PathBuf,
}

impl FileDiagnosticSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, snapshot: &DiagnosticSnapshot) -> anyhow::Result<()> {
        let line = serde_json::to_string(snapshot)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl DiagnosticSink for FileDiagnosticSink {
    fn record(&self, snapshot: &DiagnosticSnapshot) {
        debug!(
            "写入诊断快照: {} | 标题: {} | 字段数: {}",
            snapshot.context,
            snapshot.title,
            snapshot.fields.len()
        );
        if let Err(e) = self.append(snapshot) {
            warn!("⚠️ 诊断快照写入失败 ({}): {}", self.path.display(), e);
        }
    }
}

/// 内存中的快照记录，便于查看最近的诊断信息
#[derive(Default)]
pub struct MemoryDiagnosticSink {
    snapshots: Mutex<Vec<DiagnosticSnapshot>>,
}

impl MemoryDiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<DiagnosticSnapshot> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, snapshot: &DiagnosticSnapshot) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push(snapshot.clone());
        }
    }
}
