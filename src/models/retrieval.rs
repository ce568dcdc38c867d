use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;

/// 取件策略，按优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    /// 直接调用接口
    Api,
    /// 主站页面表单
    PrimaryInteractive,
    /// 备用站页面表单
    BackupInteractive,
}

impl StrategyKind {
    /// 固定的尝试顺序
    pub const PRIORITY: [StrategyKind; 3] = [
        StrategyKind::Api,
        StrategyKind::PrimaryInteractive,
        StrategyKind::BackupInteractive,
    ];

    /// 是否为页面交互策略（失败时需要采集诊断快照）
    pub fn is_interactive(self) -> bool {
        !matches!(self, StrategyKind::Api)
    }

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Api => "api",
            StrategyKind::PrimaryInteractive => "primary",
            StrategyKind::BackupInteractive => "backup",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单张报关单的取件结果，由编排器立即消费
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub success: bool,
    pub payload: Option<Vec<u8>>,
    pub strategy_used: Option<StrategyKind>,
    pub error: Option<ErrorKind>,
    /// 实际尝试过的策略（不含被跳过的）
    pub attempted: Vec<StrategyKind>,
}

impl RetrievalResult {
    pub fn succeeded(payload: Vec<u8>, strategy: StrategyKind, attempted: Vec<StrategyKind>) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            strategy_used: Some(strategy),
            error: None,
            attempted,
        }
    }

    pub fn failed(error: ErrorKind, attempted: Vec<StrategyKind>) -> Self {
        Self {
            success: false,
            payload: None,
            strategy_used: None,
            error: Some(error),
            attempted,
        }
    }

    /// 日志用的策略描述：成功时为所用策略，失败时为全部尝试列表
    pub fn strategy_summary(&self) -> String {
        match self.strategy_used {
            Some(kind) => kind.to_string(),
            None if self.attempted.is_empty() => "-".to_string(),
            None => self
                .attempted
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}
