//! 策略健康度 - 业务能力层
//!
//! 只负责"这个策略还值不值得试"的判断，每个批次新建一份

use std::collections::HashMap;

use tracing::warn;

use crate::models::StrategyKind;

/// 默认连续失败阈值
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// 策略健康度跟踪器
///
/// - 每次失败计数加一
/// - 计数达到阈值后，本批次剩余时间内不再尝试该策略
/// - 一次成功将计数清零
#[derive(Debug, Clone)]
pub struct StrategyHealthTracker {
    threshold: u32,
    failures: HashMap<StrategyKind, u32>,
}

impl StrategyHealthTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
        }
    }

    pub fn should_attempt(&self, kind: StrategyKind) -> bool {
        self.failure_count(kind) < self.threshold
    }

    pub fn record_success(&mut self, kind: StrategyKind) {
        self.failures.insert(kind, 0);
    }

    pub fn record_failure(&mut self, kind: StrategyKind) {
        let count = self.failures.entry(kind).or_insert(0);
        *count += 1;
        if *count == self.threshold {
            warn!(
                "⚠️ 策略 {} 连续失败 {} 次，本批次内不再尝试",
                kind, self.threshold
            );
        }
    }

    pub fn failure_count(&self, kind: StrategyKind) -> u32 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for StrategyHealthTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
