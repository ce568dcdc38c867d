//! 取件引擎
//!
//! 按固定优先级依次尝试各策略：
//! 1. 健康检查不通过的策略直接跳过
//! 2. 成功立即返回，不再尝试后续策略
//! 3. 失败记入健康度，页面策略额外写诊断快照，然后落到下一个策略

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ErrorKind, RetrievalError};
use crate::models::{RetrievalResult, WorkItem};
use crate::retrieval::RetrievalStrategy;
use crate::services::{DiagnosticSink, StrategyHealthTracker};

/// 采集诊断快照的时间上限
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// 取件引擎
///
/// 独占本批次的全部策略及其会话，批次结束时随引擎一起释放
pub struct RetrievalEngine {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
    health: StrategyHealthTracker,
    sink: Arc<dyn DiagnosticSink>,
}

impl RetrievalEngine {
    pub fn new(
        mut strategies: Vec<Box<dyn RetrievalStrategy>>,
        health: StrategyHealthTracker,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        strategies.sort_by_key(|s| s.kind());
        Self {
            strategies,
            health,
            sink,
        }
    }

    pub fn health(&self) -> &StrategyHealthTracker {
        &self.health
    }

    /// 为一张报关单取条码
    pub async fn attempt(&mut self, item: &WorkItem) -> RetrievalResult {
        let identity = item.identity();
        let mut attempted = Vec::new();
        let mut last_error = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !self.health.should_attempt(kind) {
                debug!("[{}] 跳过策略 {}（本批次已停用）", identity, kind);
                continue;
            }
            attempted.push(kind);

            let limit = strategy.timeout();
            let outcome = match timeout(limit, strategy.attempt(item)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RetrievalError::Timeout(limit)),
            };

            match outcome {
                Ok(payload) => {
                    self.health.record_success(kind);
                    return RetrievalResult::succeeded(payload, kind, attempted);
                }
                Err(e) => {
                    warn!("[{}] 策略 {} 失败: {}", identity, kind, e);
                    self.health.record_failure(kind);
                    last_error = Some(e.kind());

                    if kind.is_interactive() {
                        match timeout(SNAPSHOT_TIMEOUT, strategy.diagnostic_snapshot()).await {
                            Ok(Some(snapshot)) => self.sink.record(
                                &snapshot
                                    .with_context(kind.name())
                                    .with_identity(identity.to_string()),
                            ),
                            Ok(None) => {}
                            Err(_) => warn!("[{}] 诊断快照采集超时", identity),
                        }
                    }
                }
            }
        }

        RetrievalResult::failed(last_error.unwrap_or(ErrorKind::Skipped), attempted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyKind;
    use crate::services::{DiagnosticSnapshot, MemoryDiagnosticSink};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Step {
        Ok,
        Fail(RetrievalError),
        Hang,
    }

    struct Scripted {
        kind: StrategyKind,
        steps: Mutex<VecDeque<Step>>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn boxed(kind: StrategyKind, steps: Vec<Step>) -> (Box<dyn RetrievalStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Scripted {
                kind,
                steps: Mutex::new(steps.into()),
                calls: calls.clone(),
            };
            (Box::new(strategy), calls)
        }
    }

    #[async_trait]
    impl RetrievalStrategy for Scripted {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn attempt(&self, _item: &WorkItem) -> Result<Vec<u8>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(format!("%PDF-{}", self.kind).into_bytes()),
                Step::Fail(e) => Err(e),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn diagnostic_snapshot(&self) -> Option<DiagnosticSnapshot> {
            Some(DiagnosticSnapshot::new(
                "Tra cứu".to_string(),
                "https://portal".to_string(),
                vec!["txtSoToKhai".to_string()],
            ))
        }
    }

    fn item() -> WorkItem {
        WorkItem::new(
            "305123456780",
            "0101234567",
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "01B1",
        )
    }

    fn refused() -> RetrievalError {
        RetrievalError::connection("api", "connection refused")
    }

    #[tokio::test]
    async fn first_success_stops_the_chain() {
        let (api, api_calls) = Scripted::boxed(StrategyKind::Api, vec![Step::Ok]);
        let (primary, primary_calls) = Scripted::boxed(StrategyKind::PrimaryInteractive, vec![]);
        let mut engine = RetrievalEngine::new(
            vec![primary, api],
            StrategyHealthTracker::default(),
            Arc::new(MemoryDiagnosticSink::new()),
        );

        let result = engine.attempt(&item()).await;

        assert!(result.success);
        assert_eq!(result.strategy_used, Some(StrategyKind::Api));
        assert_eq!(result.attempted, vec![StrategyKind::Api]);
        assert_eq!(api_calls.load(Ordering::SeqCst), 1);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_falls_through_to_primary() {
        let (api, _) = Scripted::boxed(StrategyKind::Api, vec![Step::Hang]);
        let (primary, _) = Scripted::boxed(StrategyKind::PrimaryInteractive, vec![Step::Ok]);
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let mut engine = RetrievalEngine::new(vec![api, primary], StrategyHealthTracker::default(), sink.clone());

        let result = engine.attempt(&item()).await;

        assert!(result.success);
        assert_eq!(result.strategy_used, Some(StrategyKind::PrimaryInteractive));
        assert_eq!(engine.health().failure_count(StrategyKind::Api), 1);
        assert!(engine.health().should_attempt(StrategyKind::Api));
        // 接口策略失败不采集页面快照
        assert!(sink.snapshots().is_empty());
    }

    #[tokio::test]
    async fn single_timeout_mid_batch_keeps_api_eligible() {
        let (api, api_calls) = Scripted::boxed(
            StrategyKind::Api,
            vec![Step::Ok, Step::Ok, Step::Hang, Step::Ok, Step::Ok],
        );
        let (primary, primary_calls) = Scripted::boxed(StrategyKind::PrimaryInteractive, vec![]);
        let mut engine = RetrievalEngine::new(
            vec![api, primary],
            StrategyHealthTracker::default(),
            Arc::new(MemoryDiagnosticSink::new()),
        );

        let mut used = Vec::new();
        for n in 1..=5 {
            let result = engine.attempt(&item()).await;
            assert!(result.success);
            used.push(result.strategy_used.unwrap());
            if n == 3 {
                assert_eq!(engine.health().failure_count(StrategyKind::Api), 1);
                assert!(engine.health().should_attempt(StrategyKind::Api));
            }
        }

        assert_eq!(used[2], StrategyKind::PrimaryInteractive);
        assert_eq!(used.iter().filter(|k| **k == StrategyKind::Api).count(), 4);
        assert_eq!(api_calls.load(Ordering::SeqCst), 5);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempted_strategies_and_snapshots() {
        let (api, _) = Scripted::boxed(StrategyKind::Api, vec![Step::Fail(refused())]);
        let (primary, _) = Scripted::boxed(
            StrategyKind::PrimaryInteractive,
            vec![Step::Fail(RetrievalError::field_not_found("tax_code"))],
        );
        let (backup, _) = Scripted::boxed(
            StrategyKind::BackupInteractive,
            vec![Step::Fail(RetrievalError::field_not_found("tax_code"))],
        );
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let mut engine =
            RetrievalEngine::new(vec![backup, api, primary], StrategyHealthTracker::default(), sink.clone());

        let result = engine.attempt(&item()).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::FieldNotFound));
        assert_eq!(result.attempted, StrategyKind::PRIORITY.to_vec());
        let snapshots = sink.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].context, "primary");
        assert_eq!(snapshots[1].context, "backup");
        assert_eq!(
            snapshots[0].identity.as_deref(),
            Some("305123456780/0101234567/2024-03-15/01B1")
        );
    }

    #[tokio::test]
    async fn unhealthy_strategy_is_skipped_for_rest_of_batch() {
        let (api, api_calls) = Scripted::boxed(
            StrategyKind::Api,
            vec![Step::Fail(refused()), Step::Fail(refused()), Step::Fail(refused())],
        );
        let (primary, _) = Scripted::boxed(StrategyKind::PrimaryInteractive, vec![]);
        let mut engine = RetrievalEngine::new(
            vec![api, primary],
            StrategyHealthTracker::default(),
            Arc::new(MemoryDiagnosticSink::new()),
        );

        for _ in 0..5 {
            assert!(engine.attempt(&item()).await.success);
        }

        assert_eq!(api_calls.load(Ordering::SeqCst), 3);
        assert!(!engine.health().should_attempt(StrategyKind::Api));
    }

    #[tokio::test]
    async fn everything_skipped_is_reported_as_skipped() {
        let (api, _) = Scripted::boxed(StrategyKind::Api, vec![Step::Fail(refused())]);
        let mut engine = RetrievalEngine::new(
            vec![api],
            StrategyHealthTracker::new(1),
            Arc::new(MemoryDiagnosticSink::new()),
        );

        let first = engine.attempt(&item()).await;
        assert_eq!(first.error, Some(ErrorKind::Connection));

        let second = engine.attempt(&item()).await;
        assert!(!second.success);
        assert!(second.attempted.is_empty());
        assert_eq!(second.error, Some(ErrorKind::Skipped));
    }
}
