//! 批次编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **去重筛选**：跳过去重存储中已有的报关单（强制重处理除外）
//! 2. **顺序处理**：按输入顺序逐张调用取件引擎，不并发
//! 3. **落盘**：成功后交给输出端写文件，再写去重存储，写完才处理下一张
//! 4. **进度与取消**：每张结束后回报进度，只在两张之间检查取消
//!
//! 单张失败不会中止批次；只有去重存储本身失败才会中止，之前完成的记录全部保留。

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{BatchError, StoreError, StoreResult};
use crate::models::{Identity, RetrievalResult, StrategyKind, WorkItem};
use crate::orchestrator::CancellationToken;
use crate::retrieval::{RetrievalEngine, StrategyFactory};
use crate::services::{DiagnosticSink, OutputWriter, StrategyHealthTracker};
use crate::store::TrackingStore;
use crate::utils::logging;

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 输入的报关单总数
    pub total: usize,
    /// 因已处理或批内重复而跳过
    pub skipped_as_duplicate: usize,
    /// 实际交给引擎的数量
    pub attempted: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// 已完整结束的数量（成功 + 失败）
    pub completed_count: usize,
    /// 是否因取消而提前结束
    pub cancelled: bool,
    /// 批次结束时各策略的连续失败计数
    pub strategy_failures: BTreeMap<StrategyKind, u32>,
    pub elapsed: Duration,
}

/// 单张报关单结束后的进度
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// 从 1 开始
    pub current: usize,
    /// 本批待处理总数（已去掉跳过的）
    pub total: usize,
    pub identity: Identity,
    pub success: bool,
    /// 成功时使用的策略
    pub strategy_used: Option<StrategyKind>,
}

/// 后台批次的句柄
pub struct BatchHandle {
    pub progress: mpsc::UnboundedReceiver<BatchProgress>,
    cancel: CancellationToken,
    join: JoinHandle<Result<BatchSummary, BatchError>>,
}

impl BatchHandle {
    /// 请求取消，当前报关单处理完后停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<BatchSummary, BatchError> {
        self.join
            .await
            .map_err(|e| BatchError::Worker(e.to_string()))?
    }
}

/// 批次编排器
///
/// 同一份去重存储同一时间只允许一个批次运行，
/// 共用存储的多个编排器（包括克隆）之间互斥
#[derive(Clone)]
pub struct BatchOrchestrator {
    factory: Arc<dyn StrategyFactory>,
    store: Arc<Mutex<TrackingStore>>,
    writer: Arc<dyn OutputWriter>,
    sink: Arc<dyn DiagnosticSink>,
    failure_threshold: u32,
    run_log: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(
        factory: Arc<dyn StrategyFactory>,
        store: Arc<Mutex<TrackingStore>>,
        writer: Arc<dyn OutputWriter>,
        sink: Arc<dyn DiagnosticSink>,
        failure_threshold: u32,
    ) -> Self {
        Self {
            factory,
            store,
            writer,
            sink,
            failure_threshold,
            run_log: None,
        }
    }

    /// 每张报关单的结果同时追加到运行日志文件
    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    pub fn store(&self) -> &Arc<Mutex<TrackingStore>> {
        &self.store
    }

    /// 在后台任务中运行批次，进度通过通道发送
    pub fn spawn(&self, items: Vec<WorkItem>, force_reprocess: bool) -> BatchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let orchestrator = self.clone();

        let join = tokio::spawn(async move {
            orchestrator
                .run(
                    items,
                    force_reprocess,
                    |progress| {
                        // 接收端已关闭时进度直接丢弃
                        let _ = tx.send(progress.clone());
                    },
                    &token,
                )
                .await
        });

        BatchHandle {
            progress: rx,
            cancel,
            join,
        }
    }

    /// 运行一个批次
    pub async fn run<F>(
        &self,
        items: Vec<WorkItem>,
        force_reprocess: bool,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, BatchError>
    where
        F: FnMut(&BatchProgress),
    {
        let _active = ActiveBatch::acquire(&self.store)?;
        let started = Instant::now();

        let mut summary = BatchSummary {
            total: items.len(),
            ..Default::default()
        };
        let pending = self.filter_pending(items, force_reprocess, &mut summary)?;
        logging::log_batch_start(summary.total, pending.len(), summary.skipped_as_duplicate);

        if pending.is_empty() {
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        // 会话在批次开始时建立，随引擎在批次结束时释放
        let strategies = self
            .factory
            .open_session()
            .await
            .map_err(|e| BatchError::Session(format!("{:#}", e)))?;
        let mut engine = RetrievalEngine::new(
            strategies,
            StrategyHealthTracker::new(self.failure_threshold),
            self.sink.clone(),
        );

        let total = pending.len();
        for (index, item) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("⏹️ 已取消，剩余 {} 张未处理", total - index);
                summary.cancelled = true;
                break;
            }

            let item_index = index + 1;
            let identity = item.identity();
            info!("[报关单 {}/{}] 开始处理: {}", item_index, total, identity);
            let item_started = Instant::now();

            let result = engine.attempt(item).await;
            summary.attempted += 1;

            let success = self
                .complete_item(item, &identity, &result, force_reprocess)
                .await?;

            if success {
                summary.success_count += 1;
            } else {
                summary.error_count += 1;
            }
            summary.completed_count += 1;

            self.log_outcome(item_index, &identity, &result, success, item_started.elapsed());
            on_progress(&BatchProgress {
                current: item_index,
                total,
                identity,
                success,
                strategy_used: result.strategy_used.filter(|_| success),
            });
        }

        for kind in StrategyKind::PRIORITY {
            summary
                .strategy_failures
                .insert(kind, engine.health().failure_count(kind));
        }
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// 去掉已处理的和批内重复的报关单，保持输入顺序
    fn filter_pending(
        &self,
        items: Vec<WorkItem>,
        force_reprocess: bool,
        summary: &mut BatchSummary,
    ) -> Result<Vec<WorkItem>, BatchError> {
        let store = self.lock_store()?;
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(items.len());

        for item in items {
            let identity = item.identity();
            let already_done = !force_reprocess && store.is_processed(&identity);
            if !seen.insert(identity) || already_done {
                summary.skipped_as_duplicate += 1;
                continue;
            }
            pending.push(item);
        }
        Ok(pending)
    }

    /// 写文件并更新去重存储，返回该报关单是否成功
    ///
    /// 只有去重存储的错误会向上传递
    async fn complete_item(
        &self,
        item: &WorkItem,
        identity: &Identity,
        result: &RetrievalResult,
        force_reprocess: bool,
    ) -> Result<bool, BatchError> {
        let Some(payload) = result.payload.as_deref().filter(|_| result.success) else {
            return Ok(false);
        };

        let location = match self.writer.write(item, payload).await {
            Ok(location) => location,
            Err(e) => {
                error!("[{}] ❌ 条码文件写入失败: {:#}", identity, e);
                return Ok(false);
            }
        };

        self.record_processed(identity, location, force_reprocess)?;
        Ok(true)
    }

    fn record_processed(
        &self,
        identity: &Identity,
        location: String,
        force_reprocess: bool,
    ) -> StoreResult<()> {
        let mut store = self.lock_store()?;
        if !store.is_processed(identity) {
            return store.add_processed(identity.clone(), location);
        }
        if force_reprocess {
            return store.update_processed(identity, location);
        }
        warn!("[{}] 记录已存在，保留原记录", identity);
        Ok(())
    }

    fn lock_store(&self) -> StoreResult<MutexGuard<'_, TrackingStore>> {
        self.store.lock().map_err(|_| StoreError::Poisoned)
    }

    fn log_outcome(
        &self,
        index: usize,
        identity: &Identity,
        result: &RetrievalResult,
        success: bool,
        elapsed: Duration,
    ) {
        let strategy = result.strategy_summary();
        let elapsed_ms = elapsed.as_millis() as u64;
        if success {
            info!(
                identity = %identity,
                strategy = %strategy,
                elapsed_ms,
                "[报关单 {}] ✅ 取件成功",
                index
            );
        } else {
            let reason = result
                .error
                .map(|k| k.to_string())
                .unwrap_or_else(|| "写入失败".to_string());
            warn!(
                identity = %identity,
                attempted = %strategy,
                elapsed_ms,
                reason = %reason,
                "[报关单 {}] ❌ 取件失败",
                index
            );
        }

        if let Some(path) = &self.run_log {
            if let Err(e) = logging::append_outcome(path, identity, success, &strategy, elapsed) {
                warn!("⚠️ 运行日志写入失败: {}", e);
            }
        }
    }
}

/// 运行中批次在去重存储上的占位，释放时清除标记
struct ActiveBatch {
    store: Arc<Mutex<TrackingStore>>,
}

impl ActiveBatch {
    fn acquire(store: &Arc<Mutex<TrackingStore>>) -> Result<Self, BatchError> {
        let started = store
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .begin_batch();
        if !started {
            return Err(BatchError::AlreadyRunning);
        }
        Ok(Self {
            store: store.clone(),
        })
    }
}

impl Drop for ActiveBatch {
    fn drop(&mut self) {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .end_batch();
    }
}
