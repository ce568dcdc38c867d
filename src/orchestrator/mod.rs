//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度，是整个系统的"指挥中心"。
//!
//! ### `batch_orchestrator` - 批次编排器
//! - 按去重存储筛掉已处理的报关单
//! - 为每个批次建立会话和全新的策略健康度
//! - 顺序处理，成功即落盘并写存储
//! - 回报进度，响应取消，输出统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_orchestrator (处理 Vec<WorkItem>)
//!     ↓
//! retrieval::RetrievalEngine (处理单张报关单)
//!     ↓
//! locator / services (字段定位、健康度、诊断、输出)
//!     ↓
//! infrastructure (FormDocument)
//! ```

pub mod batch_orchestrator;
pub mod cancellation;

pub use batch_orchestrator::{BatchHandle, BatchOrchestrator, BatchProgress, BatchSummary};
pub use cancellation::CancellationToken;
