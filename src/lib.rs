//! # Barcode Fetch
//!
//! 报关单集装箱条码批量取件工具
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `FormDocument` - 页面表单能力：打开、查字段、填写、点击、导出
//! - `browser/` - 连接调试端口或启动无头浏览器
//!
//! ### ② 业务能力层（Services）
//! - `StrategyHealthTracker` - 按批次统计各策略连续失败次数
//! - `DiagnosticSink` - 记录页面诊断快照
//! - `OutputWriter` - 按命名规则写条码文件
//!
//! ### ③ 字段定位层（Locator）
//! - `FieldLocator` - 逻辑字段名 → 页面字段，先查缓存再全量扫描
//! - `SelectorCache` - 成功定位结果缓存，24 小时有效
//!
//! ### ④ 取件层（Retrieval）
//! - `RetrievalEngine` - 接口 → 主站页面 → 备用站页面，依次回退
//! - `StrategyFactory` - 每个批次建立一套新会话
//!
//! ### ⑤ 去重存储（Store）
//! - `TrackingStore` - 已处理报关单记录，每次修改都先落盘
//!
//! ### ⑥ 编排层（Orchestration）
//! - `BatchOrchestrator` - 筛选、顺序处理、进度、取消、统计
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod locator;
pub mod models;
pub mod orchestrator;
pub mod retrieval;
pub mod services;
pub mod store;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{BatchError, ErrorKind, RetrievalError, StoreError};
pub use locator::{FieldLocator, SelectorCache};
pub use models::{Identity, RetrievalResult, StrategyKind, WorkItem};
pub use orchestrator::{BatchHandle, BatchOrchestrator, BatchProgress, BatchSummary, CancellationToken};
pub use retrieval::{RetrievalEngine, RetrievalStrategy, StrategyFactory};
pub use services::StrategyHealthTracker;
pub use store::TrackingStore;
