//! 取件层
//!
//! ```text
//! RetrievalEngine (按优先级回退)
//!     ├── ApiStrategy              接口
//!     ├── InteractiveStrategy      主站页面
//!     └── InteractiveStrategy      备用站页面
//!             ↓
//!         FieldLocator → FormDocument
//! ```

pub mod api_strategy;
pub mod engine;
pub mod factory;
pub mod interactive_strategy;
pub mod strategy;

pub use api_strategy::ApiStrategy;
pub use engine::RetrievalEngine;
pub use factory::{PortalStrategyFactory, StrategyFactory};
pub use interactive_strategy::InteractiveStrategy;
pub use strategy::RetrievalStrategy;
