//! 字段定位层
//!
//! 把逻辑字段名解析为页面上的具体字段：候选列表 + 带有效期的选择器缓存

pub mod candidates;
pub mod field_locator;
pub mod selector_cache;

pub use candidates::{fields, FieldCandidate, FieldCandidateSet, LookupMode};
pub use field_locator::{FieldLocator, FieldRef};
pub use selector_cache::{SelectorCache, SelectorCacheEntry};
