pub mod eligibility;
pub mod loaders;
pub mod retrieval;
pub mod work_item;

pub use eligibility::EligibilityFilter;
pub use loaders::{load_work_items, parse_work_items};
pub use retrieval::{RetrievalResult, StrategyKind};
pub use work_item::{parse_declaration_date, Identity, WorkItem};
