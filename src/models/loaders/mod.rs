pub mod toml_loader;

pub use toml_loader::{load_work_items, parse_work_items};
