//! 基础设施层：持有稀缺资源（浏览器页面），只暴露能力

pub mod browser_document;
pub mod form_document;

pub use browser_document::BrowserDocument;
pub use form_document::FormDocument;
