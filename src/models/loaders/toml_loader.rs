use crate::models::WorkItem;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 报关单清单文件格式
///
/// ```toml
/// [[items]]
/// declaration_number = "305123456780"
/// tax_code = "0101234567"
/// declaration_date = "2024-03-15"
/// customs_office_code = "01B1"
/// channel = "green"
/// status = "cleared"
/// ```
#[derive(Debug, Deserialize)]
struct WorkItemFile {
    #[serde(default)]
    items: Vec<WorkItem>,
}

/// 从 TOML 文件加载报关单列表，保持文件中的顺序
pub async fn load_work_items(toml_file_path: &Path) -> Result<Vec<WorkItem>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    parse_work_items(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))
}

/// 解析 TOML 文本
pub fn parse_work_items(content: &str) -> Result<Vec<WorkItem>> {
    let file: WorkItemFile = toml::from_str(content)?;
    tracing::info!("成功加载 {} 张报关单", file.items.len());
    Ok(file.items)
}
