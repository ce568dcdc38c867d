use std::path::Path;

use anyhow::{anyhow, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

use super::connection::SETTLE_DELAY;

/// 启动无头浏览器并导航到指定 URL
///
/// 未指定可执行文件时由 chromiumoxide 自行查找本机 Chrome / Chromium
pub async fn launch_headless_browser(executable: Option<&str>, url: &str) -> Result<(Browser, Page)> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
    ]);
    if let Some(path) = executable {
        debug!("浏览器可执行文件: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }
    let config = builder
        .build()
        .map_err(|e| anyhow!("配置无头浏览器失败: {}", e))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow!("启动无头浏览器失败: {}", e))?;

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(SETTLE_DELAY).await;

    let page = browser
        .new_page(url)
        .await
        .map_err(|e| anyhow!("创建页面失败: {}", e))?;

    info!("✅ 无头浏览器已导航到: {}", url);
    Ok((browser, page))
}
