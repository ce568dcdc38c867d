use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// 等待浏览器状态同步
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// 连接到已开启调试端口的浏览器并获取页面
///
/// 优先复用标题匹配的标签页，否则新开一个并导航到 `target_url`
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .with_context(|| format!("无法连接到浏览器 (端口: {})", port))?;

    // 在后台处理浏览器事件，连接释放后自然退出
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(SETTLE_DELAY).await;

    if let Some(title) = target_title {
        let pages = browser.pages().await?;
        debug!("获取到 {} 个页面，查找标题包含 '{}' 的页面", pages.len(), title);
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 找到目标页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
    }

    let page = browser
        .new_page(target_url.unwrap_or("about:blank"))
        .await
        .context("创建新页面失败")?;
    if let Some(url) = target_url {
        info!("已导航到: {}", url);
    }

    Ok((browser, page))
}
