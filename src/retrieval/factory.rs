//! 批次会话工厂
//!
//! 每个批次开始时建立一套新的策略（HTTP 会话、浏览器页面），批次结束时随引擎释放

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{BrowserDocument, FormDocument};
use crate::locator::{FieldCandidateSet, FieldLocator, SelectorCache};
use crate::retrieval::{ApiStrategy, InteractiveStrategy, RetrievalStrategy};
use crate::services::DiagnosticSink;

/// 为一个批次建立策略列表
#[async_trait]
pub trait StrategyFactory: Send + Sync {
    async fn open_session(&self) -> Result<Vec<Box<dyn RetrievalStrategy>>>;
}

/// 海关门户的三种策略
pub struct PortalStrategyFactory {
    config: Config,
    cache: Arc<SelectorCache>,
    sink: Arc<dyn DiagnosticSink>,
}

impl PortalStrategyFactory {
    pub fn new(config: Config, cache: Arc<SelectorCache>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            cache,
            sink,
        }
    }

    async fn open_document(&self) -> Result<BrowserDocument> {
        let (browser, page) = if self.config.headless {
            browser::launch_headless_browser(
                self.config.browser_executable.as_deref(),
                &self.config.primary_portal_url,
            )
            .await?
        } else {
            browser::connect_to_browser_and_page(
                self.config.browser_debug_port,
                Some(&self.config.primary_portal_url),
                None,
            )
            .await?
        };
        Ok(BrowserDocument::with_browser(browser, page))
    }
}

#[async_trait]
impl StrategyFactory for PortalStrategyFactory {
    async fn open_session(&self) -> Result<Vec<Box<dyn RetrievalStrategy>>> {
        let mut strategies: Vec<Box<dyn RetrievalStrategy>> = vec![Box::new(ApiStrategy::new(
            &self.config.api_endpoint,
            self.config.api_timeout(),
        )?)];

        // 浏览器不可用时只用接口策略，不中止批次
        match self.open_document().await {
            Ok(document) => {
                let document: Arc<dyn FormDocument> = Arc::new(document);
                let locator = Arc::new(FieldLocator::new(
                    FieldCandidateSet::defaults(),
                    self.cache.clone(),
                    self.sink.clone(),
                ));
                let timeout = self.config.interactive_timeout();
                strategies.push(Box::new(InteractiveStrategy::primary(
                    &self.config.primary_portal_url,
                    timeout,
                    document.clone(),
                    locator.clone(),
                )));
                strategies.push(Box::new(InteractiveStrategy::backup(
                    &self.config.backup_portal_url,
                    timeout,
                    document,
                    locator,
                )));
                info!("✓ 浏览器会话已建立，启用页面策略");
            }
            Err(e) => {
                error!("❌ 无法建立浏览器会话，本批次仅使用接口策略: {:#}", e);
            }
        }

        Ok(strategies)
    }
}
