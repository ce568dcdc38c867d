use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::EligibilityFilter;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 取件端点 ---
    /// 条码接口地址
    pub api_endpoint: String,
    /// 主站表单页面
    pub primary_portal_url: String,
    /// 备用站表单页面
    pub backup_portal_url: String,

    // --- 策略参数 ---
    /// 接口策略超时（秒）
    pub api_timeout_secs: u64,
    /// 页面策略超时（秒）
    pub interactive_timeout_secs: u64,
    /// 连续失败多少次后本批次跳过该策略
    pub failure_skip_threshold: u32,
    /// 选择器缓存有效期（小时）
    pub selector_cache_ttl_hours: i64,

    // --- 浏览器 ---
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动无头浏览器
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件
    pub browser_executable: Option<String>,

    // --- 文件位置 ---
    /// 报关单清单
    pub work_items_file: String,
    /// 去重存储文件
    pub store_path: String,
    /// 条码文件输出目录
    pub output_dir: String,
    /// 诊断快照文件
    pub diagnostics_file: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// 选择器缓存文件
    pub selector_cache_file: String,

    /// 上游资格筛选
    pub eligibility: EligibilityFilter,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: "https://pus.customs.gov.vn/api/barcode".to_string(),
            primary_portal_url: "https://pus.customs.gov.vn/faces/ContainerBarcode".to_string(),
            backup_portal_url: "https://pus1.customs.gov.vn/faces/ContainerBarcode".to_string(),
            api_timeout_secs: 10,
            interactive_timeout_secs: 15,
            failure_skip_threshold: 3,
            selector_cache_ttl_hours: 24,
            browser_debug_port: 9222,
            headless: false,
            browser_executable: None,
            work_items_file: "declarations.toml".to_string(),
            store_path: "tracking.json".to_string(),
            output_dir: "barcodes".to_string(),
            diagnostics_file: "diagnostics.jsonl".to_string(),
            output_log_file: "output.txt".to_string(),
            selector_cache_file: "selector_cache.json".to_string(),
            eligibility: EligibilityFilter::default(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_endpoint: env_or("API_ENDPOINT", self.api_endpoint),
            primary_portal_url: env_or("PRIMARY_PORTAL_URL", self.primary_portal_url),
            backup_portal_url: env_or("BACKUP_PORTAL_URL", self.backup_portal_url),
            api_timeout_secs: env_parse_or("API_TIMEOUT_SECS", self.api_timeout_secs),
            interactive_timeout_secs: env_parse_or(
                "INTERACTIVE_TIMEOUT_SECS",
                self.interactive_timeout_secs,
            ),
            failure_skip_threshold: env_parse_or(
                "FAILURE_SKIP_THRESHOLD",
                self.failure_skip_threshold,
            ),
            selector_cache_ttl_hours: env_parse_or(
                "SELECTOR_CACHE_TTL_HOURS",
                self.selector_cache_ttl_hours,
            ),
            browser_debug_port: env_parse_or("BROWSER_DEBUG_PORT", self.browser_debug_port),
            headless: env_parse_or("HEADLESS", self.headless),
            browser_executable: std::env::var("BROWSER_EXECUTABLE")
                .ok()
                .or(self.browser_executable),
            work_items_file: env_or("WORK_ITEMS_FILE", self.work_items_file),
            store_path: env_or("STORE_PATH", self.store_path),
            output_dir: env_or("OUTPUT_DIR", self.output_dir),
            diagnostics_file: env_or("DIAGNOSTICS_FILE", self.diagnostics_file),
            output_log_file: env_or("OUTPUT_LOG_FILE", self.output_log_file),
            selector_cache_file: env_or("SELECTOR_CACHE_FILE", self.selector_cache_file),
            eligibility: self.eligibility,
            verbose_logging: env_parse_or("VERBOSE_LOGGING", self.verbose_logging),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }

    pub fn selector_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.selector_cache_ttl_hours)
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
