use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和运行日志文件的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::models::{Identity, StrategyKind};
use crate::orchestrator::BatchSummary;

/// 初始化 tracing 输出
///
/// 设置了 `RUST_LOG` 时以其为准，否则按 `verbose` 选择级别
pub fn init(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("barcode_fetch=debug,info")
        } else {
            EnvFilter::new("barcode_fetch=info,warn")
        }
    });

    // 测试中可能重复初始化
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init();
}

/// 初始化运行日志文件，写入表头
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_header = format!(
        "{}\n条码取件日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(api_endpoint: &str, failure_threshold: u32, force_reprocess: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 报关单条码批量取件");
    info!("🔗 接口地址: {}", api_endpoint);
    info!("📊 策略停用阈值: 连续失败 {} 次", failure_threshold);
    if force_reprocess {
        info!("♻️ 强制重处理已开启");
    }
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(total: usize, pending: usize, skipped: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 批次开始: 共 {} 张", total);
    info!("📄 待处理 {} 张，跳过已处理 {} 张", pending, skipped);
    info!("{}", "=".repeat(60));
}

/// 追加一张报关单的处理结果到运行日志
pub fn append_outcome(
    log_file_path: &Path,
    identity: &Identity,
    success: bool,
    strategy: &str,
    elapsed: Duration,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(
        file,
        "[{}] {} {} 策略={} 耗时={}ms",
        chrono::Local::now().format("%H:%M:%S"),
        if success { "✅" } else { "❌" },
        identity,
        strategy,
        elapsed.as_millis()
    )?;
    Ok(())
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &BatchSummary, log_file_path: Option<&Path>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.success_count, summary.attempted);
    info!("❌ 失败: {}", summary.error_count);
    info!("⏭️ 跳过: {}", summary.skipped_as_duplicate);
    if summary.cancelled {
        info!("⏹️ 批次已被取消");
    }
    for kind in StrategyKind::PRIORITY {
        let failures = summary.strategy_failures.get(&kind).copied().unwrap_or(0);
        if failures > 0 {
            info!("⚠️ 策略 {} 结束时连续失败 {} 次", kind, failures);
        }
    }
    info!("⏱️ 总耗时: {:.1}s", summary.elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    if let Some(path) = log_file_path {
        info!("\n日志已保存至: {}", path.display());
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
