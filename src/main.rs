use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use barcode_fetch::config::Config;
use barcode_fetch::locator::SelectorCache;
use barcode_fetch::models::load_work_items;
use barcode_fetch::orchestrator::BatchOrchestrator;
use barcode_fetch::retrieval::PortalStrategyFactory;
use barcode_fetch::services::{DiagnosticSink, FileDiagnosticSink, FileOutputWriter};
use barcode_fetch::store::{TrackedRecord, TrackingStore};
use barcode_fetch::utils::logging;

#[derive(Parser)]
#[command(name = "barcode_fetch")]
#[command(about = "报关单集装箱条码批量取件")]
struct Args {
    /// TOML 配置文件，也可用 CONFIG_FILE 指定；都没有时只读环境变量
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 处理报关单清单
    Run {
        /// 忽略去重记录，全部重新取件
        #[arg(long)]
        force: bool,
    },
    /// 列出已处理的报关单
    List,
    /// 按报关单号或税号查找
    Search { query: String },
    /// 按输出目录重建去重存储
    Rebuild,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let config_file = args
        .config
        .clone()
        .or_else(|| std::env::var("CONFIG_FILE").ok().map(PathBuf::from));
    let config = match &config_file {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(args.verbose || config.verbose_logging);

    match args.command {
        Command::Run { force } => run_batch(config, force).await,
        Command::List => {
            let store = open_store(&config)?;
            print_records(&store.list_all());
            Ok(())
        }
        Command::Search { query } => {
            let store = open_store(&config)?;
            print_records(&store.search(&query));
            Ok(())
        }
        Command::Rebuild => {
            let (mut store, rebuilt) = TrackingStore::open_or_rebuild(
                Path::new(&config.store_path),
                Path::new(&config.output_dir),
            )?;
            if rebuilt.is_none() {
                store.rebuild_from_outputs(Path::new(&config.output_dir))?;
            }
            info!("✓ 去重存储现有 {} 条记录", store.len());
            Ok(())
        }
    }
}

async fn run_batch(config: Config, force: bool) -> Result<()> {
    logging::log_startup(&config.api_endpoint, config.failure_skip_threshold, force);

    let items_path = Path::new(&config.work_items_file);
    let items = load_work_items(items_path)
        .await
        .with_context(|| format!("无法加载报关单清单: {}", items_path.display()))?;
    let loaded = items.len();
    let items = config.eligibility.apply(items);
    if items.len() < loaded {
        info!("🔎 资格筛选排除 {} 张", loaded - items.len());
    }

    let store = open_store(&config)?;

    let cache_path = PathBuf::from(&config.selector_cache_file);
    let cache = match SelectorCache::load(&cache_path, config.selector_cache_ttl()) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("⚠️ 选择器缓存无法读取，使用空缓存: {:#}", e);
            SelectorCache::new(config.selector_cache_ttl())
        }
    };
    let cache = Arc::new(cache);

    let sink: Arc<dyn DiagnosticSink> = Arc::new(FileDiagnosticSink::new(&config.diagnostics_file));
    let writer = Arc::new(FileOutputWriter::new(&config.output_dir));
    let factory = Arc::new(PortalStrategyFactory::new(
        config.clone(),
        cache.clone(),
        sink.clone(),
    ));

    let log_path = PathBuf::from(&config.output_log_file);
    logging::init_log_file(&log_path)?;

    let orchestrator = BatchOrchestrator::new(
        factory,
        Arc::new(Mutex::new(store)),
        writer,
        sink,
        config.failure_skip_threshold,
    )
    .with_run_log(&log_path);

    let mut handle = orchestrator.spawn(items, force);

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，当前报关单处理完后停止");
            token.cancel();
        }
    });

    while let Some(progress) = handle.progress.recv().await {
        info!(
            "📈 进度 {}/{} {} {}",
            progress.current,
            progress.total,
            if progress.success { "✅" } else { "❌" },
            progress.identity
        );
    }

    let summary = handle.wait().await;

    if let Err(e) = cache.save(&cache_path) {
        warn!("⚠️ 选择器缓存保存失败: {:#}", e);
    }

    let summary = summary?;
    logging::print_final_stats(&summary, Some(&log_path));
    Ok(())
}

fn open_store(config: &Config) -> Result<TrackingStore> {
    let (store, rebuilt) = TrackingStore::open_or_rebuild(
        Path::new(&config.store_path),
        Path::new(&config.output_dir),
    )?;
    if let Some(count) = rebuilt {
        info!("♻️ 去重存储已按输出目录重建: {} 条", count);
    }
    Ok(store)
}

fn print_records(records: &[TrackedRecord]) {
    if records.is_empty() {
        println!("（无记录）");
        return;
    }
    for record in records {
        println!(
            "{}  {}  {}",
            record.processed_at.format("%Y-%m-%d %H:%M:%S"),
            record.identity,
            record.output_location
        );
    }
    println!("共 {} 条", records.len());
}
