//! 去重存储
//!
//! 记录已成功取到条码的报关单。标识全局唯一，写入时检查；每次修改都先落盘再返回。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::models::Identity;
use crate::services::OutputNaming;
use crate::store::{JsonFileBackend, RecordBackend};

/// 一条已处理记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRecord {
    #[serde(flatten)]
    pub identity: Identity,
    pub output_location: String,
    pub processed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct TrackingStore {
    records: BTreeMap<Identity, TrackedRecord>,
    backend: Box<dyn RecordBackend>,
    /// 是否有批次正在使用这份存储
    batch_active: bool,
}

impl TrackingStore {
    /// 用指定后端打开，读取已有记录
    pub fn open(backend: Box<dyn RecordBackend>) -> StoreResult<Self> {
        let mut records = BTreeMap::new();
        for record in backend.load()? {
            // 文件被手工编辑过时可能出现重复，保留最早的一条
            if records.contains_key(&record.identity) {
                warn!("⚠️ 存储中存在重复记录，已忽略: {}", record.identity);
                continue;
            }
            records.insert(record.identity.clone(), record);
        }
        info!("✓ 去重存储已加载 ({}): {} 条记录", backend.describe(), records.len());
        Ok(Self {
            records,
            backend,
            batch_active: false,
        })
    }

    pub fn open_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(Box::new(JsonFileBackend::new(path.as_ref())))
    }

    /// 打开存储文件；文件缺失或损坏时按输出目录重建
    ///
    /// 返回值第二项为重建出的记录数，未重建时为 None
    pub fn open_or_rebuild(path: &Path, output_dir: &Path) -> StoreResult<(Self, Option<usize>)> {
        let missing = !path.exists();
        match Self::open_file(path) {
            Ok(store) if !missing => Ok((store, None)),
            Ok(mut store) => {
                let count = store.rebuild_from_outputs(output_dir)?;
                Ok((store, Some(count)))
            }
            Err(StoreError::Corrupt { path: bad, message }) => {
                warn!("⚠️ 存储文件损坏 ({}): {}，按输出目录重建", bad, message);
                let mut store = Self {
                    records: BTreeMap::new(),
                    backend: Box::new(JsonFileBackend::new(path)),
                    batch_active: false,
                };
                let count = store.rebuild_from_outputs(output_dir)?;
                Ok((store, Some(count)))
            }
            Err(e) => Err(e),
        }
    }

    /// 标记批次开始，已有批次在用时返回 false
    pub(crate) fn begin_batch(&mut self) -> bool {
        !std::mem::replace(&mut self.batch_active, true)
    }

    pub(crate) fn end_batch(&mut self) {
        self.batch_active = false;
    }

    /// 新增记录，标识已存在时返回 `DuplicateIdentity`
    pub fn add_processed(&mut self, identity: Identity, location: impl Into<String>) -> StoreResult<()> {
        if self.records.contains_key(&identity) {
            return Err(StoreError::DuplicateIdentity(identity));
        }
        let now = Utc::now();
        let record = TrackedRecord {
            identity: identity.clone(),
            output_location: location.into(),
            processed_at: now,
            updated_at: now,
        };
        self.records.insert(identity.clone(), record);

        if let Err(e) = self.flush() {
            self.records.remove(&identity);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_processed(&self, identity: &Identity) -> bool {
        self.records.contains_key(identity)
    }

    pub fn get(&self, identity: &Identity) -> Option<&TrackedRecord> {
        self.records.get(identity)
    }

    /// 刷新更新时间
    pub fn update_timestamp(&mut self, identity: &Identity) -> StoreResult<()> {
        self.modify(identity, |_| {})
    }

    /// 强制重处理后的显式更新：替换输出位置并刷新更新时间
    pub fn update_processed(&mut self, identity: &Identity, location: impl Into<String>) -> StoreResult<()> {
        let location = location.into();
        self.modify(identity, move |record| record.output_location = location)
    }

    pub fn remove(&mut self, identity: &Identity) -> StoreResult<bool> {
        let Some(previous) = self.records.remove(identity) else {
            return Ok(false);
        };
        if let Err(e) = self.flush() {
            self.records.insert(identity.clone(), previous);
            return Err(e);
        }
        Ok(true)
    }

    /// 全部记录，按处理时间排序
    pub fn list_all(&self) -> Vec<TrackedRecord> {
        let mut all: Vec<TrackedRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
        all
    }

    /// 按报关单号或税号模糊查找（不区分大小写）
    pub fn search(&self, query: &str) -> Vec<TrackedRecord> {
        let needle = query.trim().to_lowercase();
        self.list_all()
            .into_iter()
            .filter(|r| {
                r.identity.declaration_number.to_lowercase().contains(&needle)
                    || r.identity.tax_code.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 扫描输出目录，按文件名规则重建全部记录
    ///
    /// 文件名是唯一可信来源，现有记录会被替换
    pub fn rebuild_from_outputs(&mut self, output_dir: &Path) -> StoreResult<usize> {
        let mut rebuilt = BTreeMap::new();

        if output_dir.exists() {
            let entries = fs::read_dir(output_dir)
                .map_err(|e| StoreError::io(output_dir.display().to_string(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::io(output_dir.display().to_string(), e))?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(identity) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(OutputNaming::parse)
                else {
                    continue;
                };

                let written_at = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                rebuilt.insert(
                    identity.clone(),
                    TrackedRecord {
                        identity,
                        output_location: path.to_string_lossy().to_string(),
                        processed_at: written_at,
                        updated_at: written_at,
                    },
                );
            }
        } else {
            warn!("⚠️ 输出目录不存在: {}", output_dir.display());
        }

        let count = rebuilt.len();
        let previous = std::mem::replace(&mut self.records, rebuilt);
        if let Err(e) = self.flush() {
            self.records = previous;
            return Err(e);
        }
        info!("✓ 已从输出目录重建 {} 条记录", count);
        Ok(count)
    }

    fn modify(&mut self, identity: &Identity, change: impl FnOnce(&mut TrackedRecord)) -> StoreResult<()> {
        let Some(record) = self.records.get_mut(identity) else {
            return Err(StoreError::NotFound(identity.clone()));
        };
        let previous = record.clone();
        change(record);
        record.updated_at = Utc::now();

        if let Err(e) = self.flush() {
            self.records.insert(identity.clone(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn flush(&mut self) -> StoreResult<()> {
        let records: Vec<TrackedRecord> = self.records.values().cloned().collect();
        self.backend.persist(&records)
    }
}
