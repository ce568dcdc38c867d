//! 选择器缓存
//!
//! 进程内共享：记录每个逻辑字段最近一次命中的标识。多个写者通过 `RwLock` 串行化。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::locator::LookupMode;

/// 默认有效期 24 小时
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCacheEntry {
    pub identifier: String,
    pub mode: LookupMode,
    pub last_success: DateTime<Utc>,
}

impl SelectorCacheEntry {
    /// 年龄严格小于 TTL 才有效
    pub fn is_valid(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_success) < ttl
    }
}

#[derive(Debug)]
pub struct SelectorCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, SelectorCacheEntry>>,
}

impl SelectorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 取未过期的缓存项
    pub fn get_valid(&self, field: &str, now: DateTime<Utc>) -> Option<SelectorCacheEntry> {
        self.read()
            .get(field)
            .filter(|entry| entry.is_valid(self.ttl, now))
            .cloned()
    }

    pub fn get(&self, field: &str) -> Option<SelectorCacheEntry> {
        self.read().get(field).cloned()
    }

    /// 覆盖写入最近一次成功的标识
    pub fn record_success(&self, field: &str, identifier: &str, mode: LookupMode, now: DateTime<Utc>) {
        self.insert(
            field,
            SelectorCacheEntry {
                identifier: identifier.to_string(),
                mode,
                last_success: now,
            },
        );
    }

    pub fn insert(&self, field: &str, entry: SelectorCacheEntry) {
        self.write().insert(field.to_string(), entry);
    }

    pub fn evict(&self, field: &str) -> Option<SelectorCacheEntry> {
        self.write().remove(field)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从文件恢复缓存，文件不存在时返回空缓存
    pub fn load(path: &Path, ttl: Duration) -> anyhow::Result<Self> {
        let cache = Self::new(ttl);
        if !path.exists() {
            return Ok(cache);
        }
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, SelectorCacheEntry> = serde_json::from_str(&content)?;
        *cache.write() = entries;
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&*self.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    // 锁中毒时数据依然可用：缓存内容只是提示，不影响正确性
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SelectorCacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SelectorCacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_TTL_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_at_ttl() {
        let cache = SelectorCache::default();
        let now = Utc::now();
        cache.record_success("tax_code", "txtMaDN", LookupMode::ById, now - Duration::hours(23));
        assert!(cache.get_valid("tax_code", now).is_some());

        cache.record_success("tax_code", "txtMaDN", LookupMode::ById, now - Duration::hours(24));
        assert!(cache.get_valid("tax_code", now).is_none());
        assert!(cache.get("tax_code").is_some());
    }

    #[test]
    fn survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selectors.json");
        let cache = SelectorCache::default();
        cache.record_success("submit", "btnSearch", LookupMode::ByName, Utc::now());
        cache.save(&path).unwrap();

        let restored = SelectorCache::load(&path, Duration::hours(24)).unwrap();
        assert_eq!(restored.get("submit"), cache.get("submit"));
        assert!(SelectorCache::load(&dir.path().join("missing.json"), Duration::hours(1))
            .unwrap()
            .is_empty());
    }
}
