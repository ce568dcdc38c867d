//! 字段定位器
//!
//! 查找顺序：
//! 1. 未过期的缓存标识
//! 2. 缓存未命中、过期或命中后查找失败时，完整遍历候选列表
//! 3. 成功后用胜出的标识覆盖缓存
//! 4. 全部失败时写诊断快照并返回 `FieldNotFound`

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RetrievalError;
use crate::infrastructure::FormDocument;
use crate::locator::{FieldCandidateSet, LookupMode, SelectorCache};
use crate::services::DiagnosticSink;

/// 已定位到的具体字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// 逻辑字段名
    pub field: String,
    pub identifier: String,
    pub mode: LookupMode,
}

pub struct FieldLocator {
    candidates: FieldCandidateSet,
    cache: Arc<SelectorCache>,
    sink: Arc<dyn DiagnosticSink>,
}

impl FieldLocator {
    pub fn new(
        candidates: FieldCandidateSet,
        cache: Arc<SelectorCache>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            candidates,
            cache,
            sink,
        }
    }

    pub fn cache(&self) -> &Arc<SelectorCache> {
        &self.cache
    }

    /// 定位字段，失败时记录诊断快照
    pub async fn locate(
        &self,
        field: &str,
        document: &dyn FormDocument,
    ) -> Result<FieldRef, RetrievalError> {
        if let Some(found) = self.find(field, document).await? {
            return Ok(found);
        }

        warn!("⚠️ 字段 {} 的所有候选标识都未找到", field);
        let snapshot = document
            .snapshot()
            .await
            .with_context(format!("field:{}", field));
        self.sink.record(&snapshot);
        Err(RetrievalError::field_not_found(field))
    }

    /// 定位字段，找不到时返回 None（不写诊断）
    ///
    /// 每个候选先按它标注的方式查，再换另一种方式：标注按 id 的先 id 后 name，
    /// 标注按 name 的先 name 后 id。
    pub async fn find(
        &self,
        field: &str,
        document: &dyn FormDocument,
    ) -> Result<Option<FieldRef>, RetrievalError> {
        if let Some(entry) = self.cache.get_valid(field, Utc::now()) {
            if document.has_field(&entry.identifier, entry.mode).await? {
                debug!("字段 {} 命中缓存: {}", field, entry.identifier);
                return Ok(Some(self.remember(field, &entry.identifier, entry.mode)));
            }
            // 命中但已失效的标识立即移除，避免下次再试
            debug!("字段 {} 缓存标识 {} 已失效，重新扫描", field, entry.identifier);
            self.cache.evict(field);
        }

        self.scan(field, document).await
    }

    /// 等待字段出现时的单次检查
    ///
    /// 有未过期缓存时只查缓存标识，查不到也不移除；没有缓存时遍历候选。
    /// 期限到了仍未出现再交给 `locate` 做完整回退。
    pub async fn poll(
        &self,
        field: &str,
        document: &dyn FormDocument,
    ) -> Result<Option<FieldRef>, RetrievalError> {
        match self.cache.get_valid(field, Utc::now()) {
            Some(entry) => {
                if document.has_field(&entry.identifier, entry.mode).await? {
                    return Ok(Some(self.remember(field, &entry.identifier, entry.mode)));
                }
                Ok(None)
            }
            None => self.scan(field, document).await,
        }
    }

    async fn scan(
        &self,
        field: &str,
        document: &dyn FormDocument,
    ) -> Result<Option<FieldRef>, RetrievalError> {
        for candidate in self.candidates.candidates(field) {
            for mode in [candidate.mode, candidate.mode.other()] {
                if document.has_field(&candidate.identifier, mode).await? {
                    debug!("字段 {} 定位成功: {} ({:?})", field, candidate.identifier, mode);
                    return Ok(Some(self.remember(field, &candidate.identifier, mode)));
                }
            }
        }

        Ok(None)
    }

    fn remember(&self, field: &str, identifier: &str, mode: LookupMode) -> FieldRef {
        self.cache.record_success(field, identifier, mode, Utc::now());
        FieldRef {
            field: field.to_string(),
            identifier: identifier.to_string(),
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::FieldCandidate;
    use crate::services::{DiagnosticSnapshot, MemoryDiagnosticSink};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 只认识固定几个字段的假页面，记录每一次查找
    struct FakeDocument {
        present: Vec<(String, LookupMode)>,
        lookups: Mutex<Vec<(String, LookupMode)>>,
    }

    impl FakeDocument {
        fn with_fields(present: &[(&str, LookupMode)]) -> Self {
            Self {
                present: present
                    .iter()
                    .map(|(id, mode)| (id.to_string(), *mode))
                    .collect(),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn lookups(&self) -> Vec<(String, LookupMode)> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FormDocument for FakeDocument {
        async fn open(&self, _url: &str) -> Result<(), RetrievalError> {
            Ok(())
        }

        async fn has_field(&self, identifier: &str, mode: LookupMode) -> Result<bool, RetrievalError> {
            self.lookups
                .lock()
                .unwrap()
                .push((identifier.to_string(), mode));
            Ok(self
                .present
                .iter()
                .any(|(id, m)| id == identifier && *m == mode))
        }

        async fn fill(&self, _field: &FieldRef, _value: &str) -> Result<(), RetrievalError> {
            Ok(())
        }

        async fn click(&self, _field: &FieldRef) -> Result<(), RetrievalError> {
            Ok(())
        }

        async fn capture_document(&self, _timeout: Duration) -> Result<Vec<u8>, RetrievalError> {
            Ok(Vec::new())
        }

        async fn title(&self) -> Result<String, RetrievalError> {
            Ok("Tra cứu tờ khai".to_string())
        }

        async fn location(&self) -> Result<String, RetrievalError> {
            Ok("https://portal/form".to_string())
        }

        async fn field_identifiers(&self) -> Result<Vec<String>, RetrievalError> {
            Ok(self.present.iter().map(|(id, _)| id.clone()).collect())
        }
    }

    fn tax_code_candidates() -> FieldCandidateSet {
        FieldCandidateSet::new().with_field(
            "tax_code",
            vec![
                FieldCandidate::by_id("txtMaDoanhNghiep"),
                FieldCandidate::by_id("txtMaDN"),
                FieldCandidate::by_name("maDoanhNghiep"),
            ],
        )
    }

    fn locator(cache: Arc<SelectorCache>, sink: Arc<MemoryDiagnosticSink>) -> FieldLocator {
        FieldLocator::new(tax_code_candidates(), cache, sink)
    }

    #[tokio::test]
    async fn full_scan_tries_id_then_name_and_caches_winner() {
        let cache = Arc::new(SelectorCache::default());
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let document = FakeDocument::with_fields(&[("txtMaDN", LookupMode::ByName)]);

        let found = locator(cache.clone(), sink).locate("tax_code", &document).await.unwrap();

        assert_eq!(found.identifier, "txtMaDN");
        assert_eq!(found.mode, LookupMode::ByName);
        assert_eq!(
            document.lookups(),
            vec![
                ("txtMaDoanhNghiep".to_string(), LookupMode::ById),
                ("txtMaDoanhNghiep".to_string(), LookupMode::ByName),
                ("txtMaDN".to_string(), LookupMode::ById),
                ("txtMaDN".to_string(), LookupMode::ByName),
            ]
        );
        let entry = cache.get("tax_code").unwrap();
        assert_eq!(entry.identifier, "txtMaDN");
        assert_eq!(entry.mode, LookupMode::ByName);
    }

    #[tokio::test]
    async fn name_marked_candidate_tries_name_before_id() {
        let document = FakeDocument::with_fields(&[("maDoanhNghiep", LookupMode::ById)]);

        let found = locator(Arc::new(SelectorCache::default()), Arc::new(MemoryDiagnosticSink::new()))
            .locate("tax_code", &document)
            .await
            .unwrap();

        assert_eq!(found.mode, LookupMode::ById);
        assert_eq!(
            document.lookups()[4..],
            [
                ("maDoanhNghiep".to_string(), LookupMode::ByName),
                ("maDoanhNghiep".to_string(), LookupMode::ById),
            ]
        );
    }

    #[tokio::test]
    async fn valid_cache_hit_skips_candidate_scan() {
        let cache = Arc::new(SelectorCache::default());
        cache.record_success("tax_code", "maDoanhNghiep", LookupMode::ByName, Utc::now());
        let document = FakeDocument::with_fields(&[("maDoanhNghiep", LookupMode::ByName)]);

        let found = locator(cache, Arc::new(MemoryDiagnosticSink::new()))
            .locate("tax_code", &document)
            .await
            .unwrap();

        assert_eq!(found.identifier, "maDoanhNghiep");
        assert_eq!(document.lookups().len(), 1);
    }

    #[tokio::test]
    async fn stale_cache_entry_is_ignored() {
        let cache = Arc::new(SelectorCache::new(ChronoDuration::hours(24)));
        cache.record_success(
            "tax_code",
            "oldTaxField",
            LookupMode::ById,
            Utc::now() - ChronoDuration::hours(25),
        );
        let document = FakeDocument::with_fields(&[
            ("oldTaxField", LookupMode::ById),
            ("txtMaDoanhNghiep", LookupMode::ById),
        ]);

        let found = locator(cache.clone(), Arc::new(MemoryDiagnosticSink::new()))
            .locate("tax_code", &document)
            .await
            .unwrap();

        assert_eq!(found.identifier, "txtMaDoanhNghiep");
        assert!(document
            .lookups()
            .iter()
            .all(|(id, _)| id != "oldTaxField"));
        assert_eq!(cache.get("tax_code").unwrap().identifier, "txtMaDoanhNghiep");
    }

    #[tokio::test]
    async fn failed_cache_hit_is_evicted_then_rescanned() {
        let cache = Arc::new(SelectorCache::default());
        cache.record_success("tax_code", "renamedField", LookupMode::ById, Utc::now());
        let document = FakeDocument::with_fields(&[("maDoanhNghiep", LookupMode::ByName)]);

        let found = locator(cache.clone(), Arc::new(MemoryDiagnosticSink::new()))
            .locate("tax_code", &document)
            .await
            .unwrap();

        assert_eq!(found.identifier, "maDoanhNghiep");
        assert_eq!(document.lookups()[0].0, "renamedField");
        assert_eq!(cache.get("tax_code").unwrap().identifier, "maDoanhNghiep");
    }

    #[tokio::test]
    async fn exhaustion_reports_snapshot_and_leaves_cache_empty() {
        let cache = Arc::new(SelectorCache::default());
        cache.record_success("tax_code", "renamedField", LookupMode::ById, Utc::now());
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let document = FakeDocument::with_fields(&[("somethingElse", LookupMode::ById)]);

        let err = locator(cache.clone(), sink.clone())
            .locate("tax_code", &document)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::FieldNotFound { ref field } if field == "tax_code"));
        assert!(cache.get("tax_code").is_none());
        let snapshots: Vec<DiagnosticSnapshot> = sink.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].context, "field:tax_code");
        assert_eq!(snapshots[0].fields, vec!["somethingElse".to_string()]);
    }

    #[tokio::test]
    async fn poll_miss_keeps_cached_identifier() {
        let cache = Arc::new(SelectorCache::default());
        cache.record_success("tax_code", "maDoanhNghiep", LookupMode::ByName, Utc::now());
        let sink = Arc::new(MemoryDiagnosticSink::new());
        let document = FakeDocument::with_fields(&[]);

        let found = locator(cache.clone(), sink.clone())
            .poll("tax_code", &document)
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(document.lookups().len(), 1);
        assert_eq!(cache.get("tax_code").unwrap().identifier, "maDoanhNghiep");
        assert!(sink.snapshots().is_empty());
    }

    #[tokio::test]
    async fn poll_without_cache_scans_candidates() {
        let cache = Arc::new(SelectorCache::default());
        let document = FakeDocument::with_fields(&[("txtMaDN", LookupMode::ById)]);

        let found = locator(cache.clone(), Arc::new(MemoryDiagnosticSink::new()))
            .poll("tax_code", &document)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.identifier, "txtMaDN");
        assert_eq!(cache.get("tax_code").unwrap().identifier, "txtMaDN");
    }
}
