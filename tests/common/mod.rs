#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use barcode_fetch::error::{RetrievalError, StoreError, StoreResult};
use barcode_fetch::models::{StrategyKind, WorkItem};
use barcode_fetch::retrieval::{RetrievalStrategy, StrategyFactory};
use barcode_fetch::services::OutputWriter;
use barcode_fetch::store::{MemoryBackend, RecordBackend, TrackedRecord};

pub fn work_item(n: usize) -> WorkItem {
    WorkItem::new(
        format!("30512345{:04}", n),
        "0101234567",
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        "01B1",
    )
}

pub fn work_items(count: usize) -> Vec<WorkItem> {
    (1..=count).map(work_item).collect()
}

/// 单次尝试的结果
#[derive(Clone, Copy)]
pub enum Outcome {
    Pdf,
    Fail,
    Hang,
}

type Behaviour = Arc<dyn Fn(&WorkItem) -> Outcome + Send + Sync>;

/// 按报关单决定结果的假策略，记录每次调用
pub struct ScriptedStrategy {
    kind: StrategyKind,
    behaviour: Behaviour,
    calls: Arc<Mutex<Vec<(StrategyKind, String)>>>,
}

#[async_trait]
impl RetrievalStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    async fn attempt(&self, item: &WorkItem) -> Result<Vec<u8>, RetrievalError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.kind, item.declaration_number.clone()));
        match (self.behaviour)(item) {
            Outcome::Pdf => Ok(format!("%PDF-1.4 {}", item.declaration_number).into_bytes()),
            Outcome::Fail => Err(RetrievalError::connection(self.kind.name(), "refused")),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// 每次开会话都生成一套新的假策略
#[derive(Default)]
pub struct ScriptedFactory {
    behaviours: Vec<(StrategyKind, Behaviour)>,
    calls: Arc<Mutex<Vec<(StrategyKind, String)>>>,
    sessions: AtomicUsize,
    fail_session: bool,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        kind: StrategyKind,
        behaviour: impl Fn(&WorkItem) -> Outcome + Send + Sync + 'static,
    ) -> Self {
        self.behaviours.push((kind, Arc::new(behaviour)));
        self
    }

    pub fn failing_session() -> Self {
        Self {
            fail_session: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(StrategyKind, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, kind: StrategyKind) -> usize {
        self.calls().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StrategyFactory for ScriptedFactory {
    async fn open_session(&self) -> Result<Vec<Box<dyn RetrievalStrategy>>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        if self.fail_session {
            return Err(anyhow!("no network"));
        }
        Ok(self
            .behaviours
            .iter()
            .map(|(kind, behaviour)| {
                Box::new(ScriptedStrategy {
                    kind: *kind,
                    behaviour: behaviour.clone(),
                    calls: self.calls.clone(),
                }) as Box<dyn RetrievalStrategy>
            })
            .collect())
    }
}

/// 内存输出端，可指定写入失败的报关单
#[derive(Default)]
pub struct MemoryWriter {
    written: Mutex<Vec<(String, Vec<u8>)>>,
    fail_for: HashSet<String>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(declaration_number: &str) -> Self {
        Self {
            fail_for: [declaration_number.to_string()].into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(location, _)| location.clone())
            .collect()
    }
}

#[async_trait]
impl OutputWriter for MemoryWriter {
    async fn write(&self, item: &WorkItem, payload: &[u8]) -> Result<String> {
        if self.fail_for.contains(&item.declaration_number) {
            return Err(anyhow!("disk full"));
        }
        let location = format!("mem://{}.pdf", item.declaration_number);
        self.written
            .lock()
            .unwrap()
            .push((location.clone(), payload.to_vec()));
        Ok(location)
    }
}

/// 前 `allowed` 次持久化成功，之后一直失败
pub struct FailingBackend {
    inner: MemoryBackend,
    allowed: usize,
    persisted: usize,
}

impl FailingBackend {
    pub fn new(inner: MemoryBackend, allowed: usize) -> Self {
        Self {
            inner,
            allowed,
            persisted: 0,
        }
    }
}

impl RecordBackend for FailingBackend {
    fn load(&self) -> StoreResult<Vec<TrackedRecord>> {
        self.inner.load()
    }

    fn persist(&mut self, records: &[TrackedRecord]) -> StoreResult<()> {
        if self.persisted >= self.allowed {
            return Err(StoreError::io(
                "failing",
                std::io::Error::new(std::io::ErrorKind::Other, "disk unavailable"),
            ));
        }
        self.persisted += 1;
        self.inner.persist(records)
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}
