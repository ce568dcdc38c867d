//! 去重记录的持久化后端

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{StoreError, StoreResult};
use crate::store::TrackedRecord;

const FILE_FORMAT_VERSION: u32 = 1;

/// 持久化后端
///
/// `persist` 返回前必须已经落盘，调用方依赖这一点保证"写完一张再处理下一张"
pub trait RecordBackend: Send {
    fn load(&self) -> StoreResult<Vec<TrackedRecord>>;

    fn persist(&mut self, records: &[TrackedRecord]) -> StoreResult<()>;

    /// 日志中显示的位置
    fn describe(&self) -> String;
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: Vec<TrackedRecord>,
}

/// JSON 文件后端，先写临时文件再改名替换
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tracking".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordBackend for JsonFileBackend {
    fn load(&self) -> StoreResult<Vec<TrackedRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(self.display(), e)),
        };

        let file: StoreFile = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.display(),
            message: e.to_string(),
        })?;
        if file.version != FILE_FORMAT_VERSION {
            return Err(StoreError::Corrupt {
                path: self.display(),
                message: format!("不支持的版本 {}", file.version),
            });
        }
        Ok(file.records)
    }

    fn persist(&mut self, records: &[TrackedRecord]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }

        let file = StoreFile {
            version: FILE_FORMAT_VERSION,
            records: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| StoreError::Corrupt {
            path: self.display(),
            message: e.to_string(),
        })?;

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| StoreError::io(temp.display().to_string(), e))?;
        fs::rename(&temp, &self.path).map_err(|e| StoreError::io(self.display(), e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.display()
    }
}

/// 内存后端，多个句柄共享同一份数据
#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<Vec<TrackedRecord>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一次持久化的内容
    pub fn persisted(&self) -> Vec<TrackedRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RecordBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Vec<TrackedRecord>> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|_| StoreError::Poisoned)
    }

    fn persist(&mut self, records: &[TrackedRecord]) -> StoreResult<()> {
        let mut guard = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        *guard = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
