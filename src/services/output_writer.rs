//! 条码文件写入服务 - 业务能力层
//!
//! 核心只记录写入后返回的位置，文件命名规则由这里决定

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tracing::debug;

use crate::models::{parse_declaration_date, Identity, WorkItem};

/// 条码文件输出端
#[async_trait]
pub trait OutputWriter: Send + Sync {
    /// 写入条码文件，返回存放位置
    async fn write(&self, item: &WorkItem, payload: &[u8]) -> Result<String>;
}

/// 输出文件命名规则：`<报关单号>_<税号>_<YYYYMMDD>_<海关代码>.pdf`
///
/// 字母、数字和 `-` 原样保留，其余字节写成 `%XX`，所以 `_` 只作分隔符。
/// 去重存储丢失时，按这个规则从文件名反推标识
pub struct OutputNaming;

impl OutputNaming {
    pub const EXTENSION: &'static str = "pdf";

    pub fn file_name(identity: &Identity) -> String {
        format!(
            "{}_{}_{}_{}.{}",
            encode_part(&identity.declaration_number),
            encode_part(&identity.tax_code),
            identity.declaration_date.format("%Y%m%d"),
            encode_part(&identity.customs_office_code),
            Self::EXTENSION
        )
    }

    /// 从文件名解析标识，不符合规则时返回 None
    pub fn parse(file_name: &str) -> Option<Identity> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)^([A-Za-z0-9%-]+)_([A-Za-z0-9%-]+)_(\d{8})_([A-Za-z0-9%-]+)\.pdf$")
                .expect("valid output naming pattern")
        });

        let caps = re.captures(file_name)?;
        Some(Identity {
            declaration_number: decode_part(&caps[1])?,
            tax_code: decode_part(&caps[2])?,
            declaration_date: parse_declaration_date(&caps[3])?,
            customs_office_code: decode_part(&caps[4])?,
        })
    }
}

fn encode_part(part: &str) -> String {
    let mut encoded = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// `encode_part` 的逆过程，转义不完整或不是 UTF-8 时返回 None
fn decode_part(part: &str) -> Option<String> {
    let bytes = part.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = part.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// 写到本地目录
pub struct FileOutputWriter {
    output_dir: PathBuf,
}

impl FileOutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl OutputWriter for FileOutputWriter {
    async fn write(&self, item: &WorkItem, payload: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.output_dir.display()))?;

        let path = self.output_dir.join(OutputNaming::file_name(&item.identity()));
        fs::write(&path, payload)
            .await
            .with_context(|| format!("无法写入条码文件: {}", path.display()))?;

        debug!("条码文件已写入: {} ({} 字节)", path.display(), payload.len());
        Ok(path.to_string_lossy().to_string())
    }
}
