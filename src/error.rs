use std::fmt;

use thiserror::Error;

use crate::models::Identity;

/// 单次取件失败的分类
///
/// 引擎只根据分类决定是否继续回退，不关心具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// 超时（瞬时错误）
    Timeout,
    /// 连接失败（瞬时错误）
    Connection,
    /// 所有候选字段都找不到
    FieldNotFound,
    /// 服务端返回错误响应
    BadResponse,
    /// 返回内容不是有效的条码文件
    InvalidPayload,
    /// 浏览器操作失败
    Browser,
    /// 所有策略都被健康检查跳过
    Skipped,
}

impl ErrorKind {
    /// 是否属于瞬时错误
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Connection)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::Timeout => "超时",
            ErrorKind::Connection => "连接失败",
            ErrorKind::FieldNotFound => "字段未找到",
            ErrorKind::BadResponse => "错误响应",
            ErrorKind::InvalidPayload => "无效文件",
            ErrorKind::Browser => "浏览器错误",
            ErrorKind::Skipped => "全部跳过",
        };
        f.write_str(text)
    }
}

/// 取件策略错误
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("请求超时 ({0:?})")]
    Timeout(std::time::Duration),

    #[error("连接失败 ({endpoint}): {message}")]
    Connection { endpoint: String, message: String },

    #[error("字段未找到: {field}")]
    FieldNotFound { field: String },

    #[error("服务端返回错误响应 ({endpoint}): status={status:?}, message={message}")]
    BadResponse {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("返回内容无效: {0}")]
    InvalidPayload(String),

    #[error("浏览器错误: {0}")]
    Browser(String),
}

impl RetrievalError {
    /// 转换为引擎使用的错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::Timeout(_) => ErrorKind::Timeout,
            RetrievalError::Connection { .. } => ErrorKind::Connection,
            RetrievalError::FieldNotFound { .. } => ErrorKind::FieldNotFound,
            RetrievalError::BadResponse { .. } => ErrorKind::BadResponse,
            RetrievalError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            RetrievalError::Browser(_) => ErrorKind::Browser,
        }
    }

    pub fn field_not_found(field: impl Into<String>) -> Self {
        RetrievalError::FieldNotFound {
            field: field.into(),
        }
    }

    pub fn connection(endpoint: impl Into<String>, source: impl fmt::Display) -> Self {
        RetrievalError::Connection {
            endpoint: endpoint.into(),
            message: source.to_string(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for RetrievalError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        RetrievalError::Browser(err.to_string())
    }
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::InvalidPayload(err.to_string())
    }
}

/// 去重存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 标识已存在（非强制重处理时写入重复记录）
    #[error("记录已存在: {0}")]
    DuplicateIdentity(Identity),

    #[error("记录不存在: {0}")]
    NotFound(Identity),

    /// 存储不可用，属于致命错误
    #[error("存储读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("存储文件已损坏 ({path}): {message}")]
    Corrupt { path: String, message: String },

    #[error("存储锁已失效")]
    Poisoned,
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// 批次级错误，只有这里的错误会中止整个批次
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("去重存储失败，批次中止: {0}")]
    Store(#[from] StoreError),

    #[error("已有批次正在运行")]
    AlreadyRunning,

    #[error("无法建立取件会话: {0}")]
    Session(String),

    #[error("批次任务异常退出: {0}")]
    Worker(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 存储操作结果类型
pub type StoreResult<T> = Result<T, StoreError>;
