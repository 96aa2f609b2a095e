//! 错误类型 (Error types)

use std::path::PathBuf;
use thiserror::Error;

/// 行为监控错误
#[derive(Error, Debug)]
pub enum SentinelError {
    /// 视频源无法打开 (本次运行致命)
    #[error("video source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("invalid zone: {0}")]
    InvalidZone(String),

    /// 证据文件无法创建 (唯一需要上报的写入错误)
    #[error("cannot allocate evidence file {path}: {source}")]
    EvidenceAllocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("evidence write error: {0}")]
    EvidenceWrite(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("perception log error: {0}")]
    PerceptionLog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
