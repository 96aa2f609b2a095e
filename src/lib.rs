// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置参数
pub mod detection; // 检测框 / 身份追踪
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod perception; // 感知接口 (检测 / 姿态 / 烟雾)
pub mod pipeline; // 逐帧融合与帧循环
pub mod recorder; // 证据录像
pub mod render; // 画面标注
pub mod rules; // 区域 / 吸烟 / 饮水规则

pub use crate::config::{Args, SentinelConfig};
pub use crate::detection::{BBox, Frame, PersonLandmarks, Point, SimpleTracker, TrackedObject};
pub use crate::error::{Result, SentinelError};
pub use crate::pipeline::{FrameClock, FrameReport, RunSummary, Runner, SentinelPipeline};
pub use crate::recorder::{EvidenceRecorder, MjpegSink, RecorderConfig};
pub use crate::rules::{RuleEvent, ViolationKind};

/// 证据文件时间戳 (本地时间, `YYYYMMDD_HHMMSS`)
pub fn evidence_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
