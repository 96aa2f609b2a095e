/// 视频处理流水线 (Video Processing Pipeline)
///
/// 单线程逐帧处理: 采集 → 融合 → 渲染 → 录像
/// - fusion: 追踪 / 区域 / 吸烟 / 饮水 (纯数据输出)
/// - runner: 帧循环, 取消与清理
pub mod fusion;
pub mod runner;

pub use fusion::SentinelPipeline;
pub use runner::{FrameClock, RunSummary, Runner};

use crate::detection::{BBox, TrackedObject};
use crate::rules::{RuleEvent, SmokingState};

/// 单帧融合结果 (融合 → 渲染 + 录像)
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64, // 帧序号
    pub timestamp: f64,   // 秒
    pub tracks: Vec<TrackedObject>,
    pub bottles: Vec<BBox>,
    pub smoke_detected: bool,
    pub smoke_boxes: Vec<BBox>,
    pub smoking_state: SmokingState,
    /// 本帧判定为饮水的轨迹ID
    pub drinking: Vec<u32>,
    /// 区域事件 → 吸烟事件 → 饮水事件
    pub events: Vec<RuleEvent>,
}

impl FrameReport {
    pub fn smoking_confirmed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, RuleEvent::SmokingViolation { .. }))
    }

    pub fn violations(&self) -> impl Iterator<Item = &RuleEvent> {
        self.events.iter().filter(|e| e.is_violation())
    }
}
