//! 多目标身份追踪
//! Identity tracking across frames

use super::types::BBox;

// ========== 公共数据结构 ==========

/// 跟踪对象 (统一的跟踪结果)
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    /// 唯一跟踪ID
    pub id: u32,

    /// 当前边界框 (含置信度与类别)
    pub bbox: BBox,

    /// 总共被跟踪的帧数 (age)
    pub total_frames: u32,
}

impl TrackedObject {
    pub fn class_id(&self) -> u32 {
        self.bbox.class_id
    }

    pub fn confidence(&self) -> f32 {
        self.bbox.confidence
    }
}

// ========== 跟踪器统一接口 ==========

/// 多目标跟踪器 Trait
pub trait Tracker {
    /// 更新跟踪器
    ///
    /// # 参数
    /// - `detections`: 当前帧的检测框
    ///
    /// # 返回
    /// 当前所有活跃的跟踪对象
    fn update(&mut self, detections: &[BBox]) -> &[TrackedObject];

    /// 重置跟踪器 (清除所有跟踪)
    fn reset(&mut self);

    /// 获取当前跟踪数量
    fn track_count(&self) -> usize;
}

// ========== 距离贪心跟踪器 ==========

/// 默认匹配距离 (像素)
pub const DEFAULT_MATCH_DISTANCE: f32 = 30.0;

/// 距离贪心跟踪器
///
/// 每个检测框按顺序扫描上一帧的轨迹, 取第一个左上角距离小于阈值的轨迹ID;
/// 没有匹配则分配新的递增ID. 本帧未被匹配的轨迹直接丢弃, 不保留"丢失"状态.
///
/// 多个检测框可以贪心地匹配到同一条旧轨迹, 此时最后处理的检测框胜出.
pub struct SimpleTracker {
    /// 当前跟踪对象 (插入顺序)
    tracks: Vec<TrackedObject>,

    /// 下一个分配的ID
    next_id: u32,

    /// 匹配距离阈值
    match_distance: f32,
}

impl SimpleTracker {
    pub fn new(match_distance: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            match_distance,
        }
    }

    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    fn find_match(&self, det: &BBox) -> Option<&TrackedObject> {
        let reference = det.top_left();
        self.tracks
            .iter()
            .find(|t| t.bbox.top_left().distance(&reference) < self.match_distance)
    }
}

impl Default for SimpleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_DISTANCE)
    }
}

impl Tracker for SimpleTracker {
    fn update(&mut self, detections: &[BBox]) -> &[TrackedObject] {
        let mut updated: Vec<TrackedObject> = Vec::with_capacity(detections.len());

        for det in detections {
            // 只和上一帧的轨迹比较, 不和本帧已更新的轨迹比较
            let (id, total_frames) = match self.find_match(det) {
                Some(old) => (old.id, old.total_frames + 1),
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    (id, 1)
                }
            };

            let tracked = TrackedObject {
                id,
                bbox: det.clone(),
                total_frames,
            };

            // 同一ID被再次认领时原位覆盖
            match updated.iter_mut().find(|t| t.id == id) {
                Some(slot) => *slot = tracked,
                None => updated.push(tracked),
            }
        }

        self.tracks = updated;
        &self.tracks
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
