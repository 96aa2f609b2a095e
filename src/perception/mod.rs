/// 感知适配器接口 (Perception adapters)
///
/// 目标检测 / 姿态关键点 / 烟雾检测 都是外部黑盒, 核心只通过以下接口调用.
/// 空结果表示"本帧未检测到", 永远不是错误.
pub mod replay;

pub use replay::{FrameRecord, ReplayPerception};

use crate::detection::{BBox, Frame, PersonLandmarks};

/// 目标检测器 (人 / 瓶子 等)
pub trait ObjectDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<BBox>;
}

/// 姿态关键点估计
pub trait PoseEstimator {
    /// 整帧是否存在手到嘴的姿态
    fn is_hand_near_mouth(&mut self, frame: &Frame) -> bool;

    /// 在人体框内取手指尖与嘴部锚点; 无人脸关键点时返回 None
    fn person_landmarks(&mut self, frame: &Frame, person: &BBox) -> Option<PersonLandmarks>;
}

/// 烟雾检测器
pub trait SmokeDetector {
    fn detect(&mut self, frame: &Frame, class_id: u32) -> (bool, Vec<BBox>);
}

/// 空感知: 什么都检测不到
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPerception;

impl ObjectDetector for NullPerception {
    fn detect(&mut self, _frame: &Frame) -> Vec<BBox> {
        Vec::new()
    }
}

impl PoseEstimator for NullPerception {
    fn is_hand_near_mouth(&mut self, _frame: &Frame) -> bool {
        false
    }

    fn person_landmarks(&mut self, _frame: &Frame, _person: &BBox) -> Option<PersonLandmarks> {
        None
    }
}

impl SmokeDetector for NullPerception {
    fn detect(&mut self, _frame: &Frame, _class_id: u32) -> (bool, Vec<BBox>) {
        (false, Vec::new())
    }
}

/// 三个感知适配器的组合, 由流水线持有
pub struct PerceptionAdapters {
    pub detector: Box<dyn ObjectDetector>,
    pub pose: Box<dyn PoseEstimator>,
    pub smoke: Box<dyn SmokeDetector>,
}

impl PerceptionAdapters {
    pub fn new(
        detector: Box<dyn ObjectDetector>,
        pose: Box<dyn PoseEstimator>,
        smoke: Box<dyn SmokeDetector>,
    ) -> Self {
        Self {
            detector,
            pose,
            smoke,
        }
    }

    /// 全部使用同一个可克隆的实现
    pub fn shared<P>(perception: P) -> Self
    where
        P: ObjectDetector + PoseEstimator + SmokeDetector + Clone + 'static,
    {
        Self::new(
            Box::new(perception.clone()),
            Box::new(perception.clone()),
            Box::new(perception),
        )
    }
}

impl Default for PerceptionAdapters {
    fn default() -> Self {
        Self::shared(NullPerception)
    }
}
