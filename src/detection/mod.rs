/// 检测结果与身份追踪 (Detection types & identity tracking)
///
/// - types:   检测框 / 关键点 / 采集帧
/// - tracker: 跨帧身份追踪
pub mod tracker;
pub mod types;

pub use tracker::{SimpleTracker, TrackedObject, Tracker};
pub use types::{BBox, Frame, PersonLandmarks, Point};
