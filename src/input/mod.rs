/// 视频输入系统 (Video Input System)
///
/// 独立采集线程负责解码, 主循环逐帧拉取
/// - FfmpegSource: 摄像头 / 网络流 / 视频文件
/// - DecodeFilter: YUV420P → RGB 帧
pub mod decode_filter;
pub mod source;

pub use decode_filter::DecodeFilter;
pub use source::{rational_fps, FfmpegSource, FrameSource, VideoSource};
