//! 视频源 - 摄像头 / 网络流 / 视频文件
//!
//! 解码在独立线程中运行, 帧通过有界通道交给主循环逐帧处理.

use super::decode_filter::DecodeFilter;
use crate::detection::Frame;
use crate::error::{Result, SentinelError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 启动握手超时
const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// 释放时等待采集线程退出的时间
const RELEASE_GRACE: Duration = Duration::from_secs(2);

/// 等帧时检查停止标志的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 可信帧率上限
const MAX_FPS: f64 = 240.0;

/// 视频源
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// 本地摄像头序号
    Camera(usize),
    /// 网络流 (rtsp/rtmp/http)
    Stream(String),
    /// 视频文件
    File(PathBuf),
}

impl VideoSource {
    pub fn parse(s: &str) -> Self {
        if let Ok(index) = s.trim().parse::<usize>() {
            return VideoSource::Camera(index);
        }
        let lower = s.to_ascii_lowercase();
        if ["rtsp://", "rtmp://", "http://", "https://"]
            .iter()
            .any(|p| lower.starts_with(p))
        {
            VideoSource::Stream(s.to_string())
        } else {
            VideoSource::File(PathBuf::from(s))
        }
    }

    /// 实时源才会触发证据录像
    pub fn is_live(&self) -> bool {
        !matches!(self, VideoSource::File(_))
    }

    pub fn describe(&self) -> String {
        match self {
            VideoSource::Camera(index) => format!("camera {}", index),
            VideoSource::Stream(url) => url.clone(),
            VideoSource::File(path) => path.display().to_string(),
        }
    }
}

/// 逐帧视频源接口
pub trait FrameSource {
    /// 下一帧; None 表示流结束 (正常终止)
    fn next_frame(&mut self) -> Option<Frame>;

    fn is_live(&self) -> bool;

    /// 视频源帧率 (未知时 None)
    fn fps(&self) -> Option<f64>;

    /// 释放视频源 (可重复调用)
    fn release(&mut self);
}

/// 基于 FFmpeg 的视频源
pub struct FfmpegSource {
    source: VideoSource,
    rx: Option<Receiver<Frame>>,
    stop: Arc<AtomicBool>,
    /// 外部取消标志 (Ctrl+C / SIGTERM)
    cancel: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
    fps: Option<f64>,
}

impl FfmpegSource {
    /// 打开视频源; 打不开时返回 SourceUnavailable, 不创建任何状态
    pub fn open(source: VideoSource) -> Result<Self> {
        info!("📹 打开视频源: {}", source.describe());

        let live = source.is_live();
        // 文件源阻塞投递, 实时源只保留最新一帧
        let (tx, rx) = bounded::<Frame>(if live { 1 } else { 4 });
        let (ready_tx, ready_rx) = bounded::<std::result::Result<Option<f64>, String>>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let filter = DecodeFilter::new(tx, stop.clone(), live);
        let thread_source = source.clone();
        let handle = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                // 先读流信息拿到帧率, 读不到时由调用方回退到配置
                let fps = detect_fps(&thread_source);

                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let ctx = match FfmpegContext::builder()
                    .input(build_input(&thread_source))
                    .filter_descs(["format=yuv420p"].into())
                    .output(out)
                    .build()
                {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("build failed: {}", e)));
                        return;
                    }
                };

                let sch = match ctx.start() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("start failed: {}", e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(fps));

                // 等待解码结束 (流结束 / 取消 / 主循环关闭通道)
                let _ = sch.wait();
                info!("📹 解码循环结束");
            })
            .map_err(|e| unavailable(&source, format!("cannot spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(fps)) => {
                match fps {
                    Some(fps) => info!("✅ 视频源连接成功,开始采集! (帧率 {:.2})", fps),
                    None => info!("✅ 视频源连接成功,开始采集! (帧率未知)"),
                }
                Ok(Self {
                    source,
                    rx: Some(rx),
                    stop,
                    cancel: None,
                    handle: Some(handle),
                    fps,
                })
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(unavailable(&source, reason))
            }
            Err(RecvTimeoutError::Timeout) => {
                stop.store(true, Ordering::Relaxed);
                Err(unavailable(&source, "startup timed out".to_string()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(unavailable(&source, "capture thread exited".to_string()))
            }
        }
    }

    /// 共享外部取消标志; 等帧时一并检查
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Option<Frame> {
        let rx = self.rx.as_ref()?;
        let mut flags: Vec<&AtomicBool> = vec![&self.stop];
        if let Some(cancel) = &self.cancel {
            flags.push(cancel.as_ref());
        }
        poll_frame(rx, &flags)
    }

    fn is_live(&self) -> bool {
        self.source.is_live()
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // 关闭通道, 阻塞中的投递立即失败
        self.rx = None;

        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + RELEASE_GRACE;
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            info!("📹 视频源已释放: {}", self.source.describe());
        } else {
            warn!("⚠️ 采集线程未及时退出, 放弃等待: {}", self.source.describe());
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// 等待下一帧; 任一标志置位或通道关闭时返回 None
fn poll_frame(rx: &Receiver<Frame>, flags: &[&AtomicBool]) -> Option<Frame> {
    loop {
        if flags.iter().any(|f| f.load(Ordering::Relaxed)) {
            return None;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => return Some(frame),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// 读取视频流的平均帧率 (avg_frame_rate)
///
/// 摄像头需要设备格式才能打开, 不在这里读取.
fn detect_fps(source: &VideoSource) -> Option<f64> {
    let url = match source {
        VideoSource::Camera(_) => return None,
        VideoSource::Stream(url) => url.clone(),
        VideoSource::File(path) => path.display().to_string(),
    };
    match find_video_stream_info(url) {
        Ok(Some(StreamInfo::Video { avg_frame_rate, .. })) => {
            rational_fps(avg_frame_rate.num, avg_frame_rate.den)
        }
        Ok(_) => None,
        Err(e) => {
            warn!("⚠️ 无法读取流信息: {}", e);
            None
        }
    }
}

/// 有理数帧率 → fps; 0/0, 负数或离谱的值视为未知
pub fn rational_fps(num: i32, den: i32) -> Option<f64> {
    if num <= 0 || den <= 0 {
        return None;
    }
    let fps = num as f64 / den as f64;
    (fps.is_finite() && fps <= MAX_FPS).then_some(fps)
}

fn unavailable(source: &VideoSource, reason: String) -> SentinelError {
    SentinelError::SourceUnavailable {
        source_name: source.describe(),
        reason,
    }
}

fn build_input(source: &VideoSource) -> Input {
    match source {
        VideoSource::Camera(index) => {
            let url = format_camera_url(*index);
            info!("🔗 摄像头URL: {} (格式: {})", url, CAMERA_FORMAT);
            Input::new(url).set_format(CAMERA_FORMAT)
        }
        VideoSource::Stream(url) if url.to_ascii_lowercase().starts_with("rtsp://") => {
            Input::new(url.as_str()).set_input_opts([("rtsp_transport", "tcp")].into())
        }
        VideoSource::Stream(url) => Input::new(url.as_str()),
        VideoSource::File(path) => Input::new(path.display().to_string()),
    }
}

#[cfg(target_os = "windows")]
const CAMERA_FORMAT: &str = "dshow"; // DirectShow

#[cfg(target_os = "macos")]
const CAMERA_FORMAT: &str = "avfoundation"; // AVFoundation

#[cfg(target_os = "linux")]
const CAMERA_FORMAT: &str = "v4l2"; // Video4Linux2

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
const CAMERA_FORMAT: &str = "video4linux2";

/// 格式化摄像头URL - 根据平台选择
fn format_camera_url(index: usize) -> String {
    #[cfg(target_os = "windows")]
    {
        // DirectShow 需要设备名称
        let name = ez_ffmpeg::device::get_input_video_devices()
            .ok()
            .and_then(|devices| devices.into_iter().nth(index))
            .unwrap_or_else(|| index.to_string());
        format!("video={}", name)
    }
    #[cfg(target_os = "linux")]
    {
        format!("/dev/video{}", index)
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        format!("{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources() {
        assert_eq!(VideoSource::parse("0"), VideoSource::Camera(0));
        assert_eq!(VideoSource::parse(" 2 "), VideoSource::Camera(2));
        assert_eq!(
            VideoSource::parse("rtsp://cam/1"),
            VideoSource::Stream("rtsp://cam/1".to_string())
        );
        assert_eq!(
            VideoSource::parse("data/sample_video.mp4"),
            VideoSource::File(PathBuf::from("data/sample_video.mp4"))
        );
    }

    #[test]
    fn test_only_files_are_not_live() {
        assert!(VideoSource::Camera(0).is_live());
        assert!(VideoSource::Stream("rtsp://x".to_string()).is_live());
        assert!(!VideoSource::File(PathBuf::from("a.mp4")).is_live());
    }

    #[test]
    fn test_rational_fps() {
        assert_eq!(rational_fps(25, 1), Some(25.0));
        let ntsc = rational_fps(30000, 1001).unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(rational_fps(0, 0), None);
        assert_eq!(rational_fps(25, 0), None);
        assert_eq!(rational_fps(-1, 1), None);
        assert_eq!(rational_fps(90000, 1), None);
    }

    #[test]
    fn test_poll_frame_returns_queued_frame() {
        let (tx, rx) = bounded(1);
        tx.send(Frame::new(3, image::RgbImage::new(2, 2))).unwrap();
        let stop = AtomicBool::new(false);
        assert_eq!(poll_frame(&rx, &[&stop]).map(|f| f.index), Some(3));
    }

    #[test]
    fn test_poll_frame_wakes_on_cancel_while_starved() {
        // 发送端存活但没有帧 (网络卡住): 取消后应在一个间隔内返回
        let (_tx, rx) = bounded::<Frame>(1);
        let stop = AtomicBool::new(false);
        let cancel = Arc::new(AtomicBool::new(false));
        let setter = cancel.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            setter.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        assert!(poll_frame(&rx, &[&stop, cancel.as_ref()]).is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
        t.join().unwrap();
    }

    #[test]
    fn test_poll_frame_ends_on_disconnect() {
        let (tx, rx) = bounded::<Frame>(1);
        drop(tx);
        let stop = AtomicBool::new(false);
        assert!(poll_frame(&rx, &[&stop]).is_none());
    }
}
