/// 证据录像 (Evidence recorder)
///
/// 违规事件触发一次固定时长的录像会话:
/// - 只对实时源触发
/// - 同一时间最多一个会话, 会话中的新违规不延长也不重开
/// - 超过截止时间后写完当前帧再关闭
pub mod mjpeg;

pub use mjpeg::{EvidenceMeta, MjpegSink};

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{error, info, warn};

use crate::error::{Result, SentinelError};
use crate::rules::{dominant_violation, RuleEvent, ViolationKind};

// ========== 输出接口 ==========

/// 单个会话的帧写入器
pub trait FrameWriter {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// 刷新并关闭, 返回写入帧数 (可重复调用)
    fn finish(&mut self) -> Result<u64>;
}

/// 证据输出 (负责创建写入器)
pub trait EvidenceSink {
    /// 文件扩展名
    fn extension(&self) -> &str;

    fn open(
        &mut self,
        path: &Path,
        size: (u32, u32),
        fps: f64,
        kind: ViolationKind,
    ) -> Result<Box<dyn FrameWriter>>;
}

// ========== 录像会话 ==========

/// 一次录像会话; 析构时保证刷新关闭
pub struct RecordingSession {
    pub kind: ViolationKind,
    pub output_path: PathBuf,
    pub start_time: f64,
    pub stop_deadline: f64,
    writer: Box<dyn FrameWriter>,
    frames: u64,
    closed: bool,
}

impl RecordingSession {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write(&mut self, image: &RgbImage) -> Result<()> {
        self.writer.write_frame(image)?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<u64> {
        if self.closed {
            return Ok(self.frames);
        }
        self.closed = true;
        self.writer.finish()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("❌ 关闭证据文件失败 {}: {}", self.output_path.display(), e);
        }
    }
}

/// 每帧录像状态
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderStatus {
    Idle,
    Started(PathBuf),
    Recording,
    Stopped(PathBuf),
}

// ========== 录像器 ==========

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub duration: f64,
    pub evidence_dir: PathBuf,
    pub fps: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            duration: 5.0,
            evidence_dir: PathBuf::from("evidence"),
            fps: 30.0,
        }
    }
}

/// 证据录像器
pub struct EvidenceRecorder {
    config: RecorderConfig,
    sink: Box<dyn EvidenceSink>,
    session: Option<RecordingSession>,
}

impl EvidenceRecorder {
    /// 创建录像器, 同时创建证据目录
    pub fn new(config: RecorderConfig, sink: Box<dyn EvidenceSink>) -> Result<Self> {
        std::fs::create_dir_all(&config.evidence_dir).map_err(|source| {
            SentinelError::EvidenceAllocation {
                path: config.evidence_dir.clone(),
                source,
            }
        })?;
        Ok(Self {
            config,
            sink,
            session: None,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.config.fps = fps;
    }

    /// 处理一帧
    ///
    /// 空闲且为实时源时, 任一违规事件开启新会话 (截止 = now + duration);
    /// 录像中每帧 (含触发帧) 都写入; now 超过截止时间时写完本帧后关闭.
    pub fn on_frame(
        &mut self,
        events: &[RuleEvent],
        now: f64,
        is_live: bool,
        image: &RgbImage,
    ) -> Result<RecorderStatus> {
        let mut started = None;
        if is_live && self.session.is_none() {
            if let Some(kind) = dominant_violation(events) {
                started = Some(self.start(kind, now, image.dimensions())?);
            }
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(RecorderStatus::Idle);
        };

        if let Err(e) = session.write(image) {
            // 写入失败: 丢弃会话 (析构时尽量刷新)
            warn!("⚠️ 证据写入失败, 结束录像: {}", e);
            self.session = None;
            return Err(e);
        }

        if now > session.stop_deadline {
            let path = self.finish_session()?;
            return Ok(RecorderStatus::Stopped(path));
        }

        Ok(match started {
            Some(path) => RecorderStatus::Started(path),
            None => RecorderStatus::Recording,
        })
    }

    /// 立即关闭当前会话 (取消 / 退出路径)
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        if self.session.is_none() {
            return Ok(None);
        }
        self.finish_session().map(Some)
    }

    fn start(&mut self, kind: ViolationKind, now: f64, size: (u32, u32)) -> Result<PathBuf> {
        let path = evidence_path(
            &self.config.evidence_dir,
            kind,
            &crate::evidence_timestamp(),
            self.sink.extension(),
        );
        let writer = self.sink.open(&path, size, self.config.fps, kind)?;
        info!("--- 🔴 Recording started: {} ---", path.display());

        self.session = Some(RecordingSession {
            kind,
            output_path: path.clone(),
            start_time: now,
            stop_deadline: now + self.config.duration,
            writer,
            frames: 0,
            closed: false,
        });
        Ok(path)
    }

    fn finish_session(&mut self) -> Result<PathBuf> {
        let Some(mut session) = self.session.take() else {
            return Err(SentinelError::EvidenceWrite("no open session".to_string()));
        };
        let frames = session.close()?;
        info!(
            "--- ⏹ Recording stopped: {} ({} frames) ---",
            session.output_path.display(),
            frames
        );
        Ok(session.output_path.clone())
    }
}

/// 证据文件路径: `{dir}/{KIND}_{stamp}.{ext}`, 重名时追加 `_1`, `_2`, ...
pub fn evidence_path(dir: &Path, kind: ViolationKind, stamp: &str, ext: &str) -> PathBuf {
    let base = format!("{}_{}", kind.label(), stamp);
    let mut path = dir.join(format!("{}.{}", base, ext));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", base, n, ext));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        opened: Vec<(PathBuf, ViolationKind)>,
        frames: u64,
        finished: u32,
    }

    struct MemorySink {
        log: Arc<Mutex<Log>>,
    }

    struct MemoryWriter {
        log: Arc<Mutex<Log>>,
    }

    impl EvidenceSink for MemorySink {
        fn extension(&self) -> &str {
            "mem"
        }

        fn open(
            &mut self,
            path: &Path,
            _size: (u32, u32),
            _fps: f64,
            kind: ViolationKind,
        ) -> Result<Box<dyn FrameWriter>> {
            self.log
                .lock()
                .unwrap()
                .opened
                .push((path.to_path_buf(), kind));
            Ok(Box::new(MemoryWriter {
                log: self.log.clone(),
            }))
        }
    }

    impl FrameWriter for MemoryWriter {
        fn write_frame(&mut self, _image: &RgbImage) -> Result<()> {
            self.log.lock().unwrap().frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<u64> {
            let mut log = self.log.lock().unwrap();
            log.finished += 1;
            Ok(log.frames)
        }
    }

    fn recorder() -> (EvidenceRecorder, Arc<Mutex<Log>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Log::default()));
        let config = RecorderConfig {
            duration: 5.0,
            evidence_dir: dir.path().join("evidence"),
            fps: 30.0,
        };
        let rec =
            EvidenceRecorder::new(config, Box::new(MemorySink { log: log.clone() })).unwrap();
        (rec, log, dir)
    }

    fn img() -> RgbImage {
        RgbImage::new(16, 12)
    }

    fn smoking() -> Vec<RuleEvent> {
        vec![RuleEvent::SmokingViolation { actor: None }]
    }

    #[test]
    fn test_session_deadline_is_first_trigger() {
        let (mut rec, log, _dir) = recorder();
        assert_eq!(rec.on_frame(&[], 1.0, true, &img()).unwrap(), RecorderStatus::Idle);

        let status = rec.on_frame(&smoking(), 2.0, true, &img()).unwrap();
        assert!(matches!(status, RecorderStatus::Started(_)));

        // 录像中的新违规不延长截止时间
        let status = rec.on_frame(&smoking(), 4.0, true, &img()).unwrap();
        assert_eq!(status, RecorderStatus::Recording);
        assert_eq!(rec.session().unwrap().stop_deadline, 7.0);

        assert_eq!(
            rec.on_frame(&[], 6.99, true, &img()).unwrap(),
            RecorderStatus::Recording
        );
        assert!(rec.is_recording());

        let status = rec.on_frame(&[], 7.01, true, &img()).unwrap();
        assert!(matches!(status, RecorderStatus::Stopped(_)));
        assert!(!rec.is_recording());

        let log = log.lock().unwrap();
        assert_eq!(log.opened.len(), 1);
        assert_eq!(log.frames, 4);
        assert_eq!(log.finished, 1);
    }

    #[test]
    fn test_file_source_never_records() {
        let (mut rec, log, _dir) = recorder();
        assert_eq!(
            rec.on_frame(&smoking(), 2.0, false, &img()).unwrap(),
            RecorderStatus::Idle
        );
        assert!(log.lock().unwrap().opened.is_empty());
    }

    #[test]
    fn test_zone_events_do_not_trigger() {
        let (mut rec, _log, _dir) = recorder();
        let events = vec![
            RuleEvent::ZoneEntered { track_id: 1 },
            RuleEvent::ZoneLeft {
                track_id: 1,
                duration: 2.0,
            },
        ];
        assert_eq!(
            rec.on_frame(&events, 2.0, true, &img()).unwrap(),
            RecorderStatus::Idle
        );
    }

    #[test]
    fn test_kind_priority_names_file() {
        let (mut rec, log, _dir) = recorder();
        let events = vec![
            RuleEvent::Loitering { track_id: 3 },
            RuleEvent::Drinking { track_id: 4 },
        ];
        rec.on_frame(&events, 0.0, true, &img()).unwrap();
        let log = log.lock().unwrap();
        let (path, kind) = &log.opened[0];
        assert_eq!(*kind, ViolationKind::Drinking);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("DRINKING_"));
        assert!(name.ends_with(".mem"));
    }

    #[test]
    fn test_new_session_after_close() {
        let (mut rec, log, _dir) = recorder();
        rec.on_frame(&smoking(), 0.0, true, &img()).unwrap();
        rec.on_frame(&[], 5.5, true, &img()).unwrap();
        assert!(!rec.is_recording());
        rec.on_frame(&smoking(), 6.0, true, &img()).unwrap();
        assert_eq!(rec.session().unwrap().stop_deadline, 11.0);
        assert_eq!(log.lock().unwrap().opened.len(), 2);
    }

    #[test]
    fn test_close_and_drop_flush_open_session() {
        let (mut rec, log, _dir) = recorder();
        rec.on_frame(&smoking(), 0.0, true, &img()).unwrap();
        assert!(rec.close().unwrap().is_some());
        assert_eq!(rec.close().unwrap(), None);
        assert_eq!(log.lock().unwrap().finished, 1);

        rec.on_frame(&smoking(), 10.0, true, &img()).unwrap();
        drop(rec);
        assert_eq!(log.lock().unwrap().finished, 2);
    }

    #[test]
    fn test_evidence_path_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let first = evidence_path(dir.path(), ViolationKind::Smoking, "20240101_120000", "mjpeg");
        assert_eq!(
            first.file_name().unwrap().to_string_lossy(),
            "SMOKING_20240101_120000.mjpeg"
        );
        std::fs::write(&first, b"x").unwrap();
        let second = evidence_path(dir.path(), ViolationKind::Smoking, "20240101_120000", "mjpeg");
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "SMOKING_20240101_120000_1.mjpeg"
        );
    }

    #[test]
    fn test_real_mjpeg_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            duration: 1.0,
            evidence_dir: dir.path().to_path_buf(),
            fps: 10.0,
        };
        let mut rec = EvidenceRecorder::new(config, Box::new(MjpegSink::new(60))).unwrap();
        rec.on_frame(&[RuleEvent::Loitering { track_id: 1 }], 0.0, true, &img())
            .unwrap();
        rec.on_frame(&[], 0.5, true, &img()).unwrap();
        let status = rec.on_frame(&[], 1.5, true, &img()).unwrap();
        let RecorderStatus::Stopped(path) = status else {
            panic!("expected session to stop, got {:?}", status);
        };
        assert!(path.exists());
        let meta: EvidenceMeta =
            serde_json::from_str(&std::fs::read_to_string(path.with_extension("json")).unwrap())
                .unwrap();
        assert_eq!(meta.frames, 3);
        assert_eq!(meta.kind, "LOITERING");
    }
}
