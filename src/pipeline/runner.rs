//! 帧循环 (Frame loop)
//!
//! 取帧 → 融合 → 日志 → 标注 → 录像, 逐帧同步执行.
//! 任何退出路径 (流结束 / 取消 / 错误) 都先关闭录像再释放视频源.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::fusion::SentinelPipeline;
use crate::error::{Result, SentinelError};
use crate::input::FrameSource;
use crate::recorder::{EvidenceRecorder, RecorderStatus};
use crate::render::Annotator;

/// 帧时间戳来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameClock {
    /// 自启动以来的挂钟时间
    Wall,
    /// 帧序号 / fps (离线回放可复现)
    Frames { fps: f64 },
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub events: u64,
    pub evidence: Vec<PathBuf>,
    pub cancelled: bool,
}

pub struct Runner {
    source: Box<dyn FrameSource>,
    pipeline: SentinelPipeline,
    recorder: EvidenceRecorder,
    annotator: Annotator,
    clock: FrameClock,
    cancel: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: SentinelPipeline,
        mut recorder: EvidenceRecorder,
        clock: FrameClock,
    ) -> Self {
        if let Some(fps) = source.fps() {
            recorder.set_fps(fps);
        }
        Self {
            source,
            pipeline,
            recorder,
            annotator: Annotator::default(),
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 使用外部取消标志 (与信号处理 / 视频源共享)
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// 取消标志; 置为 true 后在下一帧前停止
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn pipeline(&self) -> &SentinelPipeline {
        &self.pipeline
    }

    /// 运行到流结束或取消
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let result = self.run_loop(&mut summary);

        // 先关录像, 再释放视频源
        let closed = self.recorder.close();
        self.source.release();

        if let Ok(Some(path)) = &closed {
            summary.evidence.push(path.clone());
        }
        result?;
        match closed {
            Err(SentinelError::EvidenceWrite(msg)) => {
                warn!("⚠️ 证据文件收尾失败: {}", msg);
            }
            other => {
                other?;
            }
        }

        info!(
            "🏁 处理结束: {} 帧, {} 个事件, {} 个证据文件{}",
            summary.frames,
            summary.events,
            summary.evidence.len(),
            if summary.cancelled { " (已取消)" } else { "" }
        );
        Ok(summary)
    }

    fn run_loop(&mut self, summary: &mut RunSummary) -> Result<()> {
        let started = Instant::now();
        let is_live = self.source.is_live();

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!("🛑 收到停止请求");
                summary.cancelled = true;
                return Ok(());
            }

            let Some(mut frame) = self.source.next_frame() else {
                // 等帧期间收到取消也会让视频源返回 None
                if self.cancel.load(Ordering::Relaxed) {
                    info!("🛑 收到停止请求");
                    summary.cancelled = true;
                } else {
                    info!("📹 视频流结束");
                }
                return Ok(());
            };

            let now = match self.clock {
                FrameClock::Wall => started.elapsed().as_secs_f64(),
                FrameClock::Frames { fps } => frame.index as f64 / fps,
            };

            let report = self.pipeline.process(&frame, now);
            for event in &report.events {
                info!("[{:.1}s] {}", now, event);
            }
            summary.frames += 1;
            summary.events += report.events.len() as u64;

            self.annotator.annotate(
                &mut frame.image,
                &report,
                self.pipeline.zone(),
                self.recorder.is_recording(),
            );

            match self
                .recorder
                .on_frame(&report.events, now, is_live, &frame.image)
            {
                Ok(RecorderStatus::Stopped(path)) => summary.evidence.push(path),
                Ok(_) => {}
                Err(SentinelError::EvidenceWrite(msg)) => {
                    warn!("⚠️ 证据写入失败, 继续处理: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
