//! 数字卫兵 (Digital Sentinel)
//!
//! 行为监控: 区域徘徊 / 吸烟 / 饮水, 违规时录制证据视频
//!
//! 系统架构:
//! 1. 采集线程: 视频解码 (FFmpeg)
//! 2. 主线程:   感知 → 追踪 → 规则 → 标注 → 录像 (逐帧同步)
//! 3. 信号线程: Ctrl+C / SIGTERM → 取消标志

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cctv_sentinel::input::{FfmpegSource, FrameSource};
use cctv_sentinel::perception::{PerceptionAdapters, ReplayPerception};
use cctv_sentinel::render::Annotator;
use cctv_sentinel::{
    Args, EvidenceRecorder, FrameClock, MjpegSink, RecorderConfig, Runner, SentinelConfig,
    SentinelPipeline,
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG 优先, 否则使用 --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cctv_sentinel={0},sentinel={0}", args.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("🚀 数字卫兵系统启动");

    // ========== 配置 ==========
    let mut config = SentinelConfig::load(&args.config);
    if let Some(dir) = &args.evidence_dir {
        config.evidence_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    config.print_summary();

    // ========== 感知 ==========
    let perception = match &args.perception {
        Some(path) => {
            let replay = ReplayPerception::load(path)
                .with_context(|| format!("cannot load perception log {}", path.display()))?;
            info!("🧠 感知回放: {} ({} 帧)", path.display(), replay.len());
            PerceptionAdapters::shared(replay)
        }
        None => {
            warn!("⚠️ 未指定感知日志, 所有帧视为无检测结果");
            PerceptionAdapters::default()
        }
    };
    let pipeline = SentinelPipeline::new(&config, perception)?;

    // ========== 终止信号 ==========
    let cancel = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(cancel.clone())?;

    // ========== 视频源 ==========
    let source = match FfmpegSource::open(args.video_source()) {
        Ok(source) => source.with_cancel(cancel.clone()),
        Err(e) => {
            error!("❌ 无法打开视频源: {}", e);
            return Err(e.into());
        }
    };
    let fps = source.fps().unwrap_or(config.capture_fps);
    let clock = if args.frame_clock {
        FrameClock::Frames { fps }
    } else {
        FrameClock::Wall
    };

    // ========== 证据录像 ==========
    let recorder = EvidenceRecorder::new(
        RecorderConfig {
            duration: config.recording_duration,
            evidence_dir: config.evidence_dir.clone(),
            fps,
        },
        Box::new(MjpegSink::new(config.jpeg_quality)),
    )?;

    // ========== 标注 ==========
    let annotator = match &config.font_path {
        Some(path) => Annotator::load(path).unwrap_or_else(|e| {
            warn!("⚠️ 字体加载失败, 只画框不写字: {}", e);
            Annotator::default()
        }),
        None => Annotator::default(),
    };

    // ========== 主循环 ==========
    let mut runner = Runner::new(Box::new(source), pipeline, recorder, clock)
        .with_cancel(cancel)
        .with_annotator(annotator);
    let summary = runner.run()?;

    for path in &summary.evidence {
        info!("📁 证据文件: {}", path.display());
    }
    Ok(())
}

/// 后台线程等待终止信号, 收到后置位取消标志
fn spawn_shutdown_listener(cancel: Arc<AtomicBool>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot build signal runtime")?;
    std::thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_shutdown());
            cancel.store(true, Ordering::Relaxed);
        })
        .context("cannot spawn signal thread")?;
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("⚠️ 无法监听 Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("⚠️ 无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 收到终止信号, 正在收尾...");
}
