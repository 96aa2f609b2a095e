//! 运行参数 - 命令行 + JSON配置文件

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SentinelError};
use crate::input::VideoSource;
use crate::rules::DrinkingConfig;

/// 数字卫兵参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "数字卫兵 - 行为监控 (徘徊/吸烟/饮水)", long_about = None)]
pub struct Args {
    /// 视频源: 摄像头序号 (如 0) 或 视频文件路径
    #[arg(short, long, default_value = "0")]
    pub source: String,

    /// JSON配置文件 (不存在时写入默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    pub config: PathBuf,

    /// 感知回放日志 (JSON Lines); 不指定时感知结果为空
    #[arg(short, long)]
    pub perception: Option<PathBuf>,

    /// 使用帧序号/帧率作为时间戳, 而不是墙钟时间
    #[arg(long, default_value_t = false)]
    pub frame_clock: bool,

    /// 覆盖配置中的证据目录
    #[arg(long)]
    pub evidence_dir: Option<PathBuf>,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn video_source(&self) -> VideoSource {
        VideoSource::parse(&self.source)
    }
}

/// 行为监控配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === 区域 ===
    pub zone: Vec<(f32, f32)>,         // 多边形顶点 (像素)
    pub loiter_seconds: f64,           // 徘徊阈值
    pub presence_eviction_frames: u64, // 驻留记录清除帧数 (0=不清除)

    // === 追踪 ===
    pub track_match_distance: f32, // 左上角匹配距离 (像素)
    pub person_class_id: u32,
    pub bottle_class_id: u32,

    // === 吸烟 ===
    pub smoke_window_seconds: f64, // 松手后等待烟雾的窗口
    pub smoke_class_id: u32,

    // === 饮水 ===
    pub drinking: DrinkingConfig,

    // === 证据录像 ===
    pub recording_duration: f64,
    pub evidence_dir: PathBuf,
    pub jpeg_quality: u8,
    pub capture_fps: f64, // 视频源未提供帧率时使用

    // === 标注 ===
    /// 标注字体 (TTF/TTC); 加载失败时只画框不写字
    pub font_path: Option<PathBuf>,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            zone: vec![(100.0, 100.0), (500.0, 100.0), (500.0, 400.0), (100.0, 400.0)],
            loiter_seconds: 8.0,
            presence_eviction_frames: 300,

            track_match_distance: 30.0,
            person_class_id: 0,
            bottle_class_id: 39,

            smoke_window_seconds: 3.0,
            smoke_class_id: 0,

            drinking: DrinkingConfig::default(),

            recording_duration: 5.0,
            evidence_dir: PathBuf::from("evidence"),
            jpeg_quality: 85,
            capture_fps: 30.0,

            font_path: Some(PathBuf::from("assets/font/msyh.ttc")),
        }
    }
}

impl SentinelConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写入默认配置; 解析失败时使用默认值.
    pub fn load(path: &std::path::Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SentinelError::Config(format!("serialize: {}", e)))?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.zone.len() < 3 {
            return Err(SentinelError::Config(format!(
                "zone needs at least 3 vertices, got {}",
                self.zone.len()
            )));
        }
        let durations = [
            ("loiter_seconds", self.loiter_seconds),
            ("smoke_window_seconds", self.smoke_window_seconds),
            ("recording_duration", self.recording_duration),
            ("capture_fps", self.capture_fps),
        ];
        for (name, value) in durations {
            if !(value > 0.0) {
                return Err(SentinelError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.track_match_distance <= 0.0 {
            return Err(SentinelError::Config(
                "track_match_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前行为监控配置:");
        info!("  监控区域: {:?}", self.zone);
        info!("  徘徊阈值: {:.1}s", self.loiter_seconds);
        info!("  追踪匹配距离: {:.0}px", self.track_match_distance);
        info!("  烟雾等待窗口: {:.1}s", self.smoke_window_seconds);
        info!("  饮水判定: {:?}", self.drinking);
        info!(
            "  证据录像: {:.1}s → {}",
            self.recording_duration,
            self.evidence_dir.display()
        );
        match &self.font_path {
            Some(path) => info!("  标注字体: {}", path.display()),
            None => info!("  标注字体: 无 (只画框)"),
        }
    }
}
