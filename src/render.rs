//! 画面标注 (Frame annotation)
//!
//! 只读取 FrameReport, 不参与任何判定; 标注后的帧交给录像器.
//! 有字体时额外写出轨迹ID / 吸烟状态 / 本帧事件, 证据视频可以独立解读.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;
use tracing::info;

use crate::detection::BBox;
use crate::error::{Result, SentinelError};
use crate::pipeline::FrameReport;
use crate::rules::{SmokingState, Zone};

// ========== 颜色 ==========

pub const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TRACK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const POSE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
pub const SMOKING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const DRINKING_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const SMOKE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const BADGE_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const LINE_WIDTH: i32 = 2;
const BADGE_RADIUS: i32 = 8;
const TEXT_SIZE: f32 = 18.0;
const TEXT_LINE: i32 = 20;

/// 帧标注器; 字体可选
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(data)
            .map_err(|e| SentinelError::Config(format!("invalid font: {}", e)))?;
        Ok(Self::new(Some(font)))
    }

    /// 从字体文件加载 (TTF / TTC)
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            SentinelError::Config(format!("cannot read font {}: {}", path.display(), e))
        })?;
        let annotator = Self::from_bytes(data)?;
        info!("✅ 标注字体加载成功: {}", path.display());
        Ok(annotator)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 标注一帧: 区域 → 烟雾框 → 人员框 → 文字 → 录像标记
    pub fn annotate(&self, image: &mut RgbImage, report: &FrameReport, zone: &Zone, recording: bool) {
        draw_zone(image, zone);

        for smoke in &report.smoke_boxes {
            draw_box(image, smoke, SMOKE_COLOR);
        }

        let smoking = track_smoking_color(report);
        for track in &report.tracks {
            let color = if report.drinking.contains(&track.id) {
                DRINKING_COLOR
            } else {
                smoking.unwrap_or(TRACK_COLOR)
            };
            draw_box(image, &track.bbox, color);
            self.draw_label(image, &track.bbox, &format!("ID{}", track.id), color);
        }

        self.draw_status(image, report);

        if recording {
            draw_badge(image);
        }
    }

    /// 框上方的标签
    fn draw_label(&self, image: &mut RgbImage, bbox: &BBox, text: &str, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let x = bbox.x1.max(0.0) as i32;
        let y = (bbox.y1 as i32 - TEXT_LINE).max(0);
        draw_text_mut(image, color, x, y, PxScale::from(TEXT_SIZE), font, text);
    }

    /// 左上角: 吸烟状态 + 本帧事件
    fn draw_status(&self, image: &mut RgbImage, report: &FrameReport) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(TEXT_SIZE);
        let state = format!("STATE: {}", report.smoking_state);
        draw_text_mut(image, TEXT_COLOR, 10, 10, scale, font, &state);

        for (i, event) in report.events.iter().enumerate() {
            let color = if event.is_violation() {
                SMOKING_COLOR
            } else {
                TEXT_COLOR
            };
            let y = 10 + TEXT_LINE * (i as i32 + 1);
            draw_text_mut(image, color, 10, y, scale, font, &event.to_string());
        }
    }
}

/// 吸烟状态对应的人员框颜色 (None = 默认绿色); 抬手姿态优先于烟雾
fn track_smoking_color(report: &FrameReport) -> Option<Rgb<u8>> {
    if report.smoking_state == SmokingState::PoseActive {
        Some(POSE_COLOR)
    } else if report.smoke_detected || report.smoking_confirmed() {
        Some(SMOKING_COLOR)
    } else {
        None
    }
}

fn draw_zone(image: &mut RgbImage, zone: &Zone) {
    let vertices = zone.vertices();
    for (i, a) in vertices.iter().enumerate() {
        let b = &vertices[(i + 1) % vertices.len()];
        draw_line_segment_mut(image, (a.x, a.y), (b.x, b.y), ZONE_COLOR);
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let (img_w, img_h) = image.dimensions();
    let x1 = bbox.x1.max(0.0) as i32;
    let y1 = bbox.y1.max(0.0) as i32;
    let x2 = (bbox.x2 as i32).min(img_w as i32 - 1);
    let y2 = (bbox.y2 as i32).min(img_h as i32 - 1);

    for inset in 0..LINE_WIDTH {
        let w = x2 - x1 - 2 * inset;
        let h = y2 - y1 - 2 * inset;
        // 零尺寸 Rect 会 panic
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// 右上角录像标记
fn draw_badge(image: &mut RgbImage) {
    let (w, h) = image.dimensions();
    let size = (BADGE_RADIUS * 2 + 8) as u32;
    if w < size || h < size {
        return;
    }
    let cx = w as i32 - BADGE_RADIUS - 4;
    let cy = BADGE_RADIUS + 4;
    draw_filled_rect_mut(
        image,
        Rect::at(w as i32 - size as i32, 0).of_size(size, size),
        Rgb([255, 255, 255]),
    );
    draw_filled_circle_mut(image, (cx, cy), BADGE_RADIUS, BADGE_COLOR);
}
