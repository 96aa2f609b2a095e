//! 行为监控数据结构定义
//! Data structures shared by tracking, rules and recording

use image::RgbImage;
use serde::{Deserialize, Serialize};

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box, 像素坐标)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 左上角 (追踪匹配的参考点)
    pub fn top_left(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// 中心点
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    /// 计算两个边界框的IOU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.width() * self.height() + other.width() * other.height() - intersection;

        if union <= 0.0 {
            return 0.0;
        }

        intersection / union
    }
}

/// 像素坐标点
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// 人体关键点 (饮水检测用: 手指尖 + 嘴部锚点)
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonLandmarks {
    pub hand: Option<Point>,
    pub mouth: Option<Point>,
}

/// 采集帧 (采集线程 → 主循环)
#[derive(Clone)]
pub struct Frame {
    pub index: u64, // 帧序号
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("size", &self.size())
            .finish()
    }
}
