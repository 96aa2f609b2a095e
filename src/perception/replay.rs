//! 感知回放: 从 JSON Lines 日志读取预先计算好的逐帧感知结果
//!
//! 每行一条记录:
//! ```json
//! {"frame": 12,
//!  "detections": [{"x1": 120, "y1": 80, "x2": 220, "y2": 380, "confidence": 0.91, "class_id": 0}],
//!  "hand_near_mouth": true,
//!  "landmarks": [{"person": {"x1": 120, "y1": 80, "x2": 220, "y2": 380},
//!                 "hand": {"x": 170, "y": 120}, "mouth": {"x": 168, "y": 112}}],
//!  "smoke": [{"x1": 150, "y1": 60, "x2": 200, "y2": 110}]}
//! ```
//! 日志中缺失的帧视为什么都没检测到.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ObjectDetector, PoseEstimator, SmokeDetector};
use crate::detection::{BBox, Frame, PersonLandmarks, Point};
use crate::error::{Result, SentinelError};

/// 关键点匹配人体框的最小IOU
const LANDMARK_MIN_IOU: f32 = 0.5;

/// 单人关键点记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub person: BBox,
    #[serde(default)]
    pub hand: Option<Point>,
    #[serde(default)]
    pub mouth: Option<Point>,
}

/// 单帧感知记录
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<BBox>,
    #[serde(default)]
    pub hand_near_mouth: bool,
    #[serde(default)]
    pub landmarks: Vec<LandmarkRecord>,
    #[serde(default)]
    pub smoke: Vec<BBox>,
}

/// 回放感知 (实现全部三个适配器, 可廉价克隆)
#[derive(Clone, Debug, Default)]
pub struct ReplayPerception {
    records: Arc<HashMap<u64, FrameRecord>>,
}

impl ReplayPerception {
    pub fn from_records(records: Vec<FrameRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.frame, r)).collect();
        Self {
            records: Arc::new(records),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: FrameRecord = serde_json::from_str(line)
                .map_err(|e| SentinelError::PerceptionLog(format!("line {}: {}", n + 1, e)))?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SentinelError::PerceptionLog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let replay = Self::parse(&text)?;
        info!(
            "📼 感知日志已加载: {} ({} 帧)",
            path.display(),
            replay.records.len()
        );
        Ok(replay)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, frame: &Frame) -> Option<&FrameRecord> {
        self.records.get(&frame.index)
    }
}

impl ObjectDetector for ReplayPerception {
    fn detect(&mut self, frame: &Frame) -> Vec<BBox> {
        self.record(frame)
            .map(|r| r.detections.clone())
            .unwrap_or_default()
    }
}

impl PoseEstimator for ReplayPerception {
    fn is_hand_near_mouth(&mut self, frame: &Frame) -> bool {
        self.record(frame).is_some_and(|r| r.hand_near_mouth)
    }

    fn person_landmarks(&mut self, frame: &Frame, person: &BBox) -> Option<PersonLandmarks> {
        let record = self.record(frame)?;
        record
            .landmarks
            .iter()
            .map(|lm| (lm.person.iou(person), lm))
            .filter(|(iou, _)| *iou > LANDMARK_MIN_IOU)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, lm)| PersonLandmarks {
                hand: lm.hand,
                mouth: lm.mouth,
            })
    }
}

impl SmokeDetector for ReplayPerception {
    fn detect(&mut self, frame: &Frame, class_id: u32) -> (bool, Vec<BBox>) {
        let boxes: Vec<BBox> = self
            .record(frame)
            .map(|r| {
                r.smoke
                    .iter()
                    .filter(|b| b.class_id == class_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        (!boxes.is_empty(), boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    const LOG: &str = r#"
{"frame": 0, "detections": [{"x1": 120, "y1": 80, "x2": 220, "y2": 380, "confidence": 0.91, "class_id": 0}]}

{"frame": 2, "hand_near_mouth": true, "landmarks": [{"person": {"x1": 120, "y1": 80, "x2": 220, "y2": 380}, "hand": {"x": 170, "y": 120}, "mouth": {"x": 168, "y": 112}}], "smoke": [{"x1": 150, "y1": 60, "x2": 200, "y2": 110}]}
"#;

    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::new(8, 8))
    }

    #[test]
    fn test_parse_and_lookup() {
        let mut replay = ReplayPerception::parse(LOG).unwrap();
        assert_eq!(replay.len(), 2);

        let dets = ObjectDetector::detect(&mut replay, &frame(0));
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);

        // 日志中没有的帧
        assert!(ObjectDetector::detect(&mut replay, &frame(1)).is_empty());
        assert!(!replay.is_hand_near_mouth(&frame(1)));
        assert!(replay.is_hand_near_mouth(&frame(2)));
    }

    #[test]
    fn test_landmarks_matched_by_iou() {
        let mut replay = ReplayPerception::parse(LOG).unwrap();
        let near = BBox::new(125.0, 85.0, 222.0, 380.0, 0.9, 0);
        let lm = replay.person_landmarks(&frame(2), &near).unwrap();
        assert_eq!(lm.hand, Some(Point::new(170.0, 120.0)));

        let elsewhere = BBox::new(500.0, 80.0, 600.0, 380.0, 0.9, 0);
        assert!(replay.person_landmarks(&frame(2), &elsewhere).is_none());
    }

    #[test]
    fn test_smoke_filtered_by_class() {
        let mut replay = ReplayPerception::parse(LOG).unwrap();
        let (seen, boxes) = SmokeDetector::detect(&mut replay, &frame(2), 0);
        assert!(seen);
        assert_eq!(boxes.len(), 1);
        let (seen, boxes) = SmokeDetector::detect(&mut replay, &frame(2), 1);
        assert!(!seen);
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = ReplayPerception::parse("{\"frame\": 0}\n{oops}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
