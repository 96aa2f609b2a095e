//! 饮水检测 (Drinking detector)
//!
//! 无状态几何判断, 每帧每人重新计算: 手靠近嘴 且 手边有瓶子.

use serde::{Deserialize, Serialize};

use crate::detection::{BBox, PersonLandmarks, Point};

/// 手到嘴的距离阈值
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MouthProximity {
    /// 固定像素半径
    Fixed { radius: f32 },
    /// 人体框高度 × 比例 (随拍摄距离缩放)
    FaceRelative { ratio: f32 },
}

/// 瓶子到手的判定方式
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BottleProximity {
    /// 瓶子框中心在手的固定像素半径内
    Radius { radius: f32 },
    /// 手点落在瓶子框内
    HandInside,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrinkingConfig {
    pub mouth_proximity: MouthProximity,
    pub bottle_proximity: BottleProximity,
}

impl Default for DrinkingConfig {
    fn default() -> Self {
        Self {
            mouth_proximity: MouthProximity::FaceRelative { ratio: 0.08 },
            bottle_proximity: BottleProximity::Radius { radius: 120.0 },
        }
    }
}

/// 饮水检测器
#[derive(Clone, Debug, Default)]
pub struct DrinkingDetector {
    config: DrinkingConfig,
}

impl DrinkingDetector {
    pub fn new(config: DrinkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DrinkingConfig {
        &self.config
    }

    /// 手与嘴距离是否在阈值内
    fn hand_near_mouth(&self, hand: &Point, mouth: &Point, person: &BBox) -> bool {
        let threshold = match self.config.mouth_proximity {
            MouthProximity::Fixed { radius } => radius,
            MouthProximity::FaceRelative { ratio } => person.height().abs() * ratio,
        };
        hand.distance(mouth) <= threshold
    }

    fn bottle_near_hand(&self, hand: &Point, bottle: &BBox) -> bool {
        match self.config.bottle_proximity {
            BottleProximity::Radius { radius } => bottle.center().distance(hand) < radius,
            BottleProximity::HandInside => bottle.contains(hand),
        }
    }

    /// 判断一个人是否在饮水
    ///
    /// 缺少手或嘴的关键点时返回 false.
    pub fn detect(&self, landmarks: &PersonLandmarks, person: &BBox, bottles: &[BBox]) -> bool {
        let (Some(hand), Some(mouth)) = (landmarks.hand, landmarks.mouth) else {
            return false;
        };

        if !self.hand_near_mouth(&hand, &mouth, person) {
            return false;
        }

        bottles.iter().any(|b| self.bottle_near_hand(&hand, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> BBox {
        BBox::new(200.0, 100.0, 400.0, 600.0, 0.9, 0)
    }

    fn bottle_at(cx: f32, cy: f32) -> BBox {
        BBox::new(cx - 15.0, cy - 40.0, cx + 15.0, cy + 40.0, 0.8, 39)
    }

    fn landmarks(hand: (f32, f32), mouth: (f32, f32)) -> PersonLandmarks {
        PersonLandmarks {
            hand: Some(Point::new(hand.0, hand.1)),
            mouth: Some(Point::new(mouth.0, mouth.1)),
        }
    }

    #[test]
    fn test_bottle_at_hand_at_mouth() {
        let det = DrinkingDetector::default();
        let lm = landmarks((300.0, 180.0), (300.0, 180.0));
        assert!(det.detect(&lm, &person(), &[bottle_at(300.0, 180.0)]));
        assert!(!det.detect(&lm, &person(), &[bottle_at(800.0, 180.0)]));
    }

    #[test]
    fn test_hand_far_from_mouth() {
        let det = DrinkingDetector::default();
        // 人体高500px, 阈值 40px
        let lm = landmarks((300.0, 250.0), (300.0, 180.0));
        assert!(!det.detect(&lm, &person(), &[bottle_at(300.0, 250.0)]));
        let lm = landmarks((300.0, 215.0), (300.0, 180.0));
        assert!(det.detect(&lm, &person(), &[bottle_at(300.0, 250.0)]));
    }

    #[test]
    fn test_threshold_scales_with_person_height() {
        let det = DrinkingDetector::default();
        let lm = landmarks((300.0, 215.0), (300.0, 180.0));
        let small = BBox::new(280.0, 150.0, 320.0, 250.0, 0.9, 0);
        assert!(!det.detect(&lm, &small, &[bottle_at(300.0, 215.0)]));
    }

    #[test]
    fn test_missing_landmarks() {
        let det = DrinkingDetector::default();
        let lm = PersonLandmarks {
            hand: None,
            mouth: Some(Point::new(300.0, 180.0)),
        };
        assert!(!det.detect(&lm, &person(), &[bottle_at(300.0, 180.0)]));
        assert!(!det.detect(&PersonLandmarks::default(), &person(), &[]));
    }

    #[test]
    fn test_no_bottles() {
        let det = DrinkingDetector::default();
        let lm = landmarks((300.0, 180.0), (300.0, 180.0));
        assert!(!det.detect(&lm, &person(), &[]));
    }

    #[test]
    fn test_fixed_variant_and_hand_inside() {
        let det = DrinkingDetector::new(DrinkingConfig {
            mouth_proximity: MouthProximity::Fixed { radius: 80.0 },
            bottle_proximity: BottleProximity::HandInside,
        });
        let lm = landmarks((300.0, 250.0), (300.0, 180.0));
        assert!(det.detect(&lm, &person(), &[bottle_at(300.0, 260.0)]));
        assert!(!det.detect(&lm, &person(), &[bottle_at(300.0, 400.0)]));
    }
}
