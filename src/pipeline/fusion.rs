//! 逐帧行为融合 (Per-frame behavior fusion)
//! 职责: 感知结果 → 追踪 → 区域 → 吸烟状态机 → 饮水判断 → FrameReport

use tracing::debug;

use super::FrameReport;
use crate::config::SentinelConfig;
use crate::detection::{BBox, Frame, SimpleTracker, Tracker};
use crate::error::Result;
use crate::perception::PerceptionAdapters;
use crate::rules::{DrinkingDetector, RuleEvent, SmokingMonitor, Zone, ZoneMonitor};

/// 行为融合流水线
///
/// 帧间状态只存在于追踪器 / 区域监控 / 吸烟状态机中.
pub struct SentinelPipeline {
    perception: PerceptionAdapters,
    tracker: SimpleTracker,
    zone_monitor: ZoneMonitor,
    smoking: SmokingMonitor,
    drinking: DrinkingDetector,

    person_class_id: u32,
    bottle_class_id: u32,
    smoke_class_id: u32,
}

impl SentinelPipeline {
    pub fn new(config: &SentinelConfig, perception: PerceptionAdapters) -> Result<Self> {
        let zone = Zone::from_tuples(&config.zone)?;
        Ok(Self {
            perception,
            tracker: SimpleTracker::new(config.track_match_distance),
            zone_monitor: ZoneMonitor::new(
                zone,
                config.loiter_seconds,
                config.presence_eviction_frames,
            ),
            smoking: SmokingMonitor::new(config.smoke_window_seconds),
            drinking: DrinkingDetector::new(config.drinking),
            person_class_id: config.person_class_id,
            bottle_class_id: config.bottle_class_id,
            smoke_class_id: config.smoke_class_id,
        })
    }

    pub fn zone(&self) -> &Zone {
        self.zone_monitor.zone()
    }

    pub fn zone_monitor(&self) -> &ZoneMonitor {
        &self.zone_monitor
    }

    /// 处理一帧
    pub fn process(&mut self, frame: &Frame, now: f64) -> FrameReport {
        // 1. 目标检测, 按类别拆分
        let detections = self.perception.detector.detect(frame);
        let (persons, bottles): (Vec<BBox>, Vec<BBox>) = detections
            .into_iter()
            .filter(|d| d.class_id == self.person_class_id || d.class_id == self.bottle_class_id)
            .partition(|d| d.class_id == self.person_class_id);

        // 2. 身份追踪
        let tracks = self.tracker.update(&persons).to_vec();

        // 3. 区域驻留
        let mut events = self.zone_monitor.update(&tracks, now);

        // 4. 吸烟状态机 (全局单一行为人)
        let pose_active = self.perception.pose.is_hand_near_mouth(frame);
        let (smoke_detected, smoke_boxes) =
            self.perception.smoke.detect(frame, self.smoke_class_id);
        if let Some(event) = self.smoking.update_global(pose_active, smoke_detected, now) {
            events.push(event);
        }
        let smoking_state = self.smoking.global_state();

        // 5. 饮水判断 (每人每帧独立)
        let mut drinking = Vec::new();
        for track in &tracks {
            let Some(landmarks) = self.perception.pose.person_landmarks(frame, &track.bbox) else {
                continue;
            };
            if self.drinking.detect(&landmarks, &track.bbox, &bottles) {
                drinking.push(track.id);
                events.push(RuleEvent::Drinking { track_id: track.id });
            }
        }

        debug!(
            "frame {} t={:.2}: {} tracks, {} bottles, pose={}, smoke={}, state={}",
            frame.index,
            now,
            tracks.len(),
            bottles.len(),
            pose_active,
            smoke_detected,
            smoking_state
        );

        FrameReport {
            frame_index: frame.index,
            timestamp: now,
            tracks,
            bottles,
            smoke_detected,
            smoke_boxes,
            smoking_state,
            drinking,
            events,
        }
    }
}
