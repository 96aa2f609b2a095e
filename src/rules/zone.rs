//! 区域监控 (Zone monitor)
//!
//! 多边形区域 + 每个轨迹的驻留状态: 进入 / 徘徊告警 / 离开.

use std::collections::HashMap;

use tracing::debug;

use super::events::RuleEvent;
use crate::detection::{Point, TrackedObject};
use crate::error::{Result, SentinelError};

// ========== 多边形区域 ==========

/// 监控区域: 至少3个顶点的简单多边形 (像素坐标, 运行期间不可变)
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    vertices: Vec<Point>,
}

impl Zone {
    pub fn new(vertices: Vec<Point>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(SentinelError::InvalidZone(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        Ok(Self { vertices })
    }

    pub fn from_tuples(vertices: &[(f32, f32)]) -> Result<Self> {
        Self::new(vertices.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// 射线法判断点是否在多边形内
    ///
    /// 水平射线向右, 与边相交奇数次即在内部. 边的下端点不计, 上端点计入.
    pub fn contains(&self, p: &Point) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut p1 = self.vertices[0];

        for i in 1..=n {
            let p2 = self.vertices[i % n];
            if p.y > p1.y.min(p2.y) && p.y <= p1.y.max(p2.y) {
                let x_inters = if p1.y != p2.y {
                    p1.x + (p.y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y)
                } else {
                    p1.x
                };
                if p.x <= x_inters {
                    inside = !inside;
                }
            }
            p1 = p2;
        }

        inside
    }
}

// ========== 驻留状态 ==========

/// 单个轨迹的驻留记录
#[derive(Clone, Debug, PartialEq)]
pub struct ZonePresence {
    pub in_zone: bool,
    pub enter_time: Option<f64>,
    last_seen_frame: u64,
}

/// 区域监控器
pub struct ZoneMonitor {
    zone: Zone,
    loiter_seconds: f64,

    /// 轨迹多少帧未出现后清除驻留记录 (0 表示永不清除)
    eviction_frames: u64,

    presence: HashMap<u32, ZonePresence>,
    frame: u64,
}

impl ZoneMonitor {
    pub fn new(zone: Zone, loiter_seconds: f64, eviction_frames: u64) -> Self {
        Self {
            zone,
            loiter_seconds,
            eviction_frames,
            presence: HashMap::new(),
            frame: 0,
        }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn presence(&self, track_id: u32) -> Option<&ZonePresence> {
        self.presence.get(&track_id)
    }

    pub fn presence_count(&self) -> usize {
        self.presence.len()
    }

    /// 轨迹边界框中心点 (取整到像素)
    fn centroid(track: &TrackedObject) -> Point {
        let c = track.bbox.center();
        Point::new(c.x.floor(), c.y.floor())
    }

    /// 更新所有轨迹的驻留状态, 返回本帧事件
    ///
    /// 每个轨迹依次检查: 进入 → 徘徊 → 离开. 刚进入的轨迹同一帧不会触发徘徊.
    /// 本帧未出现的轨迹不更新.
    pub fn update(&mut self, tracks: &[TrackedObject], now: f64) -> Vec<RuleEvent> {
        self.frame += 1;
        let mut events = Vec::new();

        for track in tracks {
            let in_zone = self.zone.contains(&Self::centroid(track));
            let p = self.presence.entry(track.id).or_insert(ZonePresence {
                in_zone: false,
                enter_time: None,
                last_seen_frame: self.frame,
            });
            p.last_seen_frame = self.frame;

            if in_zone && !p.in_zone {
                p.in_zone = true;
                p.enter_time = Some(now);
                events.push(RuleEvent::ZoneEntered { track_id: track.id });
            } else if p.in_zone {
                // 按记录的驻留状态判断: 超时后本帧离开仍先报徘徊, 再报离开 (0.0s)
                let enter_time = p.enter_time.unwrap_or(now);
                if now - enter_time > self.loiter_seconds {
                    events.push(RuleEvent::Loitering { track_id: track.id });
                    // 周期告警: 每隔 loiter_seconds 再次触发
                    p.enter_time = Some(now);
                }
            }

            if !in_zone && p.in_zone {
                let duration = now - p.enter_time.unwrap_or(now);
                p.in_zone = false;
                p.enter_time = None;
                events.push(RuleEvent::ZoneLeft {
                    track_id: track.id,
                    duration,
                });
            }
        }

        self.evict_stale();
        events
    }

    fn evict_stale(&mut self) {
        if self.eviction_frames == 0 {
            return;
        }
        let frame = self.frame;
        let limit = self.eviction_frames;
        self.presence.retain(|id, p| {
            let keep = frame - p.last_seen_frame <= limit;
            if !keep {
                debug!("🧹 清除驻留记录 ID {} (in_zone={})", id, p.in_zone);
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    fn square_zone() -> Zone {
        Zone::from_tuples(&[(100.0, 100.0), (500.0, 100.0), (500.0, 400.0), (100.0, 400.0)])
            .unwrap()
    }

    /// 中心点在 (cx, cy) 的轨迹
    fn track_at(id: u32, cx: f32, cy: f32) -> TrackedObject {
        TrackedObject {
            id,
            bbox: BBox::new(cx - 20.0, cy - 40.0, cx + 20.0, cy + 40.0, 0.9, 0),
            total_frames: 1,
        }
    }

    fn monitor(loiter: f64) -> ZoneMonitor {
        ZoneMonitor::new(square_zone(), loiter, 0)
    }

    #[test]
    fn test_inside_polygon() {
        let zone = square_zone();
        assert!(zone.contains(&Point::new(300.0, 300.0)));
        assert!(!zone.contains(&Point::new(0.0, 0.0)));
        assert!(!zone.contains(&Point::new(600.0, 300.0)));
    }

    #[test]
    fn test_concave_polygon() {
        // U 形: 中间缺口不在区域内
        let zone = Zone::from_tuples(&[
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 30.0),
            (20.0, 30.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 30.0),
            (0.0, 30.0),
        ])
        .unwrap();
        assert!(zone.contains(&Point::new(5.0, 20.0)));
        assert!(!zone.contains(&Point::new(15.0, 20.0)));
        assert!(zone.contains(&Point::new(25.0, 20.0)));
    }

    #[test]
    fn test_zone_needs_three_vertices() {
        assert!(Zone::from_tuples(&[(0.0, 0.0), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_enter_event() {
        let mut m = monitor(8.0);
        assert!(m.update(&[track_at(1, 0.0, 0.0)], 0.0).is_empty());
        let events = m.update(&[track_at(1, 300.0, 300.0)], 1.0);
        assert_eq!(events, vec![RuleEvent::ZoneEntered { track_id: 1 }]);
        assert_eq!(m.presence(1).unwrap().enter_time, Some(1.0));
    }

    #[test]
    fn test_loiter_fires_once_after_threshold() {
        let mut m = monitor(8.0);
        let mut alerts = Vec::new();
        let mut t = 0.0;
        while t <= 9.0 {
            for e in m.update(&[track_at(1, 300.0, 300.0)], t) {
                if e == (RuleEvent::Loitering { track_id: 1 }) {
                    alerts.push(t);
                }
            }
            t += 0.5;
        }
        assert_eq!(alerts, vec![8.5]);
    }

    #[test]
    fn test_loiter_is_periodic() {
        let mut m = monitor(2.0);
        let mut alerts = 0;
        for step in 0..=10 {
            let events = m.update(&[track_at(1, 300.0, 300.0)], step as f64);
            alerts += events.iter().filter(|e| e.is_violation()).count();
        }
        // t=3 告警后重置, t=6, t=9 再次告警
        assert_eq!(alerts, 3);
    }

    #[test]
    fn test_entering_track_cannot_loiter_same_frame() {
        let mut m = monitor(0.0);
        let events = m.update(&[track_at(1, 300.0, 300.0)], 100.0);
        assert_eq!(events, vec![RuleEvent::ZoneEntered { track_id: 1 }]);
    }

    #[test]
    fn test_exit_reports_duration() {
        let mut m = monitor(8.0);
        m.update(&[track_at(1, 300.0, 300.0)], 1.0);
        m.update(&[track_at(1, 300.0, 300.0)], 3.0);
        let events = m.update(&[track_at(1, 700.0, 300.0)], 5.5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_string(), "ID 1 left zone after 4.5s");
        let p = m.presence(1).unwrap();
        assert!(!p.in_zone);
        assert_eq!(p.enter_time, None);
    }

    #[test]
    fn test_overdue_track_leaving_reports_loiter_then_exit() {
        let mut m = monitor(8.0);
        m.update(&[track_at(1, 300.0, 300.0)], 1.0);
        assert!(m.update(&[track_at(1, 300.0, 300.0)], 5.0).is_empty());
        let events = m.update(&[track_at(1, 700.0, 300.0)], 20.0);
        let text: Vec<String> = events.iter().map(|e| e.to_string()).collect();
        assert_eq!(text, vec!["LOITERING alert ID 1", "ID 1 left zone after 0.0s"]);
    }

    #[test]
    fn test_absent_track_is_not_updated() {
        let mut m = monitor(8.0);
        m.update(&[track_at(1, 300.0, 300.0)], 0.0);
        assert!(m.update(&[], 1.0).is_empty());
        assert!(m.presence(1).unwrap().in_zone);
    }

    #[test]
    fn test_stale_presence_is_evicted() {
        let mut m = ZoneMonitor::new(square_zone(), 8.0, 2);
        m.update(&[track_at(1, 300.0, 300.0)], 0.0);
        m.update(&[], 0.1);
        m.update(&[], 0.2);
        assert_eq!(m.presence_count(), 1);
        m.update(&[], 0.3);
        assert_eq!(m.presence_count(), 0);
    }

    #[test]
    fn test_eviction_disabled_keeps_everything() {
        let mut m = monitor(8.0);
        m.update(&[track_at(1, 300.0, 300.0), track_at(2, 0.0, 0.0)], 0.0);
        for i in 0..1000 {
            m.update(&[], i as f64);
        }
        assert_eq!(m.presence_count(), 2);
    }
}
