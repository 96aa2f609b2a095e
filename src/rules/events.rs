//! 规则事件 (Rule events)
//!
//! 规则引擎只产出纯数据事件, 渲染与录像各自消费.

use std::fmt;

/// 违规类别 (决定证据文件名前缀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    Smoking,
    Drinking,
    Loitering,
}

impl ViolationKind {
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::Smoking => "SMOKING",
            ViolationKind::Drinking => "DRINKING",
            ViolationKind::Loitering => "LOITERING",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单帧产生的规则事件
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    ZoneEntered { track_id: u32 },
    Loitering { track_id: u32 },
    ZoneLeft { track_id: u32, duration: f64 },
    /// 吸烟确认; `actor` 为 None 表示全局单一行为人
    SmokingViolation { actor: Option<u32> },
    Drinking { track_id: u32 },
}

impl RuleEvent {
    /// 触发录像的违规类别; 进出区域不算违规
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        match self {
            RuleEvent::Loitering { .. } => Some(ViolationKind::Loitering),
            RuleEvent::SmokingViolation { .. } => Some(ViolationKind::Smoking),
            RuleEvent::Drinking { .. } => Some(ViolationKind::Drinking),
            RuleEvent::ZoneEntered { .. } | RuleEvent::ZoneLeft { .. } => None,
        }
    }

    pub fn is_violation(&self) -> bool {
        self.violation_kind().is_some()
    }
}

impl fmt::Display for RuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleEvent::ZoneEntered { track_id } => write!(f, "ID {} entered zone", track_id),
            RuleEvent::Loitering { track_id } => write!(f, "LOITERING alert ID {}", track_id),
            RuleEvent::ZoneLeft { track_id, duration } => {
                write!(f, "ID {} left zone after {:.1}s", track_id, duration)
            }
            RuleEvent::SmokingViolation { .. } => f.write_str("CONFIRMED SMOKING VIOLATION"),
            RuleEvent::Drinking { track_id } => write!(f, "DRINKING detected ID {}", track_id),
        }
    }
}

/// 多类违规同时触发时的证据类别: 吸烟 > 饮水 > 徘徊
pub fn dominant_violation(events: &[RuleEvent]) -> Option<ViolationKind> {
    events.iter().filter_map(RuleEvent::violation_kind).min()
}
