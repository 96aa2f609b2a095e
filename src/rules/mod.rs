/// 行为规则 (Behavior rules)
///
/// - zone:     区域驻留 / 徘徊
/// - smoking:  吸烟确认状态机
/// - drinking: 饮水几何判断
/// - events:   规则事件
pub mod drinking;
pub mod events;
pub mod smoking;
pub mod zone;

pub use drinking::{BottleProximity, DrinkingConfig, DrinkingDetector, MouthProximity};
pub use events::{dominant_violation, RuleEvent, ViolationKind};
pub use smoking::{SmokingMonitor, SmokingState, SmokingStateMachine};
pub use zone::{Zone, ZoneMonitor, ZonePresence};
