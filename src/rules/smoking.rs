//! 吸烟确认状态机 (Smoking confirmation)
//!
//! 手到嘴姿态 → 手放下 → 等待烟雾窗口内出现烟雾 → 确认违规.
//! 默认只有一个全局行为人; `SmokingMonitor` 按可选轨迹ID分别保存状态机,
//! 以便构建多人版本而不改变单人约定.

use std::collections::HashMap;
use std::fmt;

use super::events::RuleEvent;

/// 默认烟雾等待窗口 (秒)
pub const DEFAULT_SMOKE_WINDOW_SECONDS: f64 = 3.0;

/// 吸烟状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmokingState {
    #[default]
    None,
    PoseActive,
    WaitingForSmoke,
    /// 单帧直通状态: 下一帧必定回到 None
    ViolationConfirmed,
}

impl SmokingState {
    pub fn name(&self) -> &'static str {
        match self {
            SmokingState::None => "NONE",
            SmokingState::PoseActive => "POSE_ACTIVE",
            SmokingState::WaitingForSmoke => "WAITING_FOR_SMOKE",
            SmokingState::ViolationConfirmed => "VIOLATION_CONFIRMED",
        }
    }
}

impl fmt::Display for SmokingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个行为人的吸烟状态机
#[derive(Debug, Clone)]
pub struct SmokingStateMachine {
    state: SmokingState,
    pose_release_time: f64,
    smoke_window: f64,
}

impl SmokingStateMachine {
    pub fn new(smoke_window: f64) -> Self {
        Self {
            state: SmokingState::None,
            pose_release_time: 0.0,
            smoke_window,
        }
    }

    pub fn state(&self) -> SmokingState {
        self.state
    }

    pub fn pose_release_time(&self) -> f64 {
        self.pose_release_time
    }

    pub fn reset(&mut self) {
        self.state = SmokingState::None;
        self.pose_release_time = 0.0;
    }

    /// 每帧推进一次, 确认违规时返回 true
    ///
    /// VIOLATION_CONFIRMED 不看本帧输入, 再报一次违规后回到 NONE.
    /// 其余状态下姿态为真优先: NONE / WAITING_FOR_SMOKE 均重新进入 POSE_ACTIVE.
    pub fn step(&mut self, pose_active: bool, smoke_detected: bool, now: f64) -> bool {
        if self.state == SmokingState::ViolationConfirmed {
            self.state = SmokingState::None;
            return true;
        }

        if pose_active {
            self.state = SmokingState::PoseActive;
            return false;
        }

        match self.state {
            SmokingState::PoseActive => {
                // 手离开嘴部, 开始计时
                self.pose_release_time = now;
                self.state = SmokingState::WaitingForSmoke;
                false
            }
            SmokingState::WaitingForSmoke => {
                if smoke_detected {
                    self.state = SmokingState::ViolationConfirmed;
                    true
                } else {
                    if now - self.pose_release_time > self.smoke_window {
                        self.state = SmokingState::None;
                    }
                    false
                }
            }
            SmokingState::None | SmokingState::ViolationConfirmed => false,
        }
    }
}

impl Default for SmokingStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_SMOKE_WINDOW_SECONDS)
    }
}

/// 吸烟状态机集合, 按行为人键保存 (None = 全局单一行为人)
pub struct SmokingMonitor {
    smoke_window: f64,
    machines: HashMap<Option<u32>, SmokingStateMachine>,
}

impl SmokingMonitor {
    pub fn new(smoke_window: f64) -> Self {
        Self {
            smoke_window,
            machines: HashMap::new(),
        }
    }

    /// 推进指定行为人的状态机, 确认时返回违规事件
    pub fn update(
        &mut self,
        actor: Option<u32>,
        pose_active: bool,
        smoke_detected: bool,
        now: f64,
    ) -> Option<RuleEvent> {
        let window = self.smoke_window;
        let machine = self
            .machines
            .entry(actor)
            .or_insert_with(|| SmokingStateMachine::new(window));
        machine
            .step(pose_active, smoke_detected, now)
            .then_some(RuleEvent::SmokingViolation { actor })
    }

    /// 全局单一行为人
    pub fn update_global(
        &mut self,
        pose_active: bool,
        smoke_detected: bool,
        now: f64,
    ) -> Option<RuleEvent> {
        self.update(None, pose_active, smoke_detected, now)
    }

    pub fn state(&self, actor: Option<u32>) -> SmokingState {
        self.machines
            .get(&actor)
            .map(SmokingStateMachine::state)
            .unwrap_or_default()
    }

    pub fn global_state(&self) -> SmokingState {
        self.state(None)
    }

    /// 移除某个行为人的状态机 (多人模式下轨迹消失时使用)
    pub fn forget(&mut self, actor: Option<u32>) {
        self.machines.remove(&actor);
    }

    pub fn reset(&mut self) {
        self.machines.clear();
    }
}

impl Default for SmokingMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SMOKE_WINDOW_SECONDS)
    }
}
