//! 自动眨眼
//!
//! 状态机：First -> Interval -> Closing -> Closed -> Opening -> Interval ...

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::ids::{PARAM_EYE_L_OPEN, PARAM_EYE_R_OPEN};
use crate::model::ParameterStore;

/// 眨眼状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EyeState {
    /// 尚未初始化
    First,
    /// 睁眼等待
    Interval,
    Closing,
    Closed,
    Opening,
}

#[derive(Clone, Debug)]
pub struct EyeBlink {
    parameter_ids: Vec<String>,
    state: EyeState,
    next_blinking_time: f32,
    state_start_time: f32,
    user_time: f32,

    blinking_interval: f32,
    closing_seconds: f32,
    closed_seconds: f32,
    opening_seconds: f32,
    /// 为 true 时 0 表示闭眼；为 false 时写入取反后的值
    close_if_zero: bool,

    rng: StdRng,
}

impl EyeBlink {
    pub fn new(parameter_ids: Vec<String>) -> Self {
        Self::with_rng(parameter_ids, StdRng::from_entropy())
    }

    /// 固定随机种子，用于可重复的眨眼时机
    pub fn with_seed(parameter_ids: Vec<String>, seed: u64) -> Self {
        Self::with_rng(parameter_ids, StdRng::seed_from_u64(seed))
    }

    /// 作用于左右眼开合参数
    pub fn with_default_parameters() -> Self {
        Self::new(vec![PARAM_EYE_L_OPEN.to_string(), PARAM_EYE_R_OPEN.to_string()])
    }

    fn with_rng(parameter_ids: Vec<String>, rng: StdRng) -> Self {
        Self {
            parameter_ids,
            state: EyeState::First,
            next_blinking_time: 0.0,
            state_start_time: 0.0,
            user_time: 0.0,
            blinking_interval: 4.0,
            closing_seconds: 0.1,
            closed_seconds: 0.05,
            opening_seconds: 0.15,
            close_if_zero: true,
            rng,
        }
    }

    pub fn parameter_ids(&self) -> &[String] {
        &self.parameter_ids
    }

    pub fn set_parameter_ids(&mut self, parameter_ids: Vec<String>) {
        self.parameter_ids = parameter_ids;
    }

    pub fn state(&self) -> EyeState {
        self.state
    }

    /// 平均眨眼间隔（秒）
    pub fn set_blinking_interval(&mut self, seconds: f32) {
        self.blinking_interval = seconds;
    }

    pub fn set_blinking_settings(&mut self, closing: f32, closed: f32, opening: f32) {
        self.closing_seconds = closing;
        self.closed_seconds = closed;
        self.opening_seconds = opening;
    }

    pub fn set_close_if_zero(&mut self, close_if_zero: bool) {
        self.close_if_zero = close_if_zero;
    }

    fn determine_next_blinking_time(&mut self) -> f32 {
        let r: f32 = self.rng.gen();
        self.user_time + r * (2.0 * self.blinking_interval - 1.0)
    }

    /// 分段进度，时长不大于 0 时视为已完成
    fn progress(&self, seconds: f32) -> f32 {
        if seconds <= 0.0 {
            1.0
        } else {
            (self.user_time - self.state_start_time) / seconds
        }
    }

    pub fn update_parameters(&mut self, store: &mut ParameterStore, delta_time: f32) {
        self.user_time += delta_time;

        let value = match self.state {
            EyeState::Closing => {
                let mut t = self.progress(self.closing_seconds);
                if t >= 1.0 {
                    t = 1.0;
                    self.state = EyeState::Closed;
                    self.state_start_time = self.user_time;
                }
                1.0 - t
            }
            EyeState::Closed => {
                let t = self.progress(self.closed_seconds);
                if t >= 1.0 {
                    self.state = EyeState::Opening;
                    self.state_start_time = self.user_time;
                }
                0.0
            }
            EyeState::Opening => {
                let mut t = self.progress(self.opening_seconds);
                if t >= 1.0 {
                    t = 1.0;
                    self.state = EyeState::Interval;
                    self.next_blinking_time = self.determine_next_blinking_time();
                }
                t
            }
            EyeState::Interval => {
                if self.next_blinking_time < self.user_time {
                    self.state = EyeState::Closing;
                    self.state_start_time = self.user_time;
                }
                1.0
            }
            EyeState::First => {
                self.state = EyeState::Interval;
                self.next_blinking_time = self.determine_next_blinking_time();
                1.0
            }
        };

        let value = if self.close_if_zero { value } else { -value };

        for id in &self.parameter_ids {
            store.set_parameter_value_by_id(id, value, 1.0);
        }
    }
}
