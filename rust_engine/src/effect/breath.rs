//! 呼吸
//!
//! 每个参数按 `offset + peak * sin(t / cycle)` 做周期摆动，以权重叠加到当前值上。

use std::f32::consts::TAU;

use crate::model::ids::{PARAM_ANGLE_X, PARAM_ANGLE_Y, PARAM_ANGLE_Z, PARAM_BODY_ANGLE_X, PARAM_BREATH};
use crate::model::ParameterStore;

/// 呼吸参数
#[derive(Clone, Debug, PartialEq)]
pub struct BreathParameter {
    pub parameter_id: String,
    pub offset: f32,
    pub peak: f32,
    /// 周期（秒）
    pub cycle: f32,
    pub weight: f32,
}

impl BreathParameter {
    pub fn new(parameter_id: &str, offset: f32, peak: f32, cycle: f32, weight: f32) -> Self {
        Self {
            parameter_id: parameter_id.to_string(),
            offset,
            peak,
            cycle,
            weight,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Breath {
    parameters: Vec<BreathParameter>,
    current_time: f32,
}

impl Breath {
    pub fn new(parameters: Vec<BreathParameter>) -> Self {
        Self {
            parameters,
            current_time: 0.0,
        }
    }

    /// 常用的头部 / 身体 / 呼吸参数组合
    pub fn with_default_parameters() -> Self {
        Self::new(vec![
            BreathParameter::new(PARAM_ANGLE_X, 0.0, 15.0, 6.5345, 0.5),
            BreathParameter::new(PARAM_ANGLE_Y, 0.0, 8.0, 3.5345, 0.5),
            BreathParameter::new(PARAM_ANGLE_Z, 0.0, 10.0, 5.5345, 0.5),
            BreathParameter::new(PARAM_BODY_ANGLE_X, 0.0, 4.0, 15.5345, 0.5),
            BreathParameter::new(PARAM_BREATH, 0.5, 0.5, 3.2345, 1.0),
        ])
    }

    pub fn parameters(&self) -> &[BreathParameter] {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Vec<BreathParameter>) {
        self.parameters = parameters;
    }

    pub fn update_parameters(&mut self, store: &mut ParameterStore, delta_time: f32) {
        self.current_time += delta_time;
        let t = self.current_time * TAU;

        for parameter in &self.parameters {
            if parameter.cycle == 0.0 {
                continue;
            }
            let value = parameter.offset + parameter.peak * (t / parameter.cycle).sin();
            store.add_parameter_value_by_id(&parameter.parameter_id, value, parameter.weight);
        }
    }
}
