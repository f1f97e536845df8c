//! 物理运行时
//!
//! 以固定步长推进粒子链，剩余的不足一步的时间用于在最近两次结果之间插值。

use glam::Vec2;

use crate::math::{degrees_to_radian, rotate};
use crate::model::{Parameter, ParameterIndex, ParameterStore};
use crate::Result;

use super::definition::PhysicsDefinition;
use super::rig::{
    update_particles, update_particles_for_stabilization, PhysicsOutput, PhysicsRig, PhysicsSetting,
    AIR_RESISTANCE,
};

/// 默认的剩余时间上限（秒）
pub const DEFAULT_MAX_REMAIN_SECONDS: f32 = 5.0;

/// 外力设置
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsOptions {
    /// 第一个可动粒子求角度时使用的参考重力方向
    pub gravity: Vec2,
    pub wind: Vec2,
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -1.0),
            wind: Vec2::ZERO,
        }
    }
}

/// 物理运行时
#[derive(Clone, Debug)]
pub struct CubismPhysics {
    rig: PhysicsRig,
    options: PhysicsOptions,
    current_remain_time: f32,
    max_remain_time: f32,
    /// 每步模拟使用的输入值（平滑后）与输出写入目标
    parameter_caches: Vec<f32>,
    /// 上一步的平滑输入
    parameter_input_caches: Vec<f32>,
    current_outputs: Vec<Vec<f32>>,
    previous_outputs: Vec<Vec<f32>>,
}

impl CubismPhysics {
    pub fn new(rig: PhysicsRig) -> Self {
        let options = PhysicsOptions {
            gravity: rig.gravity,
            wind: rig.wind,
        };
        let outputs: Vec<Vec<f32>> = rig.settings.iter().map(|s| vec![0.0; s.outputs.len()]).collect();

        Self {
            rig,
            options,
            current_remain_time: 0.0,
            max_remain_time: DEFAULT_MAX_REMAIN_SECONDS,
            parameter_caches: Vec::new(),
            parameter_input_caches: Vec::new(),
            previous_outputs: outputs.clone(),
            current_outputs: outputs,
        }
    }

    pub fn from_definition(definition: &PhysicsDefinition) -> Result<Self> {
        Ok(Self::new(PhysicsRig::from_definition(definition)?))
    }

    pub fn rig(&self) -> &PhysicsRig {
        &self.rig
    }

    pub fn options(&self) -> PhysicsOptions {
        self.options
    }

    pub fn set_options(&mut self, options: PhysicsOptions) {
        self.options = options;
    }

    /// 设置剩余时间上限，卡顿后最多追赶这么久的模拟
    pub fn set_max_remain_time(&mut self, seconds: f32) {
        self.max_remain_time = seconds.max(0.0);
    }

    /// 尚未模拟的剩余时间（秒）
    pub fn remain_time(&self) -> f32 {
        self.current_remain_time
    }

    /// 最近一步的原始输出，按 [粒子链][输出] 排列
    pub fn current_outputs(&self) -> &[Vec<f32>] {
        &self.current_outputs
    }

    /// 上一步的原始输出
    pub fn previous_outputs(&self) -> &[Vec<f32>] {
        &self.previous_outputs
    }

    /// 所有粒子回到初始位置并清空缓存
    pub fn reset(&mut self) {
        self.rig.reset();
        self.current_remain_time = 0.0;
        self.parameter_caches.clear();
        self.parameter_input_caches.clear();
        for outputs in self.current_outputs.iter_mut().chain(self.previous_outputs.iter_mut()) {
            outputs.fill(0.0);
        }
    }

    /// 推进模拟并写入输出参数
    pub fn evaluate(&mut self, store: &mut ParameterStore, delta_time: f32) {
        if delta_time <= 0.0 {
            return;
        }

        self.current_remain_time = (self.current_remain_time + delta_time).min(self.max_remain_time);

        let live: Vec<f32> = store.parameters().iter().map(Parameter::value).collect();
        let count = live.len();
        if self.parameter_caches.len() < count {
            self.parameter_caches.resize(count, 0.0);
        }
        if self.parameter_input_caches.len() < count {
            self.parameter_input_caches = live.clone();
        }

        let step = if self.rig.fps > 0.0 {
            1.0 / self.rig.fps
        } else {
            delta_time.min(self.max_remain_time)
        };
        if step <= 0.0 {
            return;
        }

        let Self {
            rig,
            options,
            current_remain_time,
            parameter_caches,
            parameter_input_caches,
            current_outputs,
            previous_outputs,
            ..
        } = self;

        while *current_remain_time >= step {
            previous_outputs.clone_from(current_outputs);

            // 输入按消耗的时间比例逐步追上实时值
            let input_weight = step / *current_remain_time;
            for j in 0..count {
                parameter_caches[j] = parameter_input_caches[j] * (1.0 - input_weight) + live[j] * input_weight;
                parameter_input_caches[j] = parameter_caches[j];
            }

            for (setting, outputs) in rig.settings.iter_mut().zip(current_outputs.iter_mut()) {
                let (translation, angle) =
                    setting.aggregate_inputs(|id| parameter_info(store, parameter_caches.as_slice(), id));
                let translation = rotate(translation, degrees_to_radian(-angle));
                let threshold = setting.movement_threshold();

                update_particles(
                    &mut setting.particles,
                    translation,
                    angle,
                    options.wind,
                    threshold,
                    step,
                    AIR_RESISTANCE,
                );

                write_outputs(setting, outputs, options.gravity, store, |index, minimum, maximum, output, value| {
                    output.apply(&mut parameter_caches[index], minimum, maximum, value);
                });
            }

            *current_remain_time -= step;
        }

        let alpha = *current_remain_time / step;
        self.interpolate(store, alpha);
    }

    /// 在上一步与最近一步的输出之间插值并写入参数
    pub fn interpolate(&mut self, store: &mut ParameterStore, weight: f32) {
        for (s, setting) in self.rig.settings.iter_mut().enumerate() {
            let particle_count = setting.particles.len();

            for (o, output) in setting.outputs.iter_mut().enumerate() {
                if output.vertex_index < 1 || output.vertex_index >= particle_count {
                    continue;
                }
                let Some(index) = store.find_parameter(&output.destination_id) else {
                    continue;
                };

                let previous = self.previous_outputs[s][o];
                let current = self.current_outputs[s][o];
                let parameter = &store.parameters()[index];
                let (minimum, maximum) = (parameter.minimum, parameter.maximum);
                let mut value = parameter.value();

                output.apply(&mut value, minimum, maximum, previous * (1.0 - weight) + current * weight);
                store.set_parameter_value_by_index(ParameterIndex::Existing(index), value, 1.0);
            }
        }
    }

    /// 不积分时间，直接把粒子链放到当前输入对应的受力方向上
    pub fn stabilization(&mut self, store: &mut ParameterStore) {
        let live: Vec<f32> = store.parameters().iter().map(Parameter::value).collect();
        self.parameter_caches = live.clone();
        self.parameter_input_caches = live;

        let Self {
            rig,
            options,
            parameter_caches,
            current_outputs,
            previous_outputs,
            ..
        } = self;

        for ((setting, outputs), previous) in rig
            .settings
            .iter_mut()
            .zip(current_outputs.iter_mut())
            .zip(previous_outputs.iter_mut())
        {
            let (translation, angle) =
                setting.aggregate_inputs(|id| parameter_info(store, parameter_caches.as_slice(), id));
            let translation = rotate(translation, degrees_to_radian(-angle));
            let threshold = setting.movement_threshold();

            update_particles_for_stabilization(&mut setting.particles, translation, angle, options.wind, threshold);

            let mut written = Vec::new();
            write_outputs(setting, outputs, options.gravity, store, |index, minimum, maximum, output, value| {
                output.apply(&mut parameter_caches[index], minimum, maximum, value);
                written.push(index);
            });
            previous.clone_from(outputs);

            for index in written {
                store.set_parameter_value_by_index(ParameterIndex::Existing(index), parameter_caches[index], 1.0);
            }
        }

        log::info!("[物理] 稳定化完成: {} 条粒子链", self.rig.settings.len());
    }
}

/// (当前值, 最小值, 最大值, 默认值)，值取自缓存
fn parameter_info(store: &ParameterStore, values: &[f32], id: &str) -> Option<(f32, f32, f32)> {
    let index = store.find_parameter(id)?;
    let parameter = store.parameters().get(index)?;
    let value = values.get(index).copied()?;
    Some((value, parameter.minimum, parameter.maximum))
}

/// 计算一条粒子链的所有输出，记录原始值后交给 `write` 写入
fn write_outputs<W>(
    setting: &mut PhysicsSetting,
    outputs: &mut [f32],
    gravity: Vec2,
    store: &ParameterStore,
    mut write: W,
) where
    W: FnMut(usize, f32, f32, &mut PhysicsOutput, f32),
{
    let particles = &setting.particles;

    for (o, output) in setting.outputs.iter_mut().enumerate() {
        let v = output.vertex_index;
        if v < 1 || v >= particles.len() {
            continue;
        }
        let Some(index) = store.find_parameter(&output.destination_id) else {
            continue;
        };
        let Some(parameter) = store.parameters().get(index) else {
            continue;
        };

        let translation = particles[v].position - particles[v - 1].position;
        let value = output.value(translation, particles, gravity);
        outputs[o] = value;

        write(index, parameter.minimum, parameter.maximum, output, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rig::{PhysicsInput, PhysicsNormalization, PhysicsParticle, PhysicsSource};

    fn store() -> ParameterStore {
        ParameterStore::with_data(
            vec![
                Parameter::new("ParamAngleX", -30.0, 30.0, 0.0),
                Parameter::new("ParamHair", -1.0, 1.0, 0.0),
            ],
            Vec::new(),
        )
    }

    fn rig(fps: f32) -> PhysicsRig {
        let normalization = PhysicsNormalization {
            minimum: -10.0,
            maximum: 10.0,
            default: 0.0,
        };
        let setting = PhysicsSetting {
            id: "Hair".into(),
            inputs: vec![
                PhysicsInput {
                    source_id: "ParamAngleX".into(),
                    weight: 100.0,
                    kind: PhysicsSource::X,
                    reflect: false,
                },
                PhysicsInput {
                    source_id: "ParamNotInModel".into(),
                    weight: 100.0,
                    kind: PhysicsSource::Angle,
                    reflect: false,
                },
            ],
            outputs: vec![
                PhysicsOutput::new("ParamHair", 1, 0.5, 100.0, PhysicsSource::Angle),
                PhysicsOutput::new("ParamNotInModel", 1, 1.0, 100.0, PhysicsSource::X),
            ],
            particles: vec![
                PhysicsParticle::new(1.0, 1.0, 1.0, 0.0),
                PhysicsParticle::new(0.95, 0.9, 1.5, 3.0),
            ],
            normalization_position: normalization,
            normalization_angle: normalization,
        };
        PhysicsRig::new(vec![setting], fps)
    }

    #[test]
    fn non_positive_delta_is_ignored() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        physics.evaluate(&mut store, 0.0);
        physics.evaluate(&mut store, -1.0);
        assert_eq!(physics.remain_time(), 0.0);
        assert_eq!(store.get_parameter_value_by_id("ParamHair"), 0.0);
    }

    #[test]
    fn remainder_stays_below_one_step() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        let step = 1.0 / 30.0;

        for frame in 0..240 {
            let angle = if frame < 60 { 30.0 } else { -30.0 };
            store.set_parameter_value_by_id("ParamAngleX", angle, 1.0);
            physics.evaluate(&mut store, 1.0 / 60.0);
            assert!(physics.remain_time() < step + 1e-6, "frame {frame}: {}", physics.remain_time());
        }
    }

    #[test]
    fn output_is_interpolated_between_steps() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        store.set_parameter_value_by_id("ParamAngleX", 30.0, 1.0);

        for _ in 0..7 {
            physics.evaluate(&mut store, 1.0 / 45.0);
        }

        let step = 1.0 / 30.0;
        let alpha = physics.remain_time() / step;
        let previous = physics.previous_outputs()[0][0];
        let current = physics.current_outputs()[0][0];
        let expected = ((previous * (1.0 - alpha) + current * alpha) * 0.5).clamp(-1.0, 1.0);

        assert!((store.get_parameter_value_by_id("ParamHair") - expected).abs() < 1e-5);
    }

    #[test]
    fn dragging_input_swings_the_hair() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        store.set_parameter_value_by_id("ParamAngleX", 30.0, 1.0);

        for _ in 0..10 {
            physics.evaluate(&mut store, 1.0 / 30.0);
        }
        assert!(store.get_parameter_value_by_id("ParamHair").abs() > 1e-4);
    }

    #[test]
    fn remain_time_is_capped_after_a_stall() {
        let mut physics = CubismPhysics::new(rig(0.0));
        physics.set_max_remain_time(5.0);
        let mut store = store();
        physics.evaluate(&mut store, 60.0);
        assert!(physics.remain_time() < 1e-6);
    }

    #[test]
    fn stabilization_syncs_previous_and_current() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        store.set_parameter_value_by_id("ParamAngleX", 15.0, 1.0);
        physics.stabilization(&mut store);

        assert_eq!(physics.previous_outputs(), physics.current_outputs());
        let expected = (physics.current_outputs()[0][0] * 0.5).clamp(-1.0, 1.0);
        assert!((store.get_parameter_value_by_id("ParamHair") - expected).abs() < 1e-6);
    }

    #[test]
    fn reset_returns_particles_to_rest() {
        let mut physics = CubismPhysics::new(rig(30.0));
        let mut store = store();
        store.set_parameter_value_by_id("ParamAngleX", 30.0, 1.0);
        physics.evaluate(&mut store, 0.5);

        physics.reset();
        let particle = &physics.rig().settings[0].particles[1];
        assert_eq!(particle.position, Vec2::new(0.0, 3.0));
        assert_eq!(physics.current_outputs()[0][0], 0.0);
    }
}
