//! 物理装配
//!
//! 每个 `PhysicsSetting` 是一条独立的摆锤粒子链：
//! 输入参数归一化后驱动链根，链末端的相对方向再写回输出参数。

use glam::Vec2;

use crate::math::{degrees_to_radian, direction_to_radian, radian_to_direction, rotate};
use crate::{CubismError, Result};

use super::definition::{NormalizationRangeDefinition, PhysicsDefinition};

/// 空气阻力（重力方向变化时的旋转阻尼）
pub const AIR_RESISTANCE: f32 = 5.0;
/// 输入 / 输出权重的满值
pub const MAXIMUM_WEIGHT: f32 = 100.0;
/// X 方向抖动阈值（乘以位置归一化最大值）
pub const MOVEMENT_THRESHOLD: f32 = 0.001;

/// 输入 / 输出使用的分量
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsSource {
    X,
    Y,
    Angle,
}

impl PhysicsSource {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "X" => Some(Self::X),
            "Y" => Some(Self::Y),
            "Angle" => Some(Self::Angle),
            _ => None,
        }
    }
}

/// 归一化范围
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsNormalization {
    pub minimum: f32,
    pub maximum: f32,
    pub default: f32,
}

impl From<NormalizationRangeDefinition> for PhysicsNormalization {
    fn from(range: NormalizationRangeDefinition) -> Self {
        Self {
            minimum: range.minimum,
            maximum: range.maximum,
            default: range.default,
        }
    }
}

/// 粒子
#[derive(Clone, Debug, Default)]
pub struct PhysicsParticle {
    pub initial_position: Vec2,
    pub mobility: f32,
    pub delay: f32,
    pub acceleration: f32,
    pub radius: f32,
    pub position: Vec2,
    pub last_position: Vec2,
    pub last_gravity: Vec2,
    pub force: Vec2,
    pub velocity: Vec2,
}

impl PhysicsParticle {
    pub fn new(mobility: f32, delay: f32, acceleration: f32, radius: f32) -> Self {
        Self {
            mobility,
            delay,
            acceleration,
            radius,
            ..Default::default()
        }
    }
}

/// 输入
#[derive(Clone, Debug)]
pub struct PhysicsInput {
    pub source_id: String,
    pub weight: f32,
    pub kind: PhysicsSource,
    pub reflect: bool,
}

/// 输出
#[derive(Clone, Debug)]
pub struct PhysicsOutput {
    pub destination_id: String,
    /// 取 `particles[vertex_index] - particles[vertex_index - 1]`
    pub vertex_index: usize,
    pub scale: f32,
    pub weight: f32,
    pub kind: PhysicsSource,
    pub reflect: bool,
    /// 低于参数最小值时出现过的最小输出
    pub value_below_minimum: f32,
    /// 高于参数最大值时出现过的最大输出
    pub value_exceeded_maximum: f32,
}

impl PhysicsOutput {
    pub fn new(destination_id: &str, vertex_index: usize, scale: f32, weight: f32, kind: PhysicsSource) -> Self {
        Self {
            destination_id: destination_id.to_string(),
            vertex_index,
            scale,
            weight,
            kind,
            reflect: false,
            value_below_minimum: 0.0,
            value_exceeded_maximum: 0.0,
        }
    }

    /// 从粒子链读取原始输出值（未缩放）
    pub fn value(&self, translation: Vec2, particles: &[PhysicsParticle], parent_gravity: Vec2) -> f32 {
        let value = match self.kind {
            PhysicsSource::X => translation.x,
            PhysicsSource::Y => translation.y,
            PhysicsSource::Angle => {
                let index = self.vertex_index;
                let parent = if index >= 2 {
                    particles[index - 1].position - particles[index - 2].position
                } else {
                    -parent_gravity
                };
                direction_to_radian(parent, translation)
            }
        };

        if self.reflect {
            -value
        } else {
            value
        }
    }

    /// 缩放、限幅后按权重写入参数值，同时记录越界诊断
    pub fn apply(&mut self, parameter_value: &mut f32, minimum: f32, maximum: f32, raw: f32) {
        let mut value = raw * self.scale;

        if value < minimum {
            if value < self.value_below_minimum {
                self.value_below_minimum = value;
            }
            value = minimum;
        } else if value > maximum {
            if value > self.value_exceeded_maximum {
                self.value_exceeded_maximum = value;
            }
            value = maximum;
        }

        let weight = self.weight / MAXIMUM_WEIGHT;
        if weight >= 1.0 {
            *parameter_value = value;
        } else {
            *parameter_value = *parameter_value * (1.0 - weight) + value * weight;
        }
    }
}

/// 一条独立的粒子链
#[derive(Clone, Debug, Default)]
pub struct PhysicsSetting {
    pub id: String,
    pub inputs: Vec<PhysicsInput>,
    pub outputs: Vec<PhysicsOutput>,
    pub particles: Vec<PhysicsParticle>,
    pub normalization_position: PhysicsNormalization,
    pub normalization_angle: PhysicsNormalization,
}

impl PhysicsSetting {
    /// 粒子回到初始位置：链根在原点，其余沿 +Y 按半径依次排列
    pub fn initialize_particles(&mut self) {
        let mut previous = Vec2::ZERO;

        for (i, particle) in self.particles.iter_mut().enumerate() {
            if i > 0 {
                previous += Vec2::new(0.0, particle.radius);
            }
            particle.initial_position = previous;
            particle.position = previous;
            particle.last_position = previous;
            particle.last_gravity = Vec2::new(0.0, 1.0);
            particle.velocity = Vec2::ZERO;
            particle.force = Vec2::ZERO;
        }
    }

    /// X 方向抖动阈值
    pub fn movement_threshold(&self) -> f32 {
        MOVEMENT_THRESHOLD * self.normalization_position.maximum
    }

    /// 汇总所有输入，得到链根的平移与整体角度（角度制）
    ///
    /// `value_of` 返回输入参数的 (当前值, 最小值, 最大值)，不存在的参数返回 None。
    pub fn aggregate_inputs<F>(&self, mut value_of: F) -> (Vec2, f32)
    where
        F: FnMut(&str) -> Option<(f32, f32, f32)>,
    {
        let mut translation = Vec2::ZERO;
        let mut angle = 0.0;

        for input in &self.inputs {
            let Some((value, minimum, maximum)) = value_of(&input.source_id) else {
                continue;
            };

            let weight = input.weight / MAXIMUM_WEIGHT;
            let normalization = match input.kind {
                PhysicsSource::Angle => &self.normalization_angle,
                _ => &self.normalization_position,
            };
            let normalized = normalize_parameter_value(value, minimum, maximum, normalization, input.reflect) * weight;

            match input.kind {
                PhysicsSource::X => translation.x += normalized,
                PhysicsSource::Y => translation.y += normalized,
                PhysicsSource::Angle => angle += normalized,
            }
        }

        (translation, angle)
    }
}

/// 将参数值映射到归一化范围
///
/// 以参数范围中点为界，两侧分别线性映射到归一化的 [默认, 最大] 与 [最小, 默认]。
/// 范围退化为单点时该侧结果为 0。未设置 `reflect` 时结果取反。
pub fn normalize_parameter_value(
    value: f32,
    parameter_minimum: f32,
    parameter_maximum: f32,
    normalization: &PhysicsNormalization,
    reflect: bool,
) -> f32 {
    let max_value = parameter_maximum.max(parameter_minimum);
    let min_value = parameter_maximum.min(parameter_minimum);
    let value = value.clamp(min_value, max_value);

    let min_norm = normalization.minimum.min(normalization.maximum);
    let max_norm = normalization.minimum.max(normalization.maximum);
    let middle_norm = normalization.default;

    let middle_value = min_value + (max_value - min_value) / 2.0;
    let param_value = value - middle_value;

    let mut result = 0.0;
    if param_value == 0.0 {
        result = middle_norm;
    } else if param_value > 0.0 {
        let n_length = max_norm - middle_norm;
        let p_length = max_value - middle_value;
        if p_length != 0.0 {
            result = param_value * (n_length / p_length) + middle_norm;
        }
    } else if param_value < 0.0 {
        let n_length = min_norm - middle_norm;
        let p_length = min_value - middle_value;
        if p_length != 0.0 {
            result = param_value * (n_length / p_length) + middle_norm;
        }
    }

    if reflect {
        result
    } else {
        -result
    }
}

/// 推进一条粒子链
///
/// 链根移动到 `translation`，其余粒子受重力与风力作用后被约束回与前一粒子相距 `radius`。
pub fn update_particles(
    particles: &mut [PhysicsParticle],
    translation: Vec2,
    total_angle: f32,
    wind: Vec2,
    threshold: f32,
    delta_time: f32,
    air_resistance: f32,
) {
    let gravity = radian_to_direction(degrees_to_radian(total_angle)).normalize_or_zero();

    let Some(root) = particles.first_mut() else {
        return;
    };
    root.position = translation;

    for i in 1..particles.len() {
        let previous = particles[i - 1].position;
        let particle = &mut particles[i];

        particle.force = gravity * particle.acceleration + wind;
        particle.last_position = particle.position;

        let delay = particle.delay * delta_time * 30.0;

        let radian = direction_to_radian(particle.last_gravity, gravity) / air_resistance;
        let direction = rotate(particle.position - previous, radian);

        particle.position = previous + direction;
        particle.position += particle.velocity * delay + particle.force * delay * delay;

        let new_direction = (particle.position - previous).normalize_or_zero();
        particle.position = previous + new_direction * particle.radius;

        if particle.position.x.abs() < threshold {
            particle.position.x = 0.0;
        }

        if delay != 0.0 {
            particle.velocity = (particle.position - particle.last_position) / delay * particle.mobility;
        }

        particle.force = Vec2::ZERO;
        particle.last_gravity = gravity;
    }
}

/// 不做时间积分，直接把粒子放到受力方向上（速度清零）
pub fn update_particles_for_stabilization(
    particles: &mut [PhysicsParticle],
    translation: Vec2,
    total_angle: f32,
    wind: Vec2,
    threshold: f32,
) {
    let gravity = radian_to_direction(degrees_to_radian(total_angle)).normalize_or_zero();

    let Some(root) = particles.first_mut() else {
        return;
    };
    root.position = translation;

    for i in 1..particles.len() {
        let previous = particles[i - 1].position;
        let particle = &mut particles[i];

        particle.force = gravity * particle.acceleration + wind;
        particle.last_position = particle.position;
        particle.velocity = Vec2::ZERO;

        particle.position = previous + particle.force.normalize_or_zero() * particle.radius;

        if particle.position.x.abs() < threshold {
            particle.position.x = 0.0;
        }

        particle.force = Vec2::ZERO;
        particle.last_gravity = gravity;
    }
}

/// 物理装配
#[derive(Clone, Debug)]
pub struct PhysicsRig {
    pub settings: Vec<PhysicsSetting>,
    pub gravity: Vec2,
    pub wind: Vec2,
    /// 固定步进帧率，不大于 0 时使用调用方的帧间隔
    pub fps: f32,
}

impl PhysicsRig {
    pub fn new(settings: Vec<PhysicsSetting>, fps: f32) -> Self {
        let mut rig = Self {
            settings,
            gravity: Vec2::new(0.0, -1.0),
            wind: Vec2::ZERO,
            fps,
        };
        for setting in &mut rig.settings {
            setting.initialize_particles();
        }
        rig
    }

    /// 从 physics3 结构创建
    ///
    /// 未知的分量类型或目标会被跳过；输出引用不存在的粒子、元信息数量不符时返回错误。
    pub fn from_definition(definition: &PhysicsDefinition) -> Result<Self> {
        let meta = &definition.meta;

        if let Some(count) = meta.physics_setting_count {
            if count != definition.physics_settings.len() {
                return Err(CubismError::PhysicsParse(format!(
                    "meta declares {} settings, found {}",
                    count,
                    definition.physics_settings.len()
                )));
            }
        }

        let settings_iter = || definition.physics_settings.iter();
        let input_count: usize = settings_iter().map(|s| s.input.len()).sum();
        let output_count: usize = settings_iter().map(|s| s.output.len()).sum();
        let vertex_count: usize = settings_iter().map(|s| s.vertices.len()).sum();

        for (declared, actual, name) in [
            (meta.total_input_count, input_count, "inputs"),
            (meta.total_output_count, output_count, "outputs"),
            (meta.vertex_count, vertex_count, "vertices"),
        ] {
            if let Some(declared) = declared {
                if declared != actual {
                    return Err(CubismError::PhysicsParse(format!(
                        "meta declares {} {}, found {}",
                        declared, name, actual
                    )));
                }
            }
        }

        let mut settings = Vec::with_capacity(definition.physics_settings.len());

        for setting_definition in &definition.physics_settings {
            let mut setting = PhysicsSetting {
                id: setting_definition.id.clone(),
                normalization_position: setting_definition.normalization.position.into(),
                normalization_angle: setting_definition.normalization.angle.into(),
                ..Default::default()
            };

            for input in &setting_definition.input {
                if input.source.target != "Parameter" {
                    log::warn!("[物理] 输入目标 '{}' 不受支持，已跳过", input.source.target);
                    continue;
                }
                let Some(kind) = PhysicsSource::from_name(&input.kind) else {
                    log::warn!("[物理] 输入 '{}' 的类型 '{}' 无法识别，已跳过", input.source.id, input.kind);
                    continue;
                };
                setting.inputs.push(PhysicsInput {
                    source_id: input.source.id.clone(),
                    weight: input.weight,
                    kind,
                    reflect: input.reflect,
                });
            }

            let vertex_count = setting_definition.vertices.len();
            for output in &setting_definition.output {
                if output.vertex_index >= vertex_count {
                    return Err(CubismError::PhysicsParse(format!(
                        "setting '{}' output '{}' references vertex {} of {}",
                        setting_definition.id, output.destination.id, output.vertex_index, vertex_count
                    )));
                }
                if output.destination.target != "Parameter" {
                    log::warn!("[物理] 输出目标 '{}' 不受支持，已跳过", output.destination.target);
                    continue;
                }
                let Some(kind) = PhysicsSource::from_name(&output.kind) else {
                    log::warn!(
                        "[物理] 输出 '{}' 的类型 '{}' 无法识别，已跳过",
                        output.destination.id,
                        output.kind
                    );
                    continue;
                };

                let mut physics_output =
                    PhysicsOutput::new(&output.destination.id, output.vertex_index, output.scale, output.weight, kind);
                physics_output.reflect = output.reflect;
                setting.outputs.push(physics_output);
            }

            setting.particles = setting_definition
                .vertices
                .iter()
                .map(|v| PhysicsParticle::new(v.mobility, v.delay, v.acceleration, v.radius))
                .collect();

            settings.push(setting);
        }

        let fps = meta.fps.unwrap_or(0.0);
        let mut rig = Self::new(settings, fps);
        rig.gravity = Vec2::new(meta.effective_forces.gravity.x, meta.effective_forces.gravity.y);
        rig.wind = Vec2::new(meta.effective_forces.wind.x, meta.effective_forces.wind.y);

        log::info!(
            "[物理] 装配完成: {} 条粒子链, FPS {}",
            rig.settings.len(),
            rig.fps
        );

        Ok(rig)
    }

    /// 所有粒子回到初始位置
    pub fn reset(&mut self) {
        for setting in &mut self.settings {
            setting.initialize_particles();
        }
    }
}
