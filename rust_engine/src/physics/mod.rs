//! 物理系统
//!
//! 摆锤粒子链的二次物理：输入参数驱动链根，粒子在重力 / 风力下摆动，
//! 链上相邻粒子的方向再写回输出参数。以固定步长模拟，帧间按剩余时间插值。

mod cubism_physics;
pub mod definition;
mod rig;

pub use cubism_physics::{CubismPhysics, PhysicsOptions, DEFAULT_MAX_REMAIN_SECONDS};
pub use rig::{
    normalize_parameter_value, update_particles, update_particles_for_stabilization, PhysicsInput,
    PhysicsNormalization, PhysicsOutput, PhysicsParticle, PhysicsRig, PhysicsSetting, PhysicsSource,
    AIR_RESISTANCE, MAXIMUM_WEIGHT, MOVEMENT_THRESHOLD,
};
