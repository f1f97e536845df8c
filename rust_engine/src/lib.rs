//! Cubism Engine - Rust 实现的 2D 模型动画运行时
//!
//! 提供与 Cubism Framework 等价的参数驱动核心：
//! - 参数存储（按 ID / 索引访问，缺失 ID 使用占位槽）
//! - 动作曲线求值（线性 / 贝塞尔 / 阶梯 / 反阶梯）
//! - 动作播放、淡入淡出、优先级队列和事件
//! - 表情叠加
//! - 二次物理（摆锤粒子链）
//! - 呼吸、眨眼、视线跟随
//! - 姿势（部件互斥显示）

pub mod animation;
pub mod config;
pub mod effect;
pub mod math;
pub mod model;
pub mod physics;
pub mod pose;

pub use animation::{
    Expression, ExpressionManager, Motion, MotionHandle, MotionManager, MotionPriority,
    MotionQueueManager, Playable,
};
pub use config::EngineConfig;
pub use effect::{Breath, BreathParameter, EyeBlink, TargetPoint};
pub use model::{CubismModel, Parameter, ParameterIndex, ParameterStore, Part, PartIndex};
pub use physics::{CubismPhysics, PhysicsOptions, PhysicsRig};
pub use pose::Pose;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CubismError {
    #[error("Motion parse error: {0}")]
    MotionParse(String),

    #[error("Expression parse error: {0}")]
    ExpressionParse(String),

    #[error("Physics parse error: {0}")]
    PhysicsParse(String),

    #[error("Pose parse error: {0}")]
    PoseParse(String),
}

pub type Result<T> = std::result::Result<T, CubismError>;
