//! 姿势系统
//!
//! 互斥部件组之间的交叉淡入淡出。

pub mod definition;
mod fader;

pub use fader::{PartData, Pose, DEFAULT_FADE_IN_SECONDS};
