//! 模型模块
//!
//! 参数 / 部件存储，以及驱动整帧更新的 `CubismModel`。

pub mod ids;
mod parameter;
mod part;
mod runtime;
mod store;

pub use parameter::Parameter;
pub use part::Part;
pub use runtime::CubismModel;
pub use store::{ParameterIndex, ParameterStore, PartIndex};
