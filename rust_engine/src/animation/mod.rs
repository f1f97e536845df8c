//! 动画系统
//!
//! 曲线求值、动作 / 表情播放，以及共用的淡入淡出队列。

pub mod curve;
pub mod definition;
mod expression;
mod manager;
mod motion;
mod queue;

pub use curve::{BezierMode, CurveSet, CurveTarget, MotionCurve, MotionPoint, MotionSegment, SegmentKind};
pub use definition::{
    CurveDefinition, ExpressionDefinition, ExpressionParameterDefinition, MotionDefinition, MotionMeta,
    UserDataDefinition,
};
pub use expression::{Expression, ExpressionBlend, ExpressionManager, ExpressionParameter};
pub use manager::{MotionManager, MotionPriority};
pub use motion::{Motion, MotionEvent};
pub use queue::{EventHandler, FinishedCallback, MotionHandle, MotionQueueEntry, MotionQueueManager, Playable};
