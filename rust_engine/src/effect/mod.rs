//! 程序化效果
//!
//! 呼吸、自动眨眼、视线跟随。

mod breath;
mod eye_blink;
mod target_point;

pub use breath::{Breath, BreathParameter};
pub use eye_blink::{EyeBlink, EyeState};
pub use target_point::TargetPoint;
