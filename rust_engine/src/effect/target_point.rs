//! 视线 / 拖拽跟随
//!
//! 面部朝向以受限的速度和加速度追赶目标点，接近目标时提前减速。

use glam::Vec2;

/// 以该帧率为基准换算速度
const FRAME_RATE: f32 = 30.0;
/// 与目标的距离小于该值时停止
const EPSILON: f32 = 0.01;
/// 每秒最大移动量
const MAX_SPEED_PER_SECOND: f32 = 4.0;
/// 从静止加速到最大速度的时间（秒）
const TIME_TO_MAX_SPEED: f32 = 0.15;

#[derive(Clone, Debug, Default)]
pub struct TargetPoint {
    face_target: Vec2,
    face: Vec2,
    face_velocity: Vec2,
    last_time: Option<f32>,
    user_time: f32,
}

impl TargetPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置目标点，范围一般为 [-1, 1]
    pub fn set(&mut self, x: f32, y: f32) {
        self.face_target = Vec2::new(x, y);
    }

    pub fn x(&self) -> f32 {
        self.face.x
    }

    pub fn y(&self) -> f32 {
        self.face.y
    }

    pub fn update(&mut self, delta_time: f32) {
        self.user_time += delta_time;

        let max_v = MAX_SPEED_PER_SECOND / FRAME_RATE;

        let Some(last_time) = self.last_time.replace(self.user_time) else {
            return;
        };

        let delta_time_weight = (self.user_time - last_time) * FRAME_RATE;
        let frame_to_max_speed = TIME_TO_MAX_SPEED * FRAME_RATE;
        let max_a = delta_time_weight * max_v / frame_to_max_speed;

        let delta = self.face_target - self.face;
        if delta.x.abs() <= EPSILON && delta.y.abs() <= EPSILON {
            return;
        }

        let distance = delta.length();
        let target_velocity = delta * (max_v / distance);

        let mut acceleration = target_velocity - self.face_velocity;
        let a = acceleration.length();
        if a > max_a {
            acceleration *= max_a / a;
        }
        self.face_velocity += acceleration;

        // 保证能在到达目标前减速停下
        let stop_v = 0.5 * ((max_a * max_a + 16.0 * max_a * distance - 8.0 * max_a * distance).sqrt() - max_a);
        let current_v = self.face_velocity.length();
        if current_v > stop_v && current_v > 0.0 {
            self.face_velocity *= stop_v / current_v;
        }

        self.face += self.face_velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_only_records_time() {
        let mut target = TargetPoint::new();
        target.set(1.0, 0.0);
        target.update(1.0 / 30.0);
        assert_eq!(target.x(), 0.0);
    }

    #[test]
    fn converges_without_overshooting() {
        let mut target = TargetPoint::new();
        target.set(1.0, -0.5);

        for _ in 0..600 {
            target.update(1.0 / 60.0);
            assert!(target.x() <= 1.0 + EPSILON);
            assert!(target.y() >= -0.5 - EPSILON);
        }

        assert!((target.x() - 1.0).abs() <= 0.02);
        assert!((target.y() + 0.5).abs() <= 0.02);
    }

    #[test]
    fn speed_is_limited_per_frame() {
        let mut target = TargetPoint::new();
        target.set(1.0, 0.0);
        target.update(1.0 / 30.0);

        let mut previous = target.x();
        for _ in 0..30 {
            target.update(1.0 / 30.0);
            assert!(target.x() - previous <= 4.0 / 30.0 + 1e-5);
            previous = target.x();
        }
    }
}
