//! 数学工具
//!
//! 标量插值、缓动、二维方向换算，以及用于贝塞尔反解的三次 / 二次方程求解。

use glam::Vec2;
use std::f64::consts::PI as PI64;

/// 视为零的阈值
pub const EPSILON: f32 = 0.00001;

/// 将值限制在 [min, max]
pub fn range(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// 线性插值
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 正弦缓动，输入超出 [0, 1] 时截断
pub fn ease_sine(value: f32) -> f32 {
    if value < 0.0 {
        0.0
    } else if value > 1.0 {
        1.0
    } else {
        0.5 - 0.5 * (value * std::f32::consts::PI).cos()
    }
}

pub fn degrees_to_radian(degrees: f32) -> f32 {
    degrees.to_radians()
}

pub fn radian_to_degrees(radian: f32) -> f32 {
    radian.to_degrees()
}

/// 两个方向向量之间的有符号夹角（弧度，[-π, π]）
pub fn direction_to_radian(from: Vec2, to: Vec2) -> f32 {
    let q1 = to.y.atan2(to.x);
    let q2 = from.y.atan2(from.x);

    let mut ret = q1 - q2;
    while ret < -std::f32::consts::PI {
        ret += std::f32::consts::TAU;
    }
    while ret > std::f32::consts::PI {
        ret -= std::f32::consts::TAU;
    }
    ret
}

/// 两个方向向量之间的有符号夹角（角度）
pub fn direction_to_degrees(from: Vec2, to: Vec2) -> f32 {
    radian_to_degrees(direction_to_radian(from, to))
}

/// 角度（弧度）转方向向量：0 弧度指向 +Y
pub fn radian_to_direction(total_angle: f32) -> Vec2 {
    Vec2::new(total_angle.sin(), total_angle.cos())
}

/// 绕原点旋转向量
pub fn rotate(v: Vec2, radian: f32) -> Vec2 {
    let (sin, cos) = radian.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// 求解 `a·t² + b·t + c = 0`
///
/// 有两个实根时优先返回落在 [0, 1] 内的根；判别式为负时按 0 处理，不产生 NaN。
pub fn quadratic_equation(a: f32, b: f32, c: f32) -> f32 {
    if a.abs() < EPSILON {
        if b.abs() < EPSILON {
            return -c;
        }
        return -c / b;
    }

    let sd = (b * b - 4.0 * a * c).max(0.0).sqrt();
    let root1 = (-b + sd) / (2.0 * a);
    let root2 = (-b - sd) / (2.0 * a);

    if (0.0..=1.0).contains(&root1) {
        root1
    } else if (0.0..=1.0).contains(&root2) {
        root2
    } else {
        root1
    }
}

/// Cardano 公式求解贝塞尔时间方程 `a·t³ + b·t² + c·t + d = 0`，结果限制在 [0, 1]
///
/// `a` 近似为零时退化为二次方程。三实根时按固定顺序尝试，
/// 取第一个落在 0.5 附近带内的根，否则取最后一个根。
pub fn cardano_algorithm_for_bezier(a: f32, b: f32, c: f32, d: f32) -> f32 {
    if a.abs() < EPSILON {
        return range(quadratic_equation(b, c, d), 0.0, 1.0);
    }

    // 内部用 f64，避免判别式附近的抵消误差
    let (a, b, c, d) = (a as f64, b as f64, c as f64, d as f64);

    let ba = b / a;
    let ca = c / a;
    let da = d / a;

    let p = (3.0 * ca - ba * ba) / 3.0;
    let p3 = p / 3.0;
    let q = (2.0 * ba * ba * ba - 9.0 * ba * ca + 27.0 * da) / 27.0;
    let q2 = q / 2.0;
    let discriminant = q2 * q2 + p3 * p3 * p3;

    let center = 0.5;
    let threshold = center + 0.01;
    let clamp01 = |root: f64| range(root as f32, 0.0, 1.0);

    if discriminant < 0.0 {
        let mp3 = -p / 3.0;
        let mp33 = mp3 * mp3 * mp3;
        let r = mp33.sqrt();
        let t = -q / (2.0 * r);
        let cosphi = t.clamp(-1.0, 1.0);
        let phi = cosphi.acos();
        let crtr = r.cbrt();
        let t1 = 2.0 * crtr;

        let root1 = t1 * (phi / 3.0).cos() - ba / 3.0;
        if (root1 - center).abs() < threshold {
            return clamp01(root1);
        }

        let root2 = t1 * ((phi + 2.0 * PI64) / 3.0).cos() - ba / 3.0;
        if (root2 - center).abs() < threshold {
            return clamp01(root2);
        }

        let root3 = t1 * ((phi + 4.0 * PI64) / 3.0).cos() - ba / 3.0;
        return clamp01(root3);
    }

    if discriminant == 0.0 {
        let u1 = if q2 < 0.0 { (-q2).cbrt() } else { -q2.cbrt() };

        let root1 = 2.0 * u1 - ba / 3.0;
        if (root1 - center).abs() < threshold {
            return clamp01(root1);
        }

        let root2 = -u1 - ba / 3.0;
        return clamp01(root2);
    }

    let sd = discriminant.sqrt();
    let u1 = (sd - q2).cbrt();
    let v1 = (sd + q2).cbrt();
    let root1 = u1 - v1 - ba / 3.0;
    clamp01(root1)
}
