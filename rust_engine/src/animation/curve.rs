//! 动作曲线
//!
//! 一条曲线由若干首尾相接的段组成，段的控制点存放在共享的点缓冲区中。

use crate::math::{cardano_algorithm_for_bezier, lerp};
use crate::{CubismError, Result};

/// 控制点（时间, 值）
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionPoint {
    pub time: f32,
    pub value: f32,
}

impl MotionPoint {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }

    fn lerp(self, other: MotionPoint, t: f32) -> MotionPoint {
        MotionPoint {
            time: lerp(self.time, other.time, t),
            value: lerp(self.value, other.value, t),
        }
    }
}

/// 段类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Linear,
    Bezier,
    Stepped,
    InverseStepped,
}

impl SegmentKind {
    /// 从段编码解析（0 线性, 1 贝塞尔, 2 阶梯, 3 反阶梯）
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Linear),
            1 => Some(Self::Bezier),
            2 => Some(Self::Stepped),
            3 => Some(Self::InverseStepped),
            _ => None,
        }
    }

    /// 段使用的控制点数量（含起点）
    pub fn point_count(self) -> usize {
        match self {
            Self::Bezier => 4,
            _ => 2,
        }
    }
}

/// 贝塞尔求值方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BezierMode {
    /// 按起止时间比例直接取 t（旧格式，手柄时间受限）
    Restricted,
    /// 反解三次方程得到精确的 t
    #[default]
    Cardano,
}

/// 曲线段
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSegment {
    pub kind: SegmentKind,
    /// 起点在点缓冲区中的索引
    pub base_point_index: usize,
}

impl MotionSegment {
    fn end_point_index(&self) -> usize {
        self.base_point_index + self.kind.point_count() - 1
    }
}

/// 曲线目标
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveTarget {
    Model,
    Parameter,
    PartOpacity,
}

impl CurveTarget {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Model" => Some(Self::Model),
            "Parameter" => Some(Self::Parameter),
            "PartOpacity" => Some(Self::PartOpacity),
            _ => None,
        }
    }
}

/// 动作曲线
#[derive(Clone, Debug, PartialEq)]
pub struct MotionCurve {
    pub target: CurveTarget,
    pub id: String,
    pub base_segment_index: usize,
    pub segment_count: usize,
    pub base_point_index: usize,
    /// 负值表示使用动作级淡入时间
    pub fade_in_time: f32,
    /// 负值表示使用动作级淡出时间
    pub fade_out_time: f32,
}

impl MotionCurve {
    /// 是否带有独立的淡入淡出设置
    pub fn has_fade_override(&self) -> bool {
        self.fade_in_time >= 0.0 || self.fade_out_time >= 0.0
    }
}

/// 曲线集合（共享段与点缓冲区）
#[derive(Clone, Debug, Default)]
pub struct CurveSet {
    pub curves: Vec<MotionCurve>,
    pub segments: Vec<MotionSegment>,
    pub points: Vec<MotionPoint>,
    pub bezier_mode: BezierMode,
}

impl CurveSet {
    pub fn new(bezier_mode: BezierMode) -> Self {
        Self {
            bezier_mode,
            ..Default::default()
        }
    }

    /// 从扁平段数组追加一条曲线
    ///
    /// 格式：`t0, v0` 后接若干 `(段编码, 控制点...)`。
    /// 未知段编码按线性处理；数组截断或时间倒退返回错误。
    pub fn push_curve(
        &mut self,
        target: CurveTarget,
        id: &str,
        flat: &[f32],
        fade_in_time: f32,
        fade_out_time: f32,
    ) -> Result<usize> {
        if flat.len() < 2 {
            return Err(CubismError::MotionParse(format!(
                "curve '{}' has {} values, expected at least one point",
                id,
                flat.len()
            )));
        }

        let base_point_index = self.points.len();
        let base_segment_index = self.segments.len();
        let mut points = vec![MotionPoint::new(flat[0], flat[1])];
        let mut segments = Vec::new();

        let mut i = 2;
        while i < flat.len() {
            let code = flat[i] as i32;
            i += 1;

            let kind = SegmentKind::from_code(code).unwrap_or_else(|| {
                log::warn!("[动作] 曲线 '{}' 含未知段类型 {}，按线性处理", id, code);
                SegmentKind::Linear
            });

            let needed = (kind.point_count() - 1) * 2;
            if i + needed > flat.len() {
                return Err(CubismError::MotionParse(format!(
                    "curve '{}' is truncated at value {} ({:?} segment needs {} more values)",
                    id,
                    i,
                    kind,
                    needed
                )));
            }

            let start = points.len() - 1;
            for pair in flat[i..i + needed].chunks_exact(2) {
                points.push(MotionPoint::new(pair[0], pair[1]));
            }
            i += needed;

            let end = points.len() - 1;
            if points[end].time < points[start].time {
                return Err(CubismError::MotionParse(format!(
                    "curve '{}' goes back in time ({} -> {})",
                    id, points[start].time, points[end].time
                )));
            }

            segments.push(MotionSegment {
                kind,
                base_point_index: base_point_index + start,
            });
        }

        let segment_count = segments.len();
        self.points.extend(points);
        self.segments.extend(segments);
        self.curves.push(MotionCurve {
            target,
            id: id.to_string(),
            base_segment_index,
            segment_count,
            base_point_index,
            fade_in_time,
            fade_out_time,
        });

        Ok(self.curves.len() - 1)
    }

    /// 求值指定曲线
    ///
    /// 取第一个终点时间晚于 `time` 的段；超出所有段时返回最后一个点的值。
    pub fn evaluate(&self, curve_index: usize, time: f32) -> f32 {
        let Some(curve) = self.curves.get(curve_index) else {
            return 0.0;
        };

        let segments = &self.segments[curve.base_segment_index..curve.base_segment_index + curve.segment_count];
        let mut last_point = curve.base_point_index;

        for segment in segments {
            let end = segment.end_point_index();
            last_point = end;

            if self.points[end].time > time {
                let points = &self.points[segment.base_point_index..=end];
                return evaluate_segment(segment.kind, points, time, self.bezier_mode);
            }
        }

        self.points[last_point].value
    }

    /// 段总数
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// 点总数
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

/// 按段类型求值
pub fn evaluate_segment(kind: SegmentKind, points: &[MotionPoint], time: f32, bezier_mode: BezierMode) -> f32 {
    match kind {
        SegmentKind::Linear => linear_evaluate(points, time),
        SegmentKind::Bezier => match bezier_mode {
            BezierMode::Restricted => bezier_evaluate(points, time),
            BezierMode::Cardano => bezier_evaluate_cardano(points, time),
        },
        SegmentKind::Stepped => stepped_evaluate(points, time),
        SegmentKind::InverseStepped => inverse_stepped_evaluate(points, time),
    }
}

/// 线性段，t 不小于 0
pub fn linear_evaluate(points: &[MotionPoint], time: f32) -> f32 {
    let span = points[1].time - points[0].time;
    let mut t = if span == 0.0 { 1.0 } else { (time - points[0].time) / span };
    if t < 0.0 {
        t = 0.0;
    }

    lerp(points[0].value, points[1].value, t)
}

/// 贝塞尔段（按时间比例直接取 t）
pub fn bezier_evaluate(points: &[MotionPoint], time: f32) -> f32 {
    let span = points[3].time - points[0].time;
    let mut t = if span == 0.0 { 1.0 } else { (time - points[0].time) / span };
    if t < 0.0 {
        t = 0.0;
    }

    de_casteljau(points, t).value
}

/// 贝塞尔段（Cardano 反解 t）
pub fn bezier_evaluate_cardano(points: &[MotionPoint], time: f32) -> f32 {
    let t = bezier_parameter_for_time(points, time);
    de_casteljau(points, t).value
}

/// 反解贝塞尔时间坐标等于 `time` 的参数 t
pub fn bezier_parameter_for_time(points: &[MotionPoint], time: f32) -> f32 {
    let x1 = points[0].time;
    let cx1 = points[1].time;
    let cx2 = points[2].time;
    let x2 = points[3].time;

    let a = x2 - 3.0 * cx2 + 3.0 * cx1 - x1;
    let b = 3.0 * cx2 - 6.0 * cx1 + 3.0 * x1;
    let c = 3.0 * cx1 - 3.0 * x1;
    let d = x1 - time;

    cardano_algorithm_for_bezier(a, b, c, d)
}

/// De Casteljau 插值
pub fn de_casteljau(points: &[MotionPoint], t: f32) -> MotionPoint {
    let p01 = points[0].lerp(points[1], t);
    let p12 = points[1].lerp(points[2], t);
    let p23 = points[2].lerp(points[3], t);

    let p012 = p01.lerp(p12, t);
    let p123 = p12.lerp(p23, t);

    p012.lerp(p123, t)
}

/// 阶梯段：保持起点值
pub fn stepped_evaluate(points: &[MotionPoint], _time: f32) -> f32 {
    points[0].value
}

/// 反阶梯段：立即跳到终点值
pub fn inverse_stepped_evaluate(points: &[MotionPoint], _time: f32) -> f32 {
    points[1].value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(flat: &[f32], mode: BezierMode) -> CurveSet {
        let mut set = CurveSet::new(mode);
        set.push_curve(CurveTarget::Parameter, "ParamA", flat, -1.0, -1.0)
            .expect("valid curve");
        set
    }

    #[test]
    fn linear_hits_endpoints_and_clamps_below_start() {
        let points = [MotionPoint::new(1.0, 2.0), MotionPoint::new(3.0, 6.0)];
        assert_eq!(linear_evaluate(&points, 1.0), 2.0);
        assert!((linear_evaluate(&points, 3.0) - 6.0).abs() < 1e-6);
        assert_eq!(linear_evaluate(&points, 0.0), 2.0);
        assert!((linear_evaluate(&points, 2.0) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn stepped_and_inverse_stepped_hold_values() {
        let points = [MotionPoint::new(0.0, 5.0), MotionPoint::new(1.0, 7.0)];
        assert_eq!(stepped_evaluate(&points, 0.9), 5.0);
        assert_eq!(inverse_stepped_evaluate(&points, 0.1), 7.0);
    }

    #[test]
    fn curve_walks_segments_and_clamps_after_end() {
        // 线性 (0,0)->(1,1)，阶梯 (1,1)->(2,3)，反阶梯 (2,3)->(3,-1)
        let set = single(&[0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0, -1.0], BezierMode::Cardano);
        assert_eq!(set.segment_count(), 3);

        assert!((set.evaluate(0, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(set.evaluate(0, 1.5), 1.0);
        assert_eq!(set.evaluate(0, 2.5), -1.0);
        assert_eq!(set.evaluate(0, 10.0), -1.0);
    }

    #[test]
    fn single_point_curve_is_constant() {
        let set = single(&[0.0, 4.0], BezierMode::Cardano);
        assert_eq!(set.evaluate(0, 3.0), 4.0);
    }

    #[test]
    fn restricted_and_cardano_bezier_agree_for_evenly_spaced_handles() {
        let flat = [0.0, 0.0, 1.0, 1.0 / 3.0, 0.0, 2.0 / 3.0, 1.0, 1.0, 1.0];
        let restricted = single(&flat, BezierMode::Restricted);
        let cardano = single(&flat, BezierMode::Cardano);

        for i in 0..=10 {
            let time = i as f32 / 10.0;
            let a = restricted.evaluate(0, time);
            let b = cardano.evaluate(0, time);
            assert!((a - b).abs() < 1e-4, "time {time}: {a} vs {b}");
        }
    }

    #[test]
    fn cardano_parameter_round_trips_time() {
        let points = [
            MotionPoint::new(0.0, 0.0),
            MotionPoint::new(0.6, 1.0),
            MotionPoint::new(0.7, 0.0),
            MotionPoint::new(1.0, 1.0),
        ];

        for i in 0..=20 {
            let time = i as f32 / 20.0;
            let t = bezier_parameter_for_time(&points, time);
            let back = de_casteljau(&points, t).time;
            assert!((back - time).abs() < 1e-3, "time {time} -> t {t} -> {back}");
        }
    }

    #[test]
    fn unknown_segment_code_defaults_to_linear() {
        let set = single(&[0.0, 0.0, 9.0, 1.0, 2.0], BezierMode::Cardano);
        assert!((set.evaluate(0, 0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn truncated_segments_are_rejected() {
        let mut set = CurveSet::new(BezierMode::Cardano);
        let err = set.push_curve(CurveTarget::Parameter, "ParamA", &[0.0, 0.0, 1.0, 0.3, 0.3], -1.0, -1.0);
        assert!(matches!(err, Err(CubismError::MotionParse(_))));
        assert!(set.curves.is_empty());
    }

    #[test]
    fn backwards_time_is_rejected() {
        let mut set = CurveSet::new(BezierMode::Cardano);
        let err = set.push_curve(CurveTarget::Parameter, "ParamA", &[1.0, 0.0, 0.0, 0.5, 1.0], -1.0, -1.0);
        assert!(err.is_err());
    }
}
