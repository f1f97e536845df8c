//! 动作
//!
//! 一组参数 / 部件 / 模型曲线加上用户事件。通过 `Playable` 在队列中播放。

use crate::config::EngineConfig;
use crate::model::ids::{CURVE_EYE_BLINK, CURVE_LIP_SYNC, CURVE_OPACITY};
use crate::model::ParameterStore;
use crate::{CubismError, Result};

use super::curve::{BezierMode, CurveSet, CurveTarget, MotionCurve};
use super::definition::MotionDefinition;
use super::queue::{fade_in_factor, fade_out_factor, MotionQueueEntry, Playable};

/// 默认淡入淡出时间（秒）
pub const DEFAULT_FADE_SECONDS: f32 = 1.0;

/// 用户事件
#[derive(Clone, Debug, PartialEq)]
pub struct MotionEvent {
    /// 相对于播放开始的时间（秒）
    pub fire_time: f32,
    pub value: String,
}

/// 动作数据
#[derive(Clone, Debug)]
pub struct Motion {
    curves: CurveSet,
    duration: f32,
    fps: f32,
    looping: bool,
    /// 循环重新开始时是否再次淡入
    loop_fade_in: bool,
    fade_in_seconds: f32,
    fade_out_seconds: f32,
    weight: f32,
    offset_seconds: f32,
    events: Vec<MotionEvent>,
    eye_blink_parameter_ids: Vec<String>,
    lip_sync_parameter_ids: Vec<String>,
}

impl Motion {
    /// 创建空动作
    pub fn new(duration: f32, looping: bool) -> Self {
        Self {
            curves: CurveSet::new(BezierMode::Cardano),
            duration,
            fps: 30.0,
            looping,
            loop_fade_in: true,
            fade_in_seconds: DEFAULT_FADE_SECONDS,
            fade_out_seconds: DEFAULT_FADE_SECONDS,
            weight: 1.0,
            offset_seconds: 0.0,
            events: Vec::new(),
            eye_blink_parameter_ids: Vec::new(),
            lip_sync_parameter_ids: Vec::new(),
        }
    }

    /// 从 motion3 结构创建
    ///
    /// 未知目标的曲线会被跳过；元信息中的数量与实际不符时返回错误。
    pub fn from_definition(definition: &MotionDefinition) -> Result<Self> {
        let meta = &definition.meta;

        if let Some(count) = meta.curve_count {
            if count != definition.curves.len() {
                return Err(CubismError::MotionParse(format!(
                    "meta declares {} curves, found {}",
                    count,
                    definition.curves.len()
                )));
            }
        }

        if let Some(count) = meta.user_data_count {
            if count != definition.user_data.len() {
                return Err(CubismError::MotionParse(format!(
                    "meta declares {} user data entries, found {}",
                    count,
                    definition.user_data.len()
                )));
            }
        }

        let bezier_mode = if meta.are_beziers_restricted {
            BezierMode::Restricted
        } else {
            BezierMode::Cardano
        };

        let mut motion = Motion::new(meta.duration, meta.looping);
        motion.curves = CurveSet::new(bezier_mode);
        motion.fps = meta.fps;
        motion.fade_in_seconds = meta.fade_in_time.unwrap_or(DEFAULT_FADE_SECONDS);
        motion.fade_out_seconds = meta.fade_out_time.unwrap_or(DEFAULT_FADE_SECONDS);

        for curve in &definition.curves {
            let Some(target) = CurveTarget::from_name(&curve.target) else {
                log::warn!("[动作] 曲线 '{}' 的目标 '{}' 无法识别，已跳过", curve.id, curve.target);
                continue;
            };

            motion.curves.push_curve(
                target,
                &curve.id,
                &curve.segments,
                curve.fade_in_time.unwrap_or(-1.0),
                curve.fade_out_time.unwrap_or(-1.0),
            )?;
        }

        let has_skipped_curves = motion.curves.curves.len() != definition.curves.len();
        if !has_skipped_curves {
            if let Some(count) = meta.total_segment_count {
                if count != motion.curves.segment_count() {
                    return Err(CubismError::MotionParse(format!(
                        "meta declares {} segments, found {}",
                        count,
                        motion.curves.segment_count()
                    )));
                }
            }

            if let Some(count) = meta.total_point_count {
                if count != motion.curves.point_count() {
                    return Err(CubismError::MotionParse(format!(
                        "meta declares {} points, found {}",
                        count,
                        motion.curves.point_count()
                    )));
                }
            }
        }

        for user_data in &definition.user_data {
            motion.add_event(user_data.time, &user_data.value);
        }

        log::info!(
            "[动作] 加载完成: 时长 {:.2}s, 曲线 {}, 事件 {}",
            motion.duration,
            motion.curves.curves.len(),
            motion.events.len()
        );

        Ok(motion)
    }

    /// 追加一条曲线（扁平段数组）
    pub fn add_curve(&mut self, target: CurveTarget, id: &str, segments: &[f32]) -> Result<()> {
        self.curves.push_curve(target, id, segments, -1.0, -1.0)?;
        Ok(())
    }

    /// 追加用户事件
    pub fn add_event(&mut self, fire_time: f32, value: &str) {
        self.events.push(MotionEvent {
            fire_time,
            value: value.to_string(),
        });
    }

    /// 设置眨眼 / 口型作用的参数 ID
    pub fn set_effect_ids(&mut self, eye_blink_parameter_ids: Vec<String>, lip_sync_parameter_ids: Vec<String>) {
        self.eye_blink_parameter_ids = eye_blink_parameter_ids;
        self.lip_sync_parameter_ids = lip_sync_parameter_ids;
    }

    /// 设置指定参数曲线的淡入时间（负值表示使用动作级设置）
    pub fn set_parameter_fade_in_time(&mut self, parameter_id: &str, seconds: f32) {
        for curve in self.parameter_curves_mut(parameter_id) {
            curve.fade_in_time = seconds;
        }
    }

    /// 设置指定参数曲线的淡出时间（负值表示使用动作级设置）
    pub fn set_parameter_fade_out_time(&mut self, parameter_id: &str, seconds: f32) {
        for curve in self.parameter_curves_mut(parameter_id) {
            curve.fade_out_time = seconds;
        }
    }

    /// 指定参数曲线的淡入时间，曲线不存在时为 -1
    pub fn parameter_fade_in_time(&self, parameter_id: &str) -> f32 {
        self.curves
            .curves
            .iter()
            .find(|c| c.target == CurveTarget::Parameter && c.id == parameter_id)
            .map_or(-1.0, |c| c.fade_in_time)
    }

    /// 指定参数曲线的淡出时间，曲线不存在时为 -1
    pub fn parameter_fade_out_time(&self, parameter_id: &str) -> f32 {
        self.curves
            .curves
            .iter()
            .find(|c| c.target == CurveTarget::Parameter && c.id == parameter_id)
            .map_or(-1.0, |c| c.fade_out_time)
    }

    fn parameter_curves_mut<'a>(
        &'a mut self,
        parameter_id: &'a str,
    ) -> impl Iterator<Item = &'a mut MotionCurve> + 'a {
        self.curves
            .curves
            .iter_mut()
            .filter(move |c| c.target == CurveTarget::Parameter && c.id == parameter_id)
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_loop(&self) -> bool {
        self.looping
    }

    pub fn set_loop_fade_in(&mut self, loop_fade_in: bool) {
        self.loop_fade_in = loop_fade_in;
    }

    pub fn is_loop_fade_in(&self) -> bool {
        self.loop_fade_in
    }

    pub fn set_fade_in_time(&mut self, seconds: f32) {
        self.fade_in_seconds = seconds;
    }

    pub fn set_fade_out_time(&mut self, seconds: f32) {
        self.fade_out_seconds = seconds;
    }

    /// 设置整体权重，限制在 [0, 1]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    pub fn set_offset_seconds(&mut self, seconds: f32) {
        self.offset_seconds = seconds;
    }

    /// 单次播放时长（秒）
    pub fn loop_duration(&self) -> f32 {
        self.duration
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }
}

impl Playable for Motion {
    fn fade_in_seconds(&self) -> f32 {
        self.fade_in_seconds
    }

    fn fade_out_seconds(&self) -> f32 {
        self.fade_out_seconds
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn duration(&self) -> f32 {
        if self.looping {
            -1.0
        } else {
            self.duration
        }
    }

    fn offset_seconds(&self) -> f32 {
        self.offset_seconds
    }

    fn do_update_parameters(
        &self,
        store: &mut ParameterStore,
        entry: &mut MotionQueueEntry,
        user_time: f32,
        fade_weight: f32,
        config: &EngineConfig,
    ) {
        let elapsed = (user_time - entry.start_time()).max(0.0);
        let mut time = elapsed;
        if self.looping && self.duration > 0.0 {
            while time > self.duration {
                time -= self.duration;
            }
        }

        let curves = &self.curves.curves;

        // 模型曲线：眨眼 / 口型只记录数值，不直接写入
        let mut eye_blink_value = None;
        let mut lip_sync_value = None;
        for (index, curve) in curves.iter().enumerate() {
            if curve.target != CurveTarget::Model {
                continue;
            }

            let value = self.curves.evaluate(index, time);
            match curve.id.as_str() {
                CURVE_EYE_BLINK => eye_blink_value = Some(value),
                CURVE_LIP_SYNC => lip_sync_value = Some(value),
                CURVE_OPACITY => store.set_model_opacity(value),
                _ => {}
            }
        }

        let mut eye_blink_touched = vec![false; self.eye_blink_parameter_ids.len()];
        let mut lip_sync_touched = vec![false; self.lip_sync_parameter_ids.len()];

        let motion_fade_in = fade_in_factor(self.fade_in_seconds, entry, user_time);
        let motion_fade_out = fade_out_factor(self.fade_out_seconds, entry, user_time);

        for (index, curve) in curves.iter().enumerate() {
            if curve.target != CurveTarget::Parameter {
                continue;
            }

            let parameter_index = store.get_parameter_index(&curve.id);
            let source = store.get_parameter_value_by_index(parameter_index);
            let mut value = self.curves.evaluate(index, time);

            if let Some(eye_blink) = eye_blink_value {
                if let Some(i) = self.eye_blink_parameter_ids.iter().position(|id| *id == curve.id) {
                    value *= eye_blink;
                    eye_blink_touched[i] = true;
                }
            }

            if let Some(lip_sync) = lip_sync_value {
                if let Some(i) = self.lip_sync_parameter_ids.iter().position(|id| *id == curve.id) {
                    value += lip_sync;
                    lip_sync_touched[i] = true;
                }
            }

            let weight = if curve.has_fade_override() {
                let fade_in = if curve.fade_in_time < 0.0 {
                    motion_fade_in
                } else {
                    fade_in_factor(curve.fade_in_time, entry, user_time)
                };
                let fade_out = if curve.fade_out_time < 0.0 {
                    motion_fade_out
                } else {
                    fade_out_factor(curve.fade_out_time, entry, user_time)
                };
                self.weight * fade_in * fade_out
            } else {
                fade_weight
            };

            store.set_parameter_value_by_index(parameter_index, source + (value - source) * weight, 1.0);
        }

        // 没有对应参数曲线的眨眼 / 口型参数直接按原始值混合
        if let Some(eye_blink) = eye_blink_value {
            for (id, _) in self
                .eye_blink_parameter_ids
                .iter()
                .zip(&eye_blink_touched)
                .filter(|(_, touched)| !**touched)
            {
                let source = store.get_parameter_value_by_id(id);
                store.set_parameter_value_by_id(id, source + (eye_blink - source) * fade_weight, 1.0);
            }
        }

        if let Some(lip_sync) = lip_sync_value {
            for (id, _) in self
                .lip_sync_parameter_ids
                .iter()
                .zip(&lip_sync_touched)
                .filter(|(_, touched)| !**touched)
            {
                let source = store.get_parameter_value_by_id(id);
                store.set_parameter_value_by_id(id, source + (lip_sync - source) * fade_weight, 1.0);
            }
        }

        for (index, curve) in curves.iter().enumerate() {
            if curve.target != CurveTarget::PartOpacity {
                continue;
            }

            let value = self.curves.evaluate(index, time);
            if config.part_opacity_curves_as_parameters {
                store.set_parameter_value_by_id(&curve.id, value, 1.0);
            } else {
                store.set_part_opacity_by_id(&curve.id, value);
            }
        }

        if elapsed >= self.duration {
            if self.looping {
                entry.set_start_time(user_time);
                if self.loop_fade_in {
                    entry.set_fade_in_start_time(user_time);
                }
            } else {
                if config.debug_log {
                    log::debug!("[动作] 播放完成 handle={}", entry.handle().id());
                }
                entry.finish();
            }
        }
    }

    fn fired_events(&self, before: f32, now: f32) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.fire_time > before && e.fire_time <= now)
            .map(|e| e.value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::queue::MotionQueueManager;
    use crate::model::Parameter;
    use std::sync::Arc;

    fn store() -> ParameterStore {
        ParameterStore::with_data(
            vec![
                Parameter::new("ParamA", 0.0, 1.0, 0.0),
                Parameter::new("ParamB", 0.0, 10.0, 0.0),
                Parameter::new("ParamEyeLOpen", 0.0, 1.0, 1.0),
                Parameter::new("ParamMouthOpenY", 0.0, 1.0, 0.0),
            ],
            Vec::new(),
        )
    }

    fn no_fade(mut motion: Motion) -> Motion {
        motion.set_fade_in_time(0.0);
        motion.set_fade_out_time(0.0);
        motion
    }

    #[test]
    fn linear_and_stepped_curves_drive_parameters() {
        let mut motion = Motion::new(1.0, false);
        motion.add_curve(CurveTarget::Parameter, "ParamA", &[0.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
        motion.add_curve(CurveTarget::Parameter, "ParamB", &[0.0, 5.0, 2.0, 1.0, 7.0]).unwrap();
        let motion = no_fade(motion);

        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        queue.start_motion(Arc::new(motion));

        queue.update_motion(&mut store, 0.0, &config);
        queue.update_motion(&mut store, 0.5, &config);

        assert!((store.get_parameter_value_by_id("ParamA") - 0.5).abs() < 1e-5);
        assert_eq!(store.get_parameter_value_by_id("ParamB"), 5.0);
    }

    #[test]
    fn eye_blink_curve_multiplies_and_lip_sync_adds() {
        let mut motion = Motion::new(2.0, false);
        motion.add_curve(CurveTarget::Model, CURVE_EYE_BLINK, &[0.0, 0.5]).unwrap();
        motion.add_curve(CurveTarget::Model, CURVE_LIP_SYNC, &[0.0, 0.25]).unwrap();
        motion.add_curve(CurveTarget::Parameter, "ParamEyeLOpen", &[0.0, 0.8]).unwrap();
        motion.set_effect_ids(vec!["ParamEyeLOpen".into()], vec!["ParamMouthOpenY".into()]);
        let motion = no_fade(motion);

        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        queue.start_motion(Arc::new(motion));
        queue.update_motion(&mut store, 0.1, &config);

        assert!((store.get_parameter_value_by_id("ParamEyeLOpen") - 0.4).abs() < 1e-5);
        // 没有对应参数曲线，直接写入口型原始值
        assert!((store.get_parameter_value_by_id("ParamMouthOpenY") - 0.25).abs() < 1e-5);
    }

    #[test]
    fn opacity_curve_writes_model_opacity() {
        let mut motion = no_fade(Motion::new(1.0, false));
        motion.add_curve(CurveTarget::Model, CURVE_OPACITY, &[0.0, 0.3]).unwrap();

        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        queue.start_motion(Arc::new(motion));
        queue.update_motion(&mut store, 0.1, &config);

        assert!((store.model_opacity() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn part_opacity_curves_follow_config_flag() {
        let mut motion = no_fade(Motion::new(1.0, true));
        motion.add_curve(CurveTarget::PartOpacity, "PartArm", &[0.0, 0.0]).unwrap();
        let motion = Arc::new(motion);

        let mut store = store();
        store.add_part(crate::model::Part::new("PartArm"));

        let mut queue = MotionQueueManager::new();
        queue.start_motion(motion.clone());
        let config = EngineConfig {
            part_opacity_curves_as_parameters: false,
            ..EngineConfig::default()
        };
        queue.update_motion(&mut store, 0.1, &config);
        assert_eq!(store.get_part_opacity_by_id("PartArm"), 0.0);

        let mut store = store_with_part_parameter();
        let mut queue = MotionQueueManager::new();
        queue.start_motion(motion);
        queue.update_motion(&mut store, 0.1, &EngineConfig::default());
        assert_eq!(store.get_parameter_value_by_id("PartArm"), 0.0);
        assert_eq!(store.get_part_opacity_by_id("PartArm"), 1.0);
    }

    fn store_with_part_parameter() -> ParameterStore {
        ParameterStore::with_data(
            vec![Parameter::new("PartArm", 0.0, 1.0, 1.0)],
            vec![crate::model::Part::new("PartArm")],
        )
    }

    #[test]
    fn per_parameter_fade_override_is_independent() {
        let mut motion = Motion::new(10.0, false);
        motion.add_curve(CurveTarget::Parameter, "ParamA", &[0.0, 1.0]).unwrap();
        motion.add_curve(CurveTarget::Parameter, "ParamB", &[0.0, 10.0]).unwrap();
        motion.set_fade_in_time(2.0);
        motion.set_parameter_fade_in_time("ParamA", 0.0);
        assert_eq!(motion.parameter_fade_in_time("ParamA"), 0.0);
        assert_eq!(motion.parameter_fade_in_time("ParamB"), -1.0);

        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        queue.start_motion(Arc::new(motion));
        queue.update_motion(&mut store, 0.0, &config);
        queue.update_motion(&mut store, 1.0, &config);

        assert_eq!(store.get_parameter_value_by_id("ParamA"), 1.0);
        // ParamB 仍在淡入：第一帧权重 0，第二帧权重 ease_sine(0.5) = 0.5
        assert!((store.get_parameter_value_by_id("ParamB") - 5.0).abs() < 1e-4);
    }

    #[test]
    fn looping_motion_wraps_and_never_finishes() {
        let mut motion = no_fade(Motion::new(1.0, true));
        motion.add_curve(CurveTarget::Parameter, "ParamA", &[0.0, 0.0, 0.0, 1.0, 1.0]).unwrap();

        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        let handle = queue.start_motion(Arc::new(motion));

        queue.update_motion(&mut store, 0.0, &config);
        for _ in 0..10 {
            queue.update_motion(&mut store, 0.35, &config);
        }

        assert!(!queue.is_handle_finished(handle));
        let value = store.get_parameter_value_by_id("ParamA");
        assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn events_are_reported_in_window() {
        let mut motion = Motion::new(1.0, false);
        motion.add_event(0.25, "a");
        motion.add_event(0.75, "b");

        assert_eq!(motion.fired_events(0.0, 0.5), vec!["a".to_string()]);
        assert_eq!(motion.fired_events(0.25, 0.5), Vec::<String>::new());
        assert_eq!(motion.fired_events(0.5, 1.0), vec!["b".to_string()]);
    }

    #[test]
    fn looping_motion_fires_late_event_every_cycle() {
        let mut motion = no_fade(Motion::new(1.0, true));
        motion.add_event(0.9, "late");

        let received = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = received.clone();
        let config = EngineConfig::default();
        let mut store = store();
        let mut queue = MotionQueueManager::new();
        queue.set_event_handler(Box::new(move |value| sink.lock().unwrap().push(value.to_string())));
        queue.start_motion(Arc::new(motion));

        // 每 3 帧回绕一次，事件位于回绕帧的窗口内
        for _ in 0..30 {
            queue.update_motion(&mut store, 0.35, &config);
        }

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 9);
        assert!(received.iter().all(|v| v == "late"));
    }
}
