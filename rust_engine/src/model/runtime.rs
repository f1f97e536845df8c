//! Cubism 运行时模型
//!
//! 持有参数存储和全部子系统，按固定顺序完成一帧更新。

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::animation::{
    EventHandler, Expression, ExpressionManager, FinishedCallback, Motion, MotionDefinition, MotionHandle,
    MotionManager, MotionPriority,
};
use crate::config::EngineConfig;
use crate::effect::{Breath, EyeBlink, TargetPoint};
use crate::physics::CubismPhysics;
use crate::pose::Pose;
use crate::Result;

use super::ids::{
    PARAM_ANGLE_X, PARAM_ANGLE_Y, PARAM_ANGLE_Z, PARAM_BODY_ANGLE_X, PARAM_EYE_BALL_X, PARAM_EYE_BALL_Y,
};
use super::ParameterStore;

/// Cubism 运行时模型
pub struct CubismModel {
    store: ParameterStore,
    config: EngineConfig,

    // 动作 / 表情
    motion_manager: MotionManager,
    expression_manager: ExpressionManager,
    idle_motions: Vec<Arc<Motion>>,
    rng: StdRng,

    // 程序化效果
    eye_blink: Option<EyeBlink>,
    breath: Option<Breath>,
    drag: TargetPoint,

    // 物理 / 姿势
    physics: Option<CubismPhysics>,
    pose: Option<Pose>,

    // 口型
    eye_blink_ids: Vec<String>,
    lip_sync_ids: Vec<String>,
    lip_sync_value: f32,

    user_time_seconds: f32,
}

impl CubismModel {
    pub fn new(store: ParameterStore, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            motion_manager: MotionManager::new(),
            expression_manager: ExpressionManager::new(),
            idle_motions: Vec::new(),
            rng: StdRng::from_entropy(),
            eye_blink: None,
            breath: None,
            drag: TargetPoint::new(),
            physics: None,
            pose: None,
            eye_blink_ids: Vec::new(),
            lip_sync_ids: Vec::new(),
            lip_sync_value: 0.0,
            user_time_seconds: 0.0,
        }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ParameterStore {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn user_time_seconds(&self) -> f32 {
        self.user_time_seconds
    }

    // ========== 动作 ==========

    /// 从 motion3 定义构建动作，并绑定本模型的眨眼 / 口型参数组
    pub fn load_motion(&self, definition: &MotionDefinition) -> Result<Motion> {
        let mut motion = Motion::from_definition(definition)?;
        motion.set_effect_ids(self.eye_blink_ids.clone(), self.lip_sync_ids.clone());
        Ok(motion)
    }

    pub fn start_motion(&mut self, motion: Arc<Motion>, priority: MotionPriority) -> Option<MotionHandle> {
        self.motion_manager.start_motion(motion, priority)
    }

    pub fn start_motion_with_callback(
        &mut self,
        motion: Arc<Motion>,
        priority: MotionPriority,
        on_finished: FinishedCallback,
    ) -> Option<MotionHandle> {
        self.motion_manager.start_motion_with_callback(motion, priority, on_finished)
    }

    pub fn stop_all_motions(&mut self) {
        self.motion_manager.stop_all_motions();
    }

    pub fn motion_manager(&self) -> &MotionManager {
        &self.motion_manager
    }

    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.motion_manager.set_event_handler(handler);
    }

    /// 没有动作播放时从待机动作中随机挑选一个
    pub fn add_idle_motion(&mut self, motion: Arc<Motion>) {
        self.idle_motions.push(motion);
    }

    pub fn set_idle_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ========== 表情 ==========

    pub fn set_expression(&mut self, expression: Arc<Expression>) -> MotionHandle {
        self.expression_manager.start_expression(expression)
    }

    pub fn expression_manager(&self) -> &ExpressionManager {
        &self.expression_manager
    }

    // ========== 效果 ==========

    /// 设置拖拽目标，范围 [-1, 1]
    pub fn set_dragging(&mut self, x: f32, y: f32) {
        self.drag.set(x, y);
    }

    pub fn set_lip_sync_value(&mut self, value: f32) {
        self.lip_sync_value = value;
    }

    /// 动作中 EyeBlink / LipSync 曲线作用的参数组
    pub fn set_effect_ids(&mut self, eye_blink_ids: Vec<String>, lip_sync_ids: Vec<String>) {
        self.eye_blink_ids = eye_blink_ids;
        self.lip_sync_ids = lip_sync_ids;
    }

    pub fn set_eye_blink(&mut self, eye_blink: Option<EyeBlink>) {
        self.eye_blink = eye_blink;
    }

    pub fn set_breath(&mut self, breath: Option<Breath>) {
        self.breath = breath;
    }

    // ========== 物理 / 姿势 ==========

    /// 安装物理并立即稳定化到当前参数
    pub fn set_physics(&mut self, physics: Option<CubismPhysics>) {
        self.physics = physics.map(|mut physics| {
            physics.set_max_remain_time(self.config.max_physics_remain_seconds);
            physics.stabilization(&mut self.store);
            physics
        });
    }

    pub fn physics(&self) -> Option<&CubismPhysics> {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut CubismPhysics> {
        self.physics.as_mut()
    }

    pub fn set_pose(&mut self, pose: Option<Pose>) {
        self.pose = pose;
    }

    // ========== 帧更新 ==========

    /// 推进一帧
    ///
    /// 顺序：拖拽 -> 动作 -> 眨眼 -> 表情 -> 拖拽写入 -> 呼吸 -> 物理 -> 口型 -> 姿势
    pub fn update(&mut self, delta_time: f32) {
        self.user_time_seconds += delta_time;
        self.drag.update(delta_time);

        self.store.load_parameters();

        if self.motion_manager.is_finished() {
            self.start_random_idle_motion();
        }
        let motion_updated = self.motion_manager.update_motion(&mut self.store, delta_time, &self.config);

        self.store.save_parameters();

        // 动作没有接管眼睛时才自动眨眼
        if !motion_updated {
            if let Some(eye_blink) = self.eye_blink.as_mut() {
                eye_blink.update_parameters(&mut self.store, delta_time);
            }
        }

        self.expression_manager.update(&mut self.store, delta_time, &self.config);

        self.apply_drag();

        if let Some(breath) = self.breath.as_mut() {
            breath.update_parameters(&mut self.store, delta_time);
        }

        if let Some(physics) = self.physics.as_mut() {
            physics.evaluate(&mut self.store, delta_time);
        }

        if !self.lip_sync_ids.is_empty() {
            let weight = self.config.lip_sync_weight;
            for id in &self.lip_sync_ids {
                self.store.add_parameter_value_by_id(id, self.lip_sync_value, weight);
            }
        }

        if let Some(pose) = self.pose.as_mut() {
            pose.update_parameters(&mut self.store, delta_time);
        }

        if self.config.debug_log {
            log::debug!(
                "[模型] t={:.3} 优先级={:?} 动作更新={}",
                self.user_time_seconds,
                self.motion_manager.current_priority(),
                motion_updated
            );
        }
    }

    fn start_random_idle_motion(&mut self) {
        if self.idle_motions.is_empty() {
            return;
        }
        let index = self.rng.gen_range(0..self.idle_motions.len());
        let motion = self.idle_motions[index].clone();
        if self.motion_manager.start_motion(motion, MotionPriority::Idle).is_some() {
            log::info!("[动作] 开始待机动作 #{}", index);
        }
    }

    fn apply_drag(&mut self) {
        let x = self.drag.x();
        let y = self.drag.y();
        let angle = self.config.drag_angle_scale;
        let body = self.config.drag_body_angle_scale;

        self.store.add_parameter_value_by_id(PARAM_ANGLE_X, x * angle, 1.0);
        self.store.add_parameter_value_by_id(PARAM_ANGLE_Y, y * angle, 1.0);
        self.store.add_parameter_value_by_id(PARAM_ANGLE_Z, x * y * -angle, 1.0);
        self.store.add_parameter_value_by_id(PARAM_BODY_ANGLE_X, x * body, 1.0);
        self.store.add_parameter_value_by_id(PARAM_EYE_BALL_X, x, 1.0);
        self.store.add_parameter_value_by_id(PARAM_EYE_BALL_Y, y, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::CurveTarget;
    use crate::model::ids::PARAM_MOUTH_OPEN_Y;
    use crate::model::Parameter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model() -> CubismModel {
        let store = ParameterStore::with_data(
            vec![
                Parameter::new("ParamA", 0.0, 10.0, 0.0),
                Parameter::new(PARAM_ANGLE_X, -30.0, 30.0, 0.0),
                Parameter::new(PARAM_MOUTH_OPEN_Y, 0.0, 1.0, 0.0),
            ],
            Vec::new(),
        );
        CubismModel::new(store, EngineConfig::default())
    }

    fn ramp(duration: f32) -> Motion {
        let mut motion = Motion::new(duration, false);
        motion.set_fade_in_time(0.0);
        motion.set_fade_out_time(0.0);
        motion
            .add_curve(CurveTarget::Parameter, "ParamA", &[0.0, 0.0, 0.0, duration, 10.0])
            .unwrap();
        motion
    }

    #[test]
    fn motion_drives_parameter_through_frame() {
        let mut model = model();
        model.start_motion(Arc::new(ramp(1.0)), MotionPriority::Normal).unwrap();

        model.update(0.0);
        model.update(0.5);
        assert!((model.store_mut().get_parameter_value_by_id("ParamA") - 5.0).abs() < 1e-4);
    }

    #[test]
    fn idle_motion_starts_when_nothing_plays() {
        let mut model = model();
        model.set_idle_seed(1);
        model.add_idle_motion(Arc::new(ramp(1.0)));

        model.update(0.0);
        assert_eq!(model.motion_manager().current_priority(), MotionPriority::Idle);

        // 普通优先级可以打断待机
        assert!(model.start_motion(Arc::new(ramp(1.0)), MotionPriority::Normal).is_some());
    }

    #[test]
    fn lip_sync_adds_weighted_value() {
        let mut model = model();
        model.set_effect_ids(Vec::new(), vec![PARAM_MOUTH_OPEN_Y.to_string()]);
        model.set_lip_sync_value(0.5);

        model.update(1.0 / 60.0);
        let mouth = model.store_mut().get_parameter_value_by_id(PARAM_MOUTH_OPEN_Y);
        assert!((mouth - 0.4).abs() < 1e-5);
    }

    #[test]
    fn drag_moves_head_angle() {
        let mut model = model();
        model.set_dragging(1.0, 0.0);
        for _ in 0..120 {
            model.update(1.0 / 60.0);
        }
        assert!(model.store_mut().get_parameter_value_by_id(PARAM_ANGLE_X) > 20.0);
    }

    #[test]
    fn completion_callback_runs_once() {
        let mut model = model();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        model
            .start_motion_with_callback(
                Arc::new(ramp(0.5)),
                MotionPriority::Normal,
                Box::new(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        for _ in 0..60 {
            model.update(1.0 / 30.0);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loaded_motion_picks_up_effect_ids() {
        let mut model = model();
        model.set_effect_ids(vec!["ParamEyeLOpen".into()], vec![PARAM_MOUTH_OPEN_Y.into()]);

        let definition: MotionDefinition = serde_json::from_str(
            r#"{
                "Version": 3,
                "Meta": { "Duration": 1.0, "Fps": 30.0, "Loop": false, "AreBeziersRestricted": true,
                          "FadeInTime": 0.0, "FadeOutTime": 0.0 },
                "Curves": [
                    { "Target": "Model", "Id": "LipSync", "Segments": [0, 0, 0, 1, 1] }
                ]
            }"#,
        )
        .unwrap();
        let motion = model.load_motion(&definition).unwrap();
        model.start_motion(Arc::new(motion), MotionPriority::Normal).unwrap();

        model.update(0.0);
        model.update(0.5);
        // 曲线值 0.5 叠加到口型参数，口型输入为 0
        let mouth = model.store_mut().get_parameter_value_by_id(PARAM_MOUTH_OPEN_Y);
        assert!((mouth - 0.5).abs() < 1e-4);
    }
}
