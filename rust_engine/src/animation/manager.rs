//! 带优先级的动作管理器

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::model::ParameterStore;

use super::queue::{EventHandler, FinishedCallback, MotionHandle, MotionQueueManager, Playable};

/// 动作优先级
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotionPriority {
    #[default]
    None = 0,
    Idle = 1,
    Normal = 2,
    /// 无视当前与预约优先级
    Force = 3,
}

/// 动作管理器
///
/// 新请求的优先级必须高于正在播放和已预约的优先级，同级请求被拒绝。
#[derive(Default)]
pub struct MotionManager {
    queue: MotionQueueManager,
    current_priority: MotionPriority,
    reserve_priority: MotionPriority,
}

impl MotionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按优先级规则开始播放，被拒绝时返回 None
    pub fn start_motion(&mut self, motion: Arc<dyn Playable>, priority: MotionPriority) -> Option<MotionHandle> {
        if !self.accept(priority) {
            return None;
        }
        Some(self.start_motion_priority(motion, priority, None))
    }

    /// 同 `start_motion`，并在自然播放结束时调用回调
    pub fn start_motion_with_callback(
        &mut self,
        motion: Arc<dyn Playable>,
        priority: MotionPriority,
        on_finished: FinishedCallback,
    ) -> Option<MotionHandle> {
        if !self.accept(priority) {
            return None;
        }
        Some(self.start_motion_priority(motion, priority, Some(on_finished)))
    }

    fn accept(&mut self, priority: MotionPriority) -> bool {
        if priority == MotionPriority::Force {
            self.reserve_priority = priority;
            return true;
        }

        if !self.reserve_motion(priority) {
            log::info!(
                "[动作] 优先级不足，忽略请求: {:?} (当前 {:?}, 预约 {:?})",
                priority,
                self.current_priority,
                self.reserve_priority
            );
            return false;
        }
        true
    }

    /// 直接以指定优先级开始播放，不做优先级检查
    pub fn start_motion_priority(
        &mut self,
        motion: Arc<dyn Playable>,
        priority: MotionPriority,
        on_finished: Option<FinishedCallback>,
    ) -> MotionHandle {
        if priority == self.reserve_priority {
            self.reserve_priority = MotionPriority::None;
        }
        self.current_priority = priority;

        match on_finished {
            Some(callback) => self.queue.start_motion_with_callback(motion, callback),
            None => self.queue.start_motion(motion),
        }
    }

    /// 推进并写入参数，全部结束后当前优先级归零
    pub fn update_motion(&mut self, store: &mut ParameterStore, delta_time: f32, config: &EngineConfig) -> bool {
        let updated = self.queue.update_motion(store, delta_time, config);
        if self.queue.is_finished() {
            self.current_priority = MotionPriority::None;
        }
        updated
    }

    /// 预约优先级，成功返回 true
    pub fn reserve_motion(&mut self, priority: MotionPriority) -> bool {
        if priority <= self.reserve_priority || priority <= self.current_priority {
            return false;
        }
        self.reserve_priority = priority;
        true
    }

    pub fn current_priority(&self) -> MotionPriority {
        self.current_priority
    }

    pub fn reserve_priority(&self) -> MotionPriority {
        self.reserve_priority
    }

    pub fn set_reserve_priority(&mut self, priority: MotionPriority) {
        self.reserve_priority = priority;
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn stop_all_motions(&mut self) {
        self.queue.stop_all_motions();
        self.current_priority = MotionPriority::None;
    }

    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.queue.set_event_handler(handler);
    }

    pub fn queue(&self) -> &MotionQueueManager {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MotionQueueManager {
        &mut self.queue
    }
}
