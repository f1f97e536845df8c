//! 动作队列
//!
//! 动作与表情共用的淡入淡出队列。每次播放对应一个 `MotionQueueEntry`，
//! 新播放开始时，队列中已有条目按各自动作的淡出时间开始淡出。

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::math::ease_sine;
use crate::model::ParameterStore;

/// 播放句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MotionHandle(u64);

impl MotionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// 播放结束回调
pub type FinishedCallback = Box<dyn FnOnce(MotionHandle) + Send>;

/// 用户事件回调
pub type EventHandler = Box<dyn FnMut(&str) + Send>;

/// 可在队列中淡入淡出播放的片段
pub trait Playable: Send + Sync {
    /// 淡入时间（秒），不大于 0 时不淡入
    fn fade_in_seconds(&self) -> f32;

    /// 淡出时间（秒），不大于 0 时不淡出
    fn fade_out_seconds(&self) -> f32;

    /// 整体权重
    fn weight(&self) -> f32 {
        1.0
    }

    /// 播放时长（秒），负值表示无限（循环或常驻）
    fn duration(&self) -> f32;

    /// 开始播放时跳过的时长（秒）
    fn offset_seconds(&self) -> f32 {
        0.0
    }

    /// 以给定的淡入淡出权重写入参数
    fn do_update_parameters(
        &self,
        store: &mut ParameterStore,
        entry: &mut MotionQueueEntry,
        user_time: f32,
        fade_weight: f32,
        config: &EngineConfig,
    );

    /// 返回在 `(before, now]` 区间内触发的事件（相对于播放开始的时间）
    fn fired_events(&self, _before: f32, _now: f32) -> Vec<String> {
        Vec::new()
    }

    /// 更新一帧：首次更新时确定起止时间，计算淡入淡出权重后写入参数
    fn update_parameters(
        &self,
        store: &mut ParameterStore,
        entry: &mut MotionQueueEntry,
        user_time: f32,
        config: &EngineConfig,
    ) {
        if !entry.is_available() || entry.is_finished() {
            return;
        }

        self.setup_entry(entry, user_time);

        let fade_weight = self.update_fade_weight(entry, user_time);
        self.do_update_parameters(store, entry, user_time, fade_weight, config);

        // 淡出结束
        if entry.end_time() > 0.0 && entry.end_time() < user_time {
            entry.set_finished(true);
        }
    }

    /// 首次更新时记录开始时间
    fn setup_entry(&self, entry: &mut MotionQueueEntry, user_time: f32) {
        if entry.is_started() || !entry.is_available() {
            return;
        }

        entry.set_started(true);
        entry.set_start_time(user_time - self.offset_seconds());
        entry.set_fade_in_start_time(user_time);

        if entry.end_time() < 0.0 {
            self.adjust_end_time(entry);
        }
    }

    /// 根据时长计算结束时间，无限时长为 -1
    fn adjust_end_time(&self, entry: &mut MotionQueueEntry) {
        let duration = self.duration();
        let end_time = if duration <= 0.0 {
            -1.0
        } else {
            entry.start_time() + duration
        };
        entry.set_end_time(end_time);
    }

    /// `weight * fadeIn * fadeOut`
    fn update_fade_weight(&self, entry: &mut MotionQueueEntry, user_time: f32) -> f32 {
        let fade_weight = self.weight() * fade_in_factor(self.fade_in_seconds(), entry, user_time)
            * fade_out_factor(self.fade_out_seconds(), entry, user_time);

        debug_assert!((0.0..=1.0).contains(&fade_weight), "fade weight {fade_weight}");

        entry.set_state(user_time, fade_weight);
        fade_weight
    }
}

/// 淡入系数
pub(crate) fn fade_in_factor(fade_in_seconds: f32, entry: &MotionQueueEntry, user_time: f32) -> f32 {
    if fade_in_seconds <= 0.0 {
        1.0
    } else {
        ease_sine((user_time - entry.fade_in_start_time()) / fade_in_seconds)
    }
}

/// 淡出系数，结束时间未定时不淡出
pub(crate) fn fade_out_factor(fade_out_seconds: f32, entry: &MotionQueueEntry, user_time: f32) -> f32 {
    if fade_out_seconds <= 0.0 || entry.end_time() < 0.0 {
        1.0
    } else {
        ease_sine((entry.end_time() - user_time) / fade_out_seconds)
    }
}

/// 一次播放的状态
pub struct MotionQueueEntry {
    handle: MotionHandle,
    motion: Arc<dyn Playable>,

    available: bool,
    started: bool,
    finished: bool,

    start_time: f32,
    fade_in_start_time: f32,
    /// -1 表示尚未确定或无限
    end_time: f32,
    last_event_check_time: f32,

    fade_out_seconds: f32,
    triggered_fade_out: bool,

    state_time: f32,
    state_weight: f32,

    on_finished: Option<FinishedCallback>,
}

impl MotionQueueEntry {
    fn new(handle: MotionHandle, motion: Arc<dyn Playable>, on_finished: Option<FinishedCallback>) -> Self {
        Self {
            handle,
            motion,
            available: true,
            started: false,
            finished: false,
            start_time: 0.0,
            fade_in_start_time: 0.0,
            end_time: -1.0,
            last_event_check_time: 0.0,
            fade_out_seconds: 0.0,
            triggered_fade_out: false,
            state_time: 0.0,
            state_weight: 0.0,
            on_finished,
        }
    }

    pub fn handle(&self) -> MotionHandle {
        self.handle
    }

    pub fn motion(&self) -> &Arc<dyn Playable> {
        &self.motion
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    /// 自然播放结束：标记完成并调用结束回调（只会调用一次）
    pub fn finish(&mut self) {
        self.finished = true;
        if let Some(callback) = self.on_finished.take() {
            callback(self.handle);
        }
    }

    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    pub fn set_start_time(&mut self, time: f32) {
        self.start_time = time;
    }

    pub fn fade_in_start_time(&self) -> f32 {
        self.fade_in_start_time
    }

    pub fn set_fade_in_start_time(&mut self, time: f32) {
        self.fade_in_start_time = time;
    }

    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    pub fn set_end_time(&mut self, time: f32) {
        self.end_time = time;
    }

    pub fn last_event_check_time(&self) -> f32 {
        self.last_event_check_time
    }

    pub fn set_last_event_check_time(&mut self, time: f32) {
        self.last_event_check_time = time;
    }

    pub fn fade_out_seconds(&self) -> f32 {
        self.fade_out_seconds
    }

    pub fn is_triggered_fade_out(&self) -> bool {
        self.triggered_fade_out
    }

    /// 请求淡出，在下一次队列更新时生效
    pub fn set_fade_out(&mut self, fade_out_seconds: f32) {
        self.fade_out_seconds = fade_out_seconds;
        self.triggered_fade_out = true;
    }

    /// 立即开始淡出，只会提前结束时间，不会推迟
    pub fn start_fade_out(&mut self, fade_out_seconds: f32, user_time: f32) {
        let new_end_time = user_time + fade_out_seconds;
        self.triggered_fade_out = true;

        if self.end_time < 0.0 || new_end_time < self.end_time {
            self.end_time = new_end_time;
        }
    }

    pub fn set_state(&mut self, time: f32, weight: f32) {
        self.state_time = time;
        self.state_weight = weight;
    }

    /// 最近一次更新的时间
    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    /// 最近一次更新的淡入淡出权重
    pub fn state_weight(&self) -> f32 {
        self.state_weight
    }
}

/// 动作队列管理器
pub struct MotionQueueManager {
    user_time_seconds: f32,
    entries: Vec<MotionQueueEntry>,
    event_handler: Option<EventHandler>,
    next_handle: u64,
}

impl MotionQueueManager {
    pub fn new() -> Self {
        Self {
            user_time_seconds: 0.0,
            entries: Vec::new(),
            event_handler: None,
            next_handle: 1,
        }
    }

    /// 开始播放，已有条目开始淡出
    pub fn start_motion(&mut self, motion: Arc<dyn Playable>) -> MotionHandle {
        self.push_entry(motion, None)
    }

    /// 开始播放并注册结束回调
    pub fn start_motion_with_callback(&mut self, motion: Arc<dyn Playable>, on_finished: FinishedCallback) -> MotionHandle {
        self.push_entry(motion, Some(on_finished))
    }

    fn push_entry(&mut self, motion: Arc<dyn Playable>, on_finished: Option<FinishedCallback>) -> MotionHandle {
        for entry in &mut self.entries {
            let fade_out = entry.motion.fade_out_seconds();
            entry.set_fade_out(fade_out);
        }

        let handle = MotionHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(MotionQueueEntry::new(handle, motion, on_finished));
        handle
    }

    /// 推进时间并更新所有条目，返回是否有条目被更新
    pub fn update_motion(&mut self, store: &mut ParameterStore, delta_time: f32, config: &EngineConfig) -> bool {
        self.user_time_seconds += delta_time;
        let user_time = self.user_time_seconds;
        self.do_update_motion(store, user_time, config)
    }

    /// 在指定时刻更新所有条目
    pub fn do_update_motion(&mut self, store: &mut ParameterStore, user_time: f32, config: &EngineConfig) -> bool {
        let mut updated = false;
        let mut fired = Vec::new();

        for entry in &mut self.entries {
            let motion = Arc::clone(&entry.motion);
            let was_started = entry.started;
            let previous_start = entry.start_time;
            motion.update_parameters(store, entry, user_time, config);
            updated = true;

            if entry.started && !was_started {
                // 首帧包含开始时刻的事件
                fired.extend(motion.fired_events(f32::NEG_INFINITY, user_time - entry.start_time));
            } else if entry.started {
                // 窗口按更新前的开始时间计算，循环回绕时开始时间已被重置
                let before = entry.last_event_check_time - previous_start;
                fired.extend(motion.fired_events(before, user_time - previous_start));

                if entry.start_time != previous_start {
                    fired.extend(motion.fired_events(f32::NEG_INFINITY, user_time - entry.start_time));
                }
            }
            entry.last_event_check_time = user_time;
        }

        if let Some(handler) = self.event_handler.as_mut() {
            for value in &fired {
                handler(value);
            }
        }

        self.entries.retain_mut(|entry| {
            if entry.is_finished() {
                if config.debug_log {
                    log::debug!("[动作] 播放结束 handle={}", entry.handle.0);
                }
                return false;
            }

            if entry.is_triggered_fade_out() {
                let fade_out = entry.fade_out_seconds();
                entry.start_fade_out(fade_out, user_time);
            }
            true
        });

        updated
    }

    /// 所有条目是否都已结束
    pub fn is_finished(&self) -> bool {
        self.entries.iter().all(MotionQueueEntry::is_finished)
    }

    /// 指定播放是否已结束（已移出队列视为结束）
    pub fn is_handle_finished(&self, handle: MotionHandle) -> bool {
        self.entry(handle).map_or(true, MotionQueueEntry::is_finished)
    }

    pub fn entry(&self, handle: MotionHandle) -> Option<&MotionQueueEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }

    pub fn entry_mut(&mut self, handle: MotionHandle) -> Option<&mut MotionQueueEntry> {
        self.entries.iter_mut().find(|e| e.handle == handle)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 立即停止所有播放，不调用结束回调
    pub fn stop_all_motions(&mut self) {
        self.entries.clear();
    }

    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.event_handler = Some(handler);
    }

    pub fn user_time_seconds(&self) -> f32 {
        self.user_time_seconds
    }
}

impl Default for MotionQueueManager {
    fn default() -> Self {
        Self::new()
    }
}
