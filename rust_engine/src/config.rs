//! 运行时配置
//!
//! 所有参数扁平化，由 `CubismModel` 持有并按引用传给各子系统。

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ========== 动作 ==========
    /// PartOpacity 曲线是否按同名参数写入，默认 true
    /// 为 false 时直接写入部件不透明度
    pub part_opacity_curves_as_parameters: bool,

    // ========== 物理 ==========
    /// 物理剩余时间上限（秒），默认 5.0
    pub max_physics_remain_seconds: f32,

    // ========== 口型 / 拖拽 ==========
    /// 口型值叠加权重，默认 0.8
    pub lip_sync_weight: f32,
    /// 拖拽对头部角度的缩放，默认 30.0
    pub drag_angle_scale: f32,
    /// 拖拽对身体角度的缩放，默认 10.0
    pub drag_body_angle_scale: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Pose 通过与部件同名的参数判断可见性，
            // 因此部件曲线默认走参数通道，保证动作能切换姿势
            part_opacity_curves_as_parameters: true,

            // 卡顿后最多追赶 5 秒的物理模拟
            max_physics_remain_seconds: 5.0,

            lip_sync_weight: 0.8,
            drag_angle_scale: 30.0,
            drag_body_angle_scale: 10.0,

            debug_log: false,
        }
    }
}
