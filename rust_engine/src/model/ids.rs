//! 标准参数 ID

pub const PARAM_ANGLE_X: &str = "ParamAngleX";
pub const PARAM_ANGLE_Y: &str = "ParamAngleY";
pub const PARAM_ANGLE_Z: &str = "ParamAngleZ";
pub const PARAM_BODY_ANGLE_X: &str = "ParamBodyAngleX";
pub const PARAM_EYE_BALL_X: &str = "ParamEyeBallX";
pub const PARAM_EYE_BALL_Y: &str = "ParamEyeBallY";
pub const PARAM_EYE_L_OPEN: &str = "ParamEyeLOpen";
pub const PARAM_EYE_R_OPEN: &str = "ParamEyeROpen";
pub const PARAM_MOUTH_OPEN_Y: &str = "ParamMouthOpenY";
pub const PARAM_BREATH: &str = "ParamBreath";

/// 动作中模型级曲线的 ID
pub const CURVE_EYE_BLINK: &str = "EyeBlink";
pub const CURVE_LIP_SYNC: &str = "LipSync";
pub const CURVE_OPACITY: &str = "Opacity";
