//! 动作 / 表情定义（motion3 / exp3 结构）
//!
//! 只定义反序列化后的数据形状，具体格式由调用方选择。

use serde::{Deserialize, Serialize};

/// 动作定义
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotionDefinition {
    pub meta: MotionMeta,
    #[serde(default)]
    pub curves: Vec<CurveDefinition>,
    #[serde(default)]
    pub user_data: Vec<UserDataDefinition>,
}

/// 动作元信息
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotionMeta {
    pub duration: f32,
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default, rename = "Loop")]
    pub looping: bool,
    #[serde(default)]
    pub are_beziers_restricted: bool,
    #[serde(default)]
    pub curve_count: Option<usize>,
    #[serde(default)]
    pub total_segment_count: Option<usize>,
    #[serde(default)]
    pub total_point_count: Option<usize>,
    #[serde(default)]
    pub user_data_count: Option<usize>,
    #[serde(default)]
    pub fade_in_time: Option<f32>,
    #[serde(default)]
    pub fade_out_time: Option<f32>,
}

fn default_fps() -> f32 {
    30.0
}

/// 单条曲线
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurveDefinition {
    pub target: String,
    pub id: String,
    #[serde(default)]
    pub fade_in_time: Option<f32>,
    #[serde(default)]
    pub fade_out_time: Option<f32>,
    /// 扁平段数组：`t0, v0` 后接若干 `(段编码, 控制点...)`
    pub segments: Vec<f32>,
}

/// 用户事件
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDataDefinition {
    pub time: f32,
    pub value: String,
}

/// 表情定义
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionDefinition {
    #[serde(default)]
    pub fade_in_time: Option<f32>,
    #[serde(default)]
    pub fade_out_time: Option<f32>,
    #[serde(default)]
    pub parameters: Vec<ExpressionParameterDefinition>,
}

/// 表情参数
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionParameterDefinition {
    pub id: String,
    /// 缺省时 Multiply 为 1，其余为 0
    #[serde(default)]
    pub value: Option<f32>,
    /// "Add" / "Multiply" / "Overwrite"，缺省为 Add
    #[serde(default)]
    pub blend: Option<String>,
}
