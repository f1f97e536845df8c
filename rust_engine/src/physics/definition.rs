//! 物理定义（physics3 结构）

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VectorDefinition {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsDefinition {
    pub meta: PhysicsMeta,
    #[serde(default)]
    pub physics_settings: Vec<PhysicsSettingDefinition>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsMeta {
    #[serde(default)]
    pub physics_setting_count: Option<usize>,
    #[serde(default)]
    pub total_input_count: Option<usize>,
    #[serde(default)]
    pub total_output_count: Option<usize>,
    #[serde(default)]
    pub vertex_count: Option<usize>,
    /// 缺省或不大于 0 时按调用方的帧间隔步进
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub effective_forces: EffectiveForcesDefinition,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EffectiveForcesDefinition {
    pub gravity: VectorDefinition,
    pub wind: VectorDefinition,
}

impl Default for EffectiveForcesDefinition {
    fn default() -> Self {
        Self {
            gravity: VectorDefinition { x: 0.0, y: -1.0 },
            wind: VectorDefinition::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsSettingDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub input: Vec<PhysicsInputDefinition>,
    #[serde(default)]
    pub output: Vec<PhysicsOutputDefinition>,
    #[serde(default)]
    pub vertices: Vec<PhysicsVertexDefinition>,
    pub normalization: NormalizationDefinition,
}

/// 参数引用（Target 目前只支持 "Parameter"）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterReferenceDefinition {
    pub target: String,
    pub id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsInputDefinition {
    pub source: ParameterReferenceDefinition,
    pub weight: f32,
    /// "X" / "Y" / "Angle"
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub reflect: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsOutputDefinition {
    pub destination: ParameterReferenceDefinition,
    pub vertex_index: usize,
    pub scale: f32,
    pub weight: f32,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub reflect: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicsVertexDefinition {
    pub position: VectorDefinition,
    pub mobility: f32,
    pub delay: f32,
    pub acceleration: f32,
    pub radius: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizationDefinition {
    pub position: NormalizationRangeDefinition,
    pub angle: NormalizationRangeDefinition,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizationRangeDefinition {
    pub minimum: f32,
    pub default: f32,
    pub maximum: f32,
}
