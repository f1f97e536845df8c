//! 姿势定义（pose3 结构）

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoseDefinition {
    #[serde(default)]
    pub fade_in_time: Option<f32>,
    #[serde(default)]
    pub groups: Vec<Vec<PosePartDefinition>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PosePartDefinition {
    pub id: String,
    #[serde(default)]
    pub link: Vec<String>,
}
