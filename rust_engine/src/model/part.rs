//! 部件定义

/// 模型部件（只关心不透明度）
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub id: String,
    pub opacity: f32,
}

impl Part {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opacity: 1.0,
        }
    }
}
