//! 参数定义

/// 模型参数
///
/// 写入值总是被限制在 `[minimum, maximum]`。
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub id: String,
    pub minimum: f32,
    pub maximum: f32,
    pub default: f32,
    value: f32,
}

impl Parameter {
    pub fn new(id: impl Into<String>, minimum: f32, maximum: f32, default: f32) -> Self {
        let (minimum, maximum) = if minimum <= maximum {
            (minimum, maximum)
        } else {
            (maximum, minimum)
        };

        Self {
            id: id.into(),
            minimum,
            maximum,
            default: default.clamp(minimum, maximum),
            value: default.clamp(minimum, maximum),
        }
    }

    /// 获取当前值
    pub fn value(&self) -> f32 {
        self.value
    }

    /// 设置值（自动限制范围）
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.minimum, self.maximum);
    }

    /// 重置为默认值
    pub fn reset(&mut self) {
        self.value = self.default;
    }
}
