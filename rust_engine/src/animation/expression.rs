//! 表情
//!
//! 表情是一组常驻的参数偏移，与动作共用淡入淡出队列。

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::model::ParameterStore;
use crate::{CubismError, Result};

use super::definition::ExpressionDefinition;
use super::queue::{MotionHandle, MotionQueueEntry, MotionQueueManager, Playable};

/// 表情默认淡入淡出时间（秒）
pub const DEFAULT_EXPRESSION_FADE_SECONDS: f32 = 1.0;

/// 表情参数的混合方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpressionBlend {
    /// 叠加
    Add,
    /// 相乘
    Multiply,
    /// 覆盖
    Overwrite,
}

impl ExpressionBlend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Add" => Some(Self::Add),
            "Multiply" => Some(Self::Multiply),
            "Overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionParameter {
    pub id: String,
    pub blend: ExpressionBlend,
    pub value: f32,
}

/// 表情
#[derive(Clone, Debug)]
pub struct Expression {
    parameters: Vec<ExpressionParameter>,
    fade_in_seconds: f32,
    fade_out_seconds: f32,
    weight: f32,
}

impl Expression {
    pub fn new(parameters: Vec<ExpressionParameter>) -> Self {
        Self {
            parameters,
            fade_in_seconds: DEFAULT_EXPRESSION_FADE_SECONDS,
            fade_out_seconds: DEFAULT_EXPRESSION_FADE_SECONDS,
            weight: 1.0,
        }
    }

    /// 从 exp3 结构创建，未知混合方式按 Add 处理
    pub fn from_definition(definition: &ExpressionDefinition) -> Result<Self> {
        let mut parameters = Vec::with_capacity(definition.parameters.len());

        for parameter in &definition.parameters {
            if parameter.id.is_empty() {
                return Err(CubismError::ExpressionParse("parameter without id".to_string()));
            }

            let blend = match parameter.blend.as_deref() {
                None => ExpressionBlend::Add,
                Some(name) => ExpressionBlend::from_name(name).unwrap_or_else(|| {
                    log::warn!("[表情] 参数 '{}' 的混合方式 '{}' 无法识别，按 Add 处理", parameter.id, name);
                    ExpressionBlend::Add
                }),
            };

            let value = parameter.value.unwrap_or(match blend {
                ExpressionBlend::Multiply => 1.0,
                _ => 0.0,
            });

            if !value.is_finite() {
                return Err(CubismError::ExpressionParse(format!(
                    "parameter '{}' has non-finite value",
                    parameter.id
                )));
            }

            parameters.push(ExpressionParameter {
                id: parameter.id.clone(),
                blend,
                value,
            });
        }

        let mut expression = Self::new(parameters);
        expression.fade_in_seconds = definition.fade_in_time.unwrap_or(DEFAULT_EXPRESSION_FADE_SECONDS);
        expression.fade_out_seconds = definition.fade_out_time.unwrap_or(DEFAULT_EXPRESSION_FADE_SECONDS);
        Ok(expression)
    }

    pub fn parameters(&self) -> &[ExpressionParameter] {
        &self.parameters
    }

    pub fn set_fade_in_time(&mut self, seconds: f32) {
        self.fade_in_seconds = seconds;
    }

    pub fn set_fade_out_time(&mut self, seconds: f32) {
        self.fade_out_seconds = seconds;
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }
}

impl Playable for Expression {
    fn fade_in_seconds(&self) -> f32 {
        self.fade_in_seconds
    }

    fn fade_out_seconds(&self) -> f32 {
        self.fade_out_seconds
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn duration(&self) -> f32 {
        -1.0
    }

    fn do_update_parameters(
        &self,
        store: &mut ParameterStore,
        _entry: &mut MotionQueueEntry,
        _user_time: f32,
        fade_weight: f32,
        _config: &EngineConfig,
    ) {
        for parameter in &self.parameters {
            match parameter.blend {
                ExpressionBlend::Add => store.add_parameter_value_by_id(&parameter.id, parameter.value, fade_weight),
                ExpressionBlend::Multiply => {
                    store.multiply_parameter_value_by_id(&parameter.id, parameter.value, fade_weight)
                }
                ExpressionBlend::Overwrite => {
                    store.set_parameter_value_by_id(&parameter.id, parameter.value, fade_weight)
                }
            }
        }
    }
}

/// 表情管理器
///
/// 同一时刻只保留一个目标表情，切换时旧表情淡出。
#[derive(Default)]
pub struct ExpressionManager {
    queue: MotionQueueManager,
}

impl ExpressionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换到指定表情
    pub fn start_expression(&mut self, expression: Arc<Expression>) -> MotionHandle {
        self.queue.start_motion(expression)
    }

    /// 推进并写入表情参数，返回是否有表情被更新
    pub fn update(&mut self, store: &mut ParameterStore, delta_time: f32, config: &EngineConfig) -> bool {
        self.queue.update_motion(store, delta_time, config)
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn stop_all(&mut self) {
        self.queue.stop_all_motions();
    }

    pub fn queue(&self) -> &MotionQueueManager {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::definition::ExpressionParameterDefinition;
    use crate::model::Parameter;

    fn store() -> ParameterStore {
        ParameterStore::with_data(
            vec![
                Parameter::new("ParamAdd", -10.0, 10.0, 1.0),
                Parameter::new("ParamMul", -10.0, 10.0, 2.0),
                Parameter::new("ParamSet", -10.0, 10.0, 0.0),
            ],
            Vec::new(),
        )
    }

    fn expression() -> Expression {
        let mut expression = Expression::new(vec![
            ExpressionParameter {
                id: "ParamAdd".into(),
                blend: ExpressionBlend::Add,
                value: 2.0,
            },
            ExpressionParameter {
                id: "ParamMul".into(),
                blend: ExpressionBlend::Multiply,
                value: 3.0,
            },
            ExpressionParameter {
                id: "ParamSet".into(),
                blend: ExpressionBlend::Overwrite,
                value: 4.0,
            },
        ]);
        expression.set_fade_in_time(0.0);
        expression
    }

    #[test]
    fn blends_apply_at_full_weight() {
        let config = EngineConfig::default();
        let mut store = store();
        let mut manager = ExpressionManager::new();
        manager.start_expression(Arc::new(expression()));
        manager.update(&mut store, 0.1, &config);

        assert_eq!(store.get_parameter_value_by_id("ParamAdd"), 3.0);
        assert_eq!(store.get_parameter_value_by_id("ParamMul"), 6.0);
        assert_eq!(store.get_parameter_value_by_id("ParamSet"), 4.0);
    }

    #[test]
    fn expressions_never_finish_on_their_own() {
        let config = EngineConfig::default();
        let mut store = store();
        let mut manager = ExpressionManager::new();
        manager.start_expression(Arc::new(expression()));

        for _ in 0..100 {
            store.reset_parameters();
            manager.update(&mut store, 0.5, &config);
        }
        assert!(!manager.is_finished());
        assert_eq!(manager.queue().entry_count(), 1);
    }

    #[test]
    fn definition_defaults_and_unknown_blend() {
        let definition = ExpressionDefinition {
            fade_in_time: None,
            fade_out_time: Some(0.5),
            parameters: vec![
                ExpressionParameterDefinition {
                    id: "ParamMul".into(),
                    value: None,
                    blend: Some("Multiply".into()),
                },
                ExpressionParameterDefinition {
                    id: "ParamAdd".into(),
                    value: Some(1.0),
                    blend: Some("Screen".into()),
                },
            ],
        };

        let expression = Expression::from_definition(&definition).unwrap();
        assert_eq!(expression.fade_in_seconds(), DEFAULT_EXPRESSION_FADE_SECONDS);
        assert_eq!(expression.fade_out_seconds(), 0.5);
        assert_eq!(expression.parameters()[0].value, 1.0);
        assert_eq!(expression.parameters()[1].blend, ExpressionBlend::Add);
    }

    #[test]
    fn empty_id_is_rejected() {
        let definition = ExpressionDefinition {
            parameters: vec![ExpressionParameterDefinition::default()],
            ..Default::default()
        };
        assert!(matches!(
            Expression::from_definition(&definition),
            Err(CubismError::ExpressionParse(_))
        ));
    }
}
