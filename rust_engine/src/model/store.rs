//! 参数存储
//!
//! 扁平的参数 / 部件表。按 ID 查询的结果被缓存为索引；
//! 模型中不存在的 ID 会分配到独立的占位表，读写都不会失败。

use std::collections::HashMap;

use super::{Parameter, Part};

/// 参数索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterIndex {
    /// 模型中真实存在的参数
    Existing(usize),
    /// 模型中不存在的 ID 对应的占位槽
    Missing(usize),
}

/// 部件索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartIndex {
    Existing(usize),
    Missing(usize),
}

/// 参数存储
#[derive(Debug, Clone)]
pub struct ParameterStore {
    parameters: Vec<Parameter>,
    name_to_index: HashMap<String, usize>,
    parts: Vec<Part>,
    part_name_to_index: HashMap<String, usize>,

    /// 不存在的参数 ID -> 占位槽
    missing_parameter_ids: HashMap<String, usize>,
    missing_parameter_values: Vec<f32>,
    /// 不存在的部件 ID -> 占位槽
    missing_part_ids: HashMap<String, usize>,
    missing_part_opacities: Vec<f32>,

    saved_parameters: Vec<f32>,
    model_opacity: f32,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            name_to_index: HashMap::new(),
            parts: Vec::new(),
            part_name_to_index: HashMap::new(),
            missing_parameter_ids: HashMap::new(),
            missing_parameter_values: Vec::new(),
            missing_part_ids: HashMap::new(),
            missing_part_opacities: Vec::new(),
            saved_parameters: Vec::new(),
            model_opacity: 1.0,
        }
    }

    /// 从参数和部件列表创建
    pub fn with_data(parameters: Vec<Parameter>, parts: Vec<Part>) -> Self {
        let mut store = Self::new();
        for parameter in parameters {
            store.add_parameter(parameter);
        }
        for part in parts {
            store.add_part(part);
        }
        store
    }

    /// 添加参数，ID 重复时替换原参数
    pub fn add_parameter(&mut self, parameter: Parameter) -> usize {
        if let Some(&index) = self.name_to_index.get(&parameter.id) {
            log::warn!("[参数] 重复的参数 ID '{}'，覆盖原定义", parameter.id);
            self.parameters[index] = parameter;
            return index;
        }

        let index = self.parameters.len();
        self.name_to_index.insert(parameter.id.clone(), index);
        self.parameters.push(parameter);
        index
    }

    /// 添加部件，ID 重复时替换原部件
    pub fn add_part(&mut self, part: Part) -> usize {
        if let Some(&index) = self.part_name_to_index.get(&part.id) {
            log::warn!("[参数] 重复的部件 ID '{}'，覆盖原定义", part.id);
            self.parts[index] = part;
            return index;
        }

        let index = self.parts.len();
        self.part_name_to_index.insert(part.id.clone(), index);
        self.parts.push(part);
        index
    }

    /// 获取参数数量
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// 获取部件数量
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// 全部真实参数
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// 全部真实部件
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// 按 ID 查找真实参数（不分配占位槽）
    pub fn find_parameter(&self, id: &str) -> Option<usize> {
        self.name_to_index.get(id).copied()
    }

    /// 按 ID 查找真实部件（不分配占位槽）
    pub fn find_part(&self, id: &str) -> Option<usize> {
        self.part_name_to_index.get(id).copied()
    }

    /// 获取参数索引，不存在时分配占位槽
    pub fn get_parameter_index(&mut self, id: &str) -> ParameterIndex {
        if let Some(&index) = self.name_to_index.get(id) {
            return ParameterIndex::Existing(index);
        }

        if let Some(&slot) = self.missing_parameter_ids.get(id) {
            return ParameterIndex::Missing(slot);
        }

        let slot = self.missing_parameter_values.len();
        self.missing_parameter_ids.insert(id.to_string(), slot);
        self.missing_parameter_values.push(0.0);
        ParameterIndex::Missing(slot)
    }

    /// 获取部件索引，不存在时分配占位槽
    pub fn get_part_index(&mut self, id: &str) -> PartIndex {
        if let Some(&index) = self.part_name_to_index.get(id) {
            return PartIndex::Existing(index);
        }

        if let Some(&slot) = self.missing_part_ids.get(id) {
            return PartIndex::Missing(slot);
        }

        let slot = self.missing_part_opacities.len();
        self.missing_part_ids.insert(id.to_string(), slot);
        self.missing_part_opacities.push(0.0);
        PartIndex::Missing(slot)
    }

    // ========== 参数值 ==========

    pub fn get_parameter_value_by_index(&self, index: ParameterIndex) -> f32 {
        match index {
            ParameterIndex::Existing(i) => self.parameters.get(i).map(Parameter::value).unwrap_or(0.0),
            ParameterIndex::Missing(slot) => self.missing_parameter_values.get(slot).copied().unwrap_or(0.0),
        }
    }

    pub fn get_parameter_value_by_id(&mut self, id: &str) -> f32 {
        let index = self.get_parameter_index(id);
        self.get_parameter_value_by_index(index)
    }

    /// 以权重写入参数：`weight == 1` 时直接覆盖，否则与当前值线性混合
    pub fn set_parameter_value_by_index(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        match index {
            ParameterIndex::Existing(i) => {
                if let Some(parameter) = self.parameters.get_mut(i) {
                    let value = if weight == 1.0 {
                        value
                    } else {
                        parameter.value() * (1.0 - weight) + value.clamp(parameter.minimum, parameter.maximum) * weight
                    };
                    parameter.set_value(value);
                }
            }
            ParameterIndex::Missing(slot) => {
                if let Some(current) = self.missing_parameter_values.get_mut(slot) {
                    *current = if weight == 1.0 {
                        value
                    } else {
                        *current * (1.0 - weight) + value * weight
                    };
                }
            }
        }
    }

    pub fn set_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) {
        let index = self.get_parameter_index(id);
        self.set_parameter_value_by_index(index, value, weight);
    }

    /// 叠加：`current + value * weight`
    pub fn add_parameter_value_by_index(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        let current = self.get_parameter_value_by_index(index);
        self.set_parameter_value_by_index(index, current + value * weight, 1.0);
    }

    pub fn add_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) {
        let index = self.get_parameter_index(id);
        self.add_parameter_value_by_index(index, value, weight);
    }

    /// 相乘：`current * (1 + (value - 1) * weight)`
    pub fn multiply_parameter_value_by_index(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        let current = self.get_parameter_value_by_index(index);
        self.set_parameter_value_by_index(index, current * (1.0 + (value - 1.0) * weight), 1.0);
    }

    pub fn multiply_parameter_value_by_id(&mut self, id: &str, value: f32, weight: f32) {
        let index = self.get_parameter_index(id);
        self.multiply_parameter_value_by_index(index, value, weight);
    }

    // ========== 部件不透明度 ==========

    pub fn get_part_opacity_by_index(&self, index: PartIndex) -> f32 {
        match index {
            PartIndex::Existing(i) => self.parts.get(i).map(|p| p.opacity).unwrap_or(0.0),
            PartIndex::Missing(slot) => self.missing_part_opacities.get(slot).copied().unwrap_or(0.0),
        }
    }

    pub fn get_part_opacity_by_id(&mut self, id: &str) -> f32 {
        let index = self.get_part_index(id);
        self.get_part_opacity_by_index(index)
    }

    pub fn set_part_opacity_by_index(&mut self, index: PartIndex, opacity: f32) {
        match index {
            PartIndex::Existing(i) => {
                if let Some(part) = self.parts.get_mut(i) {
                    part.opacity = opacity;
                }
            }
            PartIndex::Missing(slot) => {
                if let Some(current) = self.missing_part_opacities.get_mut(slot) {
                    *current = opacity;
                }
            }
        }
    }

    pub fn set_part_opacity_by_id(&mut self, id: &str, opacity: f32) {
        let index = self.get_part_index(id);
        self.set_part_opacity_by_index(index, opacity);
    }

    // ========== 模型整体 ==========

    /// 模型整体不透明度
    pub fn model_opacity(&self) -> f32 {
        self.model_opacity
    }

    pub fn set_model_opacity(&mut self, opacity: f32) {
        self.model_opacity = opacity;
    }

    /// 保存当前参数值
    pub fn save_parameters(&mut self) {
        self.saved_parameters.clear();
        self.saved_parameters
            .extend(self.parameters.iter().map(Parameter::value));
    }

    /// 恢复上次保存的参数值
    pub fn load_parameters(&mut self) {
        for (parameter, &value) in self.parameters.iter_mut().zip(&self.saved_parameters) {
            parameter.set_value(value);
        }
    }

    /// 所有参数恢复默认值
    pub fn reset_parameters(&mut self) {
        for parameter in &mut self.parameters {
            parameter.reset();
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParameterStore {
        ParameterStore::with_data(
            vec![
                Parameter::new("ParamA", -1.0, 1.0, 0.0),
                Parameter::new("ParamB", 0.0, 10.0, 2.0),
            ],
            vec![Part::new("PartArm")],
        )
    }

    #[test]
    fn writes_are_clamped_to_bounds() {
        let mut store = store();
        store.set_parameter_value_by_id("ParamA", 5.0, 1.0);
        assert_eq!(store.get_parameter_value_by_id("ParamA"), 1.0);

        store.add_parameter_value_by_id("ParamA", -10.0, 1.0);
        assert_eq!(store.get_parameter_value_by_id("ParamA"), -1.0);
    }

    #[test]
    fn duplicate_part_replaces_existing_entry() {
        let mut store = store();
        let mut part = Part::new("PartArm");
        part.opacity = 0.3;

        assert_eq!(store.add_part(part), 0);
        assert_eq!(store.part_count(), 1);
        assert!((store.get_part_opacity_by_id("PartArm") - 0.3).abs() < 1e-6);
    }

    #[test]
    fn weighted_set_blends_with_current_value() {
        let mut store = store();
        store.set_parameter_value_by_id("ParamB", 6.0, 0.5);
        assert!((store.get_parameter_value_by_id("ParamB") - 4.0).abs() < 1e-6);
    }

    #[test]
    fn multiply_scales_by_weight() {
        let mut store = store();
        store.multiply_parameter_value_by_id("ParamB", 3.0, 0.5);
        // 2 * (1 + 2 * 0.5)
        assert!((store.get_parameter_value_by_id("ParamB") - 4.0).abs() < 1e-6);
    }

    #[test]
    fn missing_ids_get_stable_slots() {
        let mut store = store();
        let first = store.get_parameter_index("ParamNope");
        let second = store.get_parameter_index("ParamNope");
        assert_eq!(first, second);
        assert!(matches!(first, ParameterIndex::Missing(_)));

        store.set_parameter_value_by_index(first, 42.0, 1.0);
        assert_eq!(store.get_parameter_value_by_index(second), 42.0);
        assert_eq!(store.parameter_count(), 2);
    }

    #[test]
    fn missing_parts_do_not_touch_real_parts() {
        let mut store = store();
        store.set_part_opacity_by_id("PartGhost", 0.3);
        assert_eq!(store.get_part_opacity_by_id("PartGhost"), 0.3);
        assert_eq!(store.get_part_opacity_by_id("PartArm"), 1.0);
    }

    #[test]
    fn save_and_load_restore_snapshot() {
        let mut store = store();
        store.save_parameters();
        store.set_parameter_value_by_id("ParamA", 0.7, 1.0);
        store.load_parameters();
        assert_eq!(store.get_parameter_value_by_id("ParamA"), 0.0);
    }
}
