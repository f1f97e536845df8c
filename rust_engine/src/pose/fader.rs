//! 姿势
//!
//! 每组部件互斥显示：由与部件同名的参数决定哪个部件可见，
//! 可见部件淡入，其余部件跟随其不透明度淡出。

use crate::model::{ParameterIndex, ParameterStore, PartIndex};
use crate::{CubismError, Result};

use super::definition::PoseDefinition;

const EPSILON: f32 = 0.001;
/// 默认淡入时间（秒）
pub const DEFAULT_FADE_IN_SECONDS: f32 = 0.5;
/// 淡出曲线的拐点
const PHI: f32 = 0.5;
/// 背后部件透出的上限
const BACK_OPACITY_THRESHOLD: f32 = 0.15;

/// 组内的一个部件
#[derive(Clone, Debug)]
pub struct PartData {
    pub part_id: String,
    /// 不透明度跟随本部件的部件
    pub links: Vec<PartData>,
    indices: Option<(ParameterIndex, PartIndex)>,
}

impl PartData {
    pub fn new(part_id: &str, links: &[String]) -> Self {
        Self {
            part_id: part_id.to_string(),
            links: links.iter().map(|id| PartData::new(id, &[])).collect(),
            indices: None,
        }
    }

    /// 驱动参数与部件的索引，首次调用时解析
    fn indices(&mut self, store: &mut ParameterStore) -> (ParameterIndex, PartIndex) {
        if let Some(indices) = self.indices {
            return indices;
        }
        let indices = (store.get_parameter_index(&self.part_id), store.get_part_index(&self.part_id));
        self.indices = Some(indices);
        indices
    }
}

#[derive(Clone, Debug)]
pub struct Pose {
    groups: Vec<Vec<PartData>>,
    fade_time_seconds: f32,
    initialized: bool,
}

impl Pose {
    pub fn new(groups: Vec<Vec<PartData>>, fade_time_seconds: f32) -> Self {
        Self {
            groups,
            fade_time_seconds: if fade_time_seconds < 0.0 {
                DEFAULT_FADE_IN_SECONDS
            } else {
                fade_time_seconds
            },
            initialized: false,
        }
    }

    /// 从 pose3 结构创建
    pub fn from_definition(definition: &PoseDefinition) -> Result<Self> {
        let mut groups = Vec::with_capacity(definition.groups.len());

        for group in &definition.groups {
            if group.is_empty() {
                log::warn!("[姿势] 忽略空的部件组");
                continue;
            }

            let mut parts = Vec::with_capacity(group.len());
            for part in group {
                if part.id.is_empty() {
                    return Err(CubismError::PoseParse("part without id".to_string()));
                }
                parts.push(PartData::new(&part.id, &part.link));
            }
            groups.push(parts);
        }

        Ok(Self::new(groups, definition.fade_in_time.unwrap_or(DEFAULT_FADE_IN_SECONDS)))
    }

    pub fn groups(&self) -> &[Vec<PartData>] {
        &self.groups
    }

    pub fn fade_time_seconds(&self) -> f32 {
        self.fade_time_seconds
    }

    /// 每组第一个部件完全显示，其余隐藏
    pub fn reset(&mut self, store: &mut ParameterStore) {
        for group in &mut self.groups {
            for (i, part) in group.iter_mut().enumerate() {
                let (parameter_index, part_index) = part.indices(store);
                let value = if i == 0 { 1.0 } else { 0.0 };

                store.set_parameter_value_by_index(parameter_index, value, 1.0);
                store.set_part_opacity_by_index(part_index, value);

                for link in &mut part.links {
                    link.indices(store);
                }
            }
        }
        self.initialized = true;
    }

    pub fn update_parameters(&mut self, store: &mut ParameterStore, delta_time: f32) {
        if !self.initialized {
            self.reset(store);
        }

        let delta_time = delta_time.max(0.0);
        let fade_time = self.fade_time_seconds;

        for group in &mut self.groups {
            do_fade(group, store, delta_time, fade_time);
        }

        self.copy_part_opacities(store);
    }

    /// 联动部件复制所属部件的最终不透明度
    fn copy_part_opacities(&mut self, store: &mut ParameterStore) {
        for part in self.groups.iter_mut().flatten() {
            if part.links.is_empty() {
                continue;
            }

            let (_, part_index) = part.indices(store);
            let opacity = store.get_part_opacity_by_index(part_index);

            for link in &mut part.links {
                let (_, link_index) = link.indices(store);
                store.set_part_opacity_by_index(link_index, opacity);
            }
        }
    }
}

fn do_fade(group: &mut [PartData], store: &mut ParameterStore, delta_time: f32, fade_time: f32) {
    let mut visible = None;
    let mut new_opacity = 1.0;

    for (i, part) in group.iter_mut().enumerate() {
        let (parameter_index, part_index) = part.indices(store);
        if store.get_parameter_value_by_index(parameter_index) > EPSILON {
            if visible.is_some() {
                break;
            }
            visible = Some(i);

            new_opacity = if fade_time <= 0.0 {
                1.0
            } else {
                store.get_part_opacity_by_index(part_index) + delta_time / fade_time
            };
            if new_opacity > 1.0 {
                new_opacity = 1.0;
            }
        }
    }

    let visible = match visible {
        Some(i) => i,
        None => {
            new_opacity = 1.0;
            0
        }
    };

    for (i, part) in group.iter_mut().enumerate() {
        let (_, part_index) = part.indices(store);

        if i == visible {
            store.set_part_opacity_by_index(part_index, new_opacity);
            continue;
        }

        let mut opacity = store.get_part_opacity_by_index(part_index);

        let mut a1 = if new_opacity < PHI {
            new_opacity * (PHI - 1.0) / PHI + 1.0
        } else {
            (1.0 - new_opacity) * PHI / (1.0 - PHI)
        };

        let back_opacity = (1.0 - a1) * (1.0 - new_opacity);
        if back_opacity > BACK_OPACITY_THRESHOLD {
            a1 = 1.0 - BACK_OPACITY_THRESHOLD / (1.0 - new_opacity);
        }

        if opacity > a1 {
            opacity = a1;
        }
        store.set_part_opacity_by_index(part_index, opacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Parameter, Part};
    use crate::pose::definition::PosePartDefinition;

    fn store() -> ParameterStore {
        ParameterStore::with_data(
            vec![
                Parameter::new("PartArmA", 0.0, 1.0, 0.0),
                Parameter::new("PartArmB", 0.0, 1.0, 0.0),
            ],
            vec![Part::new("PartArmA"), Part::new("PartArmB"), Part::new("PartSleeveA")],
        )
    }

    fn pose() -> Pose {
        Pose::new(
            vec![vec![
                PartData::new("PartArmA", &["PartSleeveA".to_string()]),
                PartData::new("PartArmB", &[]),
            ]],
            0.5,
        )
    }

    #[test]
    fn first_update_shows_first_member_only() {
        let mut store = store();
        let mut pose = pose();
        pose.update_parameters(&mut store, 0.0);

        assert_eq!(store.get_parameter_value_by_id("PartArmA"), 1.0);
        assert_eq!(store.get_parameter_value_by_id("PartArmB"), 0.0);
        assert_eq!(store.get_part_opacity_by_id("PartArmA"), 1.0);
        assert_eq!(store.get_part_opacity_by_id("PartArmB"), 0.0);
    }

    #[test]
    fn switching_fades_in_new_part_and_out_old_part_monotonically() {
        let mut store = store();
        let mut pose = pose();
        pose.update_parameters(&mut store, 0.0);

        store.set_parameter_value_by_id("PartArmA", 0.0, 1.0);
        store.set_parameter_value_by_id("PartArmB", 1.0, 1.0);

        let mut last_a = store.get_part_opacity_by_id("PartArmA");
        let mut last_b = store.get_part_opacity_by_id("PartArmB");
        for _ in 0..40 {
            pose.update_parameters(&mut store, 1.0 / 60.0);
            let a = store.get_part_opacity_by_id("PartArmA");
            let b = store.get_part_opacity_by_id("PartArmB");
            assert!(a <= last_a + 1e-6, "losing part grew: {last_a} -> {a}");
            assert!(b >= last_b - 1e-6);
            last_a = a;
            last_b = b;
        }

        assert_eq!(last_b, 1.0);
        assert_eq!(last_a, 0.0);
    }

    #[test]
    fn links_mirror_their_part() {
        let mut store = store();
        let mut pose = pose();
        pose.update_parameters(&mut store, 0.0);

        store.set_parameter_value_by_id("PartArmA", 0.0, 1.0);
        store.set_parameter_value_by_id("PartArmB", 1.0, 1.0);
        pose.update_parameters(&mut store, 0.1);

        assert_eq!(
            store.get_part_opacity_by_id("PartSleeveA"),
            store.get_part_opacity_by_id("PartArmA")
        );
    }

    #[test]
    fn no_visible_member_falls_back_to_first() {
        let mut store = store();
        let mut pose = pose();
        pose.update_parameters(&mut store, 0.0);

        store.set_parameter_value_by_id("PartArmA", 0.0, 1.0);
        pose.update_parameters(&mut store, 0.1);
        assert_eq!(store.get_part_opacity_by_id("PartArmA"), 1.0);
    }

    #[test]
    fn definition_skips_empty_groups() {
        let definition = PoseDefinition {
            fade_in_time: None,
            groups: vec![
                Vec::new(),
                vec![PosePartDefinition {
                    id: "PartArmA".into(),
                    link: Vec::new(),
                }],
            ],
        };
        let pose = Pose::from_definition(&definition).unwrap();
        assert_eq!(pose.groups().len(), 1);
        assert_eq!(pose.fade_time_seconds(), DEFAULT_FADE_IN_SECONDS);
    }
}
