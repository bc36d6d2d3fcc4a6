//! Host-side mesh/skeleton object model the decoder builds into.

use crate::MeshNode;
use glam::Mat4;
use std::collections::HashMap;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    /// Rest-pose transform relative to the parent joint.
    pub local_matrix: Mat4,
    /// Rest-pose transform in model space.
    pub global_matrix: Mat4,
}

/// Name and parent link of one bone, as read back from a mesh.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoneInfo {
    pub name: String,
    pub parent: Option<usize>,
}

/// Read-back and override access to a mesh's bone list.
pub trait BoneHierarchy {
    fn bones(&self) -> Vec<BoneInfo>;

    fn bind_matrix(&self, index: usize) -> Option<Mat4>;

    fn set_bind_matrix(&mut self, index: usize, matrix: Mat4);

    fn set_parent(&mut self, index: usize, parent: Option<usize>);

    /// Called once after a batch of `set_*` calls.
    fn refresh(&mut self) {}
}

/// Joints and renderable meshes of one model. Joints are stored parents-first.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SkinnedMesh {
    pub joints: Vec<Joint>,
    pub meshes: Vec<MeshNode>,
}

impl SkinnedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a joint and returns its index. `global` is the parent's global matrix times
    /// `local`, which the caller already knows while walking top-down.
    pub fn add_joint(
        &mut self,
        name: &str,
        parent: Option<usize>,
        local: Mat4,
        global: Mat4,
    ) -> usize {
        self.joints.push(Joint {
            name: name.to_string(),
            parent,
            local_matrix: local,
            global_matrix: global,
        });
        self.joints.len() - 1
    }

    pub fn add_mesh(&mut self, mesh: MeshNode) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn joint_by_name(&self, name: &str) -> Option<(usize, &Joint)> {
        self.joints.iter().enumerate().find(|(_, j)| j.name == name)
    }

    /// Name to joint index. The first joint registered under a name wins.
    pub fn joint_index_map(&self) -> HashMap<String, usize> {
        let mut map = HashMap::with_capacity(self.joints.len());
        for (i, joint) in self.joints.iter().enumerate() {
            map.entry(joint.name.clone()).or_insert(i);
        }
        map
    }

    /// Recomputes every global matrix from the local ones.
    pub fn update_global_matrices(&mut self) {
        let mut resolved = vec![None::<Mat4>; self.joints.len()];
        for i in 0..self.joints.len() {
            let global = self.resolve_global(i, &mut resolved, 0);
            self.joints[i].global_matrix = global;
        }
    }

    fn resolve_global(&self, index: usize, resolved: &mut [Option<Mat4>], depth: usize) -> Mat4 {
        if let Some(m) = resolved[index] {
            return m;
        }
        let joint = &self.joints[index];
        let global = match joint.parent {
            // A parent link that loops back is treated as a root rather than recursing forever.
            Some(parent) if parent < self.joints.len() && depth < self.joints.len() => {
                self.resolve_global(parent, resolved, depth + 1) * joint.local_matrix
            }
            _ => joint.local_matrix,
        };
        resolved[index] = Some(global);
        global
    }
}

impl BoneHierarchy for SkinnedMesh {
    fn bones(&self) -> Vec<BoneInfo> {
        self.joints
            .iter()
            .map(|j| BoneInfo {
                name: j.name.clone(),
                parent: j.parent,
            })
            .collect()
    }

    fn bind_matrix(&self, index: usize) -> Option<Mat4> {
        self.joints.get(index).map(|j| j.local_matrix)
    }

    fn set_bind_matrix(&mut self, index: usize, matrix: Mat4) {
        if let Some(joint) = self.joints.get_mut(index) {
            joint.local_matrix = matrix;
        }
    }

    fn set_parent(&mut self, index: usize, parent: Option<usize>) {
        if let Some(joint) = self.joints.get_mut(index) {
            joint.parent = parent;
        }
    }

    fn refresh(&mut self) {
        self.update_global_matrices();
    }
}
