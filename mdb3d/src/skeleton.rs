//! Flat bone hierarchy used to validate and override a loaded mesh's bind pose.

use crate::{BoneHierarchy, Error};
use glam::Mat4;

/// Whether [`Skeleton::apply_to_model`] also rewrites parent links.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ApplyParents {
    #[default]
    Keep,
    Overwrite,
}

/// `names`, `parent_id` and `bind_matrix` always have the same length, and every parent index
/// points at another bone without forming a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    names: Vec<String>,
    parent_id: Vec<Option<usize>>,
    bind_matrix: Vec<Mat4>,
}

impl Skeleton {
    pub fn new(
        names: Vec<String>,
        parent_id: Vec<Option<usize>>,
        bind_matrix: Vec<Mat4>,
    ) -> Result<Self, Error> {
        let n = names.len();
        if parent_id.len() != n || bind_matrix.len() != n {
            return Err(Error::InvalidValue {
                message: format!(
                    "skeleton arrays differ in length: names={n}, parents={}, matrices={}",
                    parent_id.len(),
                    bind_matrix.len()
                ),
            });
        }
        for (i, parent) in parent_id.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= n || p == i {
                    return Err(Error::InvalidValue {
                        message: format!("bone {i} ('{}') has invalid parent {p}", names[i]),
                    });
                }
            }
        }
        for start in 0..n {
            let mut current = parent_id[start];
            let mut steps = 0usize;
            while let Some(p) = current {
                steps += 1;
                if steps > n {
                    return Err(Error::InvalidValue {
                        message: format!(
                            "bone {start} ('{}') is part of a parent cycle",
                            names[start]
                        ),
                    });
                }
                current = parent_id[p];
            }
        }
        Ok(Self {
            names,
            parent_id,
            bind_matrix,
        })
    }

    /// Extracts the current bone list and bind pose of `model`.
    pub fn from_model<M: BoneHierarchy + ?Sized>(model: &M) -> Self {
        let bones = model.bones();
        let mut names = Vec::with_capacity(bones.len());
        let mut parent_id = Vec::with_capacity(bones.len());
        let mut bind_matrix = Vec::with_capacity(bones.len());
        for (i, bone) in bones.into_iter().enumerate() {
            names.push(bone.name);
            parent_id.push(bone.parent);
            bind_matrix.push(model.bind_matrix(i).unwrap_or(Mat4::IDENTITY));
        }
        Self {
            names,
            parent_id,
            bind_matrix,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn parent_id(&self) -> &[Option<usize>] {
        &self.parent_id
    }

    pub fn bind_matrix(&self) -> &[Mat4] {
        &self.bind_matrix
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Exact structural match: same bone count, and the same name and parent index at every
    /// position. Bind matrices are not compared.
    pub fn check_if_perfectly_corresponding<M: BoneHierarchy + ?Sized>(&self, model: &M) -> bool {
        let bones = model.bones();
        bones.len() == self.names.len()
            && bones
                .iter()
                .zip(self.names.iter().zip(&self.parent_id))
                .all(|(bone, (name, parent))| bone.name == *name && bone.parent == *parent)
    }

    /// Overwrites the bind matrices of `model` with this skeleton's.
    ///
    /// This does not re-validate: call [`Self::check_if_perfectly_corresponding`] first.
    /// Applying a skeleton that does not correspond corrupts the model's bind pose.
    pub fn apply_to_model<M: BoneHierarchy + ?Sized>(&self, model: &mut M, parents: ApplyParents) {
        for (i, matrix) in self.bind_matrix.iter().enumerate() {
            model.set_bind_matrix(i, *matrix);
            if parents == ApplyParents::Overwrite {
                model.set_parent(i, self.parent_id[i]);
            }
        }
        model.refresh();
    }
}

#[cfg(feature = "json")]
mod json {
    use super::Skeleton;
    use crate::Error;
    use glam::Mat4;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct SkeletonFile {
        bones: Vec<BoneEntry>,
    }

    #[derive(Serialize, Deserialize)]
    struct BoneEntry {
        name: String,
        #[serde(default)]
        parent: Option<usize>,
        /// Column-major.
        #[serde(default = "identity")]
        matrix: [f32; 16],
    }

    fn identity() -> [f32; 16] {
        Mat4::IDENTITY.to_cols_array()
    }

    impl Skeleton {
        pub fn from_json_str(input: &str) -> Result<Self, Error> {
            let file: SkeletonFile = serde_json::from_str(input).map_err(|e| Error::Json {
                message: e.to_string(),
            })?;
            let mut names = Vec::with_capacity(file.bones.len());
            let mut parents = Vec::with_capacity(file.bones.len());
            let mut matrices = Vec::with_capacity(file.bones.len());
            for bone in file.bones {
                names.push(bone.name);
                parents.push(bone.parent);
                matrices.push(Mat4::from_cols_array(&bone.matrix));
            }
            Self::new(names, parents, matrices)
        }

        pub fn to_json_string(&self) -> Result<String, Error> {
            let file = SkeletonFile {
                bones: self
                    .names
                    .iter()
                    .zip(&self.parent_id)
                    .zip(&self.bind_matrix)
                    .map(|((name, parent), matrix)| BoneEntry {
                        name: name.clone(),
                        parent: *parent,
                        matrix: matrix.to_cols_array(),
                    })
                    .collect(),
            };
            serde_json::to_string_pretty(&file).map_err(|e| Error::Json {
                message: e.to_string(),
            })
        }
    }
}
