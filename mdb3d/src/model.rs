use crate::SkinnedMesh;
use glam::{Mat4, Quat, Vec2, Vec3};
use std::collections::HashMap;
use std::fmt;

/// One of the byte ranges a packed model is split into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum RegionKind {
    /// The whole input, used for the fixed header.
    File,
    /// Structural data: model header, node tree, controllers, clip headers.
    Model,
    /// Raw payload data: geometry, weights and other bulk arrays.
    Raw,
    /// Texture-info data: inline material descriptions.
    TextureInfo,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Model => "model",
            Self::Raw => "raw",
            Self::TextureInfo => "texture-info",
        })
    }
}

/// Absolute byte range of a region inside the file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RegionSpan {
    pub offset: u64,
    pub size: u64,
}

impl RegionSpan {
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct FileRegions {
    pub model: RegionSpan,
    pub raw: RegionSpan,
    pub texture_info: RegionSpan,
}

/// Static pose and appearance of a node, decoded from its single-row controllers.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ControllerSnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Transparency in `[0, 1]`.
    pub alpha: f32,
    /// Self-illumination tint.
    pub self_illum: Vec3,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            alpha: 1.0,
            self_illum: Vec3::ZERO,
        }
    }
}

impl ControllerSnapshot {
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Time-sampled values. `times` and `values` always have the same length and `times` never
/// decreases.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Channel<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> Channel<T> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn push(&mut self, time: f32, value: T) {
        self.times.push(time);
        self.values.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (f32, &T)> {
        self.times.iter().copied().zip(self.values.iter())
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.times.windows(2).all(|w| w[0] <= w[1])
    }

    /// Stable reorder by time; samples sharing a time keep their relative order.
    pub(crate) fn sort_by_time(&mut self) {
        if self.is_sorted() {
            return;
        }
        let mut pairs: Vec<(f32, T)> = self.times.drain(..).zip(self.values.drain(..)).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (time, value) in pairs {
            self.push(time, value);
        }
    }

    pub(crate) fn append(&mut self, other: Channel<T>) {
        self.times.extend(other.times);
        self.values.extend(other.values);
        self.sort_by_time();
    }
}

/// Keyframe tracks of one node. Channels are independent and may have different lengths.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AnimationCurveSet {
    pub position: Channel<Vec3>,
    pub rotation: Channel<Quat>,
    pub scale: Channel<Vec3>,
}

impl AnimationCurveSet {
    pub fn is_empty(&self) -> bool {
        self.position.is_empty() && self.rotation.is_empty() && self.scale.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.position.len() + self.rotation.len() + self.scale.len()
    }

    pub(crate) fn merge(&mut self, other: AnimationCurveSet) {
        self.position.append(other.position);
        self.rotation.append(other.rotation);
        self.scale.append(other.scale);
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AnimationEvent {
    pub time: f32,
    pub name: String,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub transition_time: f32,
    /// Added to every sample time of this clip.
    pub time_offset: f32,
    /// Name of the node the clip is rooted at.
    pub anim_root: String,
    pub events: Vec<AnimationEvent>,
    /// Keyed by node (bone) name.
    pub tracks: HashMap<String, AnimationCurveSet>,
}

impl AnimationClip {
    pub fn track(&self, bone: &str) -> Option<&AnimationCurveSet> {
        self.tracks.get(bone)
    }
}

/// A clip dropped under [`crate::ClipFailurePolicy::Skip`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SkippedClip {
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct BoneWeight {
    pub joint: usize,
    pub weight: f32,
}

/// Resolved per-vertex bone influences of a skin node. Weights of every vertex sum to 1.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SkinBinding {
    pub weights: Vec<Vec<BoneWeight>>,
    /// Global transform of the skin node when it was bound.
    pub bind_shape: Mat4,
}

impl SkinBinding {
    /// Joints influencing at least one vertex, ascending.
    pub fn joints(&self) -> Vec<usize> {
        let mut joints: Vec<usize> = self.weights.iter().flatten().map(|w| w.joint).collect();
        joints.sort_unstable();
        joints.dedup();
        joints
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct TextureSlot {
    pub slot: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MeshMaterial {
    pub shader: Option<String>,
    pub textures: Vec<TextureSlot>,
    pub diffuse: Vec3,
    pub ambient: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub transparency_hint: u32,
}

impl Default for MeshMaterial {
    fn default() -> Self {
        Self {
            shader: None,
            textures: Vec::new(),
            diffuse: Vec3::ONE,
            ambient: Vec3::ZERO,
            specular: Vec3::ZERO,
            shininess: 0.0,
            transparency_hint: 0,
        }
    }
}

impl MeshMaterial {
    pub fn texture(&self, slot: &str) -> Option<&str> {
        self.textures
            .iter()
            .find(|t| t.slot == slot)
            .map(|t| t.path.as_str())
    }

    /// Resolves every texture slot through `loader`; unresolved slots are left out.
    pub fn resolve_textures<L: crate::TextureLoader>(
        &self,
        loader: &mut L,
    ) -> Vec<(String, L::Handle)> {
        self.textures
            .iter()
            .filter_map(|t| loader.load(&t.path).map(|h| (t.slot.clone(), h)))
            .collect()
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct PaintLayer {
    pub texture: String,
    pub weights: Vec<f32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum MeshKind {
    Trimesh,
    Skin,
    TexturePaint,
}

/// Renderable geometry, already transformed into model space.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MeshNode {
    pub name: String,
    pub kind: MeshKind,
    /// Joint the node was registered as.
    pub joint: usize,
    pub transform: Mat4,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub lightmap_uvs: Vec<Vec2>,
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u32>,
    pub material: MeshMaterial,
    pub alpha: f32,
    pub self_illum: Vec3,
    pub render: bool,
    pub shadow: bool,
    pub skin: Option<SkinBinding>,
    pub paint_layers: Vec<PaintLayer>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SpeedtreeProxy {
    pub name: String,
    pub joint: usize,
    pub tree: String,
    pub transform: Mat4,
    pub parameters: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ModelInfo {
    pub name: String,
    pub file_version: u16,
    pub regions: FileRegions,
    pub model_type: u8,
    pub first_lod: f32,
    pub last_lod: f32,
    pub detail_map: String,
    pub model_scale: f32,
    pub super_model: String,
}

/// A fully decoded model. Only ever produced by a load that succeeded end to end.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Model {
    pub info: ModelInfo,
    pub mesh: SkinnedMesh,
    pub speedtrees: Vec<SpeedtreeProxy>,
    pub clips: Vec<AnimationClip>,
    pub clip_index: HashMap<String, usize>,
    pub skipped_clips: Vec<SkippedClip>,
}

impl Model {
    pub fn meshes(&self) -> &[MeshNode] {
        &self.mesh.meshes
    }

    pub fn clip(&self, name: &str) -> Option<(usize, &AnimationClip)> {
        let index = *self.clip_index.get(name)?;
        self.clips.get(index).map(|c| (index, c))
    }

    /// Bone hierarchy of the loaded node tree.
    pub fn skeleton(&self) -> crate::Skeleton {
        crate::Skeleton::from_model(&self.mesh)
    }
}
