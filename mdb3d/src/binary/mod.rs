//! Decoder for packed binary `.mdb` models (file revision 133).
//!
//! A load runs in strict order: the file header is validated, the structural node tree is
//! walked once to build joints and meshes, queued skin nodes are bound against the finished
//! joint list, and finally each animation clip's node tree is walked on its own. Any failure
//! before the clip stage aborts the load; clip failures follow [`ClipFailurePolicy`].

mod animation;
mod array;
mod controller;
mod header;
mod input;
mod mesh;
mod node;
mod skin;

#[cfg(test)]
mod test_builder;


pub use array::ArrayDescriptor;
pub use node::NodeKind;

use crate::{Error, MaterialLibrary, Model, ModelInfo};
use glam::Mat4;
use std::collections::HashMap;
use std::io::Read;

/// How clip sample times are placed relative to each other.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ClipTimeline {
    /// Each clip starts where the previous one ends.
    #[default]
    Concatenated,
    /// Every clip starts at zero.
    Independent,
}

/// Treatment of sample times below zero.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum NegativeTimePolicy {
    #[default]
    Clamp,
    /// Wrapped into `[0, duration)`; clamped when the clip has no duration.
    Wrap,
    Keep,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ClipFailurePolicy {
    /// Log the failure, record it in [`Model::skipped_clips`] and continue.
    #[default]
    Skip,
    Abort,
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub load_animations: bool,
    pub clip_timeline: ClipTimeline,
    pub negative_time: NegativeTimePolicy,
    pub clip_failure: ClipFailurePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_nodes: 65_536,
            load_animations: true,
            clip_timeline: ClipTimeline::default(),
            negative_time: NegativeTimePolicy::default(),
            clip_failure: ClipFailurePolicy::default(),
        }
    }
}

impl LoadOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_animations(mut self, load_animations: bool) -> Self {
        self.load_animations = load_animations;
        self
    }

    pub fn with_clip_timeline(mut self, timeline: ClipTimeline) -> Self {
        self.clip_timeline = timeline;
        self
    }

    pub fn with_negative_time(mut self, policy: NegativeTimePolicy) -> Self {
        self.negative_time = policy;
        self
    }

    pub fn with_clip_failure(mut self, policy: ClipFailurePolicy) -> Self {
        self.clip_failure = policy;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_depth == 0 || self.max_nodes == 0 {
            return Err(Error::InvalidValue {
                message: format!(
                    "walk limits must be positive (max_depth {}, max_nodes {})",
                    self.max_depth, self.max_nodes
                ),
            });
        }
        Ok(())
    }
}

/// Loads models with fixed options and an optional material library.
#[derive(Clone, Default)]
pub struct MdbLoader<'m> {
    options: LoadOptions,
    materials: Option<&'m dyn MaterialLibrary>,
}

impl<'m> MdbLoader<'m> {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            materials: None,
        }
    }

    pub fn with_materials(mut self, materials: &'m dyn MaterialLibrary) -> Self {
        self.materials = Some(materials);
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn load(&self, bytes: &[u8]) -> Result<Model, Error> {
        self.options.validate()?;

        let file = header::read_file_header(bytes)?;
        let regions = header::Regions::new(bytes, &file.regions)?;
        let model_header = header::read_model_header(&regions.model)?;

        let mut walker = node::TreeWalker::new(regions, &self.options, self.materials);
        walker.walk(model_header.root_node_offset, None, Mat4::IDENTITY, 0)?;
        let node::WalkOutput {
            mut mesh,
            speedtrees,
            pending_skins,
            visited,
        } = walker.finish();
        if visited != model_header.node_count as usize {
            log::debug!(
                "model '{}': header declares {} nodes, walked {visited}",
                model_header.name,
                model_header.node_count
            );
        }

        skin::resolve_skins(&regions, pending_skins, &mut mesh)?;

        let clip_set = if self.options.load_animations {
            animation::load_clips(
                &regions,
                model_header.clips,
                &self.options,
                &mesh.joint_index_map(),
            )?
        } else {
            animation::ClipSet::default()
        };

        let mut clip_index = HashMap::with_capacity(clip_set.clips.len());
        for (i, clip) in clip_set.clips.iter().enumerate() {
            clip_index.entry(clip.name.clone()).or_insert(i);
        }

        log::debug!(
            "model '{}': {} joints, {} meshes, {} clips ({} skipped)",
            model_header.name,
            mesh.joints.len(),
            mesh.meshes.len(),
            clip_set.clips.len(),
            clip_set.skipped.len()
        );

        Ok(Model {
            info: ModelInfo {
                name: model_header.name,
                file_version: file.version,
                regions: file.regions,
                model_type: model_header.model_type,
                first_lod: model_header.first_lod,
                last_lod: model_header.last_lod,
                detail_map: model_header.detail_map,
                model_scale: model_header.model_scale,
                super_model: model_header.super_model,
            },
            mesh,
            speedtrees,
            clips: clip_set.clips,
            clip_index,
            skipped_clips: clip_set.skipped,
        })
    }
}

impl Model {
    pub fn from_mdb_bytes(bytes: &[u8]) -> Result<Self, Error> {
        MdbLoader::default().load(bytes)
    }

    pub fn from_mdb_bytes_with_options(bytes: &[u8], options: LoadOptions) -> Result<Self, Error> {
        MdbLoader::new(options).load(bytes)
    }

    /// Reads `reader` to the end, then decodes. The reader is not retained.
    pub fn from_mdb_reader<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        drop(reader);
        Self::from_mdb_bytes(&bytes)
    }
}
