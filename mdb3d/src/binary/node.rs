//! Recursive node-tree walk (structure pass).

use super::array::read_array;
use super::controller::{ControllerMode, decode_controllers};
use super::header::Regions;
use super::input::Region;
use super::mesh::{
    MESH_PAYLOAD_SIZE, build_mesh_node, read_mesh_payload, read_paint_layers, read_speedtree,
};
use super::{ArrayDescriptor, LoadOptions};
use crate::{Error, MaterialLibrary, MeshKind, SkinnedMesh, SpeedtreeProxy};
use glam::Mat4;
use std::collections::HashSet;

pub(crate) const NODE_HEADER_SIZE: usize = 164;

pub(crate) const NODE_TRANSFORM: u32 = 0x001;
pub(crate) const NODE_LIGHT: u32 = 0x003;
pub(crate) const NODE_EMITTER: u32 = 0x005;
pub(crate) const NODE_CAMERA: u32 = 0x009;
pub(crate) const NODE_REFERENCE: u32 = 0x011;
pub(crate) const NODE_TRIMESH: u32 = 0x021;
pub(crate) const NODE_SKIN: u32 = 0x061;
pub(crate) const NODE_ANIMMESH: u32 = 0x0A1;
pub(crate) const NODE_DANGLYMESH: u32 = 0x121;
pub(crate) const NODE_AABB: u32 = 0x221;
pub(crate) const NODE_TEXTURE_PAINT: u32 = 0x821;
pub(crate) const NODE_SPEEDTREE: u32 = 0x1001;

/// The closed set of node behaviours the decoder dispatches on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Transform,
    Mesh,
    Skin,
    TexturePaint,
    SpeedtreeProxy,
}

impl NodeKind {
    /// Maps a raw kind tag. Tags without the header bit, or with any of the upper 16 bits
    /// set, cannot be a node at all; other unknown tags are walked as plain transforms.
    pub(crate) fn classify(tag: u32, node: &str) -> Result<Self, Error> {
        if tag & NODE_TRANSFORM == 0 || tag & 0xFFFF_0000 != 0 {
            return Err(Error::structure(format!(
                "node '{node}' has invalid kind tag {tag:#x}"
            )));
        }
        Ok(match tag {
            NODE_TRANSFORM => Self::Transform,
            NODE_LIGHT | NODE_EMITTER | NODE_CAMERA | NODE_REFERENCE => {
                log::debug!("node '{node}': kind {tag:#x} payload not decoded");
                Self::Transform
            }
            NODE_TRIMESH => Self::Mesh,
            NODE_ANIMMESH | NODE_DANGLYMESH | NODE_AABB => {
                log::debug!("node '{node}': kind {tag:#x} extension ignored, decoded as trimesh");
                Self::Mesh
            }
            NODE_SKIN => Self::Skin,
            NODE_TEXTURE_PAINT => Self::TexturePaint,
            NODE_SPEEDTREE => Self::SpeedtreeProxy,
            other => {
                log::warn!("node '{node}': unknown kind {other:#x}, treating it as a transform");
                Self::Transform
            }
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NodeHeader {
    pub(crate) name: String,
    pub(crate) children: ArrayDescriptor,
    pub(crate) controller_keys: ArrayDescriptor,
    pub(crate) controller_data: ArrayDescriptor,
    pub(crate) kind_tag: u32,
    /// Model-region offset of the kind payload.
    pub(crate) payload_offset: usize,
}

pub(crate) fn read_node_header(model: &Region<'_>, offset: u32) -> Result<NodeHeader, Error> {
    let offset = offset as usize;
    model.slice(offset as u64, NODE_HEADER_SIZE as u64, "node header")?;
    let mut input = model.input_at(offset);
    input.skip(32);
    let name = input.read_fixed_string(64)?;
    input.skip(8);
    let children = input.read_array_def()?;
    let controller_keys = input.read_array_def()?;
    let controller_data = input.read_array_def()?;
    input.skip(20);
    let kind_tag = input.read_u32()?;
    debug_assert_eq!(input.position(), offset + NODE_HEADER_SIZE);
    Ok(NodeHeader {
        name,
        children,
        controller_keys,
        controller_data,
        kind_tag,
        payload_offset: offset + NODE_HEADER_SIZE,
    })
}

pub(crate) fn read_children(model: &Region<'_>, header: &NodeHeader) -> Result<Vec<u32>, Error> {
    read_array(model, header.children, "child node offsets")
}

/// Recursion and fan-out bounds for one walk.
#[derive(Clone, Debug)]
pub(crate) struct WalkLimits {
    max_depth: usize,
    max_nodes: usize,
    visited: usize,
    seen: HashSet<u32>,
}

impl WalkLimits {
    pub(crate) fn new(options: &LoadOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            max_nodes: options.max_nodes,
            visited: 0,
            seen: HashSet::new(),
        }
    }

    pub(crate) fn enter(&mut self, depth: usize, offset: u32) -> Result<(), Error> {
        if depth >= self.max_depth {
            return Err(Error::structure(format!(
                "node at offset {offset} exceeds the maximum tree depth {}",
                self.max_depth
            )));
        }
        if !self.seen.insert(offset) {
            return Err(Error::structure(format!(
                "node at offset {offset} is reached more than once"
            )));
        }
        self.visited += 1;
        if self.visited > self.max_nodes {
            return Err(Error::structure(format!(
                "node tree has more than {} nodes",
                self.max_nodes
            )));
        }
        Ok(())
    }

    pub(crate) fn visited(&self) -> usize {
        self.visited
    }
}

/// A skin node whose bone references wait for the whole tree to be known.
#[derive(Clone, Debug)]
pub(crate) struct PendingSkinEntry {
    pub(crate) node: String,
    /// Model-region offset of the 24-byte skin extension.
    pub(crate) extension_offset: usize,
    pub(crate) global: Mat4,
    pub(crate) mesh_index: usize,
    pub(crate) vertex_count: usize,
}

pub(crate) struct WalkOutput {
    pub(crate) mesh: SkinnedMesh,
    pub(crate) speedtrees: Vec<SpeedtreeProxy>,
    pub(crate) pending_skins: Vec<PendingSkinEntry>,
    pub(crate) visited: usize,
}

/// Builds joints and meshes top-down from the structural node tree.
pub(crate) struct TreeWalker<'a, 'm> {
    regions: Regions<'a>,
    materials: Option<&'m dyn MaterialLibrary>,
    limits: WalkLimits,
    mesh: SkinnedMesh,
    speedtrees: Vec<SpeedtreeProxy>,
    pending_skins: Vec<PendingSkinEntry>,
}

impl<'a, 'm> TreeWalker<'a, 'm> {
    pub(crate) fn new(
        regions: Regions<'a>,
        options: &LoadOptions,
        materials: Option<&'m dyn MaterialLibrary>,
    ) -> Self {
        Self {
            regions,
            materials,
            limits: WalkLimits::new(options),
            mesh: SkinnedMesh::new(),
            speedtrees: Vec::new(),
            pending_skins: Vec::new(),
        }
    }

    pub(crate) fn walk(
        &mut self,
        offset: u32,
        parent: Option<usize>,
        parent_global: Mat4,
        depth: usize,
    ) -> Result<(), Error> {
        self.limits.enter(depth, offset)?;
        let model = self.regions.model;
        let header = read_node_header(&model, offset)?;
        let kind = NodeKind::classify(header.kind_tag, &header.name)?;
        log::trace!(
            "{:indent$}node '{}' @{offset} {kind:?}",
            "",
            header.name,
            indent = depth * 2
        );

        let controllers = decode_controllers(
            &model,
            header.controller_keys,
            header.controller_data,
            ControllerMode::Structure,
            &header.name,
        )?;
        let snapshot = controllers.snapshot;
        let local = snapshot.local_transform();
        let global = parent_global * local;
        let joint = self.mesh.add_joint(&header.name, parent, local, global);

        match kind {
            NodeKind::Transform => {}
            NodeKind::Mesh | NodeKind::Skin | NodeKind::TexturePaint => {
                let payload = read_mesh_payload(&model, header.payload_offset)?;
                let mesh_kind = match kind {
                    NodeKind::Skin => MeshKind::Skin,
                    NodeKind::TexturePaint => MeshKind::TexturePaint,
                    _ => MeshKind::Trimesh,
                };
                let mut node = build_mesh_node(
                    &self.regions,
                    &payload,
                    mesh_kind,
                    &header.name,
                    joint,
                    global,
                    &snapshot,
                    self.materials,
                )?;
                let extension_offset = header.payload_offset + MESH_PAYLOAD_SIZE;
                if kind == NodeKind::TexturePaint {
                    node.paint_layers = read_paint_layers(
                        &self.regions,
                        extension_offset,
                        node.positions.len(),
                        &header.name,
                    )?;
                }
                let vertex_count = node.positions.len();
                let mesh_index = self.mesh.add_mesh(node);
                if kind == NodeKind::Skin {
                    self.pending_skins.push(PendingSkinEntry {
                        node: header.name.clone(),
                        extension_offset,
                        global,
                        mesh_index,
                        vertex_count,
                    });
                }
            }
            NodeKind::SpeedtreeProxy => {
                let proxy = read_speedtree(
                    &self.regions,
                    header.payload_offset,
                    &header.name,
                    joint,
                    global,
                )?;
                self.speedtrees.push(proxy);
            }
        }

        for child in read_children(&model, &header)? {
            self.walk(child, Some(joint), global, depth + 1)?;
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> WalkOutput {
        WalkOutput {
            mesh: self.mesh,
            speedtrees: self.speedtrees,
            pending_skins: self.pending_skins,
            visited: self.limits.visited(),
        }
    }
}
