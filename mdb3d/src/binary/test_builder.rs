//! Writes synthetic `.mdb` files for tests.

#![allow(dead_code)]

use super::header::MODEL_HEADER_SIZE;
use super::node::{
    NODE_SKIN, NODE_SPEEDTREE, NODE_TEXTURE_PAINT, NODE_TRANSFORM, NODE_TRIMESH,
};
use crate::MDB_FILE_VERSION;

const POSITION: u32 = 8;
const ORIENTATION: u32 = 20;
const SCALE: u32 = 36;
const ALPHA: u32 = 132;

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_zeros(out: &mut Vec<u8>, n: usize) {
    out.resize(out.len() + n, 0);
}

fn push_fixed(out: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    assert!(bytes.len() < len, "{s:?} does not fit in {len} bytes");
    out.extend_from_slice(bytes);
    push_zeros(out, len - bytes.len());
}

fn push_def(out: &mut Vec<u8>, def: (u32, u32, u32)) {
    push_u32(out, def.0);
    push_u32(out, def.1);
    push_u32(out, def.2);
}

#[derive(Clone, Debug)]
pub(crate) struct ControllerSpec {
    pub(crate) kind: u32,
    pub(crate) columns: u8,
    pub(crate) times: Vec<f32>,
    pub(crate) values: Vec<f32>,
}

impl ControllerSpec {
    pub(crate) fn raw(kind: u32, columns: u8, times: Vec<f32>, values: Vec<f32>) -> Self {
        Self {
            kind,
            columns,
            times,
            values,
        }
    }

    pub(crate) fn position(v: [f32; 3]) -> Self {
        Self::raw(POSITION, 3, vec![0.0], v.to_vec())
    }

    pub(crate) fn orientation(xyzw: [f32; 4]) -> Self {
        Self::raw(ORIENTATION, 4, vec![0.0], xyzw.to_vec())
    }

    pub(crate) fn scale(s: f32) -> Self {
        Self::raw(SCALE, 1, vec![0.0], vec![s])
    }

    pub(crate) fn alpha(a: f32) -> Self {
        Self::raw(ALPHA, 1, vec![0.0], vec![a])
    }

    pub(crate) fn position_keys(keys: &[(f32, [f32; 3])]) -> Self {
        Self::raw(
            POSITION,
            3,
            keys.iter().map(|k| k.0).collect(),
            keys.iter().flat_map(|k| k.1).collect(),
        )
    }

    pub(crate) fn orientation_keys(keys: &[(f32, [f32; 4])]) -> Self {
        Self::raw(
            ORIENTATION,
            4,
            keys.iter().map(|k| k.0).collect(),
            keys.iter().flat_map(|k| k.1).collect(),
        )
    }

    pub(crate) fn scale_keys(keys: &[(f32, f32)]) -> Self {
        Self::raw(
            SCALE,
            1,
            keys.iter().map(|k| k.0).collect(),
            keys.iter().map(|k| k.1).collect(),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MeshSpec {
    pub(crate) positions: Vec<[f32; 3]>,
    pub(crate) normals: Vec<[f32; 3]>,
    pub(crate) uvs: Vec<[f32; 2]>,
    pub(crate) colors: Vec<[u8; 4]>,
    pub(crate) faces: Vec<[u16; 3]>,
    pub(crate) material_name: String,
    pub(crate) textures: [String; 4],
    pub(crate) texture_info: Option<String>,
    pub(crate) render: bool,
    /// Reserved-but-unused slots appended to every payload array's allocated count.
    pub(crate) extra_allocated: u32,
}

impl MeshSpec {
    pub(crate) fn triangle() -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            faces: vec![[0, 1, 2]],
            render: true,
            ..Self::default()
        }
    }

    pub(crate) fn texture(mut self, slot: usize, name: &str) -> Self {
        self.textures[slot] = name.to_string();
        self
    }

    pub(crate) fn material(mut self, name: &str) -> Self {
        self.material_name = name.to_string();
        self
    }

    pub(crate) fn inline_material(mut self, text: &str) -> Self {
        self.texture_info = Some(text.to_string());
        self
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SkinSpec {
    pub(crate) bone_names: Vec<String>,
    /// Per vertex `(bone-name slot, weight)`; padded with unused slots up to four.
    pub(crate) influences: Vec<Vec<(u16, f32)>>,
}

impl SkinSpec {
    pub(crate) fn new(bone_names: &[&str], influences: Vec<Vec<(u16, f32)>>) -> Self {
        Self {
            bone_names: bone_names.iter().map(|s| s.to_string()).collect(),
            influences,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct LayerSpec {
    pub(crate) texture: String,
    pub(crate) weights: Vec<f32>,
}

#[derive(Clone, Debug)]
pub(crate) enum Payload {
    None,
    Mesh(MeshSpec),
    Skin(MeshSpec, SkinSpec),
    TexturePaint(MeshSpec, Vec<LayerSpec>, u32),
    Speedtree(String, Vec<f32>),
}

#[derive(Clone, Debug)]
pub(crate) struct NodeSpec {
    pub(crate) name: String,
    pub(crate) kind: u32,
    pub(crate) controllers: Vec<ControllerSpec>,
    pub(crate) children: Vec<NodeSpec>,
    pub(crate) payload: Payload,
    /// Extra child entries pointing back at this node.
    pub(crate) self_references: usize,
    pub(crate) shared_references: usize,
}

impl NodeSpec {
    fn new(name: &str, kind: u32, payload: Payload) -> Self {
        Self {
            name: name.to_string(),
            kind,
            controllers: Vec::new(),
            children: Vec::new(),
            payload,
            self_references: 0,
            shared_references: 0,
        }
    }

    pub(crate) fn transform(name: &str) -> Self {
        Self::new(name, NODE_TRANSFORM, Payload::None)
    }

    pub(crate) fn mesh(name: &str, mesh: MeshSpec) -> Self {
        Self::new(name, NODE_TRIMESH, Payload::Mesh(mesh))
    }

    pub(crate) fn skin(name: &str, mesh: MeshSpec, skin: SkinSpec) -> Self {
        Self::new(name, NODE_SKIN, Payload::Skin(mesh, skin))
    }

    pub(crate) fn texture_paint(name: &str, mesh: MeshSpec, layers: Vec<LayerSpec>) -> Self {
        Self::new(name, NODE_TEXTURE_PAINT, Payload::TexturePaint(mesh, layers, 0))
    }

    pub(crate) fn speedtree(name: &str, tree: &str, parameters: Vec<f32>) -> Self {
        Self::new(
            name,
            NODE_SPEEDTREE,
            Payload::Speedtree(tree.to_string(), parameters),
        )
    }

    pub(crate) fn with_kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn controller(mut self, controller: ControllerSpec) -> Self {
        self.controllers.push(controller);
        self
    }

    pub(crate) fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Lists the first child's offset `count` more times in the children array.
    pub(crate) fn share_first_child(mut self, count: usize) -> Self {
        self.shared_references += count;
        self
    }

    pub(crate) fn self_reference(mut self) -> Self {
        self.self_references += 1;
        self
    }

    fn count(&self) -> u32 {
        1 + self.children.iter().map(NodeSpec::count).sum::<u32>()
    }
}

/// A chain `name0 -> name1 -> ...` of transform nodes, `depth` nodes long.
pub(crate) fn chain(depth: usize) -> NodeSpec {
    let mut node = NodeSpec::transform(&format!("n{}", depth - 1));
    for i in (0..depth - 1).rev() {
        node = NodeSpec::transform(&format!("n{i}")).child(node);
    }
    node
}

#[derive(Clone, Debug)]
pub(crate) struct ClipSpec {
    pub(crate) name: String,
    pub(crate) duration: f32,
    pub(crate) transition_time: f32,
    pub(crate) anim_root: String,
    pub(crate) root: NodeSpec,
    pub(crate) events: Vec<(f32, String)>,
}

impl ClipSpec {
    pub(crate) fn new(name: &str, duration: f32, root: NodeSpec) -> Self {
        Self {
            name: name.to_string(),
            duration,
            transition_time: 0.25,
            anim_root: root.name.clone(),
            root,
            events: Vec::new(),
        }
    }

    pub(crate) fn event(mut self, time: f32, name: &str) -> Self {
        self.events.push((time, name.to_string()));
        self
    }
}

pub(crate) struct MdbBuilder {
    name: String,
    version: u16,
    model_scale: f32,
    super_model: String,
    clips: Vec<ClipSpec>,
    model: Vec<u8>,
    raw: Vec<u8>,
    texture_info: Vec<u8>,
}

impl MdbBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: MDB_FILE_VERSION,
            model_scale: 1.0,
            super_model: String::new(),
            clips: Vec::new(),
            model: Vec::new(),
            raw: Vec::new(),
            texture_info: Vec::new(),
        }
    }

    pub(crate) fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn model_scale(mut self, scale: f32) -> Self {
        self.model_scale = scale;
        self
    }

    pub(crate) fn super_model(mut self, name: &str) -> Self {
        self.super_model = name.to_string();
        self
    }

    pub(crate) fn clip(mut self, clip: ClipSpec) -> Self {
        self.clips.push(clip);
        self
    }

    pub(crate) fn build(mut self, root: &NodeSpec) -> Vec<u8> {
        self.model = vec![0u8; MODEL_HEADER_SIZE];
        let root_offset = self.write_node(root);

        let clips = std::mem::take(&mut self.clips);
        let clip_offsets: Vec<u32> = clips.iter().map(|c| self.write_clip(c)).collect();
        let clips_offset = self.model.len() as u32;
        for offset in &clip_offsets {
            push_u32(&mut self.model, *offset);
        }

        let mut header = Vec::with_capacity(MODEL_HEADER_SIZE);
        push_zeros(&mut header, 8);
        push_fixed(&mut header, &self.name, 64);
        push_u32(&mut header, root_offset);
        push_u32(&mut header, root.count());
        push_zeros(&mut header, 28);
        header.extend_from_slice(&[1, 0, 0, 0]);
        let n = clip_offsets.len() as u32;
        push_def(&mut header, (clips_offset, n, n));
        push_zeros(&mut header, 4);
        push_f32(&mut header, 0.0);
        push_f32(&mut header, 100.0);
        push_zeros(&mut header, 16);
        push_fixed(&mut header, "", 64);
        push_zeros(&mut header, 4);
        push_f32(&mut header, self.model_scale);
        push_fixed(&mut header, &self.super_model, 64);
        push_zeros(&mut header, 16);
        assert_eq!(header.len(), MODEL_HEADER_SIZE);
        self.model[..MODEL_HEADER_SIZE].copy_from_slice(&header);

        let model_len = self.model.len() as u32;
        let raw_len = self.raw.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&[0, 0, 0, 0]);
        push_u16(&mut out, self.version);
        push_u16(&mut out, 0);
        push_u32(&mut out, model_len);
        push_u32(&mut out, 0);
        push_u32(&mut out, model_len);
        push_u32(&mut out, raw_len);
        push_u32(&mut out, model_len + raw_len);
        push_u32(&mut out, self.texture_info.len() as u32);
        assert_eq!(out.len(), 32);
        out.extend_from_slice(&self.model);
        out.extend_from_slice(&self.raw);
        out.extend_from_slice(&self.texture_info);
        out
    }

    fn raw_array(&mut self, bytes: &[u8], count: usize, extra: u32) -> (u32, u32, u32) {
        let offset = self.raw.len() as u32;
        self.raw.extend_from_slice(bytes);
        (offset, count as u32, count as u32 + extra)
    }

    fn write_controllers(
        &mut self,
        controllers: &[ControllerSpec],
    ) -> ((u32, u32, u32), (u32, u32, u32)) {
        let mut data = Vec::<f32>::new();
        let mut keys = Vec::new();
        for c in controllers {
            let time_index = data.len() as u16;
            data.extend_from_slice(&c.times);
            let data_index = data.len() as u16;
            data.extend_from_slice(&c.values);
            push_u32(&mut keys, c.kind);
            push_u16(&mut keys, 0);
            push_u16(&mut keys, c.times.len() as u16);
            push_u16(&mut keys, time_index);
            push_u16(&mut keys, data_index);
            keys.extend_from_slice(&[c.columns, 0, 0, 0]);
        }
        let data_offset = self.model.len() as u32;
        for v in &data {
            push_f32(&mut self.model, *v);
        }
        let keys_offset = self.model.len() as u32;
        self.model.extend_from_slice(&keys);
        let n = controllers.len() as u32;
        let d = data.len() as u32;
        ((keys_offset, n, n), (data_offset, d, d))
    }

    fn write_node(&mut self, node: &NodeSpec) -> u32 {
        let mut child_offsets: Vec<u32> =
            node.children.iter().map(|c| self.write_node(c)).collect();
        let (keys, data) = self.write_controllers(&node.controllers);

        if let Some(&first) = child_offsets.first() {
            child_offsets.extend(std::iter::repeat_n(first, node.shared_references));
        }
        let n = child_offsets.len() + node.self_references;
        let children_offset = self.model.len() as u32;
        let header_offset = children_offset + 4 * n as u32;
        for offset in &child_offsets {
            push_u32(&mut self.model, *offset);
        }
        for _ in 0..node.self_references {
            push_u32(&mut self.model, header_offset);
        }
        assert_eq!(self.model.len() as u32, header_offset);

        // Payload arrays go to the raw region first so the payload follows the header directly.
        let payload = self.payload_bytes(&node.payload);

        push_zeros(&mut self.model, 24);
        push_u32(&mut self.model, 0);
        push_u32(&mut self.model, 7);
        push_fixed(&mut self.model, &node.name, 64);
        push_zeros(&mut self.model, 8);
        push_def(&mut self.model, (children_offset, n as u32, n as u32));
        push_def(&mut self.model, keys);
        push_def(&mut self.model, data);
        push_zeros(&mut self.model, 20);
        push_u32(&mut self.model, node.kind);
        self.model.extend_from_slice(&payload);
        header_offset
    }

    fn payload_bytes(&mut self, payload: &Payload) -> Vec<u8> {
        match payload {
            Payload::None => Vec::new(),
            Payload::Mesh(mesh) => self.mesh_bytes(mesh),
            Payload::Skin(mesh, skin) => {
                let mut out = self.mesh_bytes(mesh);
                let mut names = Vec::new();
                for name in &skin.bone_names {
                    push_fixed(&mut names, name, 64);
                }
                let names_def = self.raw_array(&names, skin.bone_names.len(), 0);
                let mut influences = Vec::new();
                for vertex in &skin.influences {
                    let mut slots = [(0xFFFFu16, 0.0f32); 4];
                    for (i, influence) in vertex.iter().enumerate() {
                        slots[i] = *influence;
                    }
                    for (slot, _) in slots {
                        push_u16(&mut influences, slot);
                    }
                    for (_, weight) in slots {
                        push_f32(&mut influences, weight);
                    }
                }
                let influences_def = self.raw_array(&influences, skin.influences.len(), 0);
                push_def(&mut out, names_def);
                push_def(&mut out, influences_def);
                out
            }
            Payload::TexturePaint(mesh, layers, flags) => {
                let mut out = self.mesh_bytes(mesh);
                let mut records = Vec::new();
                for layer in layers {
                    let mut weights = Vec::new();
                    for w in &layer.weights {
                        push_f32(&mut weights, *w);
                    }
                    let weights_def = self.raw_array(&weights, layer.weights.len(), 0);
                    push_fixed(&mut records, &layer.texture, 64);
                    push_def(&mut records, weights_def);
                }
                let layers_def = self.raw_array(&records, layers.len(), 0);
                push_def(&mut out, layers_def);
                push_u32(&mut out, *flags);
                out
            }
            Payload::Speedtree(tree, parameters) => {
                let mut params = Vec::new();
                for p in parameters {
                    push_f32(&mut params, *p);
                }
                let params_def = self.raw_array(&params, parameters.len(), 0);
                let mut out = Vec::new();
                push_zeros(&mut out, 8);
                push_fixed(&mut out, tree, 64);
                push_def(&mut out, params_def);
                out
            }
        }
    }

    fn mesh_bytes(&mut self, mesh: &MeshSpec) -> Vec<u8> {
        let extra = mesh.extra_allocated;

        let mut faces = Vec::new();
        for face in &mesh.faces {
            push_f32(&mut faces, 0.0);
            push_f32(&mut faces, 0.0);
            push_f32(&mut faces, 1.0);
            push_f32(&mut faces, 0.0);
            push_u32(&mut faces, 0);
            for _ in 0..3 {
                faces.extend_from_slice(&(-1i16).to_le_bytes());
            }
            for index in face {
                push_u16(&mut faces, *index);
            }
        }
        let faces_def = self.raw_array(&faces, mesh.faces.len(), extra);

        let mut vertices = Vec::new();
        for p in mesh.positions.iter().flatten() {
            push_f32(&mut vertices, *p);
        }
        let vertices_def = self.raw_array(&vertices, mesh.positions.len(), extra);

        let mut normals = Vec::new();
        for n in mesh.normals.iter().flatten() {
            push_f32(&mut normals, *n);
        }
        let normals_def = self.raw_array(&normals, mesh.normals.len(), extra);

        let mut uvs = Vec::new();
        for uv in mesh.uvs.iter().flatten() {
            push_f32(&mut uvs, *uv);
        }
        let uvs_def = self.raw_array(&uvs, mesh.uvs.len(), extra);

        let colors: Vec<u8> = mesh.colors.iter().flatten().copied().collect();
        let colors_def = self.raw_array(&colors, mesh.colors.len(), extra);

        let (info_offset, info_size) = match &mesh.texture_info {
            Some(text) => {
                let offset = self.texture_info.len() as u32;
                self.texture_info.extend_from_slice(text.as_bytes());
                (offset, text.len() as u32)
            }
            None => (0, 0),
        };

        let mut out = Vec::with_capacity(512);
        push_zeros(&mut out, 8);
        push_def(&mut out, faces_def);
        for v in [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0] {
            push_f32(&mut out, v);
        }
        for v in [1.0, 0.0, 0.0, 0.0] {
            push_f32(&mut out, v);
        }
        for v in [0.8, 0.7, 0.6, 0.1, 0.1, 0.1, 0.0, 0.0, 0.0, 2.0] {
            push_f32(&mut out, v);
        }
        push_u32(&mut out, 1);
        push_u32(&mut out, 0);
        push_u32(&mut out, mesh.render as u32);
        push_u32(&mut out, 0);
        push_fixed(&mut out, &mesh.material_name, 64);
        for texture in &mesh.textures {
            push_fixed(&mut out, texture, 64);
        }
        push_u32(&mut out, info_offset);
        push_u32(&mut out, info_size);
        push_u32(&mut out, 0);
        out.extend_from_slice(&[0, 0, 0, 0]);
        push_def(&mut out, vertices_def);
        push_def(&mut out, normals_def);
        push_def(&mut out, uvs_def);
        push_def(&mut out, (0, 0, 0));
        push_def(&mut out, colors_def);
        assert_eq!(out.len(), 512);
        out
    }

    fn write_clip(&mut self, clip: &ClipSpec) -> u32 {
        let root_offset = self.write_node(&clip.root);
        let events_offset = self.model.len() as u32;
        for (time, name) in &clip.events {
            push_f32(&mut self.model, *time);
            push_fixed(&mut self.model, name, 32);
        }
        let n = clip.events.len() as u32;

        let header_offset = self.model.len() as u32;
        push_zeros(&mut self.model, 8);
        push_fixed(&mut self.model, &clip.name, 64);
        push_u32(&mut self.model, root_offset);
        push_u32(&mut self.model, clip.root.count());
        push_zeros(&mut self.model, 28);
        self.model.extend_from_slice(&[5, 0, 0, 0]);
        push_f32(&mut self.model, clip.duration);
        push_f32(&mut self.model, clip.transition_time);
        push_fixed(&mut self.model, &clip.anim_root, 64);
        push_def(&mut self.model, (events_offset, n, n));
        push_zeros(&mut self.model, 4);
        debug_assert_eq!(self.model.len() as u32 - header_offset, 200);
        header_offset
    }
}
