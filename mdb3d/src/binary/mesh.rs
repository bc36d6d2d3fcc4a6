//! Mesh, texture-paint and speedtree payloads.

use super::array::{ArrayElement, FixedString, read_array, read_descriptor};
use super::header::Regions;
use super::input::Region;
use super::ArrayDescriptor;
use crate::{
    ControllerSnapshot, Error, MaterialDescription, MaterialLibrary, MeshKind, MeshMaterial,
    MeshNode, PaintLayer, SpeedtreeProxy, TextureSlot,
};
use byteorder::{ByteOrder, LittleEndian};
use glam::{Mat4, Vec2, Vec3};

pub(crate) const MESH_PAYLOAD_SIZE: usize = 512;
const PAINT_EXTENSION_SIZE: usize = 16;
const SPEEDTREE_PAYLOAD_SIZE: usize = 84;

struct Face {
    indices: [u16; 3],
}

impl ArrayElement for Face {
    const STRIDE: usize = 32;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            indices: [
                LittleEndian::read_u16(&bytes[26..28]),
                LittleEndian::read_u16(&bytes[28..30]),
                LittleEndian::read_u16(&bytes[30..32]),
            ],
        }
    }
}

struct PaintLayerRecord {
    texture: String,
    weights: ArrayDescriptor,
}

impl ArrayElement for PaintLayerRecord {
    const STRIDE: usize = 76;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            texture: FixedString::<64>::decode(&bytes[..64]).0,
            weights: read_descriptor(&bytes[64..76]),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MeshPayload {
    faces: ArrayDescriptor,
    diffuse: Vec3,
    ambient: Vec3,
    specular: Vec3,
    shininess: f32,
    shadow: bool,
    render: bool,
    transparency_hint: u32,
    material_name: String,
    textures: [String; 4],
    texture_info_offset: u32,
    texture_info_size: u32,
    vertices: ArrayDescriptor,
    normals: ArrayDescriptor,
    uvs: ArrayDescriptor,
    lightmap_uvs: ArrayDescriptor,
    colors: ArrayDescriptor,
}

pub(crate) fn read_mesh_payload(model: &Region<'_>, offset: usize) -> Result<MeshPayload, Error> {
    model.slice(offset as u64, MESH_PAYLOAD_SIZE as u64, "mesh payload")?;
    let mut input = model.input_at(offset);
    input.skip(8);
    let faces = input.read_array_def()?;
    input.skip(40);
    let diffuse = input.read_vec3()?;
    let ambient = input.read_vec3()?;
    let specular = input.read_vec3()?;
    let shininess = input.read_f32()?;
    let shadow = input.read_u32()? != 0;
    let _beaming = input.read_u32()?;
    let render = input.read_u32()? != 0;
    let transparency_hint = input.read_u32()?;
    let material_name = input.read_fixed_string(64)?;
    let textures = [
        input.read_fixed_string(64)?,
        input.read_fixed_string(64)?,
        input.read_fixed_string(64)?,
        input.read_fixed_string(64)?,
    ];
    let texture_info_offset = input.read_u32()?;
    let texture_info_size = input.read_u32()?;
    input.skip(8);
    let vertices = input.read_array_def()?;
    let normals = input.read_array_def()?;
    let uvs = input.read_array_def()?;
    let lightmap_uvs = input.read_array_def()?;
    let colors = input.read_array_def()?;
    debug_assert_eq!(input.position(), offset + MESH_PAYLOAD_SIZE);

    Ok(MeshPayload {
        faces,
        diffuse,
        ambient,
        specular,
        shininess,
        shadow,
        render,
        transparency_hint,
        material_name,
        textures,
        texture_info_offset,
        texture_info_size,
        vertices,
        normals,
        uvs,
        lightmap_uvs,
        colors,
    })
}

/// Decodes geometry and appearance into a model-space [`MeshNode`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_mesh_node(
    regions: &Regions<'_>,
    payload: &MeshPayload,
    kind: MeshKind,
    name: &str,
    joint: usize,
    global: Mat4,
    snapshot: &ControllerSnapshot,
    materials: Option<&dyn MaterialLibrary>,
) -> Result<MeshNode, Error> {
    let raw = &regions.raw;
    let positions: Vec<Vec3> = read_array(raw, payload.vertices, "mesh vertices")?;
    let normals: Vec<Vec3> = read_array(raw, payload.normals, "mesh normals")?;
    let uvs: Vec<Vec2> = read_array(raw, payload.uvs, "mesh uvs")?;
    let lightmap_uvs: Vec<Vec2> = read_array(raw, payload.lightmap_uvs, "mesh lightmap uvs")?;
    let colors: Vec<[u8; 4]> = read_array(raw, payload.colors, "mesh vertex colors")?;
    let faces: Vec<Face> = read_array(raw, payload.faces, "mesh faces")?;

    let vertex_count = positions.len();
    for (what, len) in [
        ("normals", normals.len()),
        ("uvs", uvs.len()),
        ("lightmap uvs", lightmap_uvs.len()),
        ("vertex colors", colors.len()),
    ] {
        if len != 0 && len != vertex_count {
            return Err(Error::structure(format!(
                "mesh '{name}' has {len} {what} for {vertex_count} vertices"
            )));
        }
    }

    let mut indices = Vec::with_capacity(faces.len() * 3);
    for (i, face) in faces.iter().enumerate() {
        for index in face.indices {
            if usize::from(index) >= vertex_count {
                return Err(Error::structure(format!(
                    "face {i} of mesh '{name}' references vertex {index} of {vertex_count}"
                )));
            }
            indices.push(u32::from(index));
        }
    }

    let normal_matrix = if global.determinant().abs() > f32::EPSILON {
        global.inverse().transpose()
    } else {
        global
    };

    Ok(MeshNode {
        name: name.to_string(),
        kind,
        joint,
        transform: global,
        positions: positions.iter().map(|p| global.transform_point3(*p)).collect(),
        normals: normals
            .iter()
            .map(|n| normal_matrix.transform_vector3(*n).normalize_or_zero())
            .collect(),
        uvs,
        lightmap_uvs,
        colors,
        indices,
        material: resolve_material(regions, payload, name, materials)?,
        alpha: snapshot.alpha,
        self_illum: snapshot.self_illum,
        render: payload.render,
        shadow: payload.shadow,
        skin: None,
        paint_layers: Vec::new(),
    })
}

/// Inline material text first, then the library entry for the material name, then the raw
/// texture names.
fn resolve_material(
    regions: &Regions<'_>,
    payload: &MeshPayload,
    name: &str,
    materials: Option<&dyn MaterialLibrary>,
) -> Result<MeshMaterial, Error> {
    let mut material = MeshMaterial {
        shader: None,
        textures: Vec::new(),
        diffuse: payload.diffuse,
        ambient: payload.ambient,
        specular: payload.specular,
        shininess: payload.shininess,
        transparency_hint: payload.transparency_hint,
    };

    let description = inline_material(regions, payload, name, materials)?.or_else(|| {
        if payload.material_name.is_empty() {
            return None;
        }
        let found = materials.and_then(|library| library.lookup(&payload.material_name));
        if found.is_none() {
            log::debug!(
                "mesh '{name}': material '{}' not found",
                payload.material_name
            );
        }
        found
    });

    match description {
        Some(description) => {
            material.shader = description.shader.clone();
            material.textures = description
                .sorted_textures()
                .into_iter()
                .map(|(slot, path)| TextureSlot {
                    slot: slot.to_string(),
                    path: path.to_string(),
                })
                .collect();
        }
        None => {
            material.textures = payload
                .textures
                .iter()
                .enumerate()
                .filter(|(_, path)| !path.is_empty())
                .map(|(i, path)| TextureSlot {
                    slot: format!("texture{i}"),
                    path: path.clone(),
                })
                .collect();
        }
    }
    Ok(material)
}

fn inline_material(
    regions: &Regions<'_>,
    payload: &MeshPayload,
    name: &str,
    materials: Option<&dyn MaterialLibrary>,
) -> Result<Option<MaterialDescription>, Error> {
    if payload.texture_info_size == 0 {
        return Ok(None);
    }
    let bytes = regions.texture_info.slice(
        u64::from(payload.texture_info_offset),
        u64::from(payload.texture_info_size),
        "inline material",
    )?;
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_end_matches('\0');
    let parsed = match materials {
        Some(library) => library.parse_inline(text),
        None => MaterialDescription::parse(text),
    };
    match parsed {
        Ok(description) if description.has_material() => Ok(Some(description)),
        Ok(_) => Ok(None),
        Err(err) => {
            log::warn!("mesh '{name}': ignoring inline material: {err}");
            Ok(None)
        }
    }
}

/// Layers with no texture or a weight count other than `vertex_count` are dropped.
pub(crate) fn read_paint_layers(
    regions: &Regions<'_>,
    extension_offset: usize,
    vertex_count: usize,
    name: &str,
) -> Result<Vec<PaintLayer>, Error> {
    let ext = regions.model.slice(
        extension_offset as u64,
        PAINT_EXTENSION_SIZE as u64,
        "texture-paint extension",
    )?;
    let layers_def = read_descriptor(&ext[0..12]);
    let flags = LittleEndian::read_u32(&ext[12..16]);
    if flags != 0 {
        log::debug!("texture-paint '{name}': flags {flags:#x}");
    }

    let records: Vec<PaintLayerRecord> = read_array(&regions.raw, layers_def, "paint layers")?;
    let mut layers = Vec::with_capacity(records.len());
    for record in records {
        let weights: Vec<f32> = read_array(&regions.raw, record.weights, "paint layer weights")?;
        if record.texture.is_empty() || weights.len() != vertex_count {
            log::warn!(
                "texture-paint '{name}': dropping layer '{}' with {} weights for {vertex_count} vertices",
                record.texture,
                weights.len()
            );
            continue;
        }
        layers.push(PaintLayer {
            texture: record.texture,
            weights,
        });
    }
    Ok(layers)
}

pub(crate) fn read_speedtree(
    regions: &Regions<'_>,
    offset: usize,
    name: &str,
    joint: usize,
    global: Mat4,
) -> Result<SpeedtreeProxy, Error> {
    regions.model.slice(
        offset as u64,
        SPEEDTREE_PAYLOAD_SIZE as u64,
        "speedtree payload",
    )?;
    let mut input = regions.model.input_at(offset);
    input.skip(8);
    let tree = input.read_fixed_string(64)?;
    let parameters_def = input.read_array_def()?;
    let parameters = read_array(&regions.raw, parameters_def, "speedtree parameters")?;
    Ok(SpeedtreeProxy {
        name: name.to_string(),
        joint,
        tree,
        transform: global,
        parameters,
    })
}
