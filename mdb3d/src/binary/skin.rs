//! Second pass: binds queued skin nodes to joints once the whole tree is known.

use super::array::{ArrayElement, FixedString, read_array, read_descriptor};
use super::header::Regions;
use super::node::PendingSkinEntry;
use crate::{BoneWeight, Error, SkinBinding, SkinnedMesh};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

pub(crate) const SKIN_EXTENSION_SIZE: usize = 24;

pub(crate) const MAX_INFLUENCES: usize = 4;

const UNUSED_SLOT: u16 = 0xFFFF;

/// Weight sums closer to 1 than this are kept as stored.
const WEIGHT_SUM_TOLERANCE: f32 = 1.0e-5;

struct InfluenceRecord {
    slots: [u16; MAX_INFLUENCES],
    weights: [f32; MAX_INFLUENCES],
}

impl ArrayElement for InfluenceRecord {
    const STRIDE: usize = 24;

    fn decode(bytes: &[u8]) -> Self {
        let mut slots = [0u16; MAX_INFLUENCES];
        let mut weights = [0f32; MAX_INFLUENCES];
        for i in 0..MAX_INFLUENCES {
            slots[i] = LittleEndian::read_u16(&bytes[i * 2..i * 2 + 2]);
            weights[i] = LittleEndian::read_f32(&bytes[8 + i * 4..12 + i * 4]);
        }
        Self { slots, weights }
    }
}

/// Attaches a [`SkinBinding`] to every queued mesh. Fails on the first skin that cannot be
/// bound.
pub(crate) fn resolve_skins(
    regions: &Regions<'_>,
    pending: Vec<PendingSkinEntry>,
    mesh: &mut SkinnedMesh,
) -> Result<(), Error> {
    if pending.is_empty() {
        return Ok(());
    }
    let joints = mesh.joint_index_map();
    for entry in pending {
        let binding = bind_skin(regions, &entry, &joints)?;
        let Some(target) = mesh.meshes.get_mut(entry.mesh_index) else {
            return Err(Error::structure(format!(
                "skin '{}' lost its mesh slot {}",
                entry.node, entry.mesh_index
            )));
        };
        target.skin = Some(binding);
    }
    Ok(())
}

fn bind_skin(
    regions: &Regions<'_>,
    entry: &PendingSkinEntry,
    joints: &HashMap<String, usize>,
) -> Result<SkinBinding, Error> {
    let skin = entry.node.as_str();
    let ext = regions.model.slice(
        entry.extension_offset as u64,
        SKIN_EXTENSION_SIZE as u64,
        "skin extension",
    )?;
    let names: Vec<FixedString<64>> =
        read_array(&regions.raw, read_descriptor(&ext[0..12]), "skin bone names")?;
    let influences: Vec<InfluenceRecord> =
        read_array(&regions.raw, read_descriptor(&ext[12..24]), "skin influences")?;

    if influences.len() != entry.vertex_count {
        return Err(Error::structure(format!(
            "skin '{skin}' has {} influence records for {} vertices",
            influences.len(),
            entry.vertex_count
        )));
    }

    // Bone-name slot -> joint, resolved on first use.
    let mut slot_joints: Vec<Option<usize>> = vec![None; names.len()];
    let mut weights = Vec::with_capacity(influences.len());

    for (vertex, record) in influences.iter().enumerate() {
        let mut vertex_weights: Vec<BoneWeight> = Vec::with_capacity(MAX_INFLUENCES);
        for (&slot, &weight) in record.slots.iter().zip(&record.weights) {
            if slot == UNUSED_SLOT {
                continue;
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::structure(format!(
                    "skin '{skin}': vertex {vertex} has weight {weight}"
                )));
            }
            let slot = usize::from(slot);
            let Some(bone) = names.get(slot) else {
                return Err(Error::structure(format!(
                    "skin '{skin}': vertex {vertex} uses bone slot {slot} of {}",
                    names.len()
                )));
            };
            let joint = match slot_joints[slot] {
                Some(joint) => joint,
                None => {
                    let joint =
                        *joints
                            .get(bone.0.as_str())
                            .ok_or_else(|| Error::MissingBone {
                                skin: skin.to_string(),
                                bone: bone.0.clone(),
                            })?;
                    slot_joints[slot] = Some(joint);
                    joint
                }
            };
            if weight == 0.0 {
                continue;
            }
            match vertex_weights.iter_mut().find(|w| w.joint == joint) {
                Some(existing) => existing.weight += weight,
                None => vertex_weights.push(BoneWeight { joint, weight }),
            }
        }

        let sum: f32 = vertex_weights.iter().map(|w| w.weight).sum();
        if vertex_weights.is_empty() || sum <= 0.0 {
            return Err(Error::DegenerateBinding {
                skin: skin.to_string(),
                vertex,
            });
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            for w in &mut vertex_weights {
                w.weight /= sum;
            }
        }
        weights.push(vertex_weights);
    }

    log::debug!(
        "skin '{skin}': bound {} vertices to {} bone names",
        weights.len(),
        names.len()
    );
    Ok(SkinBinding {
        weights,
        bind_shape: entry.global,
    })
}
