//! Animation clips: one extra node-tree walk per clip, collecting keyed tracks per node name.

use super::array::{ArrayElement, FixedString, read_array};
use super::controller::{ControllerMode, decode_controllers};
use super::header::Regions;
use super::input::Region;
use super::node::{NodeKind, WalkLimits, read_children, read_node_header};
use super::{ArrayDescriptor, ClipFailurePolicy, ClipTimeline, LoadOptions, NegativeTimePolicy};
use crate::{AnimationClip, AnimationCurveSet, AnimationEvent, Error, SkippedClip};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

pub(crate) const CLIP_HEADER_SIZE: usize = 200;

#[derive(Clone, Debug)]
struct ClipHeader {
    name: String,
    root_node_offset: u32,
    duration: f32,
    transition_time: f32,
    anim_root: String,
    events: ArrayDescriptor,
}

struct EventRecord {
    time: f32,
    name: String,
}

impl ArrayElement for EventRecord {
    const STRIDE: usize = 36;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            time: LittleEndian::read_f32(&bytes[0..4]),
            name: FixedString::<32>::decode(&bytes[4..36]).0,
        }
    }
}

fn read_clip_header(model: &Region<'_>, offset: u32) -> Result<ClipHeader, Error> {
    let offset = offset as usize;
    model.slice(offset as u64, CLIP_HEADER_SIZE as u64, "animation clip header")?;
    let mut input = model.input_at(offset);
    input.skip(8);
    let name = input.read_fixed_string(64)?;
    let root_node_offset = input.read_u32()?;
    let _node_count = input.read_u32()?;
    input.skip(32);
    let duration = input.read_f32()?;
    let transition_time = input.read_f32()?;
    let anim_root = input.read_fixed_string(64)?;
    let events = input.read_array_def()?;
    Ok(ClipHeader {
        name,
        root_node_offset,
        duration,
        transition_time,
        anim_root,
        events,
    })
}

#[derive(Debug, Default)]
pub(crate) struct ClipSet {
    pub(crate) clips: Vec<AnimationClip>,
    pub(crate) skipped: Vec<SkippedClip>,
}

/// Loads every clip listed in `offsets`. `joints` is only used to report tracks that animate
/// nodes missing from the structural tree.
pub(crate) fn load_clips(
    regions: &Regions<'_>,
    offsets: ArrayDescriptor,
    options: &LoadOptions,
    joints: &HashMap<String, usize>,
) -> Result<ClipSet, Error> {
    let offsets: Vec<u32> = read_array(&regions.model, offsets, "animation clip offsets")?;
    let mut set = ClipSet::default();
    let mut time_offset = 0.0f32;

    for (index, &offset) in offsets.iter().enumerate() {
        let mut name = format!("clip #{index}");
        let mut duration = 0.0f32;
        let result = read_clip_header(&regions.model, offset).and_then(|header| {
            name = header.name.clone();
            duration = header.duration;
            load_clip(regions, header, time_offset, options, joints)
        });

        match result {
            Ok(clip) => {
                log::debug!(
                    "clip '{}': {} tracks, {} events, offset {}",
                    clip.name,
                    clip.tracks.len(),
                    clip.events.len(),
                    clip.time_offset
                );
                set.clips.push(clip);
            }
            Err(err) => match options.clip_failure {
                ClipFailurePolicy::Abort => return Err(err),
                ClipFailurePolicy::Skip => {
                    log::warn!("skipping animation clip '{name}': {err}");
                    set.skipped.push(SkippedClip {
                        name,
                        reason: err.to_string(),
                    });
                }
            },
        }

        if options.clip_timeline == ClipTimeline::Concatenated
            && duration.is_finite()
            && duration > 0.0
        {
            time_offset += duration;
        }
    }
    Ok(set)
}

fn load_clip(
    regions: &Regions<'_>,
    header: ClipHeader,
    time_offset: f32,
    options: &LoadOptions,
    joints: &HashMap<String, usize>,
) -> Result<AnimationClip, Error> {
    if !header.duration.is_finite() || header.duration < 0.0 {
        return Err(Error::structure(format!(
            "clip '{}' has duration {}",
            header.name, header.duration
        )));
    }
    let model = regions.model;
    let events: Vec<EventRecord> = read_array(&model, header.events, "animation events")?;

    let mut tracks: HashMap<String, AnimationCurveSet> = HashMap::new();
    let mut limits = WalkLimits::new(options);
    walk_clip_node(&model, header.root_node_offset, 0, &mut limits, &mut tracks)?;

    let timing = ClipTiming {
        offset: time_offset,
        duration: header.duration,
        negative: options.negative_time,
    };
    for (node, curves) in &mut tracks {
        if !joints.contains_key(node.as_str()) {
            log::debug!("clip '{}': track for '{node}' has no joint", header.name);
        }
        for t in curves.position.times.iter_mut() {
            *t = timing.apply(*t);
        }
        for t in curves.rotation.times.iter_mut() {
            *t = timing.apply(*t);
        }
        for t in curves.scale.times.iter_mut() {
            *t = timing.apply(*t);
        }
        curves.position.sort_by_time();
        curves.rotation.sort_by_time();
        curves.scale.sort_by_time();
    }

    let mut events: Vec<AnimationEvent> = events
        .into_iter()
        .map(|e| AnimationEvent {
            time: timing.apply(e.time),
            name: e.name,
        })
        .collect();
    events.sort_by(|a, b| a.time.total_cmp(&b.time));

    Ok(AnimationClip {
        name: header.name,
        duration: header.duration,
        transition_time: header.transition_time,
        time_offset,
        anim_root: header.anim_root,
        events,
        tracks,
    })
}

struct ClipTiming {
    offset: f32,
    duration: f32,
    negative: NegativeTimePolicy,
}

impl ClipTiming {
    /// Applies the negative-time policy to a clip-local time, then shifts it by the offset.
    fn apply(&self, t: f32) -> f32 {
        let local = if t >= 0.0 {
            t
        } else {
            match self.negative {
                NegativeTimePolicy::Clamp => 0.0,
                NegativeTimePolicy::Wrap if self.duration > 0.0 => t.rem_euclid(self.duration),
                NegativeTimePolicy::Wrap => 0.0,
                NegativeTimePolicy::Keep => t,
            }
        };
        local + self.offset
    }
}

/// Every controller with at least one row becomes a track; node payloads are not decoded.
fn walk_clip_node(
    model: &Region<'_>,
    offset: u32,
    depth: usize,
    limits: &mut WalkLimits,
    tracks: &mut HashMap<String, AnimationCurveSet>,
) -> Result<(), Error> {
    limits.enter(depth, offset)?;
    let header = read_node_header(model, offset)?;
    NodeKind::classify(header.kind_tag, &header.name)?;
    let controllers = decode_controllers(
        model,
        header.controller_keys,
        header.controller_data,
        ControllerMode::Animation,
        &header.name,
    )?;
    if !controllers.curves.is_empty() {
        tracks
            .entry(header.name.clone())
            .or_default()
            .merge(controllers.curves);
    }
    for child in read_children(model, &header)? {
        walk_clip_node(model, child, depth + 1, limits, tracks)?;
    }
    Ok(())
}
