//! Per-node controller streams: static pose fields or time-sampled curves.

use super::array::{ArrayElement, read_array};
use super::input::Region;
use super::ArrayDescriptor;
use crate::{AnimationCurveSet, ControllerSnapshot, Error};
use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec3};

const CONTROLLER_POSITION: u32 = 8;
const CONTROLLER_ORIENTATION: u32 = 20;
const CONTROLLER_SCALE: u32 = 36;
const CONTROLLER_SELF_ILLUM_COLOR: u32 = 100;
const CONTROLLER_ALPHA: u32 = 132;

/// Row counts that carry no samples.
const ROW_COUNT_NONE: u16 = 0xFFFF;

#[derive(Copy, Clone, Debug)]
pub(crate) struct ControllerKey {
    pub(crate) kind: u32,
    pub(crate) row_count: u16,
    pub(crate) time_index: u16,
    pub(crate) data_index: u16,
    pub(crate) column_count: u8,
}

impl ArrayElement for ControllerKey {
    const STRIDE: usize = 16;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            kind: LittleEndian::read_u32(&bytes[0..4]),
            row_count: LittleEndian::read_u16(&bytes[6..8]),
            time_index: LittleEndian::read_u16(&bytes[8..10]),
            data_index: LittleEndian::read_u16(&bytes[10..12]),
            column_count: bytes[12],
        }
    }
}

/// How multi-sample controllers are interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ControllerMode {
    /// Structural pass: the first row seeds the static pose; later rows and times are not read.
    Structure,
    /// Animation pass: every controller with at least one row yields a curve.
    Animation,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Semantic {
    Position,
    Orientation,
    Scale,
    SelfIllum,
    Alpha,
}

impl Semantic {
    fn from_kind(kind: u32) -> Option<Self> {
        match kind {
            CONTROLLER_POSITION => Some(Self::Position),
            CONTROLLER_ORIENTATION => Some(Self::Orientation),
            CONTROLLER_SCALE => Some(Self::Scale),
            CONTROLLER_SELF_ILLUM_COLOR => Some(Self::SelfIllum),
            CONTROLLER_ALPHA => Some(Self::Alpha),
            _ => None,
        }
    }

    fn accepts_columns(self, columns: u8) -> bool {
        match self {
            Self::Position => columns == 3,
            Self::Orientation => columns == 4,
            Self::Scale | Self::SelfIllum => columns == 1 || columns == 3,
            Self::Alpha => columns == 1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct NodeControllers {
    pub(crate) snapshot: ControllerSnapshot,
    pub(crate) curves: AnimationCurveSet,
}

/// Decodes every controller of a node. Keys and data live in the model region.
pub(crate) fn decode_controllers(
    model: &Region<'_>,
    keys: ArrayDescriptor,
    data: ArrayDescriptor,
    mode: ControllerMode,
    node: &str,
) -> Result<NodeControllers, Error> {
    let keys: Vec<ControllerKey> = read_array(model, keys, "controller keys")?;
    let mut out = NodeControllers::default();
    if keys.is_empty() {
        return Ok(out);
    }
    let data: Vec<f32> = read_array(model, data, "controller data")?;

    for key in keys {
        if key.row_count == 0 || key.row_count == ROW_COUNT_NONE {
            continue;
        }
        let Some(semantic) = Semantic::from_kind(key.kind) else {
            log::warn!(
                "node '{node}': skipping unknown controller type {} ({} rows)",
                key.kind,
                key.row_count
            );
            continue;
        };
        if !semantic.accepts_columns(key.column_count) {
            return Err(Error::structure(format!(
                "node '{node}': {semantic:?} controller with {} columns",
                key.column_count
            )));
        }

        let rows = usize::from(key.row_count);
        let columns = usize::from(key.column_count);
        let values = data_range(&data, usize::from(key.data_index), rows * columns, node)?;
        apply_static(&mut out.snapshot, semantic, &values[..columns], node);
        if mode == ControllerMode::Structure {
            continue;
        }

        let times = data_range(&data, usize::from(key.time_index), rows, node)?;
        if times.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::structure(format!(
                "node '{node}': {semantic:?} controller times decrease"
            )));
        }
        let rows_iter = times.iter().copied().zip(values.chunks_exact(columns));
        match semantic {
            Semantic::Position => {
                for (time, row) in rows_iter {
                    out.curves.position.push(time, Vec3::from_slice(row));
                }
            }
            Semantic::Orientation => {
                for (time, row) in rows_iter {
                    out.curves.rotation.push(time, quaternion(row, node));
                }
            }
            Semantic::Scale => {
                for (time, row) in rows_iter {
                    out.curves.scale.push(time, vector_or_uniform(row));
                }
            }
            Semantic::SelfIllum | Semantic::Alpha => {
                log::debug!(
                    "node '{node}': {semantic:?} has {rows} samples; keeping the first as static"
                );
            }
        }
    }

    Ok(out)
}

fn data_range<'d>(
    data: &'d [f32],
    start: usize,
    len: usize,
    node: &str,
) -> Result<&'d [f32], Error> {
    data.get(start..start + len)
        .ok_or_else(|| Error::TruncatedData {
            context: format!("controller data of node '{node}'"),
            region: crate::RegionKind::Model,
            start: (start * 4) as u64,
            end: ((start + len) * 4) as u64,
            size: (data.len() * 4) as u64,
        })
}

fn apply_static(snapshot: &mut ControllerSnapshot, semantic: Semantic, row: &[f32], node: &str) {
    match semantic {
        Semantic::Position => snapshot.position = Vec3::from_slice(row),
        Semantic::Orientation => snapshot.rotation = quaternion(row, node),
        Semantic::Scale => snapshot.scale = vector_or_uniform(row),
        Semantic::SelfIllum => snapshot.self_illum = vector_or_uniform(row),
        Semantic::Alpha => snapshot.alpha = row[0].clamp(0.0, 1.0),
    }
}

fn vector_or_uniform(row: &[f32]) -> Vec3 {
    if row.len() == 1 {
        Vec3::splat(row[0])
    } else {
        Vec3::from_slice(row)
    }
}

/// Stored as `x y z w`; normalized so the result is always a unit quaternion.
fn quaternion(row: &[f32], node: &str) -> Quat {
    let q = Quat::from_xyzw(row[0], row[1], row[2], row[3]);
    let len = q.length();
    if !len.is_finite() || len <= 1.0e-6 {
        log::warn!("node '{node}': degenerate orientation {row:?}, using identity");
        return Quat::IDENTITY;
    }
    q / len
}
