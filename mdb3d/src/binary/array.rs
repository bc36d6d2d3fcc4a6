//! Offset-indirected typed arrays.

use super::input::{Region, fixed_string};
use crate::Error;
use byteorder::{ByteOrder, LittleEndian};
use glam::{Vec2, Vec3};

/// `(first element offset, used count, allocated count)` triple pointing into a region.
///
/// Only the first `used_count` elements are meaningful; the remaining allocated slots are
/// reserved capacity and are never read.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ArrayDescriptor {
    pub first_element_offset: u32,
    pub used_count: u32,
    pub allocated_count: u32,
}

impl ArrayDescriptor {
    pub fn is_empty(&self) -> bool {
        self.used_count == 0
    }
}

/// Fixed-stride element of an array.
pub(crate) trait ArrayElement: Sized {
    const STRIDE: usize;

    /// `bytes` is exactly `STRIDE` long.
    fn decode(bytes: &[u8]) -> Self;
}

/// Decodes the `used_count` elements of `def` from `region`.
pub(crate) fn decode_array<T>(
    region: &Region<'_>,
    def: ArrayDescriptor,
    stride: usize,
    context: &str,
    decode: impl FnMut(&[u8]) -> T,
) -> Result<Vec<T>, Error> {
    debug_assert!(stride > 0);
    if def.used_count > def.allocated_count {
        return Err(Error::structure(format!(
            "{context}: array uses {} of {} allocated elements",
            def.used_count, def.allocated_count
        )));
    }
    if def.used_count == 0 {
        return Ok(Vec::new());
    }
    let len = u64::from(def.used_count) * stride as u64;
    let bytes = region.slice(u64::from(def.first_element_offset), len, context)?;
    Ok(bytes.chunks_exact(stride).map(decode).collect())
}

pub(crate) fn read_array<T: ArrayElement>(
    region: &Region<'_>,
    def: ArrayDescriptor,
    context: &str,
) -> Result<Vec<T>, Error> {
    decode_array(region, def, T::STRIDE, context, T::decode)
}

impl ArrayElement for u32 {
    const STRIDE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }
}

impl ArrayElement for f32 {
    const STRIDE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }
}

impl ArrayElement for Vec2 {
    const STRIDE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        Vec2::new(
            LittleEndian::read_f32(&bytes[0..4]),
            LittleEndian::read_f32(&bytes[4..8]),
        )
    }
}

impl ArrayElement for Vec3 {
    const STRIDE: usize = 12;

    fn decode(bytes: &[u8]) -> Self {
        Vec3::new(
            LittleEndian::read_f32(&bytes[0..4]),
            LittleEndian::read_f32(&bytes[4..8]),
            LittleEndian::read_f32(&bytes[8..12]),
        )
    }
}

/// RGBA8 vertex color.
impl ArrayElement for [u8; 4] {
    const STRIDE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        [bytes[0], bytes[1], bytes[2], bytes[3]]
    }
}

/// NUL-padded string of exactly `N` bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct FixedString<const N: usize>(pub(crate) String);

impl<const N: usize> ArrayElement for FixedString<N> {
    const STRIDE: usize = N;

    fn decode(bytes: &[u8]) -> Self {
        FixedString(fixed_string(bytes))
    }
}

pub(crate) fn read_descriptor(bytes: &[u8]) -> ArrayDescriptor {
    ArrayDescriptor {
        first_element_offset: LittleEndian::read_u32(&bytes[0..4]),
        used_count: LittleEndian::read_u32(&bytes[4..8]),
        allocated_count: LittleEndian::read_u32(&bytes[8..12]),
    }
}
