use super::ArrayDescriptor;
use crate::{Error, RegionKind};
use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;

/// A bounded view of one region of the input. Every read funnels through [`Region::slice`].
#[derive(Copy, Clone, Debug)]
pub(crate) struct Region<'a> {
    kind: RegionKind,
    bytes: &'a [u8],
}

impl<'a> Region<'a> {
    pub(crate) fn new(kind: RegionKind, bytes: &'a [u8]) -> Self {
        Self { kind, bytes }
    }

    pub(crate) fn slice(&self, offset: u64, len: u64, context: &str) -> Result<&'a [u8], Error> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.bytes.len() as u64 => {
                Ok(&self.bytes[offset as usize..end as usize])
            }
            _ => Err(Error::TruncatedData {
                context: context.to_string(),
                region: self.kind,
                start: offset,
                end: end.unwrap_or(u64::MAX),
                size: self.bytes.len() as u64,
            }),
        }
    }

    pub(crate) fn input_at(&self, offset: usize) -> BinaryInput<'a> {
        BinaryInput {
            region: *self,
            cursor: offset,
        }
    }
}

/// Little-endian cursor over a [`Region`]. Seeking anywhere is allowed; reads outside the
/// region fail with [`Error::TruncatedData`].
#[derive(Clone, Debug)]
pub(crate) struct BinaryInput<'a> {
    region: Region<'a>,
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    pub(crate) fn position(&self) -> usize {
        self.cursor
    }

    pub(crate) fn skip(&mut self, count: usize) {
        self.cursor = self.cursor.saturating_add(count);
    }

    fn take(&mut self, count: usize, what: &str) -> Result<&'a [u8], Error> {
        let bytes = self.region.slice(self.cursor as u64, count as u64, what)?;
        self.cursor += count;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1, "u8")?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4, "u32")?))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4, "f32")?))
    }

    pub(crate) fn read_vec3(&mut self) -> Result<Vec3, Error> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// NUL-padded string occupying exactly `len` bytes.
    pub(crate) fn read_fixed_string(&mut self, len: usize) -> Result<String, Error> {
        Ok(fixed_string(self.take(len, "fixed string")?))
    }

    pub(crate) fn read_array_def(&mut self) -> Result<ArrayDescriptor, Error> {
        Ok(ArrayDescriptor {
            first_element_offset: self.read_u32()?,
            used_count: self.read_u32()?,
            allocated_count: self.read_u32()?,
        })
    }
}

pub(crate) fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
