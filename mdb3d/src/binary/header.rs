//! Fixed file header and model header.

use super::ArrayDescriptor;
use super::input::Region;
use crate::{Error, FileRegions, MDB_BINARY_MARKER, MDB_FILE_VERSION, RegionKind, RegionSpan};
use byteorder::{ByteOrder, LittleEndian};

pub(crate) const FILE_HEADER_SIZE: usize = 32;

/// Model data always starts right after the file header.
pub(crate) const MODEL_DATA_OFFSET: u64 = FILE_HEADER_SIZE as u64;

pub(crate) const MODEL_HEADER_SIZE: usize = 304;

#[derive(Clone, Debug)]
pub(crate) struct FileHeader {
    pub(crate) version: u16,
    pub(crate) regions: FileRegions,
}

/// Parses the 32-byte file header and checks every region against the file length.
pub(crate) fn read_file_header(bytes: &[u8]) -> Result<FileHeader, Error> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(Error::format(format!(
            "file is {} bytes, shorter than the {FILE_HEADER_SIZE}-byte header",
            bytes.len()
        )));
    }
    if bytes[0] != MDB_BINARY_MARKER {
        return Err(Error::format(format!(
            "first byte is {:#04x}; not a packed binary model",
            bytes[0]
        )));
    }
    let version = LittleEndian::read_u16(&bytes[4..6]);
    if version != MDB_FILE_VERSION {
        return Err(Error::format(format!(
            "file version {version} (only {MDB_FILE_VERSION} is supported)"
        )));
    }

    let field = |at: usize| u64::from(LittleEndian::read_u32(&bytes[at..at + 4]));
    let model_size = field(8);
    let raw_offset = field(16);
    let raw_size = field(20);
    let texture_offset = field(24);
    let texture_size = field(28);

    let regions = FileRegions {
        model: RegionSpan {
            offset: MODEL_DATA_OFFSET,
            size: model_size,
        },
        raw: RegionSpan {
            offset: MODEL_DATA_OFFSET + raw_offset,
            size: raw_size,
        },
        texture_info: RegionSpan {
            offset: MODEL_DATA_OFFSET + texture_offset,
            size: texture_size,
        },
    };

    let file_len = bytes.len() as u64;
    for (kind, span) in [
        (RegionKind::Model, regions.model),
        (RegionKind::Raw, regions.raw),
        (RegionKind::TextureInfo, regions.texture_info),
    ] {
        match span.end() {
            Some(end) if end <= file_len => {}
            _ => {
                return Err(Error::format(format!(
                    "{kind} region {}+{} runs past the end of the {file_len}-byte file",
                    span.offset, span.size
                )));
            }
        }
    }

    log::debug!(
        "mdb v{version}: model {}+{}, raw {}+{}, texture-info {}+{}",
        regions.model.offset,
        regions.model.size,
        regions.raw.offset,
        regions.raw.size,
        regions.texture_info.offset,
        regions.texture_info.size
    );

    Ok(FileHeader { version, regions })
}

/// Borrowed views of the three regions of a validated file.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Regions<'a> {
    pub(crate) model: Region<'a>,
    pub(crate) raw: Region<'a>,
    pub(crate) texture_info: Region<'a>,
}

impl<'a> Regions<'a> {
    pub(crate) fn new(bytes: &'a [u8], regions: &FileRegions) -> Result<Self, Error> {
        let view = |kind: RegionKind, span: RegionSpan| -> Result<Region<'a>, Error> {
            let file = Region::new(RegionKind::File, bytes);
            Ok(Region::new(
                kind,
                file.slice(span.offset, span.size, &format!("{kind} region"))?,
            ))
        };
        Ok(Self {
            model: view(RegionKind::Model, regions.model)?,
            raw: view(RegionKind::Raw, regions.raw)?,
            texture_info: view(RegionKind::TextureInfo, regions.texture_info)?,
        })
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ModelHeader {
    pub(crate) name: String,
    pub(crate) root_node_offset: u32,
    pub(crate) node_count: u32,
    pub(crate) model_type: u8,
    pub(crate) clips: ArrayDescriptor,
    pub(crate) first_lod: f32,
    pub(crate) last_lod: f32,
    pub(crate) detail_map: String,
    pub(crate) model_scale: f32,
    pub(crate) super_model: String,
}

pub(crate) fn read_model_header(model: &Region<'_>) -> Result<ModelHeader, Error> {
    model.slice(0, MODEL_HEADER_SIZE as u64, "model header")?;
    let mut input = model.input_at(0);

    input.skip(8);
    let name = input.read_fixed_string(64)?;
    let root_node_offset = input.read_u32()?;
    let node_count = input.read_u32()?;
    input.skip(28);
    let model_type = input.read_u8()?;
    input.skip(3);
    let clips = input.read_array_def()?;
    input.skip(4);
    let first_lod = input.read_f32()?;
    let last_lod = input.read_f32()?;
    input.skip(16);
    let detail_map = input.read_fixed_string(64)?;
    input.skip(4);
    let model_scale = input.read_f32()?;
    let super_model = input.read_fixed_string(64)?;

    Ok(ModelHeader {
        name,
        root_node_offset,
        node_count,
        model_type,
        clips,
        first_lod,
        last_lod,
        detail_map,
        model_scale,
        super_model,
    })
}
