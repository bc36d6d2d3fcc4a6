//! Supported `.mdb` format revision.

/// The only file revision this crate decodes.
pub const MDB_FILE_VERSION: u16 = 133;

/// First header byte of a packed binary model. ASCII models start with text instead.
pub const MDB_BINARY_MARKER: u8 = 0;
