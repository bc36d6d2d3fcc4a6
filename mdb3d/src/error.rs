use thiserror::Error;

use crate::RegionKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported or invalid model file: {message}")]
    Format { message: String },

    #[error(
        "truncated data for {context}: bytes {start}..{end} exceed the {region} region ({size} bytes)"
    )]
    TruncatedData {
        context: String,
        region: RegionKind,
        start: u64,
        end: u64,
        size: u64,
    },

    #[error("invalid model structure: {message}")]
    Structure { message: String },

    #[error("unknown bone '{bone}' referenced by skin '{skin}'")]
    MissingBone { skin: String, bone: String },

    #[error("vertex {vertex} of skin '{skin}' has no bone influence")]
    DegenerateBinding { skin: String, vertex: usize },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("failed to parse material (line {line}): {message}")]
    MaterialParse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "json")]
    #[error("failed to parse skeleton JSON: {message}")]
    Json { message: String },
}

impl Error {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }
}
