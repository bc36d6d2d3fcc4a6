//! Pure Rust decoder for packed binary `.mdb` skinned models (unofficial).
//!
//! The crate turns a model file into an engine-neutral [`Model`]: a joint hierarchy, model-space
//! meshes with optional skin bindings, and per-clip keyframe tracks keyed by node name.
//! [`Skeleton`] checks and overrides the bone hierarchy of a loaded mesh.
//!
//! Rendering and texture decoding are left to the host; materials and textures are reached
//! through the [`MaterialLibrary`] and [`TextureLoader`] traits.

#![forbid(unsafe_code)]

mod error;
mod material;
mod model;
mod scene;
mod skeleton;
mod texture;
mod version;

pub mod binary;

pub use binary::{
    ArrayDescriptor, ClipFailurePolicy, ClipTimeline, LoadOptions, MdbLoader, NegativeTimePolicy,
    NodeKind,
};
pub use error::*;
pub use material::*;
pub use model::*;
pub use scene::*;
pub use skeleton::*;
pub use texture::*;
pub use version::*;
