use std::path::{Path, PathBuf};

/// Turns a texture path referenced by a model into a loaded handle.
pub trait TextureLoader {
    type Handle;

    fn load(&mut self, path: &str) -> Option<Self::Handle>;
}

/// Texture names are usually stored without an extension.
const KNOWN_EXTENSIONS: [&str; 5] = ["dds", "tga", "png", "bmp", "jpg"];

/// Finds texture files below a root directory. The handle is the resolved file path.
#[derive(Clone, Debug)]
pub struct DirectoryTextureLoader {
    root: PathBuf,
}

impl DirectoryTextureLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find(&self, path: &str) -> Option<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        let direct = self.root.join(path);
        if direct.is_file() {
            return Some(direct);
        }
        KNOWN_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{path}.{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

impl TextureLoader for DirectoryTextureLoader {
    type Handle = PathBuf;

    fn load(&mut self, path: &str) -> Option<PathBuf> {
        let found = self.find(path);
        if found.is_none() {
            log::debug!("texture '{path}' not found under {}", self.root.display());
        }
        found
    }
}
