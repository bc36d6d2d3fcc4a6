//! Material descriptions: the lookup interface the decoder calls, plus a parser for the
//! line-oriented key-value text the descriptions are stored as.

use crate::Error;
use glam::Vec4;
use std::collections::HashMap;
use std::str::FromStr;

/// Shader name plus named texture slots, as referenced by a mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialDescription {
    pub shader: Option<String>,
    pub textures: HashMap<String, String>,
    pub bumpmaps: HashMap<String, String>,
    pub strings: HashMap<String, String>,
    pub vectors: HashMap<String, Vec4>,
    pub floats: HashMap<String, f32>,
}

impl MaterialDescription {
    pub fn parse(input: &str) -> Result<Self, Error> {
        parse_material(input)
    }

    pub fn has_material(&self) -> bool {
        self.shader.is_some() || !self.textures.is_empty()
    }

    pub fn texture(&self, slot: &str) -> Option<&str> {
        self.textures.get(slot).map(String::as_str)
    }

    /// Texture slots sorted by slot name.
    pub fn sorted_textures(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .textures
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        out.sort_unstable();
        out
    }
}

impl FromStr for MaterialDescription {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_material(s)
    }
}

/// Resolves material identifiers referenced by meshes.
pub trait MaterialLibrary {
    fn lookup(&self, id: &str) -> Option<MaterialDescription>;

    /// Interprets a description stored inline in the model's texture-info region.
    fn parse_inline(&self, text: &str) -> Result<MaterialDescription, Error> {
        parse_material(text)
    }
}

/// In-memory [`MaterialLibrary`] keyed by material identifier (case-insensitive).
#[derive(Clone, Debug, Default)]
pub struct MaterialCatalog {
    materials: HashMap<String, MaterialDescription>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, material: MaterialDescription) {
        self.materials.insert(id.to_ascii_lowercase(), material);
    }

    pub fn insert_text(&mut self, id: &str, text: &str) -> Result<(), Error> {
        let material = parse_material(text)?;
        self.insert(id, material);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl MaterialLibrary for MaterialCatalog {
    fn lookup(&self, id: &str) -> Option<MaterialDescription> {
        self.materials.get(&id.to_ascii_lowercase()).cloned()
    }
}

fn parse_material(input: &str) -> Result<MaterialDescription, Error> {
    let mut material = MaterialDescription::default();

    for (index, raw_line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let keyword = keyword.to_ascii_lowercase();

        match keyword.as_str() {
            "shader" => {
                let name = parts.next().ok_or_else(|| Error::MaterialParse {
                    line: line_no,
                    message: "shader without a name".to_string(),
                })?;
                material.shader = Some(name.to_string());
            }
            "texture" | "bumpmap" | "string" => {
                let (key, value) = key_and_rest(line, &keyword).ok_or_else(|| {
                    Error::MaterialParse {
                        line: line_no,
                        message: format!("{keyword} needs a key and a value"),
                    }
                })?;
                let target = match keyword.as_str() {
                    "texture" => &mut material.textures,
                    "bumpmap" => &mut material.bumpmaps,
                    _ => &mut material.strings,
                };
                target.insert(key.to_string(), value.to_string());
            }
            "float" => {
                let key = parts.next();
                let value = parts.next();
                let (Some(key), Some(value)) = (key, value) else {
                    return Err(Error::MaterialParse {
                        line: line_no,
                        message: "float needs a key and a value".to_string(),
                    });
                };
                material
                    .floats
                    .insert(key.to_string(), parse_f32(value, line_no)?);
            }
            "vector" => {
                let key = parts.next().ok_or_else(|| Error::MaterialParse {
                    line: line_no,
                    message: "vector without a key".to_string(),
                })?;
                let values = parts
                    .map(|v| parse_f32(v, line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if !(3..=4).contains(&values.len()) {
                    return Err(Error::MaterialParse {
                        line: line_no,
                        message: format!("vector '{key}' has {} components", values.len()),
                    });
                }
                let w = values.get(3).copied().unwrap_or(1.0);
                material
                    .vectors
                    .insert(key.to_string(), Vec4::new(values[0], values[1], values[2], w));
            }
            other => {
                log::debug!("material line {line_no}: skipping unknown keyword '{other}'");
            }
        }
    }

    Ok(material)
}

/// `#` and `//` open a comment only at the start of a token.
fn strip_comment(line: &str) -> &str {
    let mut token_start = true;
    for (i, c) in line.char_indices() {
        if token_start && (c == '#' || line[i..].starts_with("//")) {
            return &line[..i];
        }
        token_start = c.is_whitespace();
    }
    line
}

/// Splits `<keyword> <key> <value...>`; the value keeps inner spaces.
fn key_and_rest<'a>(line: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let rest = line.get(keyword.len()..)?.trim_start();
    let (key, value) = rest.split_once(char::is_whitespace)?;
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn parse_f32(value: &str, line: usize) -> Result<f32, Error> {
    value.parse::<f32>().map_err(|_| Error::MaterialParse {
        line,
        message: format!("invalid number '{value}'"),
    })
}
