use std::fmt;
use std::path::{Path, PathBuf};

use crate::lexer::{Lexer, TokenKind};
use crate::{ParseError, ParseErrorKind, ProjectError};

/// Decoded RGBA8 raster used as a layer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl LayerImage {
    pub fn load(path: &Path) -> Result<Self, image::ImageError> {
        let decoded = image::open(path)?.to_rgba8();
        Ok(Self::from(decoded))
    }

    /// Returns `None` for empty extents or a buffer that is not
    /// `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Option<Self> {
        let count = (width as usize).checked_mul(height as usize)?;
        Self::from_rgba(width, height, rgba.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let start = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[start..start + 4]);
        rgba
    }
}

impl From<image::RgbaImage> for LayerImage {
    fn from(image: image::RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Albedo,
    Mask,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Albedo => write!(formatter, "albedo"),
            ImageRole::Mask => write!(formatter, "mask"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub albedo: LayerImage,
    pub mask: LayerImage,
}

/// Ordered layers; layer 0 is composited first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    layers: Vec<Layer>,
}

impl Project {
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Parses the project file at `path`. Layer image paths are resolved
    /// against `image_root`.
    pub fn load_file(path: impl AsRef<Path>, image_root: &Path) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let mut lexer = Lexer::from_file(path).map_err(|source| {
            log::warn!("[megagen] failed to load project {}: {source}", path.display());
            ProjectError::FileNotFound {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let project = Self::parse(&mut lexer, image_root).inspect_err(|error| {
            log::warn!("[megagen] {error}");
        })?;
        log::info!(
            "[megagen] parsed {} with {} layers",
            path.display(),
            project.layers.len()
        );
        Ok(project)
    }

    /// `numlayers N` followed by `layer_0 { ... }` through `layer_{N-1}`.
    pub fn parse(lexer: &mut Lexer, image_root: &Path) -> Result<Self, ParseError> {
        lexer.expect_token("numlayers")?;
        let count_line = lexer.line();
        let count = lexer.parse_int()?;
        let count = usize::try_from(count)
            .map_err(|_| lexer.error_at(count_line, ParseErrorKind::InvalidLayerCount(count)))?;

        let mut layers = Vec::new();
        for index in 0..count {
            lexer.expect_token(&format!("layer_{index}"))?;
            let section = lexer.parse_braced_section()?;
            let mut block = Lexer::from_memory(section.text, lexer.name().to_owned())
                .starting_at_line(section.line);
            layers.push(parse_layer(&mut block, image_root)?);
        }

        if let Some(token) = lexer.read_token()? {
            return Err(lexer.error_at(
                token.line,
                ParseErrorKind::UnexpectedToken {
                    expected: "end of project".to_owned(),
                    found: token.text,
                },
            ));
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn parse_layer(block: &mut Lexer, image_root: &Path) -> Result<Layer, ParseError> {
    block.expect_token("{")?;
    let mut albedo = None;
    let mut mask = None;

    loop {
        let Some(token) = block.read_token()? else {
            return Err(block.error(ParseErrorKind::UnexpectedEof {
                expected: "'}'".to_owned(),
            }));
        };
        if token.is("}") {
            break;
        }
        let role = match (token.kind, token.text.as_str()) {
            (TokenKind::Word, "albedo") => ImageRole::Albedo,
            (TokenKind::Word, "mask") => ImageRole::Mask,
            _ => {
                return Err(
                    block.error_at(token.line, ParseErrorKind::UnknownKeyword(token.text))
                );
            }
        };

        let path_token = match block.read_token()? {
            Some(path_token) if path_token.kind != TokenKind::Punctuation => path_token,
            Some(other) => {
                return Err(block.error_at(
                    other.line,
                    ParseErrorKind::UnexpectedToken {
                        expected: format!("{role} image path"),
                        found: other.text,
                    },
                ));
            }
            None => {
                return Err(block.error(ParseErrorKind::UnexpectedEof {
                    expected: format!("{role} image path"),
                }));
            }
        };
        let path = resolve_image_path(image_root, &path_token.text);
        let image = LayerImage::load(&path).map_err(|source| {
            block.error_at(
                path_token.line,
                ParseErrorKind::ImageLoad { role, path, source },
            )
        })?;
        match role {
            ImageRole::Albedo => albedo = Some(image),
            ImageRole::Mask => mask = Some(image),
        }
    }

    let albedo =
        albedo.ok_or_else(|| block.error(ParseErrorKind::MissingImage(ImageRole::Albedo)))?;
    let mask = mask.ok_or_else(|| block.error(ParseErrorKind::MissingImage(ImageRole::Mask)))?;
    Ok(Layer { albedo, mask })
}

fn resolve_image_path(image_root: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        image_root.join(path)
    }
}
