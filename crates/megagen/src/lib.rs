use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub mod builder;
pub mod compositor;
pub mod lexer;
pub mod project;
pub mod targa;

pub use builder::{BuildStats, build_project};
pub use compositor::{evaluate_layer_row, lerp_channel};
pub use lexer::{BracedSection, Lexer, Token, TokenKind};
pub use project::{ImageRole, Layer, LayerImage, Project};
pub use targa::TargaHeader;

/// Directory under the content root holding project descriptions.
pub const PROJECT_DIR: &str = "megagen";
pub const PROJECT_EXTENSION: &str = "megagen";
/// Directory under [`PROJECT_DIR`] receiving built rasters.
pub const OUTPUT_DIR: &str = "bin";

pub fn project_path(root: &Path, project_name: &str) -> PathBuf {
    root.join(PROJECT_DIR)
        .join(format!("{project_name}.{PROJECT_EXTENSION}"))
}

pub fn output_path(root: &Path, project_name: &str) -> PathBuf {
    root.join(PROJECT_DIR)
        .join(OUTPUT_DIR)
        .join(format!("{project_name}.tga"))
}

#[derive(Debug)]
pub struct ParseError {
    pub source_name: String,
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug)]
pub enum ParseErrorKind {
    UnexpectedEof {
        expected: String,
    },
    UnexpectedToken {
        expected: String,
        found: String,
    },
    InvalidInteger(String),
    InvalidLayerCount(i64),
    UnterminatedComment,
    UnterminatedString,
    UnmatchedBrace,
    UnknownKeyword(String),
    MissingImage(ImageRole),
    ImageLoad {
        role: ImageRole,
        path: PathBuf,
        source: image::ImageError,
    },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedEof { expected } => {
                write!(formatter, "unexpected end of input, expected {expected}")
            }
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(formatter, "expected {expected}, found '{found}'")
            }
            ParseErrorKind::InvalidInteger(text) => write!(formatter, "'{text}' is not an integer"),
            ParseErrorKind::InvalidLayerCount(count) => {
                write!(formatter, "layer count {count} is negative")
            }
            ParseErrorKind::UnterminatedComment => write!(formatter, "unterminated block comment"),
            ParseErrorKind::UnterminatedString => write!(formatter, "unterminated string"),
            ParseErrorKind::UnmatchedBrace => write!(formatter, "braced section is never closed"),
            ParseErrorKind::UnknownKeyword(keyword) => {
                write!(formatter, "unknown token '{keyword}' in layer")
            }
            ParseErrorKind::MissingImage(role) => write!(formatter, "layer has no {role} image"),
            ParseErrorKind::ImageLoad { role, path, source } => write!(
                formatter,
                "failed to load {role} image {}: {source}",
                path.display()
            ),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}: {}", self.source_name, self.line, self.kind)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrorKind::ImageLoad { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ProjectError {
    FileNotFound { path: PathBuf, source: io::Error },
    Parse(ParseError),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::FileNotFound { path, source } => {
                write!(formatter, "failed to load project {}: {source}", path.display())
            }
            ProjectError::Parse(error) => write!(formatter, "project parse failed: {error}"),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::FileNotFound { source, .. } => Some(source),
            ProjectError::Parse(error) => Some(error),
        }
    }
}

impl From<ParseError> for ProjectError {
    fn from(error: ParseError) -> Self {
        ProjectError::Parse(error)
    }
}

#[derive(Debug)]
pub enum BuildError {
    InvalidOutputSize { size: u32 },
    ShortWrite { row: Option<u32> },
    Io(io::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidOutputSize { size } => write!(
                formatter,
                "output size {size} must be between 1 and {}",
                u16::MAX
            ),
            BuildError::ShortWrite { row: None } => {
                write!(formatter, "output accepted fewer header bytes than written")
            }
            BuildError::ShortWrite { row: Some(row) } => {
                write!(formatter, "output accepted fewer bytes than written at row {row}")
            }
            BuildError::Io(error) => write!(formatter, "output write failed: {error}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Io(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn project_paths_follow_content_layout() {
        let root = Path::new("content");
        assert_eq!(
            project_path(root, "island"),
            Path::new("content/megagen/island.megagen")
        );
        assert_eq!(
            output_path(root, "island"),
            Path::new("content/megagen/bin/island.tga")
        );
    }

    #[test]
    fn project_on_disk_builds_into_tga() {
        let root =
            std::env::temp_dir().join(format!("megagen_end_to_end_{}", std::process::id()));
        let textures = root.join("textures");
        fs::create_dir_all(&textures)
            .unwrap_or_else(|error| panic!("create temp test dir '{}': {error}", root.display()));
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]))
            .save(textures.join("base.tga"))
            .unwrap_or_else(|error| panic!("write albedo fixture: {error}"));
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]))
            .save(textures.join("full.png"))
            .unwrap_or_else(|error| panic!("write mask fixture: {error}"));
        let project_file = project_path(&root, "island");
        fs::create_dir_all(root.join(PROJECT_DIR))
            .unwrap_or_else(|error| panic!("create project dir: {error}"));
        fs::write(
            &project_file,
            "numlayers 1\nlayer_0\n{\n\talbedo textures/base.tga\n\tmask textures/full.png\n}\n",
        )
        .unwrap_or_else(|error| panic!("write project '{}': {error}", project_file.display()));

        let project = Project::load_file(&project_file, &root)
            .unwrap_or_else(|error| panic!("load project failed: {error}"));
        let mut output: Vec<u8> = Vec::new();
        let stats = build_project(8, &mut output, &project)
            .unwrap_or_else(|error| panic!("build failed: {error}"));

        assert_eq!(stats.rows, 8);
        assert_eq!(TargaHeader::decode(&output), Some(TargaHeader::square(8)));
        assert!(
            output[targa::TARGA_HEADER_LEN..]
                .chunks_exact(4)
                .all(|pixel| pixel == [30, 20, 10, 255])
        );

        fs::remove_dir_all(&root)
            .unwrap_or_else(|error| panic!("remove temp test dir '{}': {error}", root.display()));
        assert!(!root.exists());
    }

    #[test]
    fn parse_error_display_names_source_and_line() {
        let error = ParseError {
            source_name: "island.megagen".to_owned(),
            line: 3,
            kind: ParseErrorKind::UnknownKeyword("normal".to_owned()),
        };
        assert_eq!(
            error.to_string(),
            "island.megagen:3: unknown token 'normal' in layer"
        );
    }
}
