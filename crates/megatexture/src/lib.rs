use std::fmt;
use std::io;
use std::path::PathBuf;

/// Edge of the tile window each level keeps resident, in tiles.
pub const TILE_PER_LEVEL: u32 = 4;
/// Level images the shading stage can address.
pub const MAX_LEVELS: usize = 7;
pub const MIN_TILE_SIZE: i32 = 64;
/// Largest tile edge a header may declare.
pub const MAX_TILE_SIZE: i32 = 2048;
pub const DEFAULT_TILES_PER_UPDATE: usize = 8;

/// Placeholder tints, indexed by `level + 1`.
pub const DEBUG_TINTS: [[u8; 4]; 8] = [
    [0, 0, 0, 255],
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [255, 255, 0, 255],
    [0, 0, 255, 255],
    [255, 0, 255, 255],
    [0, 255, 255, 255],
    [255, 255, 255, 255],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Upper bound on tile reads per `update_for_center` call. Zero is
    /// raised to one when the pyramid is opened.
    pub tiles_per_update: usize,
    /// Bind flat white/black images instead of level caches.
    pub show_levels: bool,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tiles_per_update: DEFAULT_TILES_PER_UPDATE,
            show_levels: false,
        }
    }
}

#[derive(Debug)]
pub enum LoadError {
    FileNotFound { path: PathBuf, source: io::Error },
    CorruptHeader(PyramidHeader),
    ShortRead,
    TooManyLevels { required: usize },
    Io(io::Error),
    Cache(CacheImageError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FileNotFound { path, source } => {
                write!(formatter, "failed to open {}: {source}", path.display())
            }
            LoadError::CorruptHeader(header) => write!(
                formatter,
                "bad header: tile_size={} tiles_wide={} tiles_high={}",
                header.tile_size, header.tiles_wide, header.tiles_high
            ),
            LoadError::ShortRead => write!(formatter, "file ends inside the header"),
            LoadError::TooManyLevels { required } => write!(
                formatter,
                "pyramid needs {required} levels, at most {MAX_LEVELS} can be bound"
            ),
            LoadError::Io(error) => write!(formatter, "pyramid read failed: {error}"),
            LoadError::Cache(error) => write!(formatter, "level cache image failed: {error}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::FileNotFound { source, .. } => Some(source),
            LoadError::Io(error) => Some(error),
            LoadError::Cache(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum TileReadError {
    ShortRead { tile_index: u64 },
    BufferLengthMismatch { expected: usize, actual: usize },
    OffsetOverflow { tile_index: u64 },
    Io(io::Error),
    Cache(CacheImageError),
}

impl fmt::Display for TileReadError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileReadError::ShortRead { tile_index } => {
                write!(formatter, "tile {tile_index} is past the end of the file")
            }
            TileReadError::BufferLengthMismatch { expected, actual } => write!(
                formatter,
                "tile buffer length mismatch: expected {expected}, got {actual}"
            ),
            TileReadError::OffsetOverflow { tile_index } => {
                write!(formatter, "tile {tile_index} byte offset overflows")
            }
            TileReadError::Io(error) => write!(formatter, "tile read failed: {error}"),
            TileReadError::Cache(error) => write!(formatter, "tile upload failed: {error}"),
        }
    }
}

impl std::error::Error for TileReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileReadError::Io(error) => Some(error),
            TileReadError::Cache(error) => Some(error),
            _ => None,
        }
    }
}

mod binder;
mod cache;
#[cfg(feature = "gpu")]
mod gpu;
mod header;
mod level;
mod pyramid;
mod streaming;

pub use binder::{
    BORDER_CLAMP_TEXTURE_SLOT, BindOptions, BindingPlan, END_OF_CHAIN, FIRST_LEVEL_TEXTURE_SLOT,
    ImageBinding, LEVEL_SLOTS, NO_CONTRIBUTION, PARAM_SLOTS, ShadingStage, SlotBinding,
    TERMINAL_PARAM_SLOT,
};
pub use cache::{
    BC3_BLOCK_BYTES, CacheImageDesc, CacheImageError, CacheImageFormat, ImageFilter, ImageWrap,
    LevelImageCache, TexelRegion, bc3_solid_block, debug_tint, solid_fill, validate_upload,
};
#[cfg(feature = "gpu")]
pub use gpu::{MegaLevelUniforms, WgpuLevelCache, WgpuLevelImage, WgpuShadingStage};
pub use header::{HEADER_LEN, PyramidHeader};
pub use level::{Level, LevelGeometry, LevelSet, LevelSetFull, MASKED, level_geometry};
pub use pyramid::TilePyramid;
pub use streaming::{FootprintWindow, StreamStats, TileCoord};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_support;
