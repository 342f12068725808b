use std::fmt;

use crate::{DEBUG_TINTS, TILE_PER_LEVEL};

/// Bytes of one 4x4 BC3 block.
pub const BC3_BLOCK_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheImageFormat {
    /// Block compressed RGBA, one byte per texel. Tile payloads are stored
    /// in this layout on disk.
    Bc3RgbaUnorm,
}

impl CacheImageFormat {
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        match self {
            CacheImageFormat::Bc3RgbaUnorm => {
                width.div_ceil(4) as usize * height.div_ceil(4) as usize * BC3_BLOCK_BYTES
            }
        }
    }

    pub fn bytes_per_block_row(self, width: u32) -> u32 {
        match self {
            CacheImageFormat::Bc3RgbaUnorm => width.div_ceil(4) * BC3_BLOCK_BYTES as u32,
        }
    }

    pub fn block_rows(self, height: u32) -> u32 {
        match self {
            CacheImageFormat::Bc3RgbaUnorm => height.div_ceil(4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageWrap {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheImageDesc {
    pub label: String,
    pub format: CacheImageFormat,
    pub width: u32,
    pub height: u32,
    pub filter: ImageFilter,
    pub wrap: ImageWrap,
}

impl CacheImageDesc {
    /// Square per-level cache holding a `TILE_PER_LEVEL` x `TILE_PER_LEVEL`
    /// window of tiles. `None` when the edge does not fit in `u32`.
    pub fn level(level_index: usize, tile_size: u32) -> Option<Self> {
        let edge = TILE_PER_LEVEL.checked_mul(tile_size)?;
        Some(Self {
            label: format!("_mega_{level_index}"),
            format: CacheImageFormat::Bc3RgbaUnorm,
            width: edge,
            height: edge,
            filter: ImageFilter::Linear,
            wrap: ImageWrap::Repeat,
        })
    }

    pub fn byte_len(&self) -> usize {
        self.format.byte_len(self.width, self.height)
    }

    pub fn full_region(&self) -> TexelRegion {
        TexelRegion {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TexelRegion {
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x
            .checked_add(self.width)
            .is_some_and(|right| right <= width)
            && self
                .y
                .checked_add(self.height)
                .is_some_and(|bottom| bottom <= height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheImageError {
    ZeroExtent,
    RegionOutOfBounds,
    RegionNotBlockAligned,
    ByteLengthMismatch { expected: usize, actual: usize },
    UnsupportedFormat,
    Backend(String),
}

impl fmt::Display for CacheImageError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheImageError::ZeroExtent => write!(formatter, "cache image extent must be non-zero"),
            CacheImageError::RegionOutOfBounds => {
                write!(formatter, "upload region exceeds cache image bounds")
            }
            CacheImageError::RegionNotBlockAligned => {
                write!(formatter, "upload region is not aligned to compression blocks")
            }
            CacheImageError::ByteLengthMismatch { expected, actual } => write!(
                formatter,
                "upload bytes length mismatch: expected {expected}, got {actual}"
            ),
            CacheImageError::UnsupportedFormat => {
                write!(formatter, "cache image format is not supported by the device")
            }
            CacheImageError::Backend(message) => {
                write!(formatter, "cache backend error: {message}")
            }
        }
    }
}

impl std::error::Error for CacheImageError {}

/// GPU image cache service. Images are exclusively owned by whoever receives
/// them from `create_image`; dropping an image releases it.
pub trait LevelImageCache {
    type Image;

    fn create_image(&mut self, desc: &CacheImageDesc) -> Result<Self::Image, CacheImageError>;

    /// Uploads `bytes` laid out in the image's format into `region`.
    fn upload(
        &mut self,
        image: &Self::Image,
        region: TexelRegion,
        bytes: &[u8],
    ) -> Result<(), CacheImageError>;
}

/// Checks shared by every backend before touching the device.
pub fn validate_upload(
    desc: &CacheImageDesc,
    region: TexelRegion,
    bytes: &[u8],
) -> Result<(), CacheImageError> {
    if region.width == 0 || region.height == 0 {
        return Err(CacheImageError::ZeroExtent);
    }
    if !region.fits_within(desc.width, desc.height) {
        return Err(CacheImageError::RegionOutOfBounds);
    }
    match desc.format {
        CacheImageFormat::Bc3RgbaUnorm => {
            if region.x % 4 != 0 || region.y % 4 != 0 {
                return Err(CacheImageError::RegionNotBlockAligned);
            }
        }
    }
    let expected = desc.format.byte_len(region.width, region.height);
    if bytes.len() != expected {
        return Err(CacheImageError::ByteLengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Placeholder tint for a level before any tile streams in.
pub fn debug_tint(level_index: usize) -> [u8; 4] {
    DEBUG_TINTS[(level_index + 1) % DEBUG_TINTS.len()]
}

/// One BC3 block that decodes to `rgba` in all sixteen texels.
pub fn bc3_solid_block(rgba: [u8; 4]) -> [u8; BC3_BLOCK_BYTES] {
    let [r, g, b, a] = rgba;
    let rgb565 = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
    let [color_lo, color_hi] = rgb565.to_le_bytes();
    let mut block = [0u8; BC3_BLOCK_BYTES];
    // alpha endpoints equal, all 3-bit indices select endpoint 0
    block[0] = a;
    block[1] = a;
    // color endpoints equal, all 2-bit indices select endpoint 0
    block[8] = color_lo;
    block[9] = color_hi;
    block[10] = color_lo;
    block[11] = color_hi;
    block
}

/// Builds the fill payload for a whole image of `desc`, assembled per call.
pub fn solid_fill(desc: &CacheImageDesc, rgba: [u8; 4]) -> Vec<u8> {
    match desc.format {
        CacheImageFormat::Bc3RgbaUnorm => {
            let block = bc3_solid_block(rgba);
            let block_count = desc.byte_len() / BC3_BLOCK_BYTES;
            let mut bytes = Vec::with_capacity(desc.byte_len());
            for _ in 0..block_count {
                bytes.extend_from_slice(&block);
            }
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_desc_covers_tile_window() {
        let desc = CacheImageDesc::level(2, 128).unwrap();
        assert_eq!(desc.label, "_mega_2");
        assert_eq!(desc.width, 512);
        assert_eq!(desc.height, 512);
        assert_eq!(desc.byte_len(), 512 * 512);
        assert_eq!(desc.filter, ImageFilter::Linear);
        assert_eq!(desc.wrap, ImageWrap::Repeat);
    }

    #[test]
    fn level_desc_rejects_overflowing_edge() {
        assert!(CacheImageDesc::level(0, 0x4000_0000).is_none());
        assert!(CacheImageDesc::level(0, u32::MAX / 4).is_some());
    }

    #[test]
    fn debug_tint_cycles_palette_offset_by_one() {
        assert_eq!(debug_tint(0), [255, 0, 0, 255]);
        assert_eq!(debug_tint(6), [255, 255, 255, 255]);
        assert_eq!(debug_tint(7), [0, 0, 0, 255]);
    }

    #[test]
    fn solid_block_packs_rgb565_little_endian() {
        let block = bc3_solid_block([255, 0, 0, 200]);
        assert_eq!(block[0], 200);
        assert_eq!(block[1], 200);
        assert_eq!(&block[2..8], &[0; 6]);
        assert_eq!(u16::from_le_bytes([block[8], block[9]]), 0xF800);
        assert_eq!(u16::from_le_bytes([block[10], block[11]]), 0xF800);
        assert_eq!(&block[12..16], &[0; 4]);
    }

    #[test]
    fn solid_fill_repeats_block_for_whole_image() {
        let desc = CacheImageDesc::level(0, 64).unwrap();
        let fill = solid_fill(&desc, [0, 255, 0, 255]);
        assert_eq!(fill.len(), desc.byte_len());
        let block = bc3_solid_block([0, 255, 0, 255]);
        assert!(fill.chunks_exact(BC3_BLOCK_BYTES).all(|chunk| chunk == block));
    }

    #[test]
    fn upload_validation_rejects_bad_regions() {
        let desc = CacheImageDesc::level(0, 64).unwrap();
        let tile = vec![0u8; 64 * 64];
        let inside = TexelRegion {
            x: 192,
            y: 64,
            width: 64,
            height: 64,
        };
        assert_eq!(validate_upload(&desc, inside, &tile), Ok(()));
        assert_eq!(
            validate_upload(&desc, TexelRegion { x: 224, ..inside }, &tile),
            Err(CacheImageError::RegionOutOfBounds)
        );
        assert_eq!(
            validate_upload(&desc, TexelRegion { x: 2, ..inside }, &tile),
            Err(CacheImageError::RegionNotBlockAligned)
        );
        assert_eq!(
            validate_upload(&desc, inside, &tile[1..]),
            Err(CacheImageError::ByteLengthMismatch {
                expected: 4096,
                actual: 4095
            })
        );
    }
}
