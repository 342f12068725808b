use std::io::{self, Read};
use std::mem::size_of;

use static_assertions::const_assert_eq;

use crate::{LoadError, MAX_TILE_SIZE, MIN_TILE_SIZE};

/// Size of the on-disk header record. The header lives inside tile 0, which
/// level addressing never touches.
pub const HEADER_LEN: usize = 12;

const_assert_eq!(HEADER_LEN, 3 * size_of::<i32>());

/// Fixed record at byte 0 of a pyramid file.
///
/// | tile_size (i32 LE) | tiles_wide (i32 LE) | tiles_high (i32 LE) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidHeader {
    pub tile_size: i32,
    pub tiles_wide: i32,
    pub tiles_high: i32,
}

impl PyramidHeader {
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        let field = |index: usize| {
            let start = index * 4;
            i32::from_le_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ])
        };
        Self {
            tile_size: field(0),
            tiles_wide: field(1),
            tiles_high: field(2),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.tile_size.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.tiles_wide.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.tiles_high.to_le_bytes());
        bytes
    }

    pub fn is_valid(&self) -> bool {
        (MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size)
            && self.tiles_wide >= 1
            && self.tiles_high >= 1
    }

    /// Raw byte size of one tile. Only meaningful for a valid header.
    pub fn tile_bytes(&self) -> u64 {
        let edge = self.tile_size.max(0) as u64;
        edge * edge
    }

    pub(crate) fn read_from(reader: &mut impl Read) -> Result<Self, LoadError> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|error| {
            if error.kind() == io::ErrorKind::UnexpectedEof {
                LoadError::ShortRead
            } else {
                LoadError::Io(error)
            }
        })?;
        Ok(Self::decode(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_little_endian_fields() {
        let bytes = [
            0x80, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x09, 0x01, 0x00, 0x00,
        ];
        let header = PyramidHeader::decode(&bytes);
        assert_eq!(header.tile_size, 128);
        assert_eq!(header.tiles_wide, 16);
        assert_eq!(header.tiles_high, 265);
        assert_eq!(header.encode(), bytes);
    }

    #[test]
    fn validity_bounds() {
        let valid = PyramidHeader {
            tile_size: 64,
            tiles_wide: 1,
            tiles_high: 1,
        };
        assert!(valid.is_valid());
        assert!(!PyramidHeader { tile_size: 32, ..valid }.is_valid());
        assert!(!PyramidHeader { tiles_wide: 0, ..valid }.is_valid());
        assert!(!PyramidHeader { tiles_high: -3, ..valid }.is_valid());
        assert!(PyramidHeader { tile_size: MAX_TILE_SIZE, ..valid }.is_valid());
        assert!(!PyramidHeader { tile_size: MAX_TILE_SIZE + 1, ..valid }.is_valid());
        assert!(!PyramidHeader { tile_size: 0x4000_0000, ..valid }.is_valid());
    }

    #[test]
    fn truncated_header_is_short_read() {
        let mut reader = std::io::Cursor::new(vec![0u8; 7]);
        let error = PyramidHeader::read_from(&mut reader).unwrap_err();
        assert!(matches!(error, LoadError::ShortRead));
    }
}
