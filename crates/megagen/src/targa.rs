//! Uncompressed 32-bit truecolor TGA header.

pub const TARGA_HEADER_LEN: usize = 18;
pub const IMAGE_TYPE_TRUECOLOR: u8 = 2;
pub const PIXEL_DEPTH: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargaHeader {
    pub width: u16,
    pub height: u16,
}

impl TargaHeader {
    pub fn square(size: u16) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    /// Zero origin, no id field, no colormap, no descriptor flags.
    pub fn encode(&self) -> [u8; TARGA_HEADER_LEN] {
        let mut bytes = [0u8; TARGA_HEADER_LEN];
        bytes[2] = IMAGE_TYPE_TRUECOLOR;
        bytes[12..14].copy_from_slice(&self.width.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.height.to_le_bytes());
        bytes[16] = PIXEL_DEPTH;
        bytes
    }

    /// Accepts only headers `encode` could have produced.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; TARGA_HEADER_LEN] = bytes.get(..TARGA_HEADER_LEN)?.try_into().ok()?;
        let flags_clear = bytes
            .iter()
            .enumerate()
            .all(|(index, value)| matches!(index, 2 | 12..=16) || *value == 0);
        if bytes[2] != IMAGE_TYPE_TRUECOLOR || bytes[16] != PIXEL_DEPTH || !flags_clear {
            return None;
        }
        Some(Self {
            width: u16::from_le_bytes([bytes[12], bytes[13]]),
            height: u16::from_le_bytes([bytes[14], bytes[15]]),
        })
    }

    pub fn pixel_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(PIXEL_DEPTH / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = TargaHeader {
            width: 512,
            height: 256,
        }
        .encode();
        assert_eq!(
            bytes,
            [0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x02, 0x00, 0x01, 32, 0]
        );
        assert_eq!(
            TargaHeader::decode(&bytes),
            Some(TargaHeader {
                width: 512,
                height: 256
            })
        );
    }

    #[test]
    fn decode_rejects_other_layouts() {
        let mut rle = TargaHeader::square(64).encode();
        rle[2] = 10;
        assert_eq!(TargaHeader::decode(&rle), None);

        let mut flipped = TargaHeader::square(64).encode();
        flipped[17] = 0x20;
        assert_eq!(TargaHeader::decode(&flipped), None);

        assert_eq!(TargaHeader::decode(&[0; 12]), None);
    }

    #[test]
    fn pixel_bytes_counts_four_bytes_per_pixel() {
        assert_eq!(TargaHeader::square(1024).pixel_bytes(), 4 * 1024 * 1024);
    }
}
