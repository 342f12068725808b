//! In-memory collaborators for exercising pyramids without a GPU.

use std::cell::RefCell;
use std::rc::Rc;

use crate::binder::{ImageBinding, ShadingStage};
use crate::cache::{
    CacheImageDesc, CacheImageError, LevelImageCache, TexelRegion, validate_upload,
};
use crate::header::PyramidHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub image_id: usize,
    pub region: TexelRegion,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct CacheLog {
    pub created: Vec<CacheImageDesc>,
    pub uploads: Vec<RecordedUpload>,
    pub released: Vec<usize>,
}

/// Image handle that reports its release back to the owning cache log.
#[derive(Debug)]
pub struct MemoryImage {
    pub id: usize,
    pub desc: CacheImageDesc,
    log: Rc<RefCell<CacheLog>>,
}

impl Drop for MemoryImage {
    fn drop(&mut self) {
        self.log.borrow_mut().released.push(self.id);
    }
}

/// Cache service that records every call. `fail_after` makes the n-th
/// `create_image` call fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    log: Rc<RefCell<CacheLog>>,
    pub fail_after: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Rc<RefCell<CacheLog>> {
        Rc::clone(&self.log)
    }
}

impl LevelImageCache for MemoryCache {
    type Image = MemoryImage;

    fn create_image(&mut self, desc: &CacheImageDesc) -> Result<Self::Image, CacheImageError> {
        let mut log = self.log.borrow_mut();
        if self.fail_after.is_some_and(|limit| log.created.len() >= limit) {
            return Err(CacheImageError::Backend("out of video memory".to_owned()));
        }
        let id = log.created.len();
        log.created.push(desc.clone());
        Ok(MemoryImage {
            id,
            desc: desc.clone(),
            log: Rc::clone(&self.log),
        })
    }

    fn upload(
        &mut self,
        image: &Self::Image,
        region: TexelRegion,
        bytes: &[u8],
    ) -> Result<(), CacheImageError> {
        validate_upload(&image.desc, region, bytes)?;
        self.log.borrow_mut().uploads.push(RecordedUpload {
            image_id: image.id,
            region,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundImage {
    BorderClamp,
    White,
    Black,
    Level(usize),
}

#[derive(Debug, Default)]
pub struct RecordingStage {
    pub images: Vec<(u32, BoundImage)>,
    pub params: Vec<(u32, [f32; 4])>,
}

impl RecordingStage {
    pub fn image_at(&self, texture_slot: u32) -> Option<BoundImage> {
        self.images
            .iter()
            .rev()
            .find(|(slot, _)| *slot == texture_slot)
            .map(|(_, image)| *image)
    }

    pub fn params_at(&self, param_slot: u32) -> Option<[f32; 4]> {
        self.params
            .iter()
            .rev()
            .find(|(slot, _)| *slot == param_slot)
            .map(|(_, params)| *params)
    }
}

impl ShadingStage for RecordingStage {
    type Image = MemoryImage;

    fn bind_image(&mut self, texture_slot: u32, image: ImageBinding<'_, Self::Image>) {
        let bound = match image {
            ImageBinding::BorderClamp => BoundImage::BorderClamp,
            ImageBinding::White => BoundImage::White,
            ImageBinding::Black => BoundImage::Black,
            ImageBinding::Level(image) => BoundImage::Level(image.id),
        };
        self.images.push((texture_slot, bound));
    }

    fn set_level_params(&mut self, param_slot: u32, params: [f32; 4]) {
        self.params.push((param_slot, params));
    }
}

/// Builds a pyramid file image: header in tile 0, then `tile_count` tiles
/// whose bytes all equal the low byte of their tile index.
pub fn pyramid_file_bytes(header: PyramidHeader, tile_count: u64) -> Vec<u8> {
    let tile_bytes = header.tile_bytes() as usize;
    let total_tiles = tile_count as usize + 1;
    let mut bytes = vec![0u8; tile_bytes * total_tiles];
    bytes[..crate::HEADER_LEN].copy_from_slice(&header.encode());
    for tile in 1..total_tiles {
        let start = tile * tile_bytes;
        bytes[start..start + tile_bytes].fill(tile as u8);
    }
    bytes
}
