use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::binder::{BindOptions, BindingPlan, ShadingStage};
use crate::cache::{CacheImageDesc, LevelImageCache, TexelRegion, debug_tint, solid_fill};
use crate::header::PyramidHeader;
use crate::level::{Level, LevelSet, cell_index, level_geometry};
use crate::streaming::{FootprintWindow, StreamStats, TileCoord};
use crate::{LoadError, MAX_LEVELS, PyramidConfig, TILE_PER_LEVEL, TileReadError};

/// A tiled mega-texture file opened for streaming.
///
/// Owns the tile source, the image cache service and every level's cache
/// image. Dropping the pyramid releases all of them.
pub struct TilePyramid<R, C: LevelImageCache> {
    header: PyramidHeader,
    tile_size: u32,
    tile_bytes: usize,
    levels: LevelSet<C::Image>,
    source: R,
    cache: C,
    config: PyramidConfig,
    scratch: Vec<u8>,
}

impl<R, C: LevelImageCache> fmt::Debug for TilePyramid<R, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TilePyramid")
            .field("header", &self.header)
            .field("num_levels", &self.levels.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: LevelImageCache> TilePyramid<File, C> {
    pub fn load(
        path: impl AsRef<Path>,
        cache: C,
        config: PyramidConfig,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            log::warn!("[megatexture] failed to open {}: {source}", path.display());
            LoadError::FileNotFound {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_source(file, cache, config).inspect_err(|error| {
            log::warn!("[megatexture] bad pyramid file {}: {error}", path.display());
        })
    }
}

impl<R: Read + Seek, C: LevelImageCache> TilePyramid<R, C> {
    pub fn from_source(
        mut source: R,
        mut cache: C,
        config: PyramidConfig,
    ) -> Result<Self, LoadError> {
        source.seek(SeekFrom::Start(0)).map_err(LoadError::Io)?;
        let header = PyramidHeader::read_from(&mut source)?;
        if !header.is_valid() {
            return Err(LoadError::CorruptHeader(header));
        }
        let tile_size = header.tile_size as u32;
        let tile_bytes = usize::try_from(header.tile_bytes())
            .map_err(|_| LoadError::CorruptHeader(header))?;

        let geometry = level_geometry(header.tiles_wide as u32, header.tiles_high as u32);
        if geometry.len() > MAX_LEVELS {
            return Err(LoadError::TooManyLevels {
                required: geometry.len(),
            });
        }

        // Levels built so far are dropped with `levels` on any early return.
        let mut levels = LevelSet::new();
        for planned in geometry {
            let desc = CacheImageDesc::level(planned.index, tile_size)
                .ok_or(LoadError::CorruptHeader(header))?;
            let image = cache.create_image(&desc).map_err(LoadError::Cache)?;
            let fill = solid_fill(&desc, debug_tint(planned.index));
            cache
                .upload(&image, desc.full_region(), &fill)
                .map_err(LoadError::Cache)?;
            log::debug!(
                "[megatexture] level {}: {}x{} tiles at tile offset {}",
                planned.index,
                planned.tiles_wide,
                planned.tiles_high,
                planned.tile_offset
            );
            levels
                .push(Level::new(planned, image))
                .map_err(|_| LoadError::TooManyLevels {
                    required: planned.index + 1,
                })?;
        }

        let config = PyramidConfig {
            tiles_per_update: config.tiles_per_update.max(1),
            ..config
        };
        Ok(Self {
            header,
            tile_size,
            tile_bytes,
            levels,
            source,
            cache,
            config,
            scratch: vec![0; tile_bytes],
        })
    }

    pub fn header(&self) -> PyramidHeader {
        self.header
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_bytes(&self) -> usize {
        self.tile_bytes
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &LevelSet<C::Image> {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&Level<C::Image>> {
        self.levels.get(index)
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Reads tile `tile_index` (counted from the start of the file) into
    /// `buffer`, which must be exactly one tile long.
    pub fn read_tile(&mut self, tile_index: u64, buffer: &mut [u8]) -> Result<(), TileReadError> {
        read_tile_at(&mut self.source, self.tile_bytes, tile_index, buffer)
    }

    pub fn invalidate(&mut self) {
        for level in self.levels.iter_mut() {
            level.invalidate();
        }
    }

    /// Streams tiles around `center` into the level caches, spending at most
    /// `config.tiles_per_update` reads. Coarse levels are served first.
    ///
    /// On error, a level with overwritten cells stays masked until a later
    /// call completes its window.
    pub fn update_for_center(&mut self, center: [f32; 2]) -> Result<StreamStats, TileReadError> {
        let mut stats = StreamStats::default();
        let mut budget = self.config.tiles_per_update;

        for level in self.levels.iter_mut().rev() {
            let geometry = level.geometry();
            let window = FootprintWindow::around(center, &geometry);
            for coord in window.tiles_by_distance() {
                if level.holds(coord) {
                    continue;
                }
                if budget == 0 {
                    stats.pending += 1;
                    continue;
                }
                let tile_index = geometry.file_tile_index(coord);
                read_tile_at(&mut self.source, self.tile_bytes, tile_index, &mut self.scratch)?;
                level.release_cell(coord);
                self.cache
                    .upload(level.image(), cell_region(coord, self.tile_size), &self.scratch)
                    .map_err(TileReadError::Cache)?;
                level.mark_resident(coord);
                budget -= 1;
                stats.tiles_read += 1;
            }
            level.refresh(&window);
            if level.is_valid() {
                stats.levels_valid += 1;
            }
        }

        if stats.tiles_read > 0 {
            log::debug!(
                "[megatexture] streamed {} tiles around ({}, {}), {} pending",
                stats.tiles_read,
                center[0],
                center[1],
                stats.pending
            );
        }
        Ok(stats)
    }

    pub fn binding_plan(&self) -> BindingPlan<'_, C::Image> {
        BindingPlan::for_levels(
            &self.levels,
            BindOptions {
                show_levels: self.config.show_levels,
            },
        )
    }

    pub fn bind_for_view_origin<S>(&self, view_origin: [f32; 3], stage: &mut S)
    where
        S: ShadingStage<Image = C::Image> + ?Sized,
    {
        log::trace!(
            "[megatexture] bind {} levels for view origin {view_origin:?}",
            self.levels.len()
        );
        self.binding_plan().apply(stage);
    }
}

fn cell_region(coord: TileCoord, tile_size: u32) -> TexelRegion {
    let cell = cell_index(coord) as u32;
    TexelRegion {
        x: (cell % TILE_PER_LEVEL) * tile_size,
        y: (cell / TILE_PER_LEVEL) * tile_size,
        width: tile_size,
        height: tile_size,
    }
}

fn read_tile_at<R: Read + Seek>(
    source: &mut R,
    tile_bytes: usize,
    tile_index: u64,
    buffer: &mut [u8],
) -> Result<(), TileReadError> {
    if buffer.len() != tile_bytes {
        return Err(TileReadError::BufferLengthMismatch {
            expected: tile_bytes,
            actual: buffer.len(),
        });
    }
    let offset = tile_index
        .checked_mul(tile_bytes as u64)
        .ok_or(TileReadError::OffsetOverflow { tile_index })?;
    source
        .seek(SeekFrom::Start(offset))
        .map_err(TileReadError::Io)?;
    source.read_exact(buffer).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            TileReadError::ShortRead { tile_index }
        } else {
            TileReadError::Io(error)
        }
    })
}
