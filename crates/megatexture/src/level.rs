use bitvec::prelude::{BitVec, Lsb0};

use crate::streaming::{FootprintWindow, TileCoord};
use crate::{MAX_LEVELS, TILE_PER_LEVEL};

/// Window cells held by one level's cache image.
pub(crate) const CELLS_PER_LEVEL: usize = (TILE_PER_LEVEL * TILE_PER_LEVEL) as usize;

/// Footprint parameters of a level that must not be sampled yet.
pub const MASKED: f32 = -1.0;

/// Tile-grid geometry of one level, independent of any GPU state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGeometry {
    pub index: usize,
    /// First tile of this level, in units of one tile's raw size.
    pub tile_offset: u64,
    pub tiles_wide: u32,
    pub tiles_high: u32,
}

impl LevelGeometry {
    pub fn tile_count(&self) -> u64 {
        self.tiles_wide as u64 * self.tiles_high as u64
    }

    pub fn initial_params(&self) -> [f32; 4] {
        [MASKED, 0.0, 0.0, self.horizontal_scale()]
    }

    /// Width of the level measured in cache windows.
    pub fn horizontal_scale(&self) -> f32 {
        self.tiles_wide as f32 / TILE_PER_LEVEL as f32
    }

    pub fn file_tile_index(&self, coord: TileCoord) -> u64 {
        self.tile_offset + coord.y as u64 * self.tiles_wide as u64 + coord.x as u64
    }
}

/// Derives the level sequence for a base grid of `tiles_wide` x `tiles_high`.
/// Tile 0 is reserved for the header, so level 0 begins at tile 1.
pub fn level_geometry(tiles_wide: u32, tiles_high: u32) -> Vec<LevelGeometry> {
    let mut levels = Vec::new();
    let mut width = tiles_wide.max(1);
    let mut height = tiles_high.max(1);
    let mut cursor = 1u64;
    loop {
        let level = LevelGeometry {
            index: levels.len(),
            tile_offset: cursor,
            tiles_wide: width,
            tiles_high: height,
        };
        cursor += level.tile_count();
        levels.push(level);

        if width <= TILE_PER_LEVEL && height <= TILE_PER_LEVEL {
            break;
        }
        width = width.div_ceil(2);
        height = height.div_ceil(2);
    }
    levels
}

#[derive(Debug)]
pub struct Level<I> {
    geometry: LevelGeometry,
    params: [f32; 4],
    image: I,
    valid: bool,
    // cell index -> tile currently uploaded into that cell
    held: [TileCoord; CELLS_PER_LEVEL],
    resident: BitVec<usize, Lsb0>,
}

impl<I> Level<I> {
    pub(crate) fn new(geometry: LevelGeometry, image: I) -> Self {
        Self {
            geometry,
            params: geometry.initial_params(),
            image,
            valid: false,
            held: [TileCoord::default(); CELLS_PER_LEVEL],
            resident: BitVec::repeat(false, CELLS_PER_LEVEL),
        }
    }

    pub fn geometry(&self) -> LevelGeometry {
        self.geometry
    }

    pub fn index(&self) -> usize {
        self.geometry.index
    }

    pub fn tile_offset(&self) -> u64 {
        self.geometry.tile_offset
    }

    pub fn tiles_wide(&self) -> u32 {
        self.geometry.tiles_wide
    }

    pub fn tiles_high(&self) -> u32 {
        self.geometry.tiles_high
    }

    pub fn params(&self) -> [f32; 4] {
        self.params
    }

    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn resident_cells(&self) -> usize {
        self.resident.count_ones()
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.params[0] = MASKED;
        self.resident.fill(false);
    }

    pub(crate) fn holds(&self, coord: TileCoord) -> bool {
        let cell = cell_index(coord);
        self.resident[cell] && self.held[cell] == coord
    }

    pub(crate) fn mark_resident(&mut self, coord: TileCoord) {
        let cell = cell_index(coord);
        self.held[cell] = coord;
        self.resident.set(cell, true);
    }

    /// Drops residency of the cell `coord` maps to and masks the level until
    /// the next complete `refresh`. Called before the cell is overwritten.
    pub(crate) fn release_cell(&mut self, coord: TileCoord) {
        self.valid = false;
        self.params[0] = MASKED;
        self.resident.set(cell_index(coord), false);
    }

    /// Publishes the window to the shader once every wanted tile is in place.
    pub(crate) fn refresh(&mut self, window: &FootprintWindow) {
        let complete = window.iter_tiles().all(|coord| self.holds(coord));
        self.valid = complete;
        if complete {
            self.params = [
                1.0,
                window.origin.x as f32 / self.geometry.tiles_wide as f32,
                window.origin.y as f32 / self.geometry.tiles_high as f32,
                self.geometry.horizontal_scale(),
            ];
        } else {
            self.params[0] = MASKED;
        }
    }
}

/// Cache cell of a tile inside the toroidal window.
pub(crate) fn cell_index(coord: TileCoord) -> usize {
    let cell_x = coord.x % TILE_PER_LEVEL;
    let cell_y = coord.y % TILE_PER_LEVEL;
    (cell_y * TILE_PER_LEVEL + cell_x) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSetFull;

/// Ordered levels, finest first, bounded by the number of shader slots.
#[derive(Debug)]
pub struct LevelSet<I> {
    levels: Vec<Level<I>>,
}

impl<I> Default for LevelSet<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> LevelSet<I> {
    pub const CAPACITY: usize = MAX_LEVELS;

    pub fn new() -> Self {
        Self {
            levels: Vec::with_capacity(Self::CAPACITY),
        }
    }

    pub fn push(&mut self, level: Level<I>) -> Result<(), LevelSetFull> {
        if self.levels.len() >= Self::CAPACITY {
            return Err(LevelSetFull);
        }
        self.levels.push(level);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Level<I>> {
        self.levels.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Level<I>> + '_ {
        self.levels.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Level<I>> + '_ {
        self.levels.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_when_base_fits_window() {
        let levels = level_geometry(3, 4);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].tile_offset, 1);
        assert_eq!(levels[0].initial_params(), [-1.0, 0.0, 0.0, 0.75]);
    }

    #[test]
    fn halving_rounds_up_and_offsets_accumulate() {
        let levels = level_geometry(37, 9);
        let dims: Vec<(u32, u32)> = levels
            .iter()
            .map(|level| (level.tiles_wide, level.tiles_high))
            .collect();
        assert_eq!(dims, vec![(37, 9), (19, 5), (10, 3), (5, 2), (3, 1)]);
        assert_eq!(levels[0].tile_offset, 1);
        assert_eq!(levels[1].tile_offset, 1 + 37 * 9);
        assert_eq!(levels[4].tile_offset, levels[3].tile_offset + 10);
    }

    #[test]
    fn level_count_matches_log2_of_base() {
        for (wide, high) in [(5, 5), (8, 3), (16, 16), (17, 2), (256, 40), (1000, 1000)] {
            let largest = wide.max(high) as f64;
            let expected = (largest / TILE_PER_LEVEL as f64).log2().ceil() as usize + 1;
            assert_eq!(level_geometry(wide, high).len(), expected, "{wide}x{high}");
        }
    }

    #[test]
    fn file_tile_index_is_row_major_from_offset() {
        let level = level_geometry(10, 10)[1];
        assert_eq!(level.tiles_wide, 5);
        assert_eq!(level.file_tile_index(TileCoord { x: 2, y: 3 }), 101 + 3 * 5 + 2);
    }

    #[test]
    fn level_set_rejects_past_capacity() {
        let mut set = LevelSet::new();
        for geometry in level_geometry(256, 256) {
            set.push(Level::new(geometry, ())).unwrap();
        }
        assert_eq!(set.len(), MAX_LEVELS);
        let extra = Level::new(level_geometry(1, 1)[0], ());
        assert_eq!(set.push(extra), Err(LevelSetFull));
    }

    #[test]
    fn invalidate_clears_residency_and_masks() {
        let geometry = level_geometry(2, 2)[0];
        let mut level = Level::new(geometry, ());
        let window = FootprintWindow::around([0.5, 0.5], &geometry);
        for coord in window.iter_tiles() {
            level.mark_resident(coord);
        }
        level.refresh(&window);
        assert!(level.is_valid());
        assert_eq!(level.params()[0], 1.0);

        level.invalidate();
        assert!(!level.is_valid());
        assert_eq!(level.resident_cells(), 0);
        assert_eq!(level.params()[0], MASKED);
    }
}
