//! Center-driven footprint selection.
//!
//! Every level keeps a `TILE_PER_LEVEL` x `TILE_PER_LEVEL` window of tiles
//! around the viewer resident in its cache image. Tiles are addressed
//! toroidally inside the cache, so moving the window only replaces the cells
//! whose tile changed.

use crate::TILE_PER_LEVEL;
use crate::level::LevelGeometry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

/// Tiles of one level that should be resident for a given center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootprintWindow {
    pub origin: TileCoord,
    pub tiles_wide: u32,
    pub tiles_high: u32,
    /// Tile containing the center, clamped to the level.
    pub focus: TileCoord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub tiles_read: usize,
    pub levels_valid: usize,
    /// Tiles wanted by some footprint but deferred by the per-call budget.
    pub pending: usize,
}

impl FootprintWindow {
    /// `center` is in normalized texture space; values outside `[0, 1]`
    /// clamp to the nearest edge window.
    pub fn around(center: [f32; 2], geometry: &LevelGeometry) -> Self {
        let (origin_x, focus_x, span_x) = axis_window(center[0], geometry.tiles_wide);
        let (origin_y, focus_y, span_y) = axis_window(center[1], geometry.tiles_high);
        Self {
            origin: TileCoord {
                x: origin_x,
                y: origin_y,
            },
            tiles_wide: span_x,
            tiles_high: span_y,
            focus: TileCoord {
                x: focus_x,
                y: focus_y,
            },
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_wide as usize * self.tiles_high as usize
    }

    pub fn iter_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.tiles_high).flat_map(move |row| {
            (0..self.tiles_wide).map(move |column| TileCoord {
                x: self.origin.x + column,
                y: self.origin.y + row,
            })
        })
    }

    /// Window tiles ordered nearest-to-focus first; ties keep row-major order.
    pub fn tiles_by_distance(&self) -> Vec<TileCoord> {
        let mut tiles: Vec<TileCoord> = self.iter_tiles().collect();
        tiles.sort_by_key(|coord| {
            let dx = coord.x.abs_diff(self.focus.x);
            let dy = coord.y.abs_diff(self.focus.y);
            dx * dx + dy * dy
        });
        tiles
    }
}

fn axis_window(center: f32, tiles: u32) -> (u32, u32, u32) {
    let span = tiles.min(TILE_PER_LEVEL);
    let max_origin = tiles - span;
    let scaled = (center.clamp(0.0, 1.0) * tiles as f32).floor() as i64;
    let focus = scaled.clamp(0, tiles as i64 - 1) as u32;
    let origin = (scaled - (TILE_PER_LEVEL / 2) as i64).clamp(0, max_origin as i64) as u32;
    (origin, focus, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::level_geometry;

    #[test]
    fn window_centers_on_tile_under_center() {
        let geometry = level_geometry(32, 32)[0];
        let window = FootprintWindow::around([0.5, 0.25], &geometry);
        assert_eq!(window.origin, TileCoord { x: 14, y: 6 });
        assert_eq!(window.focus, TileCoord { x: 16, y: 8 });
        assert_eq!(window.tile_count(), 16);
    }

    #[test]
    fn window_clamps_at_edges() {
        let geometry = level_geometry(32, 32)[0];
        let low = FootprintWindow::around([0.0, -3.0], &geometry);
        assert_eq!(low.origin, TileCoord { x: 0, y: 0 });
        let high = FootprintWindow::around([1.0, 0.999], &geometry);
        assert_eq!(high.origin, TileCoord { x: 28, y: 28 });
        assert_eq!(high.focus, TileCoord { x: 31, y: 31 });
    }

    #[test]
    fn small_level_is_fully_covered() {
        let geometry = level_geometry(3, 2)[0];
        let window = FootprintWindow::around([0.9, 0.9], &geometry);
        assert_eq!(window.origin, TileCoord { x: 0, y: 0 });
        assert_eq!((window.tiles_wide, window.tiles_high), (3, 2));
        assert_eq!(window.iter_tiles().count(), 6);
    }

    #[test]
    fn nearest_tiles_come_first() {
        let geometry = level_geometry(32, 32)[0];
        let window = FootprintWindow::around([0.5, 0.5], &geometry);
        let ordered = window.tiles_by_distance();
        assert_eq!(ordered[0], window.focus);
        assert_eq!(ordered.len(), 16);
        assert_eq!(*ordered.last().unwrap(), TileCoord { x: 14, y: 14 });
    }
}
