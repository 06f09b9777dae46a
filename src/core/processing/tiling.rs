//! Fixed-size tile iteration for bounded-memory raster I/O.
//!
//! Reads and writes walk the output grid in square tiles (default edge
//! 2048) so arbitrarily large rasters never have to be resident at once.
//! The grid covers every pixel exactly once for any tile size, so chunk
//! layout cannot change output values.

/// One tile of an output grid, in array coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Square chunking of a (rows x cols) grid.
#[derive(Debug, Clone, Copy)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    tile_size: usize,
}

impl TileGrid {
    pub fn new(rows: usize, cols: usize, tile_size: usize) -> Self {
        // A zero tile size would loop forever; treat it as untiled
        let tile_size = if tile_size == 0 {
            rows.max(cols).max(1)
        } else {
            tile_size
        };
        Self {
            rows,
            cols,
            tile_size,
        }
    }

    /// Single tile spanning the whole grid (tiling disabled).
    pub fn whole(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, rows.max(cols).max(1))
    }

    pub fn tile_count(&self) -> usize {
        let ty = self.rows.div_ceil(self.tile_size);
        let tx = self.cols.div_ceil(self.tile_size);
        ty * tx
    }

    /// Iterate tiles row-major.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        let size = self.tile_size;
        let rows = self.rows;
        let cols = self.cols;
        (0..rows.div_ceil(size)).flat_map(move |ty| {
            (0..cols.div_ceil(size)).map(move |tx| {
                let row_off = ty * size;
                let col_off = tx * size;
                Tile {
                    row_off,
                    col_off,
                    rows: size.min(rows - row_off),
                    cols: size.min(cols - col_off),
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every pixel covered exactly once, for any tile size.
    #[test]
    fn exact_coverage() {
        for (rows, cols) in [(1usize, 1usize), (100, 37), (2048, 2048), (2049, 4097)] {
            for tile_size in [1usize, 7, 100, 2048, 5000] {
                let grid = TileGrid::new(rows, cols, tile_size);
                let mut seen = vec![0u8; rows * cols];
                for tile in grid.tiles() {
                    for r in tile.row_off..tile.row_off + tile.rows {
                        for c in tile.col_off..tile.col_off + tile.cols {
                            seen[r * cols + c] += 1;
                        }
                    }
                }
                assert!(
                    seen.iter().all(|&n| n == 1),
                    "coverage hole for {rows}x{cols} @ {tile_size}"
                );
            }
        }
    }

    #[test]
    fn whole_grid_is_one_tile() {
        let grid = TileGrid::whole(500, 300);
        let tiles: Vec<_> = grid.tiles().collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(
            tiles[0],
            Tile {
                row_off: 0,
                col_off: 0,
                rows: 500,
                cols: 300
            }
        );
    }

    #[test]
    fn tile_count_matches_iteration() {
        let grid = TileGrid::new(1000, 1000, 256);
        assert_eq!(grid.tile_count(), grid.tiles().count());
    }

    #[test]
    fn zero_tile_size_degrades_to_whole() {
        let grid = TileGrid::new(10, 10, 0);
        assert_eq!(grid.tiles().count(), 1);
    }
}
