//! Fog-of-war state: one boolean per map tile.
//!
//! `visible` is rebuilt from every snapshot; `seen` only ever grows.  Both
//! are flat bit grids sized to the map so point queries are a bounds check
//! and an index.

use crate::types::TileCoord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FogGrid {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl FogGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn idx(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize) * (self.width as usize) + x as usize)
    }

    /// Mark a tile.  Returns false when the tile lies outside the grid.
    pub fn set(&mut self, tile: TileCoord) -> bool {
        match self.idx(tile.x, tile.y) {
            Some(i) => {
                self.cells[i] = true;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.idx(x, y).map(|i| self.cells[i]).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = false);
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Change the extent, keeping every marked tile that still fits.
    pub fn resize(&mut self, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        let mut next = FogGrid::new(width, height);
        for y in 0..self.height.min(next.height) {
            for x in 0..self.width.min(next.width) {
                if self.contains(x, y) {
                    next.set(TileCoord::new(x, y));
                }
            }
        }
        *self = next;
    }

    /// Iterate every marked tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(move |(i, _)| TileCoord::new(i as i32 % width, i as i32 / width))
    }
}
