//! Spatial grid and A* pathfinder.
//!
//! Every integer coordinate of the map is a node connected to its up to
//! eight in-bounds neighbours.  Straight steps cost 1 and diagonal steps √2;
//! the octile heuristic is admissible for that metric so paths are optimal.
//!
//! Buildings block a fixed 3×3 block around their anchor tile.  Occupancy
//! is rebuilt from the mirror after every snapshot, never patched.

use crate::mirror::GameState;
use crate::types::{TileCoord, Vec2};
use log::debug;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Fixed-point scale for edge costs.
const STRAIGHT: u32 = 1000;
/// √2 × STRAIGHT, rounded down so the heuristic never overestimates.
const DIAGONAL: u32 = 1414;

/// Neighbour offsets in a fixed order so equal-cost ties resolve the same way
/// every run.
const NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Source of intermediate waypoints for the movement simulator.
pub trait Navigator {
    /// Next point to head for on the way from `current` to `target`, or
    /// `None` when no routed step is available.
    fn next_waypoint(&self, current: Vec2, target: Vec2) -> Option<Vec2>;
}

// ---------------------------------------------------------------------------
// Open-set entry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    idx: usize,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, u64) {
        (self.f, self.g, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other.key().cmp(&self.key())
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PathGrid {
    width: i32,
    height: i32,
    disabled: Vec<bool>,
    occupied: Vec<usize>,
}

impl PathGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            disabled: vec![false; (width as usize) * (height as usize)],
            occupied: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Rebuild for a new map size.  Occupancy is cleared.
    pub fn resize(&mut self, width: i32, height: i32) {
        if width != self.width || height != self.height {
            debug!(
                "Resizing path grid {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            *self = PathGrid::new(width, height);
        }
    }

    fn idx(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 || tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        Some((tile.y as usize) * (self.width as usize) + tile.x as usize)
    }

    fn tile_of(&self, idx: usize) -> TileCoord {
        let w = self.width as usize;
        TileCoord::new((idx % w) as i32, (idx / w) as i32)
    }

    /// Out-of-bounds cells are reported as not disabled; they simply are
    /// not nodes.
    pub fn is_disabled(&self, x: i32, y: i32) -> bool {
        self.idx(TileCoord::new(x, y))
            .map(|i| self.disabled[i])
            .unwrap_or(false)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    // ------------------------------------------------------------------
    // Occupancy
    // ------------------------------------------------------------------

    /// Replace occupancy with the 3×3 blocks of every visible own and enemy
    /// building.  Returns the number of blocked cells.
    pub fn update_occupied_tiles(&mut self, state: &GameState) -> usize {
        for i in self.occupied.drain(..) {
            self.disabled[i] = false;
        }

        let anchors: Vec<TileCoord> = state
            .visible_buildings()
            .chain(state.visible_enemy_buildings())
            .map(|b| b.anchor())
            .collect();

        for anchor in anchors {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(i) = self.idx(TileCoord::new(anchor.x + dx, anchor.y + dy)) else {
                        continue;
                    };
                    if !self.disabled[i] {
                        self.disabled[i] = true;
                        self.occupied.push(i);
                    }
                }
            }
        }

        debug!("Occupied tiles updated: {} blocked", self.occupied.len());
        self.occupied.len()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Shortest path between the nearest nodes of `from` and `to`, as cell
    /// centres from start to goal inclusive.  Empty when either endpoint is
    /// off the grid or disabled, or when the goal is unreachable.
    pub fn find_path(&self, from: Vec2, to: Vec2) -> Vec<Vec2> {
        let start = TileCoord::nearest(from);
        let goal = TileCoord::nearest(to);
        match self.a_star(start, goal) {
            Some(cells) => cells.into_iter().map(TileCoord::center).collect(),
            None => {
                debug!("No path from {} to {}", start, goal);
                Vec::new()
            }
        }
    }

    /// Second point of the path from `current` to `target`.
    pub fn next_waypoint(&self, current: Vec2, target: Vec2) -> Option<Vec2> {
        self.find_path(current, target).get(1).copied()
    }

    fn heuristic(a: TileCoord, b: TileCoord) -> u32 {
        let dx = (a.x - b.x).unsigned_abs();
        let dy = (a.y - b.y).unsigned_abs();
        let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
        DIAGONAL * lo + STRAIGHT * (hi - lo)
    }

    fn a_star(&self, start: TileCoord, goal: TileCoord) -> Option<Vec<TileCoord>> {
        let start_idx = self.idx(start)?;
        let goal_idx = self.idx(goal)?;
        if self.disabled[start_idx] || self.disabled[goal_idx] {
            return None;
        }

        let len = self.disabled.len();
        let mut g_score = vec![u32::MAX; len];
        let mut came_from: Vec<Option<usize>> = vec![None; len];
        let mut open = BinaryHeap::new();
        let mut tie: u64 = 0;

        g_score[start_idx] = 0;
        open.push(OpenNode {
            f: Self::heuristic(start, goal),
            g: 0,
            idx: start_idx,
            tie,
        });

        while let Some(node) = open.pop() {
            if node.idx == goal_idx {
                let mut path = vec![goal];
                let mut cur = goal_idx;
                while let Some(prev) = came_from[cur] {
                    cur = prev;
                    path.push(self.tile_of(cur));
                }
                path.reverse();
                return Some(path);
            }
            if node.g != g_score[node.idx] {
                continue; // stale
            }

            let here = self.tile_of(node.idx);
            for (dx, dy) in NEIGHBOURS {
                let next = TileCoord::new(here.x + dx, here.y + dy);
                let Some(n_idx) = self.idx(next) else { continue };
                if self.disabled[n_idx] {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { DIAGONAL } else { STRAIGHT };
                let g = node.g.saturating_add(step);
                if g >= g_score[n_idx] {
                    continue;
                }
                g_score[n_idx] = g;
                came_from[n_idx] = Some(node.idx);
                tie += 1;
                open.push(OpenNode {
                    f: g.saturating_add(Self::heuristic(next, goal)),
                    g,
                    idx: n_idx,
                    tie,
                });
            }
        }

        None
    }
}

impl Navigator for PathGrid {
    fn next_waypoint(&self, current: Vec2, target: Vec2) -> Option<Vec2> {
        PathGrid::next_waypoint(self, current, target)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Snapshot;
    use crate::types::{Building, BuildingState, BuildingType};

    fn house(id: i32, x: f32, y: f32) -> Building {
        Building {
            id,
            owner: 1,
            kind: BuildingType::House,
            x,
            y,
            state: BuildingState::Completed,
            progress: 100,
            hp: 200,
            max_hp: 200,
            visible: true,
            occupied_tiles: Vec::new(),
        }
    }

    #[test]
    fn straight_line_on_empty_grid() {
        let grid = PathGrid::new(8, 8);
        let path = grid.find_path(Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0));
        assert_eq!(path.len(), 4);
        assert_eq!(path[0], Vec2::new(0.0, 0.0));
        assert_eq!(path[3], Vec2::new(3.0, 0.0));
    }

    #[test]
    fn diagonal_is_taken_when_shorter() {
        let grid = PathGrid::new(8, 8);
        let path = grid.find_path(Vec2::new(0.0, 0.0), Vec2::new(3.0, 3.0));
        assert_eq!(path.len(), 4);
        assert_eq!(path[1], Vec2::new(1.0, 1.0));
    }

    #[test]
    fn endpoints_round_to_nearest_node() {
        let grid = PathGrid::new(8, 8);
        let path = grid.find_path(Vec2::new(0.4, 0.6), Vec2::new(2.6, 1.2));
        assert_eq!(path.first(), Some(&Vec2::new(0.0, 1.0)));
        assert_eq!(path.last(), Some(&Vec2::new(3.0, 1.0)));
    }

    #[test]
    fn out_of_bounds_endpoint_yields_empty_path() {
        let grid = PathGrid::new(8, 8);
        assert!(grid.find_path(Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0)).is_empty());
        assert!(grid.next_waypoint(Vec2::new(-3.0, 0.0), Vec2::new(1.0, 0.0)).is_none());
    }

    #[test]
    fn single_point_path_has_no_waypoint() {
        let grid = PathGrid::new(8, 8);
        let p = Vec2::new(2.0, 2.0);
        assert_eq!(grid.find_path(p, p).len(), 1);
        assert!(grid.next_waypoint(p, p).is_none());
    }

    #[test]
    fn occupancy_blocks_three_by_three_and_is_replaced() {
        let mut gs = GameState::new(16, 16);
        let mut snap = Snapshot::new(1);
        snap.map_width = 16;
        snap.map_height = 16;
        snap.buildings = vec![house(1, 5.0, 5.0)];
        gs.apply_snapshot(&snap);

        let mut grid = PathGrid::new(16, 16);
        assert_eq!(grid.update_occupied_tiles(&gs), 9);
        assert!(grid.is_disabled(4, 4));
        assert!(grid.is_disabled(6, 6));
        assert!(!grid.is_disabled(7, 5));

        // Same state twice gives the same grid.
        assert_eq!(grid.update_occupied_tiles(&gs), 9);

        snap.buildings = vec![house(1, 10.0, 10.0)];
        gs.apply_snapshot(&snap);
        grid.update_occupied_tiles(&gs);
        assert!(!grid.is_disabled(5, 5));
        assert!(grid.is_disabled(10, 10));
    }

    #[test]
    fn corner_building_is_clipped_to_grid() {
        let mut gs = GameState::new(16, 16);
        let mut snap = Snapshot::new(1);
        snap.map_width = 16;
        snap.map_height = 16;
        snap.enemy_buildings_in_view = vec![house(2, 0.0, 0.0)];
        gs.apply_snapshot(&snap);

        let mut grid = PathGrid::new(16, 16);
        assert_eq!(grid.update_occupied_tiles(&gs), 4);
    }

    #[test]
    fn disabled_goal_yields_empty_path() {
        let mut gs = GameState::new(16, 16);
        let mut snap = Snapshot::new(1);
        snap.map_width = 16;
        snap.map_height = 16;
        snap.buildings = vec![house(1, 5.0, 5.0)];
        gs.apply_snapshot(&snap);

        let mut grid = PathGrid::new(16, 16);
        grid.update_occupied_tiles(&gs);
        assert!(grid.find_path(Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0)).is_empty());
    }

    #[test]
    fn resize_clears_occupancy() {
        let mut grid = PathGrid::new(4, 4);
        grid.disabled[0] = true;
        grid.occupied.push(0);
        grid.resize(6, 6);
        assert_eq!(grid.width(), 6);
        assert_eq!(grid.occupied_count(), 0);
        assert!(!grid.is_disabled(0, 0));
    }
}
