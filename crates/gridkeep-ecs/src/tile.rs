//! Tile materials and the grid they populate.
//!
//! The grid is mutated only during world generation and by a small set of
//! map-altering action handlers (e.g. clearing forest, building a road).
//! Tile mutation is a first-class state change: it is part of the snapshot
//! and participates in the fingerprint.

use serde::{Deserialize, Serialize};

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Floor,
    Wall,
    Water,
    Road,
    Town,
    Forest,
    Desert,
    Swamp,
    Mountain,
}

impl TileKind {
    /// Movement-cost multiplier applied to an entity's `next_act_at` advance
    /// when it moves onto this tile. Higher is slower.
    pub fn movement_cost(self) -> f64 {
        match self {
            TileKind::Road => 0.7,
            TileKind::Floor | TileKind::Town => 1.0,
            TileKind::Desert => 1.2,
            TileKind::Forest => 1.3,
            TileKind::Swamp => 1.5,
            TileKind::Mountain => 1.8,
            TileKind::Water | TileKind::Wall => f64::INFINITY,
        }
    }

    pub fn is_walkable(self) -> bool {
        !matches!(self, TileKind::Wall | TileKind::Water)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self { kind }
    }

    pub fn movement_cost(self) -> f64 {
        self.kind.movement_cost()
    }

    pub fn is_walkable(self) -> bool {
        self.kind.is_walkable()
    }
}

/// A rectangular grid of tiles, row-major (`index = y * width + x`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn filled(width: i32, height: i32, kind: TileKind) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self {
            width,
            height,
            tiles: vec![Tile::new(kind); (width * height) as usize],
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.within_bounds(self.width, self.height) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    pub fn tile_at(&self, pos: Position) -> Option<Tile> {
        self.index(pos).map(|i| self.tiles[i])
    }

    /// Mutate the tile at `pos`. Returns `false` if `pos` is out of bounds.
    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.tile_at(pos).is_some_and(Tile::is_walkable)
    }

    /// All tiles in row-major order, paired with their position. Used by
    /// snapshot capture and the fingerprint, which hashes every tile in the
    /// grid unconditionally (sorted by position first, see
    /// `Snapshot::fingerprint`).
    pub fn iter(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.tiles.iter().enumerate().map(move |(i, &t)| {
            let x = i as i32 % self.width;
            let y = i as i32 / self.width;
            (Position::new(x, y), t)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_grid_has_uniform_tiles() {
        let grid = Grid::filled(4, 3, TileKind::Floor);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(grid.tile_at(Position::new(x, y)).unwrap().kind, TileKind::Floor);
            }
        }
    }

    #[test]
    fn out_of_bounds_tile_is_none() {
        let grid = Grid::filled(4, 3, TileKind::Floor);
        assert!(grid.tile_at(Position::new(-1, 0)).is_none());
        assert!(grid.tile_at(Position::new(4, 0)).is_none());
    }

    #[test]
    fn set_tile_mutates_and_reports_success() {
        let mut grid = Grid::filled(4, 3, TileKind::Floor);
        assert!(grid.set_tile(Position::new(1, 1), Tile::new(TileKind::Wall)));
        assert_eq!(grid.tile_at(Position::new(1, 1)).unwrap().kind, TileKind::Wall);
        assert!(!grid.set_tile(Position::new(99, 99), Tile::new(TileKind::Wall)));
    }

    #[test]
    fn wall_and_water_are_not_walkable() {
        assert!(!Tile::new(TileKind::Wall).is_walkable());
        assert!(!Tile::new(TileKind::Water).is_walkable());
        assert!(Tile::new(TileKind::Floor).is_walkable());
    }

    #[test]
    fn iter_visits_every_cell_once() {
        let grid = Grid::filled(3, 2, TileKind::Road);
        let count = grid.iter().count();
        assert_eq!(count, 6);
    }
}
