use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Tree,
    Rock,
}

impl ObjectKind {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Rock => "rock",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "tree" => Some(Self::Tree),
            "rock" => Some(Self::Rock),
            _ => None,
        }
    }

    pub fn is_harvestable(self) -> bool {
        match self {
            Self::Tree | Self::Rock => true,
        }
    }
}

/// Read/consume access to the terrain shared by every character.
///
/// Coordinates are real-valued grid positions. Bounds are checked on the raw value
/// (`0 <= x < cols`); object lookups use the rounded cell.
pub trait TerrainQuery {
    fn cols(&self) -> u32;
    fn rows(&self) -> u32;
    fn walkable(&self, x: f32, y: f32) -> bool;
    fn harvestable_at(&self, x: f32, y: f32) -> Option<ObjectKind>;
    /// Removes and returns the harvestable object at the rounded cell. The removal is visible
    /// to every later query, including other characters resolving in the same tick.
    fn harvest(&mut self, x: f32, y: f32) -> Option<ObjectKind>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TerrainError {
    #[error("terrain dimensions must be non-zero, got {cols}x{rows}")]
    EmptyGrid { cols: u32, rows: u32 },
    #[error("cell ({x},{y}) is outside a {cols}x{rows} grid")]
    OutOfBounds { x: i32, y: i32, cols: u32, rows: u32 },
}

/// Sparse object map over a fixed-size grid. Empty cells are walkable ground.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridTerrain {
    cols: u32,
    rows: u32,
    objects: HashMap<(i32, i32), ObjectKind>,
}

impl GridTerrain {
    pub fn new(cols: u32, rows: u32) -> Result<Self, TerrainError> {
        if cols == 0 || rows == 0 {
            return Err(TerrainError::EmptyGrid { cols, rows });
        }
        Ok(Self {
            cols,
            rows,
            objects: HashMap::new(),
        })
    }

    pub fn place(&mut self, x: i32, y: i32, kind: ObjectKind) -> Result<(), TerrainError> {
        if !self.cell_in_bounds(x, y) {
            return Err(TerrainError::OutOfBounds {
                x,
                y,
                cols: self.cols,
                rows: self.rows,
            });
        }
        self.objects.insert((x, y), kind);
        Ok(())
    }

    pub fn object_at_cell(&self, x: i32, y: i32) -> Option<ObjectKind> {
        self.objects.get(&(x, y)).copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn cell_in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.cols && (y as u32) < self.rows
    }

    fn position_in_bounds(&self, x: f32, y: f32) -> bool {
        x.is_finite()
            && y.is_finite()
            && x >= 0.0
            && y >= 0.0
            && x < self.cols as f32
            && y < self.rows as f32
    }
}

fn rounded(x: f32, y: f32) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

impl TerrainQuery for GridTerrain {
    fn cols(&self) -> u32 {
        self.cols
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn walkable(&self, x: f32, y: f32) -> bool {
        if !self.position_in_bounds(x, y) {
            return false;
        }
        !self.objects.contains_key(&rounded(x, y))
    }

    fn harvestable_at(&self, x: f32, y: f32) -> Option<ObjectKind> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.objects
            .get(&rounded(x, y))
            .copied()
            .filter(|kind| kind.is_harvestable())
    }

    fn harvest(&mut self, x: f32, y: f32) -> Option<ObjectKind> {
        self.harvestable_at(x, y)?;
        self.objects.remove(&rounded(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain_with(objects: &[(i32, i32, ObjectKind)]) -> GridTerrain {
        let mut terrain = GridTerrain::new(10, 10).expect("terrain");
        for (x, y, kind) in objects {
            terrain.place(*x, *y, *kind).expect("place");
        }
        terrain
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert_eq!(
            GridTerrain::new(0, 5),
            Err(TerrainError::EmptyGrid { cols: 0, rows: 5 })
        );
    }

    #[test]
    fn place_rejects_out_of_bounds_cells() {
        let mut terrain = GridTerrain::new(4, 4).expect("terrain");
        assert!(matches!(
            terrain.place(4, 0, ObjectKind::Rock),
            Err(TerrainError::OutOfBounds { x: 4, y: 0, .. })
        ));
        assert_eq!(terrain.object_count(), 0);
    }

    #[test]
    fn walkable_checks_bounds_on_raw_coordinates() {
        let terrain = terrain_with(&[]);
        assert!(terrain.walkable(0.0, 0.0));
        assert!(terrain.walkable(9.0, 9.0));
        assert!(terrain.walkable(9.4, 9.4));
        assert!(!terrain.walkable(-0.01, 3.0));
        assert!(!terrain.walkable(10.0, 3.0));
        assert!(!terrain.walkable(3.0, f32::NAN));
    }

    #[test]
    fn walkable_checks_occupancy_on_rounded_cell() {
        let terrain = terrain_with(&[(6, 5, ObjectKind::Tree)]);
        assert!(!terrain.walkable(6.0, 5.0));
        assert!(!terrain.walkable(5.6, 5.3));
        assert!(terrain.walkable(5.4, 5.0));
    }

    #[test]
    fn harvest_removes_object_exactly_once() {
        let mut terrain = terrain_with(&[(2, 2, ObjectKind::Rock)]);
        assert_eq!(terrain.harvestable_at(2.2, 1.9), Some(ObjectKind::Rock));
        assert_eq!(terrain.harvest(2.0, 2.0), Some(ObjectKind::Rock));
        assert_eq!(terrain.harvest(2.0, 2.0), None);
        assert!(terrain.walkable(2.0, 2.0));
        assert_eq!(terrain.object_count(), 0);
    }

    #[test]
    fn harvest_on_empty_cell_returns_none() {
        let mut terrain = terrain_with(&[(1, 1, ObjectKind::Tree)]);
        assert_eq!(terrain.harvest(3.0, 3.0), None);
        assert_eq!(terrain.object_count(), 1);
    }
}
