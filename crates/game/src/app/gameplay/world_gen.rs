use engine::{GridTerrain, ObjectKind, TerrainError, Vec2, WorldConfig};
use tracing::info;

const OBJECT_DENSITY: f64 = 0.05;
const TREE_SHARE: f64 = 0.6;
const SAFE_ZONE_RADIUS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorldGenStats {
    pub(crate) trees: u32,
    pub(crate) rocks: u32,
}

/// Scatters trees and rocks over the grid. The same seed always yields the same layout, and
/// the cells around `spawn` stay clear.
pub(crate) fn generate_terrain(
    config: &WorldConfig,
    seed: u64,
) -> Result<(GridTerrain, WorldGenStats), TerrainError> {
    let mut terrain = GridTerrain::new(config.cols, config.rows)?;
    let mut stats = WorldGenStats { trees: 0, rocks: 0 };

    for y in 0..config.rows as i32 {
        for x in 0..config.cols as i32 {
            if in_safe_zone(x, y, config.spawn) {
                continue;
            }
            let roll = cell_roll(seed, x, y);
            if roll >= OBJECT_DENSITY {
                continue;
            }
            let kind = if roll < OBJECT_DENSITY * TREE_SHARE {
                stats.trees += 1;
                ObjectKind::Tree
            } else {
                stats.rocks += 1;
                ObjectKind::Rock
            };
            terrain.place(x, y, kind)?;
        }
    }

    info!(
        seed,
        cols = config.cols,
        rows = config.rows,
        trees = stats.trees,
        rocks = stats.rocks,
        "terrain_generated"
    );
    Ok((terrain, stats))
}

fn in_safe_zone(x: i32, y: i32, spawn: Vec2) -> bool {
    let (sx, sy) = spawn.rounded_cell();
    (x - sx).abs() < SAFE_ZONE_RADIUS && (y - sy).abs() < SAFE_ZONE_RADIUS
}

/// Uniform value in `[0, 1)` derived from the seed and cell.
fn cell_roll(seed: u64, x: i32, y: i32) -> f64 {
    let cell = (u64::from(x as u32) << 32) | u64::from(y as u32);
    let mixed = splitmix64(seed ^ splitmix64(cell));
    (mixed >> 11) as f64 / (1u64 << 53) as f64
}

pub(crate) fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
