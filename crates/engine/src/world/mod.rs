mod character;
mod events;
mod manual;
mod motion;
mod persistence;
mod registry;
mod simulation;
mod terrain;

pub use character::{Action, Character, Direction, MotionRecord};
pub use events::{WorldEvent, WorldEventBus, WorldEventCounts, WorldEventKind};
pub use manual::{manual_direction, resolve_manual_movement};
pub use motion::{advance_character, smoothstep, HarvestReport, HeadResolution, StepOutcome};
pub use persistence::{
    load_state, parse_persisted_state, save_state, script_digest, write_state, FileSaveStore,
    MemorySaveStore, PersistedCharacter, PersistedState, PersistenceError, SaveStore, SAVE_KEY,
};
pub use registry::{CharacterRegistry, RegistryError};
pub use simulation::Simulation;
pub use terrain::{GridTerrain, ObjectKind, TerrainError, TerrainQuery};

/// Real-valued grid position. Integral while idle, fractional mid-step or under manual control.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, target: Vec2, s: f32) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * s,
            y: self.y + (target.y - self.y) * s,
        }
    }

    /// Nearest cell, matching how terrain occupancy is looked up.
    pub fn rounded_cell(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

pub const DEFAULT_GRID_COLS: u32 = 100;
pub const DEFAULT_GRID_ROWS: u32 = 100;
pub const STEP_DURATION_SECONDS: f32 = 0.22;
pub const MAX_TICK_DT_SECONDS: f32 = 0.033;
pub const RUN_MULTIPLIER: f32 = 1.75;
pub const DEFAULT_MOVE_SPEED: f32 = 4.8;
pub const DEFAULT_SPAWN: Vec2 = Vec2 { x: 50.0, y: 50.0 };
pub const DEFAULT_CHARACTER_COLOR: &str = "#ffd36e";

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub cols: u32,
    pub rows: u32,
    pub step_duration_seconds: f32,
    pub max_tick_dt_seconds: f32,
    pub run_multiplier: f32,
    pub default_speed: f32,
    pub spawn: Vec2,
    pub default_color: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_GRID_COLS,
            rows: DEFAULT_GRID_ROWS,
            step_duration_seconds: STEP_DURATION_SECONDS,
            max_tick_dt_seconds: MAX_TICK_DT_SECONDS,
            run_multiplier: RUN_MULTIPLIER,
            default_speed: DEFAULT_MOVE_SPEED,
            spawn: DEFAULT_SPAWN,
            default_color: DEFAULT_CHARACTER_COLOR.to_string(),
        }
    }
}

impl WorldConfig {
    /// Clamps a position into `[0, cols-1] x [0, rows-1]`.
    pub fn clamp_to_grid(&self, position: Vec2) -> Vec2 {
        let max_x = self.cols.saturating_sub(1) as f32;
        let max_y = self.rows.saturating_sub(1) as f32;
        Vec2 {
            x: position.x.clamp(0.0, max_x),
            y: position.y.clamp(0.0, max_y),
        }
    }

    /// Non-finite or negative deltas count as zero; everything else is capped.
    pub fn clamp_tick_dt(&self, dt_seconds: f32) -> f32 {
        if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return 0.0;
        }
        dt_seconds.min(self.max_tick_dt_seconds)
    }
}
