use crate::app::{InputAction, InputSnapshot};

use super::{Character, TerrainQuery, Vec2, WorldConfig};

/// Unit vector for the held direction keys, or zero when nothing (or only opposing keys) is held.
pub fn manual_direction(input: &InputSnapshot) -> Vec2 {
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if input.is_down(InputAction::MoveRight) {
        x += 1.0;
    }
    if input.is_down(InputAction::MoveLeft) {
        x -= 1.0;
    }
    if input.is_down(InputAction::MoveUp) {
        y -= 1.0;
    }
    if input.is_down(InputAction::MoveDown) {
        y += 1.0;
    }

    let len_sq = x * x + y * y;
    if len_sq > 0.0 {
        let inv_len = len_sq.sqrt().recip();
        x *= inv_len;
        y *= inv_len;
    }
    Vec2 { x, y }
}

/// Moves an idle character by held input, sliding along whichever axis is still open.
///
/// Returns `true` when the position changed. Callers decide which character is eligible;
/// this only refuses characters that still have scripted work.
pub fn resolve_manual_movement(
    character: &mut Character,
    terrain: &dyn TerrainQuery,
    config: &WorldConfig,
    input: &InputSnapshot,
    dt_seconds: f32,
) -> bool {
    if !character.is_idle() {
        return false;
    }
    let direction = manual_direction(input);
    if direction == Vec2::default() {
        return false;
    }

    let run = if input.is_down(InputAction::Run) {
        config.run_multiplier
    } else {
        1.0
    };
    let distance = character.speed * run * dt_seconds;
    let current = character.position;
    let next = Vec2 {
        x: current.x + direction.x * distance,
        y: current.y + direction.y * distance,
    };

    let resolved = if terrain.walkable(next.x, next.y) {
        next
    } else if terrain.walkable(next.x, current.y) {
        Vec2 {
            x: next.x,
            y: current.y,
        }
    } else if terrain.walkable(current.x, next.y) {
        Vec2 {
            x: current.x,
            y: next.y,
        }
    } else {
        current
    };

    character.position = config.clamp_to_grid(resolved);
    character.position != current
}
