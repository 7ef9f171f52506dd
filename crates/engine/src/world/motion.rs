use super::{Action, Character, MotionRecord, ObjectKind, TerrainQuery, Vec2, WorldConfig};

const HARVEST_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub count: u32,
    /// Distinct kinds in the order they were first harvested.
    pub kinds: Vec<ObjectKind>,
}

impl HarvestReport {
    pub fn succeeded(&self) -> bool {
        self.count > 0
    }
}

/// How the head of the queue was resolved this tick, if it was inspected at all.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadResolution {
    StepStarted { target: Vec2 },
    Blocked { action: Action, target: Vec2 },
    Harvested(HarvestReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub head: Option<HeadResolution>,
    pub step_completed: Option<Vec2>,
}

pub fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Advances one character's queue and motion by `dt_seconds` (already clamped by the caller).
///
/// Only the head action is looked at, and only while no step is in flight. A blocked move or an
/// interact consumes the tick; a move that starts a step is eased on the same tick.
pub fn advance_character(
    character: &mut Character,
    terrain: &mut dyn TerrainQuery,
    config: &WorldConfig,
    dt_seconds: f32,
) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    if character.current_motion.is_none() {
        if let Some(action) = character.action_queue.pop_front() {
            match action {
                Action::Interact => {
                    let report = harvest_around(character, terrain);
                    outcome.head = Some(HeadResolution::Harvested(report));
                    return outcome;
                }
                Action::Move(direction) => {
                    let (dx, dy) = direction.offset();
                    let start = character.position;
                    let target = config.clamp_to_grid(Vec2 {
                        x: start.x + f32::from(dx),
                        y: start.y + f32::from(dy),
                    });
                    if !terrain.walkable(target.x, target.y) {
                        outcome.head = Some(HeadResolution::Blocked { action, target });
                        return outcome;
                    }
                    character.current_motion = Some(MotionRecord {
                        elapsed: 0.0,
                        start,
                        target,
                    });
                    outcome.head = Some(HeadResolution::StepStarted { target });
                }
            }
        }
    }

    let Some(motion) = character.current_motion.as_mut() else {
        return outcome;
    };
    let step_duration = config.step_duration_seconds.max(f32::EPSILON);
    motion.elapsed += dt_seconds / step_duration;
    let t = motion.elapsed.min(1.0);
    let (start, target) = (motion.start, motion.target);

    if t >= 1.0 {
        character.position = target;
        character.current_motion = None;
        outcome.step_completed = Some(target);
    } else {
        character.position = start.lerp(target, smoothstep(t));
    }
    outcome
}

fn harvest_around(character: &mut Character, terrain: &mut dyn TerrainQuery) -> HarvestReport {
    let (cx, cy) = character.position.rounded_cell();
    let mut report = HarvestReport::default();

    for (ox, oy) in HARVEST_OFFSETS {
        let (x, y) = (cx + ox, cy + oy);
        if x < 0 || y < 0 || x as u32 >= terrain.cols() || y as u32 >= terrain.rows() {
            continue;
        }
        let Some(kind) = terrain.harvest(x as f32, y as f32) else {
            continue;
        };
        report.count = report.count.saturating_add(1);
        if !report.kinds.contains(&kind) {
            report.kinds.push(kind);
        }
        character.record_harvest(kind);
    }
    report
}
