use std::collections::{BTreeMap, VecDeque};

use super::{ObjectKind, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Grid offset for one step. The y axis grows downward.
    pub const fn offset(self) -> (i8, i8) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// A queued unit of scripted behaviour. A move is always one cardinal cell; diagonal or
/// zero-length moves are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    Interact,
}

impl Action {
    pub const fn step(direction: Direction) -> Self {
        Self::Move(direction)
    }

    /// Grid offset of a move; `None` for actions that stay in place.
    pub const fn offset(self) -> Option<(i8, i8)> {
        match self {
            Self::Move(direction) => Some(direction.offset()),
            Self::Interact => None,
        }
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        Self::step(direction)
    }
}

/// In-flight step. `elapsed` is normalized progress: 1.0 means the step is done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRecord {
    pub elapsed: f32,
    pub start: Vec2,
    pub target: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub id: String,
    pub position: Vec2,
    pub color: String,
    pub speed: f32,
    pub script_payload: Option<String>,
    pub inventory: BTreeMap<ObjectKind, u32>,
    pub(crate) action_queue: VecDeque<Action>,
    pub(crate) current_motion: Option<MotionRecord>,
}

impl Character {
    pub fn new(id: impl Into<String>, position: Vec2, color: impl Into<String>, speed: f32) -> Self {
        Self {
            id: id.into(),
            position,
            color: color.into(),
            speed,
            script_payload: None,
            inventory: BTreeMap::new(),
            action_queue: VecDeque::new(),
            current_motion: None,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.action_queue.len()
    }

    pub fn queued_actions(&self) -> impl Iterator<Item = &Action> {
        self.action_queue.iter()
    }

    pub fn current_motion(&self) -> Option<&MotionRecord> {
        self.current_motion.as_ref()
    }

    /// Idle means nothing queued and nothing in flight; only then may manual input move it.
    pub fn is_idle(&self) -> bool {
        self.action_queue.is_empty() && self.current_motion.is_none()
    }

    pub fn enqueue(&mut self, action: Action) {
        self.action_queue.push_back(action);
    }

    pub fn reset_queue(&mut self) {
        self.action_queue.clear();
        self.current_motion = None;
    }

    pub fn harvested_total(&self) -> u32 {
        self.inventory.values().sum()
    }

    pub(crate) fn record_harvest(&mut self, kind: ObjectKind) {
        let count = self.inventory.entry(kind).or_insert(0);
        *count = count.saturating_add(1);
    }
}
