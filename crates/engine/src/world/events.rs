use super::{Action, ObjectKind, Vec2};

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    CharacterCreated {
        character_id: String,
    },
    CharacterDeleted {
        character_id: String,
    },
    ActiveChanged {
        previous: Option<String>,
        current: Option<String>,
    },
    StepStarted {
        character_id: String,
        target: Vec2,
    },
    StepCompleted {
        character_id: String,
        position: Vec2,
    },
    MoveBlocked {
        character_id: String,
        action: Action,
        target: Vec2,
    },
    Harvested {
        character_id: String,
        count: u32,
        kinds: Vec<ObjectKind>,
    },
    QueueReset {
        character_id: String,
        discarded_actions: usize,
    },
}

impl WorldEvent {
    pub fn kind(&self) -> WorldEventKind {
        match self {
            Self::CharacterCreated { .. } => WorldEventKind::CharacterCreated,
            Self::CharacterDeleted { .. } => WorldEventKind::CharacterDeleted,
            Self::ActiveChanged { .. } => WorldEventKind::ActiveChanged,
            Self::StepStarted { .. } => WorldEventKind::StepStarted,
            Self::StepCompleted { .. } => WorldEventKind::StepCompleted,
            Self::MoveBlocked { .. } => WorldEventKind::MoveBlocked,
            Self::Harvested { .. } => WorldEventKind::Harvested,
            Self::QueueReset { .. } => WorldEventKind::QueueReset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEventKind {
    CharacterCreated,
    CharacterDeleted,
    ActiveChanged,
    StepStarted,
    StepCompleted,
    MoveBlocked,
    Harvested,
    QueueReset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldEventCounts {
    pub total: u32,
    pub steps_started: u32,
    pub steps_completed: u32,
    pub moves_blocked: u32,
    pub harvests: u32,
    pub roster_changes: u32,
}

impl WorldEventCounts {
    fn record(&mut self, kind: WorldEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            WorldEventKind::StepStarted => self.steps_started = self.steps_started.saturating_add(1),
            WorldEventKind::StepCompleted => {
                self.steps_completed = self.steps_completed.saturating_add(1)
            }
            WorldEventKind::MoveBlocked => self.moves_blocked = self.moves_blocked.saturating_add(1),
            WorldEventKind::Harvested => self.harvests = self.harvests.saturating_add(1),
            WorldEventKind::CharacterCreated
            | WorldEventKind::CharacterDeleted
            | WorldEventKind::ActiveChanged
            | WorldEventKind::QueueReset => {
                self.roster_changes = self.roster_changes.saturating_add(1)
            }
        }
    }
}

/// Events emitted since the last drain. Consumers (status line, logs) read them after each
/// tick or registry call; the bus never feeds back into simulation state.
#[derive(Debug, Default)]
pub struct WorldEventBus {
    pending: Vec<WorldEvent>,
    lifetime_counts: WorldEventCounts,
}

impl WorldEventBus {
    pub fn emit(&mut self, event: WorldEvent) {
        self.lifetime_counts.record(event.kind());
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[WorldEvent] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn lifetime_counts(&self) -> WorldEventCounts {
        self.lifetime_counts
    }
}
