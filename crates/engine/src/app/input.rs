#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Run,
    Quit,
}

const ACTION_COUNT: usize = 6;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::Run,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Run => 4,
            InputAction::Quit => 5,
        }
    }

    /// Maps a key name (`w a s d`, arrow names, `shift`, `escape`) to its action.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "w" | "arrowup" => Some(InputAction::MoveUp),
            "s" | "arrowdown" => Some(InputAction::MoveDown),
            "a" | "arrowleft" => Some(InputAction::MoveLeft),
            "d" | "arrowright" => Some(InputAction::MoveRight),
            "shift" => Some(InputAction::Run),
            "escape" | "esc" => Some(InputAction::Quit),
            _ => None,
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            InputAction::MoveUp => "w",
            InputAction::MoveDown => "s",
            InputAction::MoveLeft => "a",
            InputAction::MoveRight => "d",
            InputAction::Run => "shift",
            InputAction::Quit => "escape",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

/// Held-key state sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.is_down(InputAction::Quit)
    }

    pub fn held(&self) -> impl Iterator<Item = InputAction> + '_ {
        InputAction::ALL
            .into_iter()
            .filter(move |action| self.is_down(*action))
    }

    pub fn is_empty(&self) -> bool {
        self.held().next().is_none()
    }
}
