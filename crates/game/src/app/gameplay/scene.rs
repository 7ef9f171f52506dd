use engine::{InputSnapshot, ObjectKind, Scene, SceneCommand, Simulation, WorldEvent};
use tracing::info;

/// Headless scene over the grid world: advances the simulation and reports on shutdown.
#[derive(Debug, Default)]
pub(crate) struct GridScene {
    loaded_characters: usize,
}

impl GridScene {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Scene for GridScene {
    fn load(&mut self, world: &mut Simulation) {
        self.loaded_characters = world.registry().len();
        let active = world.active();
        info!(
            characters = self.loaded_characters,
            active = active.map(|character| character.id.as_str()).unwrap_or("<none>"),
            active_has_script = active.is_some_and(|character| character.script_payload.is_some()),
            "grid_scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut Simulation,
    ) -> SceneCommand {
        if input.quit_requested() {
            info!(reason = "quit_key", "shutdown_requested");
            return SceneCommand::Quit;
        }
        world.tick(fixed_dt_seconds, input);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut Simulation) {
        let saved = world.persist();
        let counts = world.event_counts();
        info!(
            saved,
            characters_at_load = self.loaded_characters,
            characters = world.registry().len(),
            steps_completed = counts.steps_completed,
            moves_blocked = counts.moves_blocked,
            harvests = counts.harvests,
            "grid_scene_unloaded"
        );
    }

    fn debug_title(&self, world: &Simulation) -> Option<String> {
        Some(format!(
            "isogrid | active: {} | characters: {} | tick: {}",
            world.registry().active_id().unwrap_or("-"),
            world.registry().len(),
            world.tick_count()
        ))
    }
}

/// One-line status for events a user would want to see; `None` for the rest.
pub(crate) fn status_for_event(event: &WorldEvent) -> Option<String> {
    match event {
        WorldEvent::Harvested {
            character_id,
            count,
            kinds,
        } if *count > 0 => Some(format!(
            "{character_id} harvested {count} ({})",
            kinds
                .iter()
                .map(|kind| ObjectKind::as_token(*kind))
                .collect::<Vec<_>>()
                .join(", ")
        )),
        WorldEvent::Harvested { character_id, .. } => {
            Some(format!("{character_id} found nothing to harvest"))
        }
        WorldEvent::CharacterCreated { .. }
        | WorldEvent::CharacterDeleted { .. }
        | WorldEvent::ActiveChanged { .. }
        | WorldEvent::StepStarted { .. }
        | WorldEvent::StepCompleted { .. }
        | WorldEvent::MoveBlocked { .. }
        | WorldEvent::QueueReset { .. } => None,
    }
}
