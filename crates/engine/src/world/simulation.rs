use tracing::{debug, info, warn};

use crate::app::InputSnapshot;

use super::motion::{advance_character, HeadResolution, StepOutcome};
use super::persistence::{load_state, save_state, script_digest, write_state, PersistedState};
use super::{
    resolve_manual_movement, Action, Character, CharacterRegistry, Direction, RegistryError,
    SaveStore, TerrainQuery, Vec2, WorldConfig, WorldEvent, WorldEventBus, WorldEventCounts,
};

/// The whole grid world: roster, terrain, save store and the events produced while mutating them.
///
/// Every registry mutation and script edit writes a snapshot to the store. Write failures are
/// logged and otherwise ignored; the in-memory roster stays authoritative.
pub struct Simulation {
    config: WorldConfig,
    registry: CharacterRegistry,
    terrain: Box<dyn TerrainQuery>,
    store: Box<dyn SaveStore>,
    events: WorldEventBus,
    tick_count: u64,
}

impl Simulation {
    pub fn new(
        config: WorldConfig,
        terrain: Box<dyn TerrainQuery>,
        store: Box<dyn SaveStore>,
        registry: CharacterRegistry,
    ) -> Self {
        Self {
            config,
            registry,
            terrain,
            store,
            events: WorldEventBus::default(),
            tick_count: 0,
        }
    }

    /// Restores the saved roster, or seeds a single default character at spawn when nothing
    /// usable is saved. A saved empty roster stays empty.
    pub fn load_or_default(
        config: WorldConfig,
        terrain: Box<dyn TerrainQuery>,
        store: Box<dyn SaveStore>,
    ) -> Self {
        match load_state(store.as_ref()) {
            Some(state) => {
                let registry = state.into_registry(config.default_speed);
                info!(
                    characters = registry.len(),
                    active = registry.active_id().unwrap_or("<none>"),
                    "saved_state_loaded"
                );
                Self::new(config, terrain, store, registry)
            }
            None => {
                let mut simulation = Self::new(config, terrain, store, CharacterRegistry::new());
                let spawn = simulation.config.spawn;
                let color = simulation.config.default_color.clone();
                info!("no_saved_state_creating_default");
                if let Err(error) = simulation.create_character(None, spawn, &color) {
                    warn!(error = %error, "default_character_create_failed");
                }
                simulation
            }
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &CharacterRegistry {
        &self.registry
    }

    pub fn terrain(&self) -> &dyn TerrainQuery {
        self.terrain.as_ref()
    }

    pub fn store(&self) -> &dyn SaveStore {
        self.store.as_ref()
    }

    pub fn active(&self) -> Option<&Character> {
        self.registry.active()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn pending_events(&self) -> &[WorldEvent] {
        self.events.pending()
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.drain()
    }

    pub fn event_counts(&self) -> WorldEventCounts {
        self.events.lifetime_counts()
    }

    /// Snapshot in the persisted shape, without writing it anywhere.
    pub fn snapshot(&self) -> PersistedState {
        save_state(&self.registry)
    }

    /// Advances every character's queue and motion, then applies held input to the active
    /// character. Characters resolve in roster order, so a harvest by an earlier character is
    /// already visible to later ones in the same tick.
    pub fn tick(&mut self, dt_seconds: f32, input: &InputSnapshot) {
        let dt = self.config.clamp_tick_dt(dt_seconds);
        self.tick_count = self.tick_count.saturating_add(1);

        let Self {
            config,
            registry,
            terrain,
            events,
            ..
        } = self;

        for character in registry.list_mut() {
            let outcome = advance_character(character, &mut **terrain, config, dt);
            record_step_outcome(events, character, outcome);
        }

        if let Some(active) = registry.active_mut() {
            resolve_manual_movement(active, &**terrain, config, input, dt);
        }
    }

    pub fn enqueue(
        &mut self,
        character_id: Option<&str>,
        action: Action,
    ) -> Result<(), RegistryError> {
        let character = self.target_mut(character_id)?;
        character.enqueue(action);
        debug!(
            character_id = %character.id,
            action = ?action,
            queued = character.queue_len(),
            "action_enqueued"
        );
        Ok(())
    }

    pub fn enqueue_move(&mut self, direction: Direction) -> Result<(), RegistryError> {
        self.enqueue(None, Action::step(direction))
    }

    pub fn enqueue_interact(&mut self) -> Result<(), RegistryError> {
        self.enqueue(None, Action::Interact)
    }

    /// Drops the active character's pending actions and in-flight step. Idempotent.
    pub fn reset_queue(&mut self) -> Result<(), RegistryError> {
        let id = self
            .registry
            .active_id()
            .ok_or(RegistryError::EmptyRoster)?
            .to_string();
        self.reset_character_queue(&id);
        Ok(())
    }

    /// Stops the active character and puts it back on the spawn cell. Not persisted until the
    /// next mutation.
    pub fn reset_active_to_spawn(&mut self) -> Result<(), RegistryError> {
        self.reset_queue()?;
        let spawn = self.config.clamp_to_grid(self.config.spawn);
        let active = self
            .registry
            .active_mut()
            .ok_or(RegistryError::EmptyRoster)?;
        active.position = spawn;
        info!(character_id = %active.id, x = spawn.x, y = spawn.y, "character_reset_to_spawn");
        Ok(())
    }

    /// Creates a character (fresh `char_N` id when `id` is `None`) and persists the roster.
    pub fn create_character(
        &mut self,
        id: Option<&str>,
        position: Vec2,
        color: &str,
    ) -> Result<String, RegistryError> {
        let previous_active = self.registry.active_id().map(ToString::to_string);
        let position = self.config.clamp_to_grid(position);
        let speed = self.config.default_speed;

        let created_id = match id {
            Some(id) => self.registry.create(id, position, color, speed)?.id.clone(),
            None => self
                .registry
                .create_with_fresh_id(position, color, speed)
                .id
                .clone(),
        };

        info!(
            character_id = %created_id,
            x = position.x,
            y = position.y,
            color,
            "character_created"
        );
        self.events.emit(WorldEvent::CharacterCreated {
            character_id: created_id.clone(),
        });
        self.note_active_change(previous_active);
        self.persist();
        Ok(created_id)
    }

    pub fn delete_character(&mut self, id: &str) -> Result<(), RegistryError> {
        let previous_active = self.registry.active_id().map(ToString::to_string);
        let removed = self.registry.delete(id)?;

        info!(
            character_id = %removed.id,
            discarded_actions = removed.queue_len(),
            remaining = self.registry.len(),
            "character_deleted"
        );
        self.events.emit(WorldEvent::CharacterDeleted {
            character_id: removed.id,
        });
        self.note_active_change(previous_active);
        self.persist();
        Ok(())
    }

    /// Moves the active pointer to `id`. With `save_outgoing` the roster is persisted before the
    /// pointer changes. The incoming character always starts with an empty queue, and the new
    /// selection is persisted afterwards.
    pub fn switch_active(&mut self, id: &str, save_outgoing: bool) -> Result<(), RegistryError> {
        if !self.registry.contains(id) {
            warn!(character_id = id, "switch_unknown_character");
            return Err(RegistryError::NotFound(id.to_string()));
        }
        if save_outgoing {
            self.persist();
        }

        let previous_active = self.registry.active_id().map(ToString::to_string);
        self.registry.set_active(id)?;
        self.reset_character_queue(id);
        info!(
            from = previous_active.as_deref().unwrap_or("<none>"),
            to = id,
            save_outgoing,
            "active_switched"
        );
        self.note_active_change(previous_active);
        self.persist();
        Ok(())
    }

    /// Replaces the active character's script payload and saves immediately.
    pub fn edit_active_script(&mut self, payload: Option<String>) -> Result<(), RegistryError> {
        let active = self
            .registry
            .active_mut()
            .ok_or(RegistryError::EmptyRoster)?;
        match payload.as_deref() {
            Some(text) => debug!(
                character_id = %active.id,
                digest = %script_digest(text),
                bytes = text.len(),
                "script_edited"
            ),
            None => debug!(character_id = %active.id, "script_cleared"),
        }
        active.script_payload = payload;
        self.persist();
        Ok(())
    }

    /// Writes the current roster to the store. Returns whether the write succeeded.
    pub fn persist(&mut self) -> bool {
        let state = save_state(&self.registry);
        match write_state(self.store.as_mut(), &state) {
            Ok(()) => {
                debug!(
                    characters = state.characters.len(),
                    active = state.active_id.as_deref().unwrap_or("<none>"),
                    "state_saved"
                );
                true
            }
            Err(error) => {
                warn!(error = %error, "save_failed");
                false
            }
        }
    }

    fn target_mut(&mut self, character_id: Option<&str>) -> Result<&mut Character, RegistryError> {
        match character_id {
            Some(id) => self.registry.get_mut(id).ok_or_else(|| {
                warn!(character_id = id, "enqueue_unknown_character");
                RegistryError::NotFound(id.to_string())
            }),
            None => self.registry.active_mut().ok_or(RegistryError::EmptyRoster),
        }
    }

    fn reset_character_queue(&mut self, id: &str) {
        let Some(character) = self.registry.get_mut(id) else {
            return;
        };
        if character.is_idle() {
            return;
        }
        let discarded_actions = character.queue_len();
        character.reset_queue();
        debug!(character_id = id, discarded_actions, "queue_reset");
        self.events.emit(WorldEvent::QueueReset {
            character_id: id.to_string(),
            discarded_actions,
        });
    }

    fn note_active_change(&mut self, previous: Option<String>) {
        let current = self.registry.active_id().map(ToString::to_string);
        if previous != current {
            self.events.emit(WorldEvent::ActiveChanged { previous, current });
        }
    }
}

fn record_step_outcome(events: &mut WorldEventBus, character: &Character, outcome: StepOutcome) {
    let character_id = &character.id;
    match outcome.head {
        Some(HeadResolution::StepStarted { target }) => {
            events.emit(WorldEvent::StepStarted {
                character_id: character_id.clone(),
                target,
            });
        }
        Some(HeadResolution::Blocked { action, target }) => {
            debug!(
                character_id = %character_id,
                action = ?action,
                x = target.x,
                y = target.y,
                "move_blocked"
            );
            events.emit(WorldEvent::MoveBlocked {
                character_id: character_id.clone(),
                action,
                target,
            });
        }
        Some(HeadResolution::Harvested(report)) => {
            if report.succeeded() {
                info!(
                    character_id = %character_id,
                    count = report.count,
                    kinds = ?report.kinds,
                    "harvested"
                );
            } else {
                debug!(character_id = %character_id, "nothing_to_harvest");
            }
            events.emit(WorldEvent::Harvested {
                character_id: character_id.clone(),
                count: report.count,
                kinds: report.kinds,
            });
        }
        None => {}
    }

    if let Some(position) = outcome.step_completed {
        events.emit(WorldEvent::StepCompleted {
            character_id: character_id.clone(),
            position,
        });
    }
}
