use std::io::Write;

use engine::{
    script_digest, Character, InputAction, InputSnapshot, RegistryError, SceneCommand,
    SceneRunner, Simulation, Vec2,
};
use serde_json::json;
use tracing::{debug, info, warn};

use super::commands::{CommandRegistry, GameCommand};
use super::scene::status_for_event;
use super::script::{compile_script, ScriptErrorCode};
use super::world_gen::splitmix64;

const SPAWN_PALETTE: [&str; 6] = [
    "#ff6e6e", "#6eff6e", "#6e6eff", "#ffff6e", "#ff6eff", "#6effff",
];
/// New characters land within `[-3, 2]` cells of spawn on each axis.
const SPAWN_JITTER_CELLS: u64 = 6;
const SPAWN_JITTER_MIN: f32 = -3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DriverSummary {
    pub(crate) executed: usize,
    pub(crate) failed: usize,
    pub(crate) quit_early: bool,
}

/// Executes command lines against a [`SceneRunner`], writing status lines to `out`.
///
/// Held keys persist across `wait` commands until released. Only write failures on `out`
/// abort a run; command errors are reported and skipped.
pub(crate) struct CommandDriver<W: Write> {
    runner: SceneRunner,
    commands: CommandRegistry,
    held: InputSnapshot,
    spawn_rng: u64,
    watched_run: Option<String>,
    out: W,
}

impl<W: Write> CommandDriver<W> {
    pub(crate) fn new(mut runner: SceneRunner, seed: u64, out: W) -> Self {
        runner.load();
        Self {
            runner,
            commands: CommandRegistry::with_builtins(),
            held: InputSnapshot::empty(),
            spawn_rng: seed,
            watched_run: None,
            out,
        }
    }

    pub(crate) fn run_lines(&mut self, lines: &[String]) -> Result<DriverSummary, String> {
        let mut summary = DriverSummary {
            executed: 0,
            failed: 0,
            quit_early: false,
        };
        for line in lines {
            summary.executed += 1;
            match self.execute_line(line)? {
                LineOutcome::Done(Flow::Continue) => {}
                LineOutcome::Done(Flow::Quit) => {
                    summary.quit_early = true;
                    break;
                }
                LineOutcome::Failed => summary.failed += 1,
            }
        }
        info!(
            executed = summary.executed,
            failed = summary.failed,
            quit_early = summary.quit_early,
            "command_script_finished"
        );
        Ok(summary)
    }

    fn execute_line(&mut self, line: &str) -> Result<LineOutcome, String> {
        let command = match self.commands.parse_line(line) {
            Ok(command) => command,
            Err(error) => {
                self.emit(&format!("error: {}. usage: {}", error.reason, error.usage))
                    .map_err(CommandFailure::into_message)?;
                return Ok(LineOutcome::Failed);
            }
        };
        debug!(command = ?command, "command_parsed");
        match self.execute(command) {
            Ok(flow) => Ok(LineOutcome::Done(flow)),
            Err(CommandFailure::Registry(error)) => {
                self.emit(&format!("error: {error}"))
                    .map_err(CommandFailure::into_message)?;
                Ok(LineOutcome::Failed)
            }
            Err(CommandFailure::Output(error)) => Err(error),
        }
    }

    fn execute(&mut self, command: GameCommand) -> Result<Flow, CommandFailure> {
        match command {
            GameCommand::Help => {
                for line in self.commands.help_lines() {
                    self.emit(&line)?;
                }
            }
            GameCommand::Move { direction, count } => {
                for _ in 0..count {
                    self.world().enqueue_move(direction)?;
                }
                let id = self.active_id()?;
                self.emit(&format!(
                    "ok: queued {count} move(s) {} for {id}",
                    direction.as_token()
                ))?;
            }
            GameCommand::Interact => {
                self.world().enqueue_interact()?;
                let id = self.active_id()?;
                self.emit(&format!("ok: queued interact for {id}"))?;
            }
            GameCommand::Stop => {
                self.world().reset_queue()?;
                self.watched_run = None;
                self.emit("Stopped.")?;
            }
            GameCommand::Reset => {
                self.world().reset_active_to_spawn()?;
                self.watched_run = None;
                self.emit("Reset.")?;
            }
            GameCommand::New { id } => {
                let id = self.spawn_character(id.as_deref(), true)?;
                self.emit(&format!("Selected {id}"))?;
            }
            GameCommand::Delete { id } => self.delete_character(&id)?,
            GameCommand::Switch { id } => {
                self.world().switch_active(&id, true)?;
                self.watched_run = None;
                self.emit(&format!("Selected {id}"))?;
            }
            GameCommand::Script { payload } => {
                let digest = script_digest(&payload);
                self.world().edit_active_script(Some(payload))?;
                let id = self.active_id()?;
                self.emit(&format!("ok: script saved for {id} ({digest})"))?;
            }
            GameCommand::Run => self.run_active_script()?,
            GameCommand::Hold { keys } => {
                for key in &keys {
                    self.held = self.held.with_action_down(*key, true);
                }
                self.emit(&format!("ok: holding {}", held_key_names(&self.held)))?;
            }
            GameCommand::Release { keys } => {
                if keys.is_empty() {
                    self.held = InputSnapshot::empty();
                } else {
                    for key in &keys {
                        self.held = self.held.with_action_down(*key, false);
                    }
                }
                self.emit(&format!("ok: holding {}", held_key_names(&self.held)))?;
            }
            GameCommand::Wait { ticks } => return self.wait_ticks(ticks),
            GameCommand::Dump => {
                let dump = roster_dump(self.runner.world());
                self.emit(&dump.to_string())?;
            }
            GameCommand::Quit => {
                info!(reason = "quit_command", "shutdown_requested");
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Compiles the active character's saved script and replaces its queue with the result.
    fn run_active_script(&mut self) -> Result<(), CommandFailure> {
        let active = self
            .runner
            .world()
            .active()
            .ok_or(RegistryError::EmptyRoster)?;
        let id = active.id.clone();
        let Some(payload) = active.script_payload.clone() else {
            return self.emit("Add an 'on start' block.");
        };

        let actions = match compile_script(&payload) {
            Ok(actions) => actions,
            Err(error) if error.code == ScriptErrorCode::MissingStart => {
                return self.emit("Add an 'on start' block.");
            }
            Err(error) => {
                warn!(character_id = %id, error = %error, "script_compile_failed");
                return self.emit(&format!("Run error: {error}"));
            }
        };

        self.world().reset_queue()?;
        for action in &actions {
            self.world().enqueue(Some(&id), *action)?;
        }
        info!(character_id = %id, actions = actions.len(), "script_run_started");
        if actions.is_empty() {
            self.watched_run = None;
            self.emit("No moves queued. Add movement blocks.")
        } else {
            self.watched_run = Some(id.clone());
            self.emit(&format!("Running {id}..."))
        }
    }

    fn delete_character(&mut self, id: &str) -> Result<(), CommandFailure> {
        let was_active = self.runner.world().registry().active_id() == Some(id);
        self.world().delete_character(id)?;
        if self.watched_run.as_deref() == Some(id) {
            self.watched_run = None;
        }
        self.emit(&format!("Deleted {id}"))?;
        if !was_active {
            return Ok(());
        }

        let next = self
            .runner
            .world()
            .registry()
            .active_id()
            .map(ToString::to_string);
        let selected = match next {
            Some(next) => {
                self.world().switch_active(&next, false)?;
                next
            }
            None => self.spawn_character(None, false)?,
        };
        self.emit(&format!("Selected {selected}"))
    }

    /// Creates a character near spawn with a palette color and selects it.
    fn spawn_character(
        &mut self,
        id: Option<&str>,
        save_outgoing: bool,
    ) -> Result<String, CommandFailure> {
        let spawn = self.runner.world().config().spawn;
        let position = Vec2::new(
            spawn.x + self.next_jitter(),
            spawn.y + self.next_jitter(),
        );
        let color = SPAWN_PALETTE[(self.next_random() % SPAWN_PALETTE.len() as u64) as usize];
        let created = self.world().create_character(id, position, color)?;
        self.world().switch_active(&created, save_outgoing)?;
        self.watched_run = None;
        Ok(created)
    }

    fn wait_ticks(&mut self, ticks: u32) -> Result<Flow, CommandFailure> {
        let frame = self.runner.fixed_dt();
        for _ in 0..ticks {
            let report = self.runner.advance_frame(frame, &self.held);
            self.report_events()?;
            if report.command == SceneCommand::Quit {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn report_events(&mut self) -> Result<(), CommandFailure> {
        let events = self.world().drain_events();
        for event in &events {
            if let Some(line) = status_for_event(event) {
                self.emit(&line)?;
            }
        }

        let Some(id) = self.watched_run.clone() else {
            return Ok(());
        };
        let finished = self
            .runner
            .world()
            .registry()
            .get(&id)
            .map_or(true, Character::is_idle);
        if finished {
            self.watched_run = None;
            self.emit(&format!("{id} finished."))?;
        }
        Ok(())
    }

    fn next_random(&mut self) -> u64 {
        self.spawn_rng = self.spawn_rng.wrapping_add(1);
        splitmix64(self.spawn_rng)
    }

    fn next_jitter(&mut self) -> f32 {
        SPAWN_JITTER_MIN + (self.next_random() % SPAWN_JITTER_CELLS) as f32
    }

    fn world(&mut self) -> &mut Simulation {
        self.runner.world_mut()
    }

    fn active_id(&self) -> Result<String, RegistryError> {
        self.runner
            .world()
            .registry()
            .active_id()
            .map(ToString::to_string)
            .ok_or(RegistryError::EmptyRoster)
    }

    fn emit(&mut self, line: &str) -> Result<(), CommandFailure> {
        writeln!(self.out, "{line}")
            .map_err(|error| CommandFailure::Output(format!("failed to write output: {error}")))
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> &SceneRunner {
        &self.runner
    }

    /// Unloads the scene and hands back the world and the output sink.
    pub(crate) fn finish(self) -> (Simulation, W) {
        (self.runner.shutdown(), self.out)
    }
}

enum LineOutcome {
    Done(Flow),
    Failed,
}

enum CommandFailure {
    Registry(RegistryError),
    Output(String),
}

impl CommandFailure {
    fn into_message(self) -> String {
        match self {
            Self::Registry(error) => error.to_string(),
            Self::Output(message) => message,
        }
    }
}

impl From<RegistryError> for CommandFailure {
    fn from(error: RegistryError) -> Self {
        Self::Registry(error)
    }
}

fn held_key_names(input: &InputSnapshot) -> String {
    let names = InputAction::ALL
        .iter()
        .filter(|action| input.is_down(**action))
        .map(|action| action.key_name())
        .collect::<Vec<_>>();
    if names.is_empty() {
        "nothing".to_string()
    } else {
        names.join(" ")
    }
}

fn roster_dump(world: &Simulation) -> serde_json::Value {
    let characters = world
        .registry()
        .list()
        .iter()
        .map(|character| {
            let inventory = character
                .inventory
                .iter()
                .map(|(kind, count)| (kind.as_token().to_string(), json!(count)))
                .collect::<serde_json::Map<_, _>>();
            json!({
                "id": character.id,
                "x": character.position.x,
                "y": character.position.y,
                "color": character.color,
                "queued": character.queue_len(),
                "moving": character.current_motion().is_some(),
                "scriptDigest": character.script_payload.as_deref().map(script_digest),
                "inventory": inventory,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "tick": world.tick_count(),
        "activeId": world.registry().active_id(),
        "characters": characters,
    })
}

#[cfg(test)]
mod tests {
    use engine::{
        GridTerrain, LoopConfig, MemorySaveStore, ObjectKind, WorldConfig, SAVE_KEY,
    };
    use serde_json::Value;

    use super::*;
    use crate::app::gameplay::scene::GridScene;

    const SCRIPT_RIGHT_TWICE: &str = r#"script <xml><block type="on_start"><statement name="DO"><block type="controls_repeat"><field name="TIMES">2</field><statement name="DO"><block type="move_dir"><field name="DIR">RIGHT</field></block></statement></block></statement></block></xml>"#;

    fn config() -> WorldConfig {
        WorldConfig {
            cols: 20,
            rows: 20,
            spawn: Vec2::new(10.0, 10.0),
            ..WorldConfig::default()
        }
    }

    fn driver_with(terrain: GridTerrain, store: MemorySaveStore) -> CommandDriver<Vec<u8>> {
        let world = Simulation::load_or_default(config(), Box::new(terrain), Box::new(store));
        let runner = SceneRunner::new(LoopConfig::default(), Box::new(GridScene::new()), world);
        CommandDriver::new(runner, 7, Vec::new())
    }

    fn driver() -> CommandDriver<Vec<u8>> {
        driver_with(
            GridTerrain::new(20, 20).expect("terrain"),
            MemorySaveStore::new(),
        )
    }

    fn run(driver: &mut CommandDriver<Vec<u8>>, lines: &[&str]) -> DriverSummary {
        let lines = lines.iter().map(ToString::to_string).collect::<Vec<_>>();
        driver.run_lines(&lines).expect("run lines")
    }

    fn output_lines(driver: CommandDriver<Vec<u8>>) -> (Simulation, Vec<String>) {
        let (world, out) = driver.finish();
        let text = String::from_utf8(out).expect("utf8");
        (world, text.lines().map(ToString::to_string).collect())
    }

    #[test]
    fn scripted_run_moves_and_reports_finish() {
        let mut driver = driver();
        let summary = run(&mut driver, &[SCRIPT_RIGHT_TWICE, "run", "wait 60"]);
        assert_eq!(summary.failed, 0);

        let (world, lines) = output_lines(driver);
        assert!(lines.contains(&"Running char_1...".to_string()), "{lines:?}");
        assert!(lines.contains(&"char_1 finished.".to_string()), "{lines:?}");
        assert_eq!(
            world.active().expect("active").position,
            Vec2::new(12.0, 10.0)
        );
    }

    #[test]
    fn run_without_script_or_start_block_reports_status() {
        let mut driver = driver();
        run(
            &mut driver,
            &[
                "run",
                r#"script <xml><block type="move_dir"><field name="DIR">UP</field></block></xml>"#,
                "run",
                r#"script <xml><block type="on_start"/></xml>"#,
                "run",
                "script <xml><block",
                "run",
            ],
        );

        let (_, lines) = output_lines(driver);
        let statuses = lines
            .iter()
            .filter(|line| !line.starts_with("ok:"))
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(statuses[0], "Add an 'on start' block.");
        assert_eq!(statuses[1], "Add an 'on start' block.");
        assert_eq!(statuses[2], "No moves queued. Add movement blocks.");
        assert!(statuses[3].starts_with("Run error: XmlMalformed"), "{statuses:?}");
    }

    #[test]
    fn run_replaces_pending_queue() {
        let mut driver = driver();
        run(&mut driver, &["move left 5", SCRIPT_RIGHT_TWICE, "run"]);

        let active = driver.runner().world().active().expect("active");
        assert_eq!(active.queue_len(), 2);
    }

    #[test]
    fn stop_and_reset_print_statuses() {
        let mut driver = driver();
        run(&mut driver, &["move up 3", "wait 5", "stop", "reset"]);

        let (world, lines) = output_lines(driver);
        assert!(lines.contains(&"Stopped.".to_string()));
        assert!(lines.contains(&"Reset.".to_string()));
        let active = world.active().expect("active");
        assert_eq!(active.position, Vec2::new(10.0, 10.0));
        assert!(active.is_idle());
    }

    #[test]
    fn new_places_character_near_spawn_and_selects_it() {
        let mut driver = driver();
        run(&mut driver, &["new", "new scout"]);

        let (world, lines) = output_lines(driver);
        assert_eq!(lines, vec!["Selected char_2", "Selected scout"]);
        assert_eq!(world.registry().active_id(), Some("scout"));
        for character in world.registry().list() {
            assert!((7.0..=12.0).contains(&character.position.x));
            assert!((7.0..=12.0).contains(&character.position.y));
            if character.id != "char_1" {
                assert!(SPAWN_PALETTE.contains(&character.color.as_str()));
            }
        }
    }

    #[test]
    fn deleting_active_selects_survivor_or_creates_replacement() {
        let mut driver = driver();
        run(&mut driver, &["new scout", "delete scout"]);
        assert_eq!(driver.runner().world().registry().active_id(), Some("char_1"));

        run(&mut driver, &["delete char_1"]);
        let (world, lines) = output_lines(driver);
        assert_eq!(world.registry().len(), 1);
        assert_eq!(world.registry().active_id(), Some("char_1"));
        assert_eq!(lines.last().map(String::as_str), Some("Selected char_1"));
    }

    #[test]
    fn deleting_inactive_keeps_selection() {
        let mut driver = driver();
        run(&mut driver, &["new scout", "switch char_1", "delete scout"]);
        let (world, lines) = output_lines(driver);
        assert_eq!(world.registry().active_id(), Some("char_1"));
        assert_eq!(lines.last().map(String::as_str), Some("Deleted scout"));
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let mut driver = driver();
        let summary = run(&mut driver, &["jump", "switch ghost", "move up"]);
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.failed, 2);

        let (_, lines) = output_lines(driver);
        assert_eq!(lines[0], "error: unknown command 'jump'. usage: help");
        assert!(lines[1].starts_with("error: "), "{lines:?}");
        assert_eq!(lines[2], "ok: queued 1 move(s) up for char_1");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_aborts_the_run() {
        let world = Simulation::load_or_default(
            config(),
            Box::new(GridTerrain::new(20, 20).expect("terrain")),
            Box::new(MemorySaveStore::new()),
        );
        let runner = SceneRunner::new(LoopConfig::default(), Box::new(GridScene::new()), world);
        let mut driver = CommandDriver::new(runner, 7, ClosedPipe);

        for line in ["jump", "switch ghost", "stop"] {
            let error = driver
                .run_lines(&[line.to_string()])
                .expect_err("output is closed");
            assert!(error.contains("failed to write output"), "{error}");
        }
    }

    #[test]
    fn quit_stops_processing() {
        let mut driver = driver();
        let summary = run(&mut driver, &["quit", "move up"]);
        assert!(summary.quit_early);
        assert_eq!(summary.executed, 1);
        assert_eq!(driver.runner().world().active().expect("active").queue_len(), 0);
    }

    #[test]
    fn held_keys_drive_manual_movement_until_released() {
        let mut driver = driver();
        run(&mut driver, &["hold d", "wait 30", "release", "wait 5"]);

        let (world, lines) = output_lines(driver);
        assert!(lines.contains(&"ok: holding d".to_string()), "{lines:?}");
        assert!(lines.contains(&"ok: holding nothing".to_string()), "{lines:?}");
        assert!(world.active().expect("active").position.x > 10.5);
    }

    #[test]
    fn interact_harvests_and_dump_reports_inventory() {
        let mut terrain = GridTerrain::new(20, 20).expect("terrain");
        terrain.place(11, 10, ObjectKind::Tree).expect("place");
        let mut driver = driver_with(terrain, MemorySaveStore::new());
        run(&mut driver, &["interact", "wait 2", "dump"]);

        let (_, lines) = output_lines(driver);
        assert!(lines.contains(&"char_1 harvested 1 (tree)".to_string()), "{lines:?}");
        let dump: Value = serde_json::from_str(lines.last().expect("dump")).expect("json");
        assert_eq!(dump["activeId"], "char_1");
        assert_eq!(dump["characters"][0]["inventory"]["tree"], 1);
    }

    #[test]
    fn scripts_are_saved_and_reloaded() {
        let mut driver = driver();
        run(&mut driver, &[SCRIPT_RIGHT_TWICE]);
        let (world, _) = output_lines(driver);

        let raw = world
            .store()
            .read(SAVE_KEY)
            .expect("read")
            .expect("saved");
        let store = MemorySaveStore::new().with_entry(SAVE_KEY, &raw);
        let world = Simulation::load_or_default(
            config(),
            Box::new(GridTerrain::new(20, 20).expect("terrain")),
            Box::new(store),
        );
        let payload = world
            .active()
            .and_then(|character| character.script_payload.clone())
            .expect("payload");
        assert!(payload.starts_with("<xml>"));
    }
}
