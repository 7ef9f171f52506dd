use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use engine::{CharacterRegistry, FileSaveStore, SceneRunner, Simulation};
use tracing::{error, info, warn};

use super::bootstrap::{AppWiring, ScriptSource};
use super::gameplay::{
    generate_terrain, parse_script_lines, CommandDriver, DriverSummary, GridScene,
};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let lines = match read_command_lines(&app.script) {
        Ok(lines) => lines,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    match execute(app, &lines, stdout.lock()) {
        Ok(summary) if summary.failed > 0 => {
            warn!(failed = summary.failed, "commands_failed");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

/// Builds the world, runs every command line through the driver and persists on shutdown.
pub(crate) fn execute<W: Write>(
    app: AppWiring,
    lines: &[String],
    out: W,
) -> Result<DriverSummary, String> {
    let (terrain, _) = generate_terrain(&app.world_config, app.seed)
        .map_err(|error| format!("failed to generate terrain: {error}"))?;
    let store = Box::new(FileSaveStore::new(&app.save_dir));

    let world = if app.fresh {
        info!(save_dir = %app.save_dir.display(), "fresh_start_ignoring_save");
        let mut world = Simulation::new(
            app.world_config.clone(),
            Box::new(terrain),
            store,
            CharacterRegistry::new(),
        );
        let spawn = app.world_config.spawn;
        world
            .create_character(None, spawn, &app.world_config.default_color)
            .map_err(|error| format!("failed to create default character: {error}"))?;
        world
    } else {
        Simulation::load_or_default(app.world_config.clone(), Box::new(terrain), store)
    };

    let runner = SceneRunner::new(app.loop_config, Box::new(GridScene::new()), world);
    if let Some(title) = runner.scene_title() {
        info!(title = %title, "scene_ready");
    }
    let mut driver = CommandDriver::new(runner, app.seed, out);
    let summary = driver.run_lines(lines)?;
    let (_world, mut out) = driver.finish();
    out.flush()
        .map_err(|error| format!("failed to flush output: {error}"))?;
    Ok(summary)
}

fn read_command_lines(source: &ScriptSource) -> Result<Vec<String>, String> {
    let content = match source {
        ScriptSource::File(path) => fs::read_to_string(path)
            .map_err(|error| format!("failed to read script '{}': {error}", path.display()))?,
        ScriptSource::Stdin => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .map_err(|error| format!("failed to read commands from stdin: {error}"))?;
            content
        }
    };
    Ok(parse_script_lines(&content))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use engine::{LoopConfig, WorldConfig, SAVE_KEY};
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    fn wiring(save_dir: &Path, fresh: bool) -> AppWiring {
        AppWiring {
            loop_config: LoopConfig::default(),
            world_config: WorldConfig::default(),
            save_dir: save_dir.to_path_buf(),
            script: ScriptSource::Stdin,
            seed: 3,
            fresh,
        }
    }

    fn run_script(save_dir: &Path, fresh: bool, script: &str) -> (DriverSummary, Vec<String>) {
        let lines = parse_script_lines(script);
        let mut out = Vec::new();
        let summary = execute(wiring(save_dir, fresh), &lines, &mut out).expect("execute");
        let text = String::from_utf8(out).expect("utf8");
        (summary, text.lines().map(ToString::to_string).collect())
    }

    fn saved(save_dir: &Path) -> Value {
        let raw = fs::read_to_string(save_dir.join(format!("{SAVE_KEY}.json"))).expect("save");
        serde_json::from_str(&raw).expect("json")
    }

    #[test]
    fn session_state_survives_restart() {
        let temp = TempDir::new().expect("temp");
        let (summary, _) = run_script(
            temp.path(),
            false,
            "# first session\nnew scout\nmove right 2\nwait 40\n",
        );
        assert_eq!(summary.failed, 0);

        let state = saved(temp.path());
        assert_eq!(state["activeId"], "scout");
        assert_eq!(state["characters"].as_array().map(Vec::len), Some(2));

        let (_, lines) = run_script(temp.path(), false, "dump\n");
        let dump: Value = serde_json::from_str(&lines[0]).expect("dump");
        assert_eq!(dump["activeId"], "scout");
        assert_eq!(dump["characters"][1]["queued"], 0);
    }

    #[test]
    fn fresh_start_overwrites_previous_roster() {
        let temp = TempDir::new().expect("temp");
        run_script(temp.path(), false, "new scout\n");

        let (_, lines) = run_script(temp.path(), true, "dump\n");
        let dump: Value = serde_json::from_str(&lines[0]).expect("dump");
        assert_eq!(dump["activeId"], "char_1");
        assert_eq!(dump["characters"].as_array().map(Vec::len), Some(1));
        let spawn = WorldConfig::default().spawn;
        assert_eq!(dump["characters"][0]["x"], f64::from(spawn.x));
        assert_eq!(saved(temp.path())["characters"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let temp = TempDir::new().expect("temp");
        let (summary, lines) = run_script(temp.path(), false, "\n# nothing\n\nstop\n");
        assert_eq!(summary.executed, 1);
        assert_eq!(lines, vec!["Stopped."]);
    }
}
