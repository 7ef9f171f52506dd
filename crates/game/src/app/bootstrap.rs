use std::env;
use std::path::PathBuf;

use engine::{resolve_app_paths, LoopConfig, WorldConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SEED: u64 = 491;

pub(crate) const USAGE: &str = "usage: isogrid [--script <path|->] [--save-dir <dir>] [--seed <u64>] \
[--tps <u32>] [--fresh]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScriptSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CliOptions {
    pub(crate) script: ScriptSource,
    pub(crate) save_dir: Option<PathBuf>,
    pub(crate) seed: u64,
    pub(crate) target_tps: Option<u32>,
    pub(crate) fresh: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            script: ScriptSource::Stdin,
            save_dir: None,
            seed: DEFAULT_SEED,
            target_tps: None,
            fresh: false,
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) world_config: WorldConfig,
    pub(crate) save_dir: PathBuf,
    pub(crate) script: ScriptSource,
    pub(crate) seed: u64,
    pub(crate) fresh: bool,
}

/// Parses the command line and sets up logging. `Ok(None)` means help was printed.
pub(crate) fn build_app() -> Result<Option<AppWiring>, String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(options) = parse_cli_args(&args)? else {
        println!("{USAGE}");
        return Ok(None);
    };

    init_tracing();
    info!("=== isogrid startup ===");

    let save_dir = match options.save_dir {
        Some(dir) => dir,
        None => {
            resolve_app_paths()
                .map_err(|error| format!("failed to resolve app paths: {error}"))?
                .saves_dir
        }
    };
    let mut loop_config = LoopConfig::default();
    if let Some(tps) = options.target_tps {
        loop_config.target_tps = tps;
    }
    info!(
        save_dir = %save_dir.display(),
        seed = options.seed,
        tps = loop_config.target_tps,
        fresh = options.fresh,
        "app_configured"
    );

    Ok(Some(AppWiring {
        loop_config,
        world_config: WorldConfig::default(),
        save_dir,
        script: options.script,
        seed: options.seed,
        fresh: options.fresh,
    }))
}

/// `Ok(None)` when `-h`/`--help` was given.
pub(crate) fn parse_cli_args(args: &[String]) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => return Ok(None),
            "--script" => {
                let value = flag_value(args, index, "--script")?;
                options.script = if value == "-" {
                    ScriptSource::Stdin
                } else {
                    ScriptSource::File(PathBuf::from(value))
                };
                index += 2;
            }
            "--save-dir" => {
                let value = flag_value(args, index, "--save-dir")?;
                options.save_dir = Some(PathBuf::from(value));
                index += 2;
            }
            "--seed" => {
                let value = flag_value(args, index, "--seed")?;
                options.seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --seed value '{value}' (expected u64)"))?;
                index += 2;
            }
            "--tps" => {
                let value = flag_value(args, index, "--tps")?;
                let tps = value
                    .parse::<u32>()
                    .map_err(|_| format!("invalid --tps value '{value}' (expected u32)"))?;
                if tps == 0 {
                    return Err("--tps must be greater than zero".to_string());
                }
                options.target_tps = Some(tps);
                index += 2;
            }
            "--fresh" => {
                options.fresh = true;
                index += 1;
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(Some(options))
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn defaults_read_commands_from_stdin() {
        let options = parse_cli_args(&[]).expect("parse").expect("options");
        assert_eq!(options, CliOptions::default());
        assert_eq!(options.script, ScriptSource::Stdin);
    }

    #[test]
    fn all_flags_parse() {
        let options = parse_cli_args(&args(&[
            "--script",
            "demo.txt",
            "--save-dir",
            "/tmp/saves",
            "--seed",
            "42",
            "--tps",
            "30",
            "--fresh",
        ]))
        .expect("parse")
        .expect("options");

        assert_eq!(options.script, ScriptSource::File(PathBuf::from("demo.txt")));
        assert_eq!(options.save_dir, Some(PathBuf::from("/tmp/saves")));
        assert_eq!(options.seed, 42);
        assert_eq!(options.target_tps, Some(30));
        assert!(options.fresh);
    }

    #[test]
    fn dash_script_means_stdin() {
        let options = parse_cli_args(&args(&["--script", "-"]))
            .expect("parse")
            .expect("options");
        assert_eq!(options.script, ScriptSource::Stdin);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse_cli_args(&args(&["--seed", "1", "-h"])).expect("parse"), None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            parse_cli_args(&args(&["--seed"])).expect_err("missing"),
            "missing value for --seed"
        );
        assert_eq!(
            parse_cli_args(&args(&["--tps", "fast"])).expect_err("invalid"),
            "invalid --tps value 'fast' (expected u32)"
        );
        assert_eq!(
            parse_cli_args(&args(&["--tps", "0"])).expect_err("zero"),
            "--tps must be greater than zero"
        );
        assert_eq!(
            parse_cli_args(&args(&["--verbose"])).expect_err("unknown"),
            "unknown argument '--verbose'"
        );
    }
}
