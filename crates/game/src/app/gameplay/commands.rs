use engine::{Direction, InputAction};

const MAX_MOVE_REPEAT: u32 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GameCommand {
    Help,
    Move { direction: Direction, count: u32 },
    Interact,
    Stop,
    Reset,
    New { id: Option<String> },
    Delete { id: String },
    Switch { id: String },
    Script { payload: String },
    Run,
    Hold { keys: Vec<InputAction> },
    /// Empty `keys` releases everything.
    Release { keys: Vec<InputAction> },
    Wait { ticks: u32 },
    Dump,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandParseError {
    pub(crate) reason: String,
    pub(crate) usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

/// Parses the whitespace-split arguments; `rest` is the raw text after the command name.
type ParseFn = fn(&[&str], &str) -> Result<GameCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

impl CommandSpec {
    fn usage(&self) -> String {
        if self.arg_schema.is_empty() {
            self.name.to_string()
        } else {
            format!("{} {}", self.name, self.arg_schema)
        }
    }
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
}

impl CommandRegistry {
    pub(crate) fn with_builtins() -> Self {
        Self {
            specs: vec![
                entry("help", "List commands", "", parse_help),
                entry(
                    "move",
                    "Queue moves on the active character",
                    "<up|down|left|right> [count:u32]",
                    parse_move,
                ),
                entry("interact", "Queue a harvest of adjacent objects", "", parse_interact),
                entry("stop", "Clear the active character's queue", "", parse_stop),
                entry("reset", "Stop and return the active character to spawn", "", parse_reset),
                entry("new", "Create a character near spawn and select it", "[id]", parse_new),
                entry("delete", "Delete a character", "<id>", parse_delete),
                entry("switch", "Select another character", "<id>", parse_switch),
                entry(
                    "script",
                    "Replace the active character's script",
                    "<xml...>",
                    parse_script,
                ),
                entry("run", "Compile the active script and queue its actions", "", parse_run),
                entry("hold", "Hold keys for manual control", "<w|a|s|d|shift...>", parse_hold),
                entry("release", "Release held keys (all when none given)", "[keys...]", parse_release),
                entry("wait", "Advance the loop", "<ticks:u32>", parse_wait),
                entry("dump", "Print roster state as JSON", "", parse_dump),
                entry("quit", "Stop processing commands", "", parse_quit),
            ],
        }
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(input_name))
    }

    /// Help lines in registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| format!("{} - {}", spec.usage(), spec.help))
            .collect()
    }

    /// Parses one non-empty line. Callers strip comments and blank lines first.
    pub(crate) fn parse_line(&self, line: &str) -> Result<GameCommand, CommandParseError> {
        let trimmed = line.trim();
        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };
        let Some(spec) = self.lookup(name) else {
            return Err(CommandParseError::new(
                format!("unknown command '{name}'"),
                "help",
            ));
        };
        let args = rest.split_whitespace().collect::<Vec<_>>();
        (spec.parse)(&args, rest).map_err(|mut error| {
            if error.usage.is_empty() {
                error.usage = spec.usage();
            }
            error
        })
    }
}

fn entry(
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
) -> CommandSpec {
    CommandSpec {
        name,
        help,
        arg_schema,
        parse,
    }
}

/// Command lines from a script file: blank lines and `#` comments dropped.
pub(crate) fn parse_script_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

fn require_no_args(args: &[&str]) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("takes no arguments", ""))
    }
}

fn exactly_one<'a>(args: &[&'a str], what: &str) -> Result<&'a str, CommandParseError> {
    match args {
        [value] => Ok(*value),
        [] => Err(CommandParseError::new(
            format!("missing required argument <{what}>"),
            "",
        )),
        _ => Err(CommandParseError::new("too many arguments", "")),
    }
}

fn parse_keys(args: &[&str]) -> Result<Vec<InputAction>, CommandParseError> {
    args.iter()
        .map(|name| {
            InputAction::from_key_name(name)
                .ok_or_else(|| CommandParseError::new(format!("unknown key '{name}'"), ""))
        })
        .collect()
}

fn parse_help(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Help)
}

fn parse_move(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    let (token, count) = match args {
        [token] => (*token, 1),
        [token, count] => {
            let count = count.parse::<u32>().map_err(|_| {
                CommandParseError::new(format!("invalid count '{count}' (expected u32)"), "")
            })?;
            (*token, count)
        }
        [] => {
            return Err(CommandParseError::new(
                "missing required argument <direction>",
                "",
            ))
        }
        _ => return Err(CommandParseError::new("too many arguments", "")),
    };
    let direction = Direction::from_token(token)
        .ok_or_else(|| CommandParseError::new(format!("unknown direction '{token}'"), ""))?;
    if count == 0 || count > MAX_MOVE_REPEAT {
        return Err(CommandParseError::new(
            format!("count must be between 1 and {MAX_MOVE_REPEAT}"),
            "",
        ));
    }
    Ok(GameCommand::Move { direction, count })
}

fn parse_interact(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Interact)
}

fn parse_stop(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Stop)
}

fn parse_reset(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Reset)
}

fn parse_new(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    match args {
        [] => Ok(GameCommand::New { id: None }),
        [id] => Ok(GameCommand::New {
            id: Some((*id).to_string()),
        }),
        _ => Err(CommandParseError::new("too many arguments", "")),
    }
}

fn parse_delete(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    let id = exactly_one(args, "id")?;
    Ok(GameCommand::Delete { id: id.to_string() })
}

fn parse_switch(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    let id = exactly_one(args, "id")?;
    Ok(GameCommand::Switch { id: id.to_string() })
}

fn parse_script(_args: &[&str], rest: &str) -> Result<GameCommand, CommandParseError> {
    if rest.is_empty() {
        return Err(CommandParseError::new(
            "missing required argument <xml...>",
            "",
        ));
    }
    Ok(GameCommand::Script {
        payload: rest.to_string(),
    })
}

fn parse_run(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Run)
}

fn parse_hold(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::new("missing required argument <keys...>", ""));
    }
    Ok(GameCommand::Hold {
        keys: parse_keys(args)?,
    })
}

fn parse_release(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    Ok(GameCommand::Release {
        keys: parse_keys(args)?,
    })
}

fn parse_wait(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    let raw = exactly_one(args, "ticks")?;
    let ticks = raw
        .parse::<u32>()
        .map_err(|_| CommandParseError::new(format!("invalid ticks '{raw}' (expected u32)"), ""))?;
    Ok(GameCommand::Wait { ticks })
}

fn parse_dump(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Dump)
}

fn parse_quit(args: &[&str], _rest: &str) -> Result<GameCommand, CommandParseError> {
    require_no_args(args)?;
    Ok(GameCommand::Quit)
}
