//! Command-line argument parsing.
//!
//! `duskswitch` with no command (or `run`) starts the service. Every other
//! command is a one-shot client that talks to the running service over the
//! command socket, or signals it directly for `stop` and `reload`.

use crate::events::HotkeyAction;
use crate::ipc::Command;

/// What the command line asks for.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Start the service.
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Send one command to the running service and print the answer.
    Send {
        debug_enabled: bool,
        config_dir: Option<String>,
        command: Command,
    },
    Status {
        debug_enabled: bool,
        config_dir: Option<String>,
        json: bool,
    },
    Stop {
        debug_enabled: bool,
    },
    Reload {
        debug_enabled: bool,
    },
    /// `help <command>`
    HelpCommand {
        command: String,
    },
    ShowHelp,
    ShowVersion,
    /// Unknown or malformed arguments; carries the problem.
    ShowHelpDueToError(String),
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse the process arguments.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }

    /// Parse `args`, whose first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ParsedArgs {
            action: parse_action(args.into_iter().skip(1).map(|s| s.as_ref().to_string())),
        }
    }
}

fn parse_action(args: impl Iterator<Item = String>) -> CliAction {
    let mut debug_enabled = false;
    let mut json = false;
    let mut config_dir: Option<String> = None;
    let mut log_file: Option<String> = None;
    let mut words: Vec<String> = Vec::new();

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return CliAction::ShowHelp,
            "-V" | "-v" | "--version" => return CliAction::ShowVersion,
            "-d" | "--debug" => debug_enabled = true,
            "--json" => json = true,
            "-c" | "--config" => match args.next() {
                Some(dir) => config_dir = Some(dir),
                None => return error("--config requires a directory"),
            },
            "-l" | "--log" => match args.next() {
                Some(file) => log_file = Some(file),
                None => return error("--log requires a file path"),
            },
            // Negative numbers are values, not flags
            flag if flag.starts_with('-') && flag.parse::<i64>().is_err() => {
                return error(&format!("Unknown option '{flag}'"));
            }
            _ => words.push(arg),
        }
    }

    let mut words = words.into_iter();
    let Some(verb) = words.next() else {
        return CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        };
    };
    let rest: Vec<String> = words.collect();

    let send = |command: Command| CliAction::Send {
        debug_enabled,
        config_dir: config_dir.clone(),
        command,
    };

    let action = match (verb.as_str(), rest.as_slice()) {
        ("run", []) => CliAction::Run {
            debug_enabled,
            config_dir: config_dir.clone(),
            log_file: log_file.clone(),
        },
        ("help", []) => CliAction::ShowHelp,
        ("help", [command]) => CliAction::HelpCommand {
            command: command.clone(),
        },
        ("version", []) => CliAction::ShowVersion,
        ("stop", []) => CliAction::Stop { debug_enabled },
        ("reload", []) => CliAction::Reload { debug_enabled },
        ("status", []) => CliAction::Status {
            debug_enabled,
            config_dir: config_dir.clone(),
            json,
        },
        ("check", []) => send(Command::RequestSwitch),
        ("switch", []) => send(Command::Switch),
        ("light", []) => send(Command::Light),
        ("dark", []) => send(Command::Dark),
        ("force", [target]) => match target.as_str() {
            "light" => send(Command::ForceLight),
            "dark" => send(Command::ForceDark),
            "none" | "off" => send(Command::NoForce),
            other => return error(&format!("Unknown force target '{other}'")),
        },
        ("skip", []) => send(Command::ToggleSkipNext),
        ("delay", [minutes]) => match minutes.parse::<i64>() {
            Ok(minutes) => send(Command::DelayBy { minutes }),
            Err(_) => return error(&format!("Invalid number of minutes '{minutes}'")),
        },
        ("clear", []) => send(Command::ClearPostponeQueue),
        ("postpones", []) => send(Command::GetPostponeStatus),
        ("requested", []) => send(Command::GetRequestedTheme),
        ("names", []) => send(Command::GetLearnedThemeNames),
        ("hotkey", [action]) => match action.parse::<HotkeyAction>() {
            Ok(action) => send(Command::Hotkey { action }),
            Err(e) => return error(&e.to_string()),
        },
        (verb, _) if is_known_command(verb) => {
            return error(&format!("Wrong arguments for '{verb}'"));
        }
        (verb, _) => return error(&format!("Unknown command '{verb}'")),
    };

    if json && !matches!(action, CliAction::Status { .. }) {
        return error("--json is only supported by 'status'");
    }
    action
}

const COMMANDS: &[&str] = &[
    "run", "help", "version", "stop", "reload", "status", "check", "switch", "light", "dark",
    "force", "skip", "delay", "clear", "postpones", "requested", "names", "hotkey",
];

pub fn is_known_command(name: &str) -> bool {
    COMMANDS.contains(&name)
}

fn error(message: &str) -> CliAction {
    CliAction::ShowHelpDueToError(message.to_string())
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    log_end!();
}

/// Displays the full help text.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("duskswitch [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-l, --log <file>       Also write the service log to a file");
    log_indented!("    --json             Print 'status' as JSON");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Service:");
    log_indented!("run                    Start the service (default)");
    log_indented!("stop                   Stop the running service");
    log_indented!("reload                 Reload the configuration");
    log_indented!("status                 Show themes, schedule and postpones");
    log_block_start!("Themes:");
    log_indented!("switch                 Switch to the other theme until the next boundary");
    log_indented!("light, dark            Switch to a theme until the next boundary");
    log_indented!("force <light|dark|none> Pin a theme or release the pin");
    log_indented!("check                  Re-evaluate the schedule now");
    log_block_start!("Postpones:");
    log_indented!("skip                   Toggle skipping the next automatic switch");
    log_indented!("delay <minutes>        Hold automatic switching for a while");
    log_indented!("clear                  Drop all user postpones");
    log_indented!("postpones              List active postpones");
    log_block_start!("Other:");
    log_indented!("hotkey <action>        Run a hotkey action");
    log_indented!("requested              Print the last requested theme");
    log_indented!("names                  Print the learned theme names");
    log_indented!("help <command>         Detailed help for one command");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        let mut full = vec!["duskswitch"];
        full.extend_from_slice(args);
        ParsedArgs::parse(full).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                log_file: None,
            }
        );
    }

    #[test]
    fn test_parse_run_with_flags() {
        assert_eq!(
            parse(&["run", "-d", "--config", "/tmp/conf", "--log", "/tmp/ds.log"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/conf".to_string()),
                log_file: Some("/tmp/ds.log".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_help_and_version_take_precedence() {
        assert_eq!(parse(&["delay", "5", "--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(
            parse(&["help", "delay"]),
            CliAction::HelpCommand {
                command: "delay".to_string()
            }
        );
    }

    #[test]
    fn test_parse_client_commands() {
        let command = |args: &[&str]| match parse(args) {
            CliAction::Send { command, .. } => command,
            other => panic!("expected a client command, got {other:?}"),
        };

        assert_eq!(command(&["switch"]), Command::Switch);
        assert_eq!(command(&["force", "dark"]), Command::ForceDark);
        assert_eq!(command(&["force", "none"]), Command::NoForce);
        assert_eq!(command(&["delay", "45"]), Command::DelayBy { minutes: 45 });
        assert_eq!(command(&["delay", "-5"]), Command::DelayBy { minutes: -5 });
        assert_eq!(
            command(&["hotkey", "toggle_postpone"]),
            Command::Hotkey {
                action: HotkeyAction::TogglePostpone
            }
        );
    }

    #[test]
    fn test_parse_status_json() {
        assert_eq!(
            parse(&["status", "--json"]),
            CliAction::Status {
                debug_enabled: false,
                config_dir: None,
                json: true,
            }
        );
        assert!(matches!(
            parse(&["skip", "--json"]),
            CliAction::ShowHelpDueToError(_)
        ));
    }

    #[test]
    fn test_parse_errors() {
        for args in [
            &["frobnicate"][..],
            &["delay"],
            &["delay", "soon"],
            &["force", "purple"],
            &["hotkey", "dance"],
            &["--unknown"],
            &["--config"],
            &["switch", "now"],
        ] {
            assert!(
                matches!(parse(args), CliAction::ShowHelpDueToError(_)),
                "{args:?} should be rejected"
            );
        }
    }
}
