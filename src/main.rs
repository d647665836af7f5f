//! duskswitch entry point: parse the command line and dispatch.

use anyhow::Result;

use duskswitch::Service;
use duskswitch::args::{self, CliAction, ParsedArgs};
use duskswitch::commands;
use duskswitch::common::constants::EXIT_FAILURE;
use duskswitch::common::logger::Log;
use duskswitch::config;
use duskswitch::{log_end, log_error_exit, log_pipe};

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError(message) => {
            log_pipe!();
            log_error_exit!("{}", message);
            commands::help::show_command_usage(None);
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::HelpCommand { command } => {
            commands::help::run_help_command(&command);
            Ok(())
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            log_file,
        } => {
            config::set_config_dir(config_dir)?;
            // Keep the writer alive until the service has logged its last line
            let _log_guard = log_file.map(Log::start_file_logging).transpose()?;
            Service::new(debug_enabled).run()
        }
        CliAction::Send {
            debug_enabled,
            config_dir,
            command,
        } => {
            config::set_config_dir(config_dir)?;
            commands::send::handle_send_command(command, debug_enabled)
        }
        CliAction::Status {
            debug_enabled,
            config_dir,
            json,
        } => {
            config::set_config_dir(config_dir)?;
            commands::status::handle_status_command(json, debug_enabled)
        }
        CliAction::Stop { debug_enabled } => commands::stop::handle_stop_command(debug_enabled),
        CliAction::Reload { debug_enabled } => {
            commands::reload::handle_reload_command(debug_enabled)
        }
    }
}
