//! Command-line interface definitions for sendkey.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;
use sendkey_protocol::{ActionSlot, Chord};

/// Command-line interface for the `sendkey` binary.
#[derive(Parser, Debug)]
#[command(
    name = "sendkey",
    about = "Choose which Enter chord sends a message and which inserts a newline",
    version
)]
pub struct Cli {
    /// Optional subcommand; without one the current pair is printed.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Run as the settings coordinator (headless).
    #[arg(long)]
    pub server: bool,

    /// Coordinator socket path (defaults to the per-user socket).
    #[arg(long, value_name = "PATH")]
    pub socket: Option<String>,

    /// Settings file path (defaults to ~/.sendkey/settings.ron).
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Coordinator idle timeout in seconds when running with --server; 0 disables.
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Logging controls shared across sendkey binaries.
    #[command(flatten)]
    pub log: LogArgs,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current send/newline chord pair.
    Get {
        /// Dump the pair as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
    /// Assign a chord to a slot, moving the other slot aside on collision.
    Set {
        /// Which slot to change.
        #[arg(value_name = "SLOT", value_parser = parse_slot)]
        slot: ActionSlot,
        /// Chord spec, e.g. `enter`, `shift+enter`, `alt+enter`, `ctrl+enter`.
        #[arg(value_name = "CHORD", value_parser = parse_chord)]
        chord: Chord,
    },
    /// Restore the default pair (Enter sends, Shift+Enter breaks the line).
    Reset,
    /// Show coordinator status.
    Status,
    /// Attach a scripted composer to the coordinator and drive it from stdin.
    Attach(AttachArgs),
}

/// Arguments for the `attach` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AttachArgs {
    /// Number of editors to start the scripted page with.
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub editors: usize,

    /// Give each editor an enabled send control (clicked instead of the
    /// synthetic Enter fallback).
    #[arg(long)]
    pub send_control: bool,
}

/// Parse an action slot name for clap.
fn parse_slot(s: &str) -> Result<ActionSlot, String> {
    ActionSlot::from_spec(s).ok_or_else(|| format!("expected `send` or `newline`, got {s:?}"))
}

/// Parse a chord spec for clap.
fn parse_chord(s: &str) -> Result<Chord, String> {
    Chord::parse(s).ok_or_else(|| {
        format!(
            "unrecognized chord {s:?}; expected one of: {}",
            Chord::ALL.map(Chord::as_spec).join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_and_chord_parsers() {
        assert_eq!(parse_slot("send"), Ok(ActionSlot::Send));
        assert_eq!(parse_slot("Newline"), Ok(ActionSlot::Newline));
        assert!(parse_slot("both").is_err());

        assert_eq!(parse_chord("ctrl+enter"), Ok(Chord::CtrlEnter));
        assert_eq!(parse_chord("Return"), Ok(Chord::Enter));
        assert!(parse_chord("meta+enter").is_err());
    }

    #[test]
    fn cli_parses_set_invocation() {
        let cli = Cli::parse_from(["sendkey", "set", "send", "ctrl+enter"]);
        match cli.command {
            Some(Command::Set { slot, chord }) => {
                assert_eq!(slot, ActionSlot::Send);
                assert_eq!(chord, Chord::CtrlEnter);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_server_mode_flags() {
        let cli = Cli::parse_from([
            "sendkey",
            "--server",
            "--socket",
            "/tmp/s.sock",
            "--idle-timeout",
            "0",
        ]);
        assert!(cli.server);
        assert_eq!(cli.socket.as_deref(), Some("/tmp/s.sock"));
        assert_eq!(cli.idle_timeout, Some(0));
        assert!(cli.command.is_none());
    }
}
