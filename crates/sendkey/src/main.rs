#![warn(missing_docs)]

//! Entry point for the `sendkey` binary.
//!
//! One executable serves both roles: `--server` runs the settings
//! coordinator headless; every subcommand is a client that joins (or
//! spawns) the per-user coordinator.

mod attach;
mod cli;
mod commands;
mod error;
mod util;

use std::{env, process};

use clap::Parser;
use sendkey_server::Server;
use tokio::runtime::Runtime;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry};

use crate::{
    cli::{Cli, Command},
    error::Result,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen command.
fn run() -> Result<()> {
    let cli = Cli::parse();
    let log_spec = logging::compute_spec(
        cli.log.trace,
        cli.log.debug,
        cli.log.log_level.as_deref(),
        cli.log.log_filter.as_deref(),
    );
    let env_filter = logging::env_filter_from_spec(&log_spec);
    registry()
        .with(env_filter)
        .with(fmt::layer().without_time())
        .try_init()
        .ok();

    let socket = resolve_socket(cli.socket.as_deref());

    if cli.server {
        // The server builds its own runtime.
        let mut server = Server::new().with_socket_path(socket);
        if let Some(secs) = cli.idle_timeout {
            server = server.with_idle_timeout_secs(secs);
        }
        if let Some(path) = cli.settings {
            server = server.with_settings_path(path);
        }
        return Ok(server.run()?);
    }

    let settings_path = cli.settings.as_deref();
    let runtime = Runtime::new()?;
    match cli.command.unwrap_or(Command::Get { json: false }) {
        Command::Get { json } => runtime.block_on(commands::get(&socket, settings_path, json)),
        Command::Set { slot, chord } => {
            runtime.block_on(commands::set(&socket, settings_path, slot, chord))
        }
        Command::Reset => runtime.block_on(commands::reset(&socket, settings_path)),
        Command::Status => runtime.block_on(commands::status(&socket, settings_path)),
        Command::Attach(args) => runtime.block_on(attach::run(&socket, settings_path, &args)),
    }
}

/// Resolve the coordinator socket path: `--socket`, then `SENDKEY_SOCKET`,
/// then the per-user default.
fn resolve_socket(flag: Option<&str>) -> String {
    if let Some(path) = flag {
        return path.to_string();
    }
    if let Ok(path) = env::var("SENDKEY_SOCKET")
        && !path.is_empty()
    {
        return path;
    }
    sendkey_server::default_socket_path().to_string()
}
