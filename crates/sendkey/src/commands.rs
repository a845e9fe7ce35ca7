//! Client-side implementations of the settings subcommands.
//!
//! Every command connects through [`connect`], which joins the running
//! coordinator or spawns one, so `sendkey set` works identically whether or
//! not anything else is attached.

use std::path::Path;

use sendkey_protocol::{ActionSlot, Chord, Settings};
use sendkey_server::Client;

use crate::error::Result;

/// Connect to the per-user coordinator, spawning one if none is running.
pub async fn connect(socket: &str, settings_path: Option<&Path>) -> Result<Client> {
    let mut client = Client::new_with_socket(socket)
        .with_server_log_filter(logging::log_config_for_child());
    if let Some(path) = settings_path {
        client = client.with_server_settings_path(path.to_string_lossy());
    }
    Ok(client.connect().await?)
}

/// Print the current chord pair, optionally as JSON.
pub async fn get(socket: &str, settings_path: Option<&Path>, json: bool) -> Result<()> {
    let mut client = connect(socket, settings_path).await?;
    let current = client.connection()?.get_settings().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&current)?);
    } else {
        print_pair(&current);
    }
    client.disconnect(false).await.ok();
    Ok(())
}

/// Assign `chord` to `slot` and persist the result.
///
/// Conflict resolution happens here, on the current pair fetched from the
/// coordinator: claiming the other slot's chord moves that slot to the first
/// free canonical entry.
pub async fn set(
    socket: &str,
    settings_path: Option<&Path>,
    slot: ActionSlot,
    chord: Chord,
) -> Result<()> {
    let mut client = connect(socket, settings_path).await?;
    let conn = client.connection()?;
    let mut pair = conn.get_settings().await?;
    let moved = pair.assign(slot, chord);
    conn.set_settings(pair).await?;
    if let Some(replacement) = moved {
        println!("{} moved to {}", slot.other(), replacement);
    }
    print_pair(&pair);
    client.disconnect(false).await.ok();
    Ok(())
}

/// Restore the default pair through the regular update path.
pub async fn reset(socket: &str, settings_path: Option<&Path>) -> Result<()> {
    let mut client = connect(socket, settings_path).await?;
    let defaults = Settings::default();
    client.connection()?.set_settings(defaults).await?;
    print_pair(&defaults);
    client.disconnect(false).await.ok();
    Ok(())
}

/// Print a coordinator status snapshot.
pub async fn status(socket: &str, settings_path: Option<&Path>) -> Result<()> {
    let mut client = connect(socket, settings_path).await?;
    let status = client.connection()?.status().await?;
    println!("socket: {}", socket);
    println!("clients connected: {}", status.clients_connected);
    if status.idle_timeout_secs == 0 {
        println!("idle timeout: disabled");
    } else {
        println!("idle timeout: {}s", status.idle_timeout_secs);
    }
    println!("settings file: {}", status.settings_path);
    if let Some(pid) = client.server_pid() {
        println!("coordinator pid: {} (spawned by this command)", pid);
    }
    client.disconnect(false).await.ok();
    Ok(())
}

/// Print the chord pair in `slot = chord` form.
pub fn print_pair(settings: &Settings) {
    println!("send = {}", settings.send);
    println!("newline = {}", settings.newline);
}
