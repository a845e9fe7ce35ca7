//! Settings coordinator for sendkey.
//!
//! This crate provides the server/client layer that makes one process the
//! owner of the durable send/newline settings and fans out changes to every
//! connected context.
//!
//! Public API (internal stability)
//! - `Server`: hosts the MRPC IPC server and the settings store.
//! - `Client`: connects to a coordinator; can auto-spawn a managed one.
//! - `Connection`: typed RPCs and a stream of context events
//!   (`MsgToContext`).
//! - `default_socket_path()`: the per-user coordinator socket path.
//!
//! Connection lifecycle and conventions
//! - Per-user socket path: the default socket path is derived from the
//!   current UID only, so all contexts for a user share one coordinator. To
//!   run an isolated instance, pass an explicit socket path.
//! - Auto-spawn: `Client` first tries to join a coordinator already serving
//!   the socket; only when none answers does it launch the current binary in
//!   `--server` mode, propagating `RUST_LOG`. The parent PID is exported via
//!   `SENDKEY_PARENT_PID` so a spawned coordinator exits promptly if the
//!   process that spawned it goes away.
//! - Idle shutdown: once at least one client has connected, the coordinator
//!   exits after the client list has stayed empty for the idle timeout. A
//!   new connection cancels the countdown.
//! - Event stream: the coordinator broadcasts `SETTINGS_UPDATED` after
//!   every accepted change and a lightweight heartbeat at a fixed interval
//!   to signal liveness. Delivery is best-effort; clients that fail a send
//!   are dropped from the list.
#![warn(unsafe_op_in_unsafe_fn)]

use std::{env, path::PathBuf, sync::OnceLock};

mod client;
mod error;
mod ipc;
mod process;
mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use ipc::Connection;
pub use server::Server;

/// Return the per-user runtime directory used for IPC socket files.
///
/// Preference order:
/// - `$XDG_RUNTIME_DIR/sendkey`
/// - `~/.cache/sendkey/run`
fn socket_runtime_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_RUNTIME_DIR")
        && !xdg.is_empty()
    {
        return PathBuf::from(xdg).join("sendkey");
    }
    let home = env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".cache/sendkey/run")
}

/// Get the default socket path for IPC communication.
///
/// The path is per-user (derived from the current UID), not per-process:
/// every context belonging to a user talks to the same coordinator.
pub fn default_socket_path() -> &'static str {
    static SOCKET_PATH: OnceLock<String> = OnceLock::new();
    SOCKET_PATH.get_or_init(|| {
        let uid = unsafe { libc::getuid() };
        socket_runtime_dir()
            .join(format!("sendkey-{}.sock", uid))
            .to_string_lossy()
            .to_string()
    })
}
