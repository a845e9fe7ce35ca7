use std::{env, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::{
    Error, Result, default_socket_path,
    ipc::Connection,
    process::{ProcessConfig, ServerProcess},
};

// Connection timing constants (internal-only; simplified API)
const STARTUP_POLL_TIMEOUT_MS: u64 = 1000;
const CONNECT_TIMEOUT_SECS: u64 = 5;
const CONNECT_MAX_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY_MS: u64 = 200;

/// A client for connecting to a settings coordinator.
///
/// The client will attempt to connect to an existing coordinator at the
/// configured socket path. If none is running and auto-spawn is configured,
/// it will spawn a new coordinator process.
///
/// # Coordinator Spawning
///
/// By default, the client auto-spawns the current executable with the
/// `--server` flag. Use [`with_connect_only()`](Self::with_connect_only) to
/// only connect to an already-running coordinator.
pub struct Client {
    /// Socket path for IPC communication
    socket_path: String,
    /// Optional coordinator configuration (if None, won't spawn one)
    server_config: Option<ProcessConfig>,
    /// The spawned coordinator process (if any)
    server: Option<ServerProcess>,
    /// The active IPC connection (if connected)
    connection: Option<Connection>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a new managed client with default configuration.
    ///
    /// Defaults to auto-spawning a coordinator (same binary) unless opted
    /// out via [`with_connect_only`](Self::with_connect_only).
    pub fn new() -> Self {
        let base = Self {
            socket_path: default_socket_path().to_string(),
            server_config: None,
            server: None,
            connection: None,
        };
        base.with_auto_spawn_server()
    }

    /// Create a new managed client with the given socket path.
    ///
    /// Like [`new`](Self::new), this defaults to auto-spawn.
    pub fn new_with_socket(socket_path: impl Into<String>) -> Self {
        let base = Self {
            socket_path: socket_path.into(),
            server_config: None,
            server: None,
            connection: None,
        };
        base.with_auto_spawn_server()
    }

    /// Set the socket path
    pub fn with_socket_path(mut self, socket_path: impl Into<String>) -> Self {
        self.socket_path = socket_path.into();
        // Remove any existing "--socket <...>" pair and append one fresh pair
        // at the end. Preserve all other args as-is.
        if let Some(ref mut config) = self.server_config {
            let mut new_args: Vec<String> = Vec::with_capacity(config.args.len() + 2);
            let mut i = 0;
            while i < config.args.len() {
                if config.args[i] == "--socket" {
                    // Skip option and its value if present
                    i += 1;
                    if i < config.args.len() {
                        i += 1;
                    }
                } else {
                    new_args.push(config.args[i].clone());
                    i += 1;
                }
            }
            new_args.push("--socket".to_string());
            new_args.push(self.socket_path.clone());
            config.args = new_args;
        }
        self
    }

    /// Enable automatic coordinator spawning using the default command.
    ///
    /// The default command is the current executable with `--server` and the
    /// client's socket path. Our PID is propagated via `SENDKEY_PARENT_PID`
    /// so the coordinator can exit when this process goes away.
    pub fn with_auto_spawn_server(mut self) -> Self {
        if let Ok(current_exe) = env::current_exe() {
            let mut config = ProcessConfig::new(current_exe);
            config.args = vec![
                "--server".to_string(),
                "--socket".to_string(),
                self.socket_path.clone(),
            ];
            let ppid = std::process::id().to_string();
            if let Some((_, v)) = config
                .env
                .iter_mut()
                .find(|(k, _)| k == "SENDKEY_PARENT_PID")
            {
                *v = ppid;
            } else {
                config.env.push(("SENDKEY_PARENT_PID".to_string(), ppid));
            }
            self.server_config = Some(config);
        }
        self
    }

    /// Propagate a log filter to the spawned coordinator via `RUST_LOG`.
    ///
    /// Call after `with_auto_spawn_server()` (or ensure a server_config exists).
    pub fn with_server_log_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        // Ensure we have a config to attach env to.
        if self.server_config.is_none()
            && let Ok(current_exe) = env::current_exe()
        {
            let mut config = ProcessConfig::new(current_exe);
            config.args = vec![
                "--server".to_string(),
                "--socket".to_string(),
                self.socket_path.clone(),
            ];
            self.server_config = Some(config);
        }
        if let Some(cfg) = &mut self.server_config {
            // Replace existing RUST_LOG if present, otherwise push
            if let Some((_, v)) = cfg.env.iter_mut().find(|(k, _)| k == "RUST_LOG") {
                *v = filter.clone();
            } else {
                cfg.env.push(("RUST_LOG".to_string(), filter));
            }
        }
        self
    }

    /// Point a spawned coordinator at an explicit settings file.
    ///
    /// Exported as `SENDKEY_SETTINGS`, which the store's path resolution
    /// honors. No effect unless auto-spawn is configured.
    pub fn with_server_settings_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if let Some(cfg) = &mut self.server_config {
            if let Some((_, v)) = cfg.env.iter_mut().find(|(k, _)| k == "SENDKEY_SETTINGS") {
                *v = path;
            } else {
                cfg.env.push(("SENDKEY_SETTINGS".to_string(), path));
            }
        }
        self
    }

    /// Opt-out of auto-spawn behavior and only attempt to connect to an
    /// already-running coordinator.
    pub fn with_connect_only(mut self) -> Self {
        self.server_config = None;
        self
    }

    /// Connect to the coordinator, spawning one if none is reachable.
    pub async fn connect(mut self) -> Result<Self> {
        // Check if we're already connected
        if self.connection.is_some() {
            debug!("Already connected to coordinator");
            return Ok(self);
        }

        // The socket is shared per user, so another context may already be
        // running a coordinator. Prefer joining it over spawning our own.
        if self.server_config.is_some() {
            match self.try_connect().await {
                Ok(conn) => {
                    debug!("Joined existing coordinator at {}", self.socket_path);
                    self.connection = Some(conn);
                    return Ok(self);
                }
                Err(e) => {
                    debug!("No existing coordinator ({}); spawning one", e);
                }
            }
        }

        // Spawn a managed coordinator if configured
        let mut spawned_server: Option<ServerProcess> = None;
        if let Some(server_config) = &self.server_config {
            info!("Spawning new coordinator at {}", self.socket_path);
            let mut server = ServerProcess::new(server_config.clone());
            server.start()?;
            spawned_server = Some(server);
        }

        // Unified readiness + retry logic
        match self
            .try_connect_with_retries(spawned_server.is_some())
            .await
        {
            Ok(conn) => {
                self.connection = Some(conn);
                if let Some(server) = spawned_server {
                    self.server = Some(server);
                }
                Ok(self)
            }
            Err(e) => {
                error!("Failed to connect to coordinator: {}", e);
                if let Some(mut server) = spawned_server {
                    // Best effort cleanup
                    let _ = server.stop().await;
                }
                Err(e)
            }
        }
    }

    /// Try to connect to the coordinator once
    async fn try_connect(&self) -> Result<Connection> {
        match timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Connection::connect_unix(&self.socket_path),
        )
        .await
        {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Ipc(format!(
                "Connection timeout after {:?}",
                Duration::from_secs(CONNECT_TIMEOUT_SECS)
            ))),
        }
    }

    /// Try to connect with retries; includes a fast startup poll when a
    /// managed coordinator has just been spawned.
    async fn try_connect_with_retries(&self, just_spawned: bool) -> Result<Connection> {
        let mut last_error = None;

        if just_spawned {
            debug!(
                "Polling for coordinator readiness (timeout: {:?})",
                Duration::from_millis(STARTUP_POLL_TIMEOUT_MS)
            );
            let start_time = tokio::time::Instant::now();
            let mut poll_interval = Duration::from_millis(10);
            while start_time.elapsed() < Duration::from_millis(STARTUP_POLL_TIMEOUT_MS) {
                match self.try_connect().await {
                    Ok(conn) => {
                        info!(
                            "Connected to spawned coordinator in {:?}",
                            start_time.elapsed()
                        );
                        return Ok(conn);
                    }
                    Err(e) => {
                        last_error = Some(e);
                        sleep(poll_interval).await;
                        if poll_interval < Duration::from_millis(100) {
                            poll_interval = poll_interval.saturating_add(Duration::from_millis(10));
                        }
                    }
                }
            }
            debug!("Startup poll window elapsed; falling back to standard retries");
        }

        for attempt in 1..=CONNECT_MAX_ATTEMPTS {
            debug!("Connection attempt {}/{}", attempt, CONNECT_MAX_ATTEMPTS);
            match self.try_connect().await {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < CONNECT_MAX_ATTEMPTS {
                        sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Ipc("Failed to connect after all retry attempts".to_string())
        }))
    }

    /// Get a reference to the connection
    pub fn connection(&mut self) -> Result<&mut Connection> {
        self.connection
            .as_mut()
            .ok_or_else(|| Error::Ipc("Not connected to coordinator".to_string()))
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Disconnect from the coordinator and optionally stop it.
    ///
    /// The coordinator is shared by every context of this user, so plain
    /// disconnect only drops the connection; the coordinator reaps the dead
    /// client on its next broadcast.
    pub async fn disconnect(&mut self, stop_server: bool) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            info!("Closing coordinator connection");
            drop(connection);
        }

        // Stop the coordinator if requested and we spawned it
        if stop_server && let Some(mut server) = self.server.take() {
            info!("Stopping managed coordinator");
            server.stop().await?;
        }

        Ok(())
    }

    /// Gracefully shut down the coordinator via RPC, then stop the managed
    /// process if still running.
    pub async fn shutdown_server(&mut self) -> Result<()> {
        // Request graceful shutdown if connected
        if let Some(conn) = self.connection.as_mut() {
            info!("Requesting coordinator shutdown via RPC");
            conn.shutdown().await?;
        }
        // If we manage a spawned coordinator, ensure the process is stopped
        if let Some(mut server) = self.server.take() {
            info!("Stopping managed coordinator process");
            server.stop().await?;
        }
        Ok(())
    }

    /// Get the PID of the spawned coordinator process, if any.
    ///
    /// Returns `None` if no coordinator was spawned (e.g., connected to an
    /// existing one) or if it has terminated.
    pub fn server_pid(&self) -> Option<u32> {
        self.server.as_ref().and_then(|s| s.pid())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Clean disconnect on drop
        if self.is_connected() {
            debug!("Client dropped while still connected");
            // Can't do async in drop, so connection will close when dropped
        }

        // ServerProcess has its own drop implementation
        if self.server.is_some() {
            debug!("Client dropped with running coordinator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builder_socket() {
        let client = Client::new_with_socket("/test/socket.sock");
        assert_eq!(client.socket_path, "/test/socket.sock");
    }

    #[test]
    fn client_default_socket_path() {
        let client = Client::new();
        assert_eq!(client.socket_path, default_socket_path());
    }

    #[test]
    fn socket_path_change_rewrites_spawn_args() {
        let client = Client::new().with_socket_path("/elsewhere/a.sock");
        let config = client.server_config.as_ref().unwrap();
        let pos = config
            .args
            .iter()
            .position(|a| a == "--socket")
            .expect("spawn args carry --socket");
        assert_eq!(config.args[pos + 1], "/elsewhere/a.sock");
        // Exactly one --socket pair survives repeated changes.
        let client = client.with_socket_path("/elsewhere/b.sock");
        let config = client.server_config.as_ref().unwrap();
        assert_eq!(
            config.args.iter().filter(|a| *a == "--socket").count(),
            1
        );
    }
}
