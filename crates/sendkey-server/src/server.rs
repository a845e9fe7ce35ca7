use std::{
    env,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use sendkey_protocol::Settings;
use settings_store::{SettingsStore, resolve_settings_path};
use tracing::{info, warn};

use crate::{Error, Result, default_socket_path, ipc::IPCServer};

/// Default idle timeout in seconds after the last context disconnects.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5;

/// A settings coordinator that owns the store and hosts IPC communication
pub struct Server {
    socket_path: String,
    idle_timeout_secs: u64,
    settings_path: Option<PathBuf>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a new coordinator with default configuration
    pub fn new() -> Self {
        // Allow environment override; fallback to default.
        let idle_timeout_secs = env::var("SENDKEY_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);
        Self {
            socket_path: default_socket_path().to_string(),
            idle_timeout_secs,
            settings_path: None,
        }
    }

    /// Set the socket path for IPC communication
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Override the idle timeout in seconds (0 disables idle shutdown).
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Use an explicit settings file instead of the default location.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Run the coordinator
    ///
    /// This will:
    /// 1. Initialize the settings store (first run writes the defaults)
    /// 2. Start the MRPC IPC server on a current-thread tokio runtime
    /// 3. Serve requests until shutdown is requested
    ///
    /// The coordinator shuts down when:
    /// - A client sends the shutdown RPC
    /// - The client list stays empty past the idle timeout
    /// - The watched parent process (`SENDKEY_PARENT_PID`) exits
    pub fn run(self) -> Result<()> {
        info!("Starting settings coordinator on socket: {}", self.socket_path);

        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_parent_watch(shutdown.clone());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Coordinator(format!("Failed to create tokio runtime: {}", e)))?;

        runtime.block_on(async {
            let store = SettingsStore::new(resolve_settings_path(self.settings_path.as_deref()));
            match store.init_defaults(Settings::default()).await {
                Ok(true) => info!("Initialized settings store at {}", store.path().display()),
                Ok(false) => {}
                Err(e) => {
                    // Serve the defaults from memory for this session.
                    warn!("Settings store init failed: {}", e);
                }
            }
            let settings = store.get(Settings::default()).await;

            let ipc = IPCServer::new(
                &self.socket_path,
                store,
                settings,
                shutdown,
                self.idle_timeout_secs,
            );
            ipc.run().await
        })?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Watch the process named by `SENDKEY_PARENT_PID` (standard when
/// auto-spawned) and request shutdown as soon as it exits. This makes the
/// coordinator die promptly when the process that spawned it goes away for
/// any reason.
fn spawn_parent_watch(shutdown: Arc<AtomicBool>) {
    let Ok(ppid_str) = env::var("SENDKEY_PARENT_PID") else {
        return;
    };
    let Ok(ppid) = ppid_str.parse::<libc::pid_t>() else {
        warn!("SENDKEY_PARENT_PID present but invalid: {:?}", ppid_str);
        return;
    };
    thread::spawn(move || {
        loop {
            // kill == 0 -> process exists; ESRCH -> doesn't exist
            let alive = unsafe { libc::kill(ppid, 0) } == 0
                || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
            if !alive {
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_builder_methods() {
        let server = Server::new().with_socket_path("/custom/path.sock");
        assert_eq!(server.socket_path, "/custom/path.sock");

        let server = Server::new()
            .with_socket_path("/initial/path.sock")
            .with_socket_path("/another/path.sock");
        assert_eq!(server.socket_path, "/another/path.sock");
    }

    #[test]
    fn server_default_socket_path() {
        let server = Server::default();
        assert_eq!(server.socket_path, default_socket_path());
    }

    #[test]
    fn idle_timeout_zero_allowed() {
        let server = Server::new().with_idle_timeout_secs(0);
        assert_eq!(server.idle_timeout_secs, 0);
    }
}
