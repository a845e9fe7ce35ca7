//! IPC server implementation for the settings coordinator

use std::{
    fs, io,
    os::unix::{
        fs::{FileTypeExt as _, MetadataExt as _, PermissionsExt as _},
        net::UnixStream,
    },
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use mrpc::Server as MrpcServer;
use sendkey_protocol::Settings;
use settings_store::SettingsStore;
use tokio::{select, time::sleep};
use tracing::{debug, trace};

use super::service::CoordinatorService;
use crate::{Error, Result};

/// IPC server
pub struct IPCServer {
    socket_path: String,
    service: CoordinatorService,
}

impl IPCServer {
    /// Create a new IPC server
    pub fn new(
        socket_path: impl Into<String>,
        store: SettingsStore,
        settings: Settings,
        shutdown: Arc<AtomicBool>,
        idle_timeout_secs: u64,
    ) -> Self {
        let service = CoordinatorService::new(store, settings, shutdown, idle_timeout_secs);

        Self {
            socket_path: socket_path.into(),
            service,
        }
    }

    /// Run the server
    pub async fn run(self) -> Result<()> {
        trace!("Starting MRPC server on socket: {}", self.socket_path);

        ensure_socket_dir(&self.socket_path);
        clear_stale_socket(&self.socket_path)?;

        // Create server with our service
        let service = self.service.clone();
        let server = MrpcServer::from_fn(move || service.clone());

        // Listen on Unix socket
        let server = server
            .unix(&self.socket_path)
            .await
            .map_err(|e| Error::Ipc(format!("Failed to bind to socket: {}", e)))?;

        trace!("MRPC server listening, waiting for client connections...");

        // Run the server until shutdown is requested. Dropping the run future
        // will close the listener and active connections gracefully.
        let shutdown = self.service.shutdown_flag();
        select! {
            res = server.run() => {
                res.map_err(|e| Error::Ipc(format!("Server error: {}", e)))?;
            }
            _ = async {
                // Poll the shutdown flag; wake up periodically.
                while !shutdown.load(Ordering::SeqCst) {
                    sleep(Duration::from_millis(50)).await;
                }
            } => {
                debug!("Shutdown flag set; stopping MRPC server");
                // server.run() future is dropped here, closing the socket and tasks
            }
        }

        Ok(())
    }
}

impl Drop for IPCServer {
    fn drop(&mut self) {
        // Best-effort cleanup. A successor coordinator that already rebound
        // the path answers the liveness probe and keeps its socket.
        let _ = clear_stale_socket(&self.socket_path);
    }
}

/// Create the socket's parent directory with user-only permissions (0700).
///
/// The default path lives under a per-user runtime dir, but explicit paths
/// via CLI are supported too.
fn ensure_socket_dir(path: &str) {
    let Some(parent) = Path::new(path).parent() else {
        return;
    };
    if parent.as_os_str().is_empty() {
        return;
    }
    let _ = fs::create_dir_all(parent);
    if let Ok(meta) = fs::metadata(parent) {
        let mut perms = meta.permissions();
        perms.set_mode(0o700);
        let _ = fs::set_permissions(parent, perms);
    }
}

/// Unlink a dead socket we own so the path can be rebound.
///
/// An absent path is fine. Anything that is not a Unix socket, or a socket
/// owned by another user, is left alone and reported as an error; this
/// defends against symlink tricks in world-writable directories. A socket
/// that still answers a connect belongs to a live coordinator serving this
/// user, so it is never stolen: when two contexts race to spawn, the loser
/// errors out here and its client joins the winner instead.
fn clear_stale_socket(path: &str) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::Ipc(format!(
                "Failed to lstat existing path '{}': {}",
                path, e
            )));
        }
        Ok(meta) => meta,
    };

    if !meta.file_type().is_socket() {
        return Err(Error::Ipc(format!(
            "Refusing to remove non-socket at '{}': {:?}",
            path,
            meta.file_type()
        )));
    }
    let uid = unsafe { libc::getuid() };
    if meta.uid() != uid {
        return Err(Error::Ipc(format!(
            "Socket at '{}' not owned by current user (uid {} != {})",
            path,
            meta.uid(),
            uid
        )));
    }
    if UnixStream::connect(path).is_ok() {
        return Err(Error::Ipc(format!(
            "A live coordinator is already serving '{}'",
            path
        )));
    }

    fs::remove_file(path)
        .map_err(|e| Error::Ipc(format!("Failed to remove stale socket '{}': {}", path, e)))
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixListener;

    use super::*;

    fn tmpdir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        let unique = format!(
            "sendkey-test-{}-{}",
            unsafe { libc::getuid() },
            std::process::id()
        );
        p.push(unique);
        let _ = fs::create_dir_all(&p);
        p
    }

    #[test]
    fn absent_path_needs_no_clearing() {
        let d = tmpdir();
        let sock = d.join("nope.sock");
        assert!(clear_stale_socket(sock.to_str().unwrap()).is_ok());
        // Nothing created
        assert!(!sock.exists());
    }

    #[test]
    fn regular_file_is_never_removed() {
        let d = tmpdir();
        let p = d.join("regular.txt");
        fs::write(&p, b"hi").unwrap();
        assert!(clear_stale_socket(p.to_str().unwrap()).is_err());
        assert!(p.exists());
    }

    #[test]
    fn symlink_is_never_followed() {
        use std::os::unix::fs::symlink;
        let d = tmpdir();
        let target = d.join("target.txt");
        fs::write(&target, b"hi").unwrap();
        let link = d.join("link.sock");
        symlink(&target, &link).unwrap();
        assert!(clear_stale_socket(link.to_str().unwrap()).is_err());
        assert!(link.exists());
    }

    #[test]
    fn live_socket_is_never_stolen() {
        let d = tmpdir();
        let sock = d.join("live.sock");
        let _listener = UnixListener::bind(&sock).unwrap();
        assert!(clear_stale_socket(sock.to_str().unwrap()).is_err());
        assert!(sock.exists());
    }

    #[test]
    fn dead_socket_is_unlinked() {
        let d = tmpdir();
        let sock = d.join("dead.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        drop(listener);
        // The path persists after the listener dies and refuses connects.
        clear_stale_socket(sock.to_str().unwrap()).unwrap();
        assert!(!sock.exists());
    }
}
