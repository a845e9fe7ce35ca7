//! settings-store: the durable home of the two sendkey preferences.
//!
//! The store is a single RON file holding a [`Settings`] pair. It is
//! deliberately dumb: it never validates the send ≠ newline invariant (the
//! settings surface owns that), and every read path degrades to the caller's
//! defaults rather than surfacing an error. Writes are atomic via a temp file
//! renamed into place.

use std::{
    env,
    path::{Path, PathBuf},
    process,
};

use sendkey_protocol::Settings;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced while reading or writing the settings file.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure reading the settings file.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file exists but does not parse as a settings pair.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying RON parse error.
        source: ron::error::SpannedError,
    },
    /// Serializing the settings pair failed.
    #[error("failed to encode settings: {0}")]
    Encode(#[from] ron::Error),
    /// I/O failure writing the settings file.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, Error>;

/// Determine the preferred settings file path (`~/.sendkey/settings.ron`).
pub fn default_settings_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".sendkey");
    p.push("settings.ron");
    p
}

/// Resolve the effective settings path.
///
/// Policy:
/// 1) Use `explicit` when provided.
/// 2) Else use `$SENDKEY_SETTINGS` when set and non-empty.
/// 3) Else use `~/.sendkey/settings.ron`.
pub fn resolve_settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(env_path) = env::var("SENDKEY_SETTINGS")
        && !env_path.is_empty()
    {
        return PathBuf::from(env_path);
    }
    default_settings_path()
}

/// Handle on the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    /// Location of the RON settings file.
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store over the given file path. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored settings, or `defaults` when the file is missing,
    /// unreadable, or malformed. This is the read path the remapper and
    /// coordinator use; it never fails.
    pub async fn get(&self, defaults: Settings) -> Settings {
        match self.try_get().await {
            Ok(s) => s,
            Err(Error::Read { ref source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %self.path.display(), "settings file absent; using defaults");
                defaults
            }
            Err(e) => {
                warn!("settings read failed ({}); using defaults", e);
                defaults
            }
        }
    }

    /// Read and parse the stored settings, surfacing failures.
    pub async fn try_get(&self) -> Result<Settings> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?;
        ron::from_str(&raw).map_err(|source| Error::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist the settings pair.
    ///
    /// The pair is written to a sibling temp file and renamed into place so a
    /// crash mid-write never leaves a torn settings file behind.
    pub async fn set(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let body = ron::ser::to_string_pretty(settings, ron::ser::PrettyConfig::default())?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, body.as_bytes())
            .await
            .map_err(|source| Error::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Seed the store with `defaults` if no settings file exists yet.
    ///
    /// Idempotent: an existing file is left untouched, even if malformed.
    /// Returns true when this call created the file.
    pub async fn init_defaults(&self, defaults: Settings) -> Result<bool> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => Ok(false),
            Ok(false) => {
                self.set(&defaults).await?;
                debug!(path = %self.path.display(), "seeded settings file with defaults");
                Ok(true)
            }
            Err(source) => Err(Error::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Sibling temp path used for atomic writes; unique per process.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map_or_else(
            || std::ffi::OsString::from("settings.ron"),
            std::ffi::OsStr::to_os_string,
        );
        name.push(format!(".tmp{}", process::id()));
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use sendkey_protocol::Chord;

    use super::*;

    fn tmpdir() -> PathBuf {
        let mut p = env::temp_dir();
        let unique = format!(
            "sendkey-store-test-{}-{}",
            unsafe { libc::getuid() },
            process::id()
        );
        p.push(unique);
        let _ = std::fs::create_dir_all(&p);
        p
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let store = SettingsStore::new(tmpdir().join("absent.ron"));
        let got = store.get(Settings::default()).await;
        assert_eq!(got, Settings::default());
        assert!(store.try_get().await.is_err());
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = SettingsStore::new(tmpdir().join("roundtrip.ron"));
        let s = Settings {
            send: Chord::CtrlEnter,
            newline: Chord::Enter,
        };
        store.set(&s).await.expect("set");
        assert_eq!(store.try_get().await.expect("get"), s);
        assert_eq!(store.get(Settings::default()).await, s);
    }

    #[tokio::test]
    async fn malformed_file_yields_defaults() {
        let path = tmpdir().join("garbage.ron");
        std::fs::write(&path, "(send: \"enter\"").expect("write");
        let store = SettingsStore::new(&path);
        assert!(matches!(store.try_get().await, Err(Error::Parse { .. })));
        assert_eq!(store.get(Settings::default()).await, Settings::default());
    }

    #[tokio::test]
    async fn init_defaults_is_idempotent() {
        let store = SettingsStore::new(tmpdir().join("seeded.ron"));
        assert!(store.init_defaults(Settings::default()).await.expect("seed"));

        // A later write must survive re-initialization.
        let custom = Settings {
            send: Chord::AltEnter,
            newline: Chord::Enter,
        };
        store.set(&custom).await.expect("set");
        assert!(!store.init_defaults(Settings::default()).await.expect("reseed"));
        assert_eq!(store.try_get().await.expect("get"), custom);
    }

    #[tokio::test]
    async fn set_leaves_no_temp_file() {
        let dir = tmpdir();
        let store = SettingsStore::new(dir.join("clean.ron"));
        store.set(&Settings::default()).await.expect("set");
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("clean.ron.tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let path = tmpdir().join("nested/deeper/settings.ron");
        let store = SettingsStore::new(&path);
        store.set(&Settings::default()).await.expect("set");
        assert!(path.exists());
    }
}
