//! Coordinator service: owns the settings truth and fans out changes.
//!
//! # Locking Strategy
//!
//! - Prefer Tokio locks inside async paths. The `clients` list uses
//!   `tokio::sync::Mutex` to avoid mixing where we `await` soon after.
//! - The settings cache uses a short-lived `parking_lot::Mutex`, always
//!   released before any `.await`.
//! - Never hold any lock across network or file I/O; clone snapshots first.

use std::{
    result::Result as StdResult,
    slice,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use mrpc::{Connection as MrpcConnection, RpcError, RpcSender, ServiceError, Value};
use parking_lot::Mutex;
use sendkey_protocol::{
    CoordinatorStatus, MsgToContext, Settings,
    ipc::{codec, heartbeat},
    rpc::{Method, Notification},
};
use settings_store::SettingsStore;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, trace, warn};

use crate::error::RpcErrorCode;

/// IPC service that owns settings state and context fan-out
#[derive(Clone)]
pub struct CoordinatorService {
    /// Durable settings store; this service is its only writer.
    store: SettingsStore,
    /// In-memory settings truth, seeded from the store at startup.
    settings: Arc<Mutex<Settings>>,
    /// Connected contexts; use Tokio mutex to reduce sync/async mixing.
    clients: Arc<AsyncMutex<Vec<RpcSender>>>,
    /// When set to true, the outer server loop should exit.
    shutdown: Arc<AtomicBool>,
    /// Ensure we only spawn one heartbeat loop across clones.
    hb_running: Arc<AtomicBool>,
    /// Seconds the client list may stay empty before shutdown; 0 disables.
    idle_timeout_secs: u64,
}

impl CoordinatorService {
    /// Construct a typed `RpcError::Service` with a stable `name` and structured fields.
    fn typed_err(code: RpcErrorCode, fields: &[(&str, Value)]) -> RpcError {
        let map = fields
            .iter()
            .map(|(k, v)| (Value::String((*k).into()), v.clone()))
            .collect::<Vec<_>>();
        RpcError::Service(ServiceError {
            name: code.to_string(),
            value: Value::Map(map),
        })
    }

    /// Create the service around an initialized store and its current settings.
    pub fn new(
        store: SettingsStore,
        settings: Settings,
        shutdown: Arc<AtomicBool>,
        idle_timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            settings: Arc::new(Mutex::new(settings)),
            clients: Arc::new(AsyncMutex::new(Vec::new())),
            shutdown,
            hb_running: Arc::new(AtomicBool::new(false)),
            idle_timeout_secs,
        }
    }

    /// Expose the shutdown flag for coordinated server shutdown.
    pub(crate) fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Gather a lightweight status snapshot for diagnostics.
    async fn snapshot_status(&self) -> CoordinatorStatus {
        let clients_connected = { self.clients.lock().await.len() };
        CoordinatorStatus {
            clients_connected,
            idle_timeout_secs: self.idle_timeout_secs,
            settings_path: self.store.path().display().to_string(),
        }
    }

    /// Broadcast an event to all connected contexts.
    ///
    /// Delivery is best-effort: contexts that fail the send are dropped from
    /// the client list and the rest still receive the event.
    async fn broadcast_event(&self, event: MsgToContext) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        // Clone the current client list for sending without holding the lock
        let clients_snapshot = { self.clients.lock().await.clone() };

        let value = match codec::msg_to_value(&event) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to encode event for broadcast: {}", e);
                return;
            }
        };

        // Send concurrently; retain only successful clients
        let mut survivors = Vec::with_capacity(clients_snapshot.len());
        let mut futs = FuturesUnordered::new();
        for client in clients_snapshot {
            let v = value.clone();
            futs.push(async move {
                (
                    client.clone(),
                    client
                        .send_notification(Notification::Notify.as_str(), slice::from_ref(&v))
                        .await,
                )
            });
        }
        while let Some((client, res)) = futs.next().await {
            match res {
                Ok(_) => survivors.push(client),
                Err(e) => warn!("Dropping disconnected context (send failed): {:?}", e),
            }
        }

        // Replace the clients list with survivors
        *self.clients.lock().await = survivors;
    }
}

#[async_trait]
impl MrpcConnection for CoordinatorService {
    async fn connected(&self, client: RpcSender) -> StdResult<(), RpcError> {
        if self.shutdown.load(Ordering::SeqCst) {
            // Refuse new connections during shutdown
            return Err(Self::typed_err(
                RpcErrorCode::ShuttingDown,
                &[(
                    "message",
                    Value::String("Coordinator is shutting down".into()),
                )],
            ));
        }
        debug!("Context connected via MRPC");

        // Add the context to the broadcast list
        self.clients.lock().await.push(client.clone());

        // Start a single heartbeat loop. Besides signaling liveness, it
        // drives idle shutdown: once the list has ever been non-empty, an
        // empty list for longer than the idle timeout stops the server.
        if !self.hb_running.swap(true, Ordering::SeqCst) {
            let svc = self.clone();
            tokio::spawn(async move {
                let interval = heartbeat::interval();
                let mut empty_since: Option<Instant> = None;
                loop {
                    if svc.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let ts = SystemTime::now()
                        .duration_since(SystemTime::UNIX_EPOCH)
                        .map(|d| d.as_millis() as u64)
                        .unwrap_or(0);
                    svc.broadcast_event(MsgToContext::Heartbeat { ms: ts }).await;
                    if svc.idle_timeout_secs > 0 {
                        let n = { svc.clients.lock().await.len() };
                        if n == 0 {
                            match empty_since {
                                None => empty_since = Some(Instant::now()),
                                Some(t0) => {
                                    if t0.elapsed() >= Duration::from_secs(svc.idle_timeout_secs) {
                                        info!(
                                            "No contexts for {}s; stopping coordinator",
                                            svc.idle_timeout_secs
                                        );
                                        svc.shutdown.store(true, Ordering::SeqCst);
                                        break;
                                    }
                                }
                            }
                        } else {
                            empty_since = None;
                        }
                    }
                    tokio::time::sleep(interval).await;
                }
                svc.hb_running.store(false, Ordering::SeqCst);
            });
        }

        Ok(())
    }

    async fn handle_request(
        &self,
        _client: RpcSender,
        method: &str,
        params: Vec<Value>,
    ) -> StdResult<Value, RpcError> {
        debug!("Handling request: {} with {} params", method, params.len());

        match Method::try_from_str(method) {
            Some(Method::GetSettings) => {
                let settings = { *self.settings.lock() };
                enc_settings(&settings).map_err(|e| {
                    Self::typed_err(
                        RpcErrorCode::InvalidType,
                        &[("message", Value::String(e.to_string().into()))],
                    )
                })
            }

            Some(Method::SetSettings) => {
                if params.is_empty() {
                    return Err(Self::typed_err(
                        RpcErrorCode::MissingParams,
                        &[
                            ("method", Value::String(Method::SetSettings.as_str().into())),
                            ("expected", Value::String("settings".into())),
                        ],
                    ));
                }

                let settings = dec_settings_param(&params[0])?;
                if !settings.is_valid() {
                    // Clients resolve slot collisions before sending; a
                    // colliding pair here is accepted but worth flagging.
                    warn!(
                        send = %settings.send,
                        newline = %settings.newline,
                        "send and newline slots collide"
                    );
                }
                debug!(send = %settings.send, newline = %settings.newline, "Setting settings via MRPC");

                {
                    *self.settings.lock() = settings;
                }
                if let Err(e) = self.store.set(&settings).await {
                    // The change still applies for this session; contexts
                    // are updated from the broadcast below.
                    warn!("Failed to persist settings: {}", e);
                }

                self.broadcast_event(MsgToContext::SettingsUpdated { settings })
                    .await;

                Ok(Value::Boolean(true))
            }

            Some(Method::Status) => {
                enc_status(&self.snapshot_status().await).map_err(|e| {
                    Self::typed_err(
                        RpcErrorCode::InvalidType,
                        &[("message", Value::String(e.to_string().into()))],
                    )
                })
            }

            Some(Method::Shutdown) => {
                info!("Shutdown request received");
                // Flip shutdown flag (idempotent)
                self.shutdown.store(true, Ordering::SeqCst);

                // Drop all contexts so no further notifications are attempted
                self.clients.lock().await.clear();

                Ok(Value::Boolean(true))
            }

            None => {
                warn!("Unknown method: {}", method);
                Err(Self::typed_err(
                    RpcErrorCode::MethodNotFound,
                    &[("method", Value::String(method.into()))],
                ))
            }
        }
    }

    async fn handle_notification(
        &self,
        _client: RpcSender,
        method: &str,
        _params: Vec<Value>,
    ) -> StdResult<(), RpcError> {
        trace!("Received notification: {}", method);
        Ok(())
    }
}

/// Encode settings to msgpack binary `Value`.
fn enc_settings(settings: &Settings) -> crate::Result<Value> {
    let bytes = rmp_serde::to_vec_named(settings)?;
    Ok(Value::Binary(bytes))
}

/// Encode a status snapshot to msgpack binary `Value`.
fn enc_status(status: &CoordinatorStatus) -> crate::Result<Value> {
    let bytes = rmp_serde::to_vec_named(status)?;
    Ok(Value::Binary(bytes))
}

/// Decode `set_settings` param from msgpack binary.
fn dec_settings_param(v: &Value) -> StdResult<Settings, RpcError> {
    match v {
        Value::Binary(bytes) => rmp_serde::from_slice::<Settings>(bytes).map_err(|e| {
            CoordinatorService::typed_err(
                RpcErrorCode::InvalidSettings,
                &[("message", Value::String(e.to_string().into()))],
            )
        }),
        _ => Err(CoordinatorService::typed_err(
            RpcErrorCode::InvalidType,
            &[("expected", Value::String("binary msgpack".into()))],
        )),
    }
}
