//! MRPC connection implementation for the settings coordinator

use std::{result::Result as StdResult, sync::Arc};

use async_trait::async_trait;
use mrpc::{Client as MrpcClient, Connection as MrpcConnection, RpcError, RpcSender, Value};
use sendkey_protocol::{
    CoordinatorStatus, MsgToContext, Settings,
    ipc::codec,
    rpc::{Method, Notification},
};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace};

use crate::{Error, Result};

/// Active IPC connection.
///
/// Holds the MRPC client and an unbounded channel that carries
/// coordinator→context notifications: settings updates and a heartbeat for
/// liveness.
pub struct Connection {
    // Drop order matters: `client` must be released before `event_rx` so the
    // MRPC connection closes before we tear down the receive channel.
    // Otherwise in-flight notifications arrive after the receiver disappears,
    // spamming channel errors during normal shutdown.
    event_rx: UnboundedReceiver<MsgToContext>,
    client: MrpcClient<ClientHandler>,
}

impl Connection {
    /// Connect to the coordinator and return a connection handle
    pub async fn connect_unix(socket_path: &str) -> Result<Self> {
        debug!("Connecting to MRPC server at: {}", socket_path);

        // Create event channel for receiving events from the coordinator
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handler = ClientHandler {
            event_tx: Arc::new(event_tx),
        };

        let client = MrpcClient::connect_unix(socket_path, handler)
            .await
            .map_err(|e| Error::Ipc(format!("Failed to connect: {}", e)))?;

        info!("IPC client connected");

        Ok(Self { event_rx, client })
    }

    async fn request(&mut self, method: Method, params: &[Value]) -> Result<Value> {
        self.client
            .send_request(method.as_str(), params)
            .await
            .map_err(|e| Error::Ipc(format!("{} request failed: {}", method.as_str(), e)))
    }

    async fn request_ok(&mut self, method: Method, params: &[Value]) -> Result<()> {
        match self.request(method, params).await? {
            Value::Boolean(true) => Ok(()),
            other => Err(Error::Ipc(format!(
                "Unexpected {} response: {:?}",
                method.as_str(),
                other
            ))),
        }
    }

    async fn request_binary<T: DeserializeOwned>(
        &mut self,
        method: Method,
        params: &[Value],
    ) -> Result<T> {
        match self.request(method, params).await? {
            Value::Binary(bytes) => {
                rmp_serde::from_slice::<T>(&bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            other => Err(Error::Ipc(format!(
                "Unexpected {} response: {:?}",
                method.as_str(),
                other
            ))),
        }
    }

    /// Fetch the coordinator's current settings (typed convenience method).
    pub async fn get_settings(&mut self) -> Result<Settings> {
        debug!("Sending get_settings request");
        self.request_binary(Method::GetSettings, &[]).await
    }

    /// Replace the coordinator's settings; it persists and fans out.
    pub async fn set_settings(&mut self, settings: Settings) -> Result<()> {
        debug!("Sending set_settings request");
        let param = enc_settings(&settings)?;
        self.request_ok(Method::SetSettings, &[param]).await
    }

    /// Retrieve a coordinator status snapshot.
    pub async fn status(&mut self) -> Result<CoordinatorStatus> {
        self.request_binary(Method::Status, &[]).await
    }

    /// Send shutdown request to the coordinator (typed convenience method).
    pub async fn shutdown(&mut self) -> Result<()> {
        debug!("Sending shutdown request");
        self.request_ok(Method::Shutdown, &[]).await
    }

    /// Receive the next event from the coordinator.
    ///
    /// Keep polling this to observe settings updates and heartbeats;
    /// disconnects are detected when the channel closes.
    pub async fn recv_event(&mut self) -> Result<MsgToContext> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| Error::Ipc("Event channel closed".into()))
    }
}

/// Client-side connection handler for receiving events
#[derive(Clone)]
struct ClientHandler {
    event_tx: Arc<UnboundedSender<MsgToContext>>,
}

#[async_trait]
impl MrpcConnection for ClientHandler {
    async fn connected(&self, _client: RpcSender) -> StdResult<(), RpcError> {
        trace!("Client handler connected");
        Ok(())
    }

    async fn handle_request(
        &self,
        _client: RpcSender,
        method: &str,
        _params: Vec<Value>,
    ) -> StdResult<Value, RpcError> {
        // Contexts don't handle requests from the coordinator
        error!("Unexpected request from server: {}", method);
        Err(RpcError::Service(mrpc::ServiceError {
            name: "not_implemented".into(),
            value: Value::String("Client doesn't handle requests".into()),
        }))
    }

    async fn handle_notification(
        &self,
        _client: RpcSender,
        method: &str,
        params: Vec<Value>,
    ) -> StdResult<(), RpcError> {
        trace!("Received notification: {}", method);

        if method == Notification::Notify.as_str() && !params.is_empty() {
            match dec_event(params[0].clone()) {
                Ok(msg) => {
                    if let Err(err) = self.event_tx.send(msg) {
                        if self.event_tx.is_closed() {
                            debug!("Dropping notify: client event receiver already closed");
                        } else {
                            error!("Failed to send event to channel: {}", err);
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to parse event: {}, raw value: {:?}", e, params[0]);
                }
            }
        }

        Ok(())
    }
}

/// Encode `set_settings` params as msgpack binary.
fn enc_settings(settings: &Settings) -> crate::Result<Value> {
    let bytes = rmp_serde::to_vec_named(settings)?;
    Ok(Value::Binary(bytes))
}

/// Decode a context event from a notification param value.
fn dec_event(v: Value) -> crate::Result<MsgToContext> {
    codec::value_to_msg(v).map_err(|e| Error::Serialization(e.to_string()))
}
