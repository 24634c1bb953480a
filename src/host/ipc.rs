//! Compositor IPC socket client.
//!
//! Connects to the compositor's event socket and speaks its newline-delimited
//! JSON protocol: requests carry a serial, replies echo it, and events are
//! pushed interleaved with replies at any time.

use super::{
    GrabHandle, Host, HostError, HostEvent, OutputEventKind, OutputId, SubscriptionId,
    ViewEventKind, ViewId,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::env;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, trace, warn};

/// Environment variable holding the compositor socket path.
const COMPOSITOR_SOCKET_ENV: &str = "COMPOSITOR_SOCKET";

/// Requests understood by the compositor, tagged by name on the wire.
#[derive(Debug, Serialize)]
#[serde(tag = "request", rename_all = "kebab-case")]
enum Request<'a> {
    Outputs,
    Views,
    ViewsOnOutput { output: OutputId },
    ViewAtCursor,
    SubscribeOutput { output: OutputId, kind: OutputEventKind },
    SubscribeView { view: ViewId, kind: ViewEventKind },
    Unsubscribe { subscription: SubscriptionId },
    ClaimInputGrab { output: OutputId },
    ReleaseInputGrab { grab: GrabHandle },
    SetActivated { view: ViewId, activated: bool },
    RequestFocus { view: ViewId },
    CompleteFocusRequest { serial: u64 },
    RunCommand { command: &'a str },
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    serial: u64,
    #[serde(flatten)]
    request: Request<'a>,
}

/// Client for the compositor IPC socket, implementing [`Host`].
pub struct IpcHost {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Events read while waiting for a reply, delivered by `next_event`.
    pending_events: VecDeque<HostEvent>,
    next_serial: u64,
}

/// Discover the compositor socket path from the environment.
pub fn get_socket_path() -> Result<PathBuf, HostError> {
    let socket_path_str =
        env::var(COMPOSITOR_SOCKET_ENV).map_err(|_| HostError::SocketNotSet)?;

    let socket_path = PathBuf::from(&socket_path_str);
    if !socket_path.exists() {
        return Err(HostError::SocketNotFound { path: socket_path });
    }

    Ok(socket_path)
}

impl IpcHost {
    /// Connect to the compositor socket.
    ///
    /// Uses `path` when given, otherwise discovers the socket from
    /// `$COMPOSITOR_SOCKET`.
    pub async fn connect(path: Option<&Path>) -> Result<Self, HostError> {
        let socket_path = match path {
            Some(p) => p.to_path_buf(),
            None => get_socket_path()?,
        };
        info!("Connecting to compositor socket: {}", socket_path.display());

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| HostError::ConnectionFailed {
                path: socket_path.clone(),
                source: e,
            })?;

        info!("Connected to compositor socket");
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            pending_events: VecDeque::new(),
            next_serial: 0,
        })
    }

    /// Get diagnostic information about the compositor environment.
    pub fn get_diagnostics() -> Vec<String> {
        let mut diags = Vec::new();

        match env::var(COMPOSITOR_SOCKET_ENV) {
            Ok(v) => diags.push(format!("{COMPOSITOR_SOCKET_ENV}={v}")),
            Err(_) => diags.push(format!("{COMPOSITOR_SOCKET_ENV}: NOT SET")),
        }

        match get_socket_path() {
            Ok(path) => diags.push(format!("Socket path: {} (exists)", path.display())),
            Err(_) => diags.push("Socket path: NOT FOUND".to_string()),
        }

        diags
    }

    /// Read one JSON message off the socket.
    async fn read_message(&mut self) -> Result<Value, HostError> {
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line).await {
                Ok(0) => return Err(HostError::ConnectionClosed),
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trace!("Received line: {}", trimmed);
                    return serde_json::from_str(trimmed).map_err(HostError::DeserializeFailed);
                }
                Err(e) => return Err(HostError::ReceiveFailed(e)),
            }
        }
    }

    /// Queue a pushed event, dropping lines that do not parse.
    fn queue_event(&mut self, value: Value) {
        match serde_json::from_value::<HostEvent>(value) {
            Ok(event) => self.pending_events.push_back(event),
            Err(e) => warn!("Dropping unparseable host event: {}", e),
        }
    }

    /// Send one request and wait for its reply, queueing any events that
    /// arrive in between.
    async fn request<T: DeserializeOwned>(&mut self, request: Request<'_>) -> Result<T, HostError> {
        self.next_serial += 1;
        let serial = self.next_serial;

        let mut line = serde_json::to_string(&Envelope { serial, request })
            .map_err(HostError::SerializeFailed)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(HostError::SendFailed)?;

        loop {
            let value = self.read_message().await?;
            let Some(reply_serial) = value.get("reply").and_then(Value::as_u64) else {
                self.queue_event(value);
                continue;
            };

            if reply_serial != serial {
                debug!("Skipping stale reply with serial {}", reply_serial);
                continue;
            }

            if let Some(message) = value.get("error").and_then(Value::as_str) {
                return Err(HostError::Rejected {
                    message: message.to_string(),
                });
            }

            let ok = value.get("ok").cloned().unwrap_or(Value::Null);
            return serde_json::from_value(ok).map_err(HostError::DeserializeFailed);
        }
    }
}

#[async_trait]
impl Host for IpcHost {
    async fn next_event(&mut self) -> Result<HostEvent, HostError> {
        loop {
            if let Some(event) = self.pending_events.pop_front() {
                return Ok(event);
            }

            let value = self.read_message().await?;
            if value.get("reply").is_some() {
                debug!("Skipping unsolicited reply");
                continue;
            }
            self.queue_event(value);
        }
    }

    async fn outputs(&mut self) -> Result<Vec<OutputId>, HostError> {
        self.request(Request::Outputs).await
    }

    async fn views(&mut self) -> Result<Vec<ViewId>, HostError> {
        self.request(Request::Views).await
    }

    async fn views_on_output(&mut self, output: OutputId) -> Result<Vec<ViewId>, HostError> {
        self.request(Request::ViewsOnOutput { output }).await
    }

    async fn view_at_cursor(&mut self) -> Result<Option<ViewId>, HostError> {
        self.request(Request::ViewAtCursor).await
    }

    async fn subscribe_output(
        &mut self,
        output: OutputId,
        kind: OutputEventKind,
    ) -> Result<SubscriptionId, HostError> {
        self.request(Request::SubscribeOutput { output, kind }).await
    }

    async fn subscribe_view(
        &mut self,
        view: ViewId,
        kind: ViewEventKind,
    ) -> Result<SubscriptionId, HostError> {
        self.request(Request::SubscribeView { view, kind }).await
    }

    async fn unsubscribe(&mut self, subscription: SubscriptionId) -> Result<(), HostError> {
        self.request(Request::Unsubscribe { subscription }).await
    }

    async fn claim_input_grab(&mut self, output: OutputId) -> Result<GrabHandle, HostError> {
        self.request(Request::ClaimInputGrab { output }).await
    }

    async fn release_input_grab(&mut self, grab: GrabHandle) -> Result<(), HostError> {
        self.request(Request::ReleaseInputGrab { grab }).await
    }

    async fn set_activated(&mut self, view: ViewId, activated: bool) -> Result<(), HostError> {
        self.request(Request::SetActivated { view, activated }).await
    }

    async fn request_focus(&mut self, view: ViewId) -> Result<(), HostError> {
        self.request(Request::RequestFocus { view }).await
    }

    async fn complete_focus_request(&mut self, serial: u64) -> Result<(), HostError> {
        self.request(Request::CompleteFocusRequest { serial }).await
    }

    async fn run_command(&mut self, command: &str) -> Result<(), HostError> {
        self.request(Request::RunCommand { command }).await
    }
}
