//! Compositor host boundary.
//!
//! This module defines the types and the `Host` trait through which the
//! bridge observes the compositor: stable output/view ids, typed event
//! payloads, subscription handles, and the small set of queries and
//! commands the bridge issues back to the host.

pub mod ipc;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
pub use ipc::IpcHost;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All four tiling edges set (top, bottom, left, right).
pub const TILED_EDGES_ALL: u32 = 0b1111;

/// Stable id of a compositor output for the lifetime of the process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl OutputId {
    /// Get the raw id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output-{}", self.0)
    }
}

/// Stable id of a compositor view for the lifetime of the process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub u32);

impl ViewId {
    /// Get the raw id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// Classification of a view as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewRole {
    /// Ordinary application window.
    Toplevel,
    /// Panels, docks, backgrounds and other shell surfaces.
    DesktopEnvironment,
    /// Override-redirect style surfaces not managed by the compositor.
    Unmanaged,
    /// Unmapped or not yet classified.
    #[default]
    Unknown,
}

impl ViewRole {
    /// Wire code published on the bus.
    pub fn code(self) -> u32 {
        match self {
            Self::Toplevel => 1,
            Self::DesktopEnvironment => 2,
            Self::Unmanaged => 3,
            Self::Unknown => 0,
        }
    }

    /// Whether this role is an ordinary application window.
    pub fn is_toplevel(self) -> bool {
        self == Self::Toplevel
    }
}

/// View geometry in output-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Opaque handle for one active (source, event-kind) subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

/// Opaque handle for a claimed per-output input-grab capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrabHandle(pub u64);

/// Output-level event kinds an output gets subscribed to when tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputEventKind {
    ViewMapped,
    ViewFocused,
    ViewMinimizeRequest,
    ViewTileRequest,
    ViewMoveRequest,
    ViewResizeRequest,
    ViewChangeWorkspace,
    WorkspaceChanged,
    ViewLayerAttached,
    ViewLayerDetached,
    ViewFullscreenRequest,
    WmActionsAboveChanged,
    ConfigurationChanged,
}

/// The fixed subscription list for a tracked output.
pub const OUTPUT_EVENT_KINDS: &[OutputEventKind] = &[
    OutputEventKind::ViewMapped,
    OutputEventKind::ViewFocused,
    OutputEventKind::ViewMinimizeRequest,
    OutputEventKind::ViewTileRequest,
    OutputEventKind::ViewMoveRequest,
    OutputEventKind::ViewResizeRequest,
    OutputEventKind::ViewChangeWorkspace,
    OutputEventKind::WorkspaceChanged,
    OutputEventKind::ViewLayerAttached,
    OutputEventKind::ViewLayerDetached,
    OutputEventKind::ViewFullscreenRequest,
    OutputEventKind::WmActionsAboveChanged,
    OutputEventKind::ConfigurationChanged,
];

/// View-level event kinds a view gets subscribed to when tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewEventKind {
    AppIdChanged,
    TitleChanged,
    GeometryChanged,
    Unmapped,
    Tiled,
    PingTimeout,
}

/// The fixed subscription list for a tracked view.
pub const VIEW_EVENT_KINDS: &[ViewEventKind] = &[
    ViewEventKind::AppIdChanged,
    ViewEventKind::TitleChanged,
    ViewEventKind::GeometryChanged,
    ViewEventKind::Unmapped,
    ViewEventKind::Tiled,
    ViewEventKind::PingTimeout,
];

/// Value of a changed setting delivered by the configuration watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Str(String),
}

/// One event pushed by the host.
///
/// Payloads carry the scalar fields the translator needs (ids, coordinates,
/// booleans, role codes) so translation stays free of host round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    OutputAdded {
        output: OutputId,
    },
    OutputRemoved {
        output: OutputId,
    },
    OutputConfigurationChanged {
        output: OutputId,
    },
    OutputWorkspaceChanged {
        output: OutputId,
        horizontal: i32,
        vertical: i32,
    },
    ViewMapped {
        view: ViewId,
        output: OutputId,
    },
    ViewUnmapped {
        view: ViewId,
    },
    ViewAppIdChanged {
        view: ViewId,
        app_id: String,
    },
    ViewTitleChanged {
        view: ViewId,
        role: ViewRole,
        title: String,
    },
    ViewGeometryChanged {
        view: ViewId,
        geometry: Geometry,
    },
    ViewTiled {
        view: ViewId,
        role: ViewRole,
        edges: u32,
    },
    ViewPingTimeout {
        view: ViewId,
    },
    ViewRoleChanged {
        view: ViewId,
        role: ViewRole,
    },
    ViewWorkspaceChanged {
        view: ViewId,
        role: ViewRole,
    },
    ViewMoveRequest {
        view: ViewId,
        role: ViewRole,
    },
    ViewResizeRequest {
        view: ViewId,
        role: ViewRole,
    },
    ViewMinimizeRequest {
        view: ViewId,
        role: ViewRole,
        minimized: bool,
    },
    ViewTileRequest {
        view: ViewId,
        role: ViewRole,
        edges: u32,
    },
    ViewFullscreenChanged {
        view: ViewId,
        fullscreen: bool,
    },
    ViewFocused {
        view: ViewId,
        role: ViewRole,
        activated: bool,
    },
    ViewKeepAboveChanged {
        view: ViewId,
        role: ViewRole,
        above: bool,
    },
    ViewHintsChanged {
        view: ViewId,
        role: ViewRole,
        demands_attention: bool,
    },
    ViewOutputMoveRequested {
        view: ViewId,
        old_output: OutputId,
        new_output: OutputId,
    },
    ViewOutputMoved {
        view: ViewId,
        role: ViewRole,
        old_output: OutputId,
        new_output: OutputId,
    },
    /// Command-intent event: a view asks to be focused. Not observational;
    /// handled by mutating host state, never republished.
    ViewFocusRequest {
        view: ViewId,
        role: ViewRole,
        serial: u64,
        self_request: bool,
        carried_out: bool,
    },
    PointerButton {
        x: f64,
        y: f64,
        button: u32,
        released: bool,
    },
    TabletButton,
    SettingChanged {
        key: String,
        value: SettingValue,
    },
}

/// Errors from the host connection.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("COMPOSITOR_SOCKET environment variable not set - is the compositor running?")]
    SocketNotSet,

    #[error("compositor socket not found at {path}")]
    SocketNotFound { path: std::path::PathBuf },

    #[error("failed to connect to compositor socket at {path}: {source}")]
    ConnectionFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send request to compositor: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("failed to receive from compositor: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("failed to serialize request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("failed to deserialize message: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    #[error("compositor returned error: {message}")]
    Rejected { message: String },

    #[error("connection to compositor closed unexpectedly")]
    ConnectionClosed,
}

/// Connection to the compositor host.
///
/// All methods run on the single event-processing context; the bridge never
/// issues two calls concurrently.
#[async_trait]
pub trait Host: Send {
    /// Wait for the next pushed event.
    async fn next_event(&mut self) -> Result<HostEvent, HostError>;

    /// Enumerate all currently-live outputs.
    async fn outputs(&mut self) -> Result<Vec<OutputId>, HostError>;

    /// Enumerate all currently-live views.
    async fn views(&mut self) -> Result<Vec<ViewId>, HostError>;

    /// Enumerate the views currently belonging to an output.
    async fn views_on_output(&mut self, output: OutputId) -> Result<Vec<ViewId>, HostError>;

    /// The view under the cursor right now, if any.
    async fn view_at_cursor(&mut self) -> Result<Option<ViewId>, HostError>;

    /// Subscribe an output to one event kind.
    async fn subscribe_output(
        &mut self,
        output: OutputId,
        kind: OutputEventKind,
    ) -> Result<SubscriptionId, HostError>;

    /// Subscribe a view to one event kind.
    async fn subscribe_view(
        &mut self,
        view: ViewId,
        kind: ViewEventKind,
    ) -> Result<SubscriptionId, HostError>;

    /// Tear down one subscription.
    async fn unsubscribe(&mut self, subscription: SubscriptionId) -> Result<(), HostError>;

    /// Claim the per-output input-grab capability.
    async fn claim_input_grab(&mut self, output: OutputId) -> Result<GrabHandle, HostError>;

    /// Release a previously claimed input-grab capability.
    async fn release_input_grab(&mut self, grab: GrabHandle) -> Result<(), HostError>;

    /// Mark a view activated or deactivated.
    async fn set_activated(&mut self, view: ViewId, activated: bool) -> Result<(), HostError>;

    /// Ask the host to grant keyboard focus to a view.
    async fn request_focus(&mut self, view: ViewId) -> Result<(), HostError>;

    /// Mark a focus request as carried out so no other handler reprocesses it.
    async fn complete_focus_request(&mut self, serial: u64) -> Result<(), HostError>;

    /// Ask the host to run a shell command (startup hook only).
    async fn run_command(&mut self, command: &str) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes() {
        assert_eq!(ViewRole::Toplevel.code(), 1);
        assert_eq!(ViewRole::DesktopEnvironment.code(), 2);
        assert_eq!(ViewRole::Unmanaged.code(), 3);
        assert_eq!(ViewRole::Unknown.code(), 0);
        assert!(ViewRole::Toplevel.is_toplevel());
        assert!(!ViewRole::Unmanaged.is_toplevel());
    }

    #[test]
    fn test_event_kind_lists_are_complete() {
        assert_eq!(OUTPUT_EVENT_KINDS.len(), 13);
        assert_eq!(VIEW_EVENT_KINDS.len(), 6);
    }

    #[test]
    fn test_event_wire_format() {
        let line = r#"{"event":"view-focused","view":7,"role":"toplevel","activated":true}"#;
        let event: HostEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event,
            HostEvent::ViewFocused {
                view: ViewId(7),
                role: ViewRole::Toplevel,
                activated: true,
            }
        );
    }

    #[test]
    fn test_setting_value_wire_format() {
        let line = r#"{"event":"setting-changed","key":"geometry-signal","value":true}"#;
        let event: HostEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            event,
            HostEvent::SettingChanged {
                key: "geometry-signal".to_string(),
                value: SettingValue::Bool(true),
            }
        );
    }
}
