//! Bus publisher boundary.
//!
//! The core builds an immutable [`BusSignal`] and transfers it to a
//! [`Publisher`] exactly once; `emit` consumes the value, so the core cannot
//! touch a message after handing it across the boundary.

pub mod dbus;

use async_trait::async_trait;
pub use dbus::DbusPublisher;
use thiserror::Error;

/// Topic names of every published signal.
pub mod topic {
    pub const VIEW_PRESSED: &str = "view_pressed";
    pub const POINTER_CLICKED: &str = "pointer_clicked";
    pub const TABLET_TOUCHED: &str = "tablet_touched";
    pub const VIEW_ADDED: &str = "view_added";
    pub const VIEW_CLOSED: &str = "view_closed";
    pub const VIEW_TIMEOUT: &str = "view_timeout";
    pub const VIEW_APP_ID_CHANGED: &str = "view_app_id_changed";
    pub const VIEW_TITLE_CHANGED: &str = "view_title_changed";
    pub const VIEW_FULLSCREEN_CHANGED: &str = "view_fullscreen_changed";
    pub const VIEW_GEOMETRY_CHANGED: &str = "view_geometry_changed";
    pub const VIEW_TILING_CHANGED: &str = "view_tiling_changed";
    pub const VIEW_OUTPUT_MOVED: &str = "view_output_moved";
    pub const VIEW_OUTPUT_MOVE_REQUESTED: &str = "view_output_move_requested";
    pub const VIEW_ROLE_CHANGED: &str = "view_role_changed";
    pub const VIEW_WORKSPACES_CHANGED: &str = "view_workspaces_changed";
    pub const VIEW_MOVING_CHANGED: &str = "view_moving_changed";
    pub const VIEW_RESIZING_CHANGED: &str = "view_resizing_changed";
    pub const VIEW_MAXIMIZED_CHANGED: &str = "view_maximized_changed";
    pub const VIEW_MINIMIZED_CHANGED: &str = "view_minimized_changed";
    pub const VIEW_KEEP_ABOVE_CHANGED: &str = "view_keep_above_changed";
    pub const VIEW_FOCUS_CHANGED: &str = "view_focus_changed";
    pub const VIEW_ATTENTION_CHANGED: &str = "view_attention_changed";
    pub const OUTPUT_CONFIGURATION_CHANGED: &str = "output_configuration_changed";
    pub const OUTPUT_WORKSPACE_CHANGED: &str = "output_workspace_changed";
    pub const OUTPUT_ADDED: &str = "output_added";
    pub const OUTPUT_REMOVED: &str = "output_removed";
}

/// Ordered argument tuple of an outbound signal.
///
/// One variant per argument shape in the published catalogue; the D-Bus
/// adapter maps each to the matching typed tuple body.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalBody {
    /// No arguments.
    Empty,
    /// (uint id)
    Id(u32),
    /// (uint id, string)
    IdStr(u32, String),
    /// (uint id, bool)
    IdBool(u32, bool),
    /// (uint id, uint), e.g. tiling edges or role code.
    IdFlags(u32, u32),
    /// (uint id, uint old_output, uint new_output)
    IdOutputs(u32, u32, u32),
    /// (uint id, int x, int y, int w, int h)
    IdRect(u32, i32, i32, i32, i32),
    /// (double x, double y, uint button, bool released)
    Pointer(f64, f64, u32, bool),
    /// (uint output_id, int horiz, int vert)
    Workspace(u32, i32, i32),
}

/// An outbound message: topic plus ordered argument tuple.
///
/// Immutable once constructed; ownership moves into [`Publisher::emit`].
#[derive(Debug, Clone, PartialEq)]
pub struct BusSignal {
    pub topic: &'static str,
    pub body: SignalBody,
}

impl BusSignal {
    pub fn new(topic: &'static str, body: SignalBody) -> Self {
        Self { topic, body }
    }
}

/// Errors from the bus backend.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to claim bus name {name}: {source}")]
    AcquireFailed {
        name: String,
        #[source]
        source: zbus::Error,
    },

    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),
}

/// Delivery boundary for outbound signals.
#[async_trait]
pub trait Publisher: Send {
    /// Fire-and-forget publish; the signal is consumed by the call.
    async fn emit(&mut self, signal: BusSignal) -> Result<(), PublishError>;

    /// Release backend-owned bus state at shutdown.
    async fn unload(&mut self) -> Result<(), PublishError>;
}

/// Publisher that records every emitted signal, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub sent: Vec<BusSignal>,
    pub unloaded: bool,
}

#[cfg(test)]
impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.sent.iter().map(|s| s.topic).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Publisher for RecordingPublisher {
    async fn emit(&mut self, signal: BusSignal) -> Result<(), PublishError> {
        self.sent.push(signal);
        Ok(())
    }

    async fn unload(&mut self) -> Result<(), PublishError> {
        self.unloaded = true;
        Ok(())
    }
}
