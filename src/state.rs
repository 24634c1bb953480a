//! Process-wide state derived from signal history.
//!
//! Holds the currently focused view, the runtime-toggleable geometry-signal
//! flag, and the startup-notify command read once at init. The bridge is the
//! only writer; the D-Bus query interface reads through [`SharedState`].

use crate::config::Config;
use crate::host::{SettingValue, ViewId, ViewRole};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Setting key toggling geometry-change publication.
pub const SETTING_GEOMETRY_SIGNAL: &str = "geometry-signal";

/// Setting key for the view-under-cursor resolution on pointer release.
pub const SETTING_FIND_VIEW_UNDER_CURSOR: &str = "find-view-under-cursor";

/// Setting key for the startup command. Read once at init; runtime changes
/// are acknowledged but have no effect.
pub const SETTING_STARTUP_NOTIFY: &str = "startup-notify";

/// Mutable state derived from signal history.
#[derive(Debug)]
pub struct DerivedState {
    /// Last view for which a focus change was accepted.
    focused_view: Option<ViewId>,

    /// Whether geometry-change events are published.
    geometry_signal: bool,

    /// Whether pointer releases resolve the view under the cursor.
    find_view_under_cursor: bool,

    /// Startup command, read once at init.
    startup_notify: String,
}

impl DerivedState {
    /// Initialize the store from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            focused_view: None,
            geometry_signal: config.geometry_signal,
            find_view_under_cursor: config.find_view_under_cursor,
            startup_notify: config.startup_notify.clone(),
        }
    }

    pub fn geometry_signal(&self) -> bool {
        self.geometry_signal
    }

    pub fn find_view_under_cursor(&self) -> bool {
        self.find_view_under_cursor
    }

    pub fn focused_view(&self) -> Option<ViewId> {
        self.focused_view
    }

    /// Focused view id for bus queries, 0 when nothing is focused.
    pub fn focused_view_id(&self) -> u32 {
        self.focused_view.map_or(0, ViewId::get)
    }

    pub fn startup_notify(&self) -> &str {
        &self.startup_notify
    }

    /// Accept a focus-change candidate.
    ///
    /// Updates and returns true only if the candidate differs from the
    /// current focus, is a toplevel application window, and is activated.
    /// This triple condition is the sole gate for `view_focus_changed`.
    pub fn try_update_focus(&mut self, view: ViewId, role: ViewRole, activated: bool) -> bool {
        if self.focused_view == Some(view) {
            debug!("Focus unchanged for {}", view);
            return false;
        }
        if !role.is_toplevel() {
            debug!("Focus candidate {} is not a toplevel", view);
            return false;
        }
        if !activated {
            debug!("Focus candidate {} is not activated", view);
            return false;
        }

        self.focused_view = Some(view);
        true
    }

    /// Forget the focused view if it matches, e.g. when it closes.
    pub fn clear_focus_if(&mut self, view: ViewId) {
        if self.focused_view == Some(view) {
            self.focused_view = None;
        }
    }

    /// Apply a changed setting delivered by the configuration watcher.
    ///
    /// Unrecognized keys or mismatched value types produce a diagnostic and
    /// are otherwise ignored; returns whether the change took effect.
    pub fn apply_setting(&mut self, key: &str, value: &SettingValue) -> bool {
        match (key, value) {
            (SETTING_GEOMETRY_SIGNAL, SettingValue::Bool(enabled)) => {
                debug!("geometry-signal set to {}", enabled);
                self.geometry_signal = *enabled;
                true
            }
            (SETTING_FIND_VIEW_UNDER_CURSOR, SettingValue::Bool(enabled)) => {
                debug!("find-view-under-cursor set to {}", enabled);
                self.find_view_under_cursor = *enabled;
                true
            }
            (SETTING_STARTUP_NOTIFY, SettingValue::Str(_)) => {
                // Read once at init; a runtime change applies on next start.
                debug!("startup-notify changed, takes effect on restart");
                false
            }
            (key, value) => {
                warn!("No such setting {} (value {:?})", key, value);
                false
            }
        }
    }
}

/// Shared handle to the derived state.
///
/// Everything runs on the single event-processing context, but the D-Bus
/// query interface answers method calls from the bus executor, so reads go
/// through a mutex. The bridge never holds the guard across an await.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<DerivedState>>);

impl SharedState {
    pub fn new(state: DerivedState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state. Poisoning cannot corrupt this data, so recover the
    /// inner value instead of propagating the poison.
    pub fn lock(&self) -> MutexGuard<'_, DerivedState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
