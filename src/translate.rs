//! Event translation: internal event to (topic, argument tuple) or suppressed.
//!
//! One mapping per event kind. Title, tiling, workspace, move, resize,
//! output-move, focus and the marker-derived events only fire for toplevel
//! views; geometry changes are additionally gated by the runtime toggle.
//! Side-effect free except for the focus update through [`DerivedState`].

use crate::bus::{BusSignal, SignalBody, topic};
use crate::host::{Geometry, OutputId, TILED_EDGES_ALL, ViewId, ViewRole};
use crate::state::DerivedState;

pub fn view_added(view: ViewId) -> BusSignal {
    BusSignal::new(topic::VIEW_ADDED, SignalBody::Id(view.get()))
}

pub fn view_closed(view: ViewId) -> BusSignal {
    BusSignal::new(topic::VIEW_CLOSED, SignalBody::Id(view.get()))
}

pub fn view_timeout(view: ViewId) -> BusSignal {
    BusSignal::new(topic::VIEW_TIMEOUT, SignalBody::Id(view.get()))
}

pub fn app_id_changed(view: ViewId, app_id: String) -> BusSignal {
    BusSignal::new(topic::VIEW_APP_ID_CHANGED, SignalBody::IdStr(view.get(), app_id))
}

pub fn title_changed(view: ViewId, role: ViewRole, title: String) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(topic::VIEW_TITLE_CHANGED, SignalBody::IdStr(view.get(), title))
    })
}

/// Gated solely by the geometry-signal toggle.
pub fn geometry_changed(
    state: &DerivedState,
    view: ViewId,
    geometry: Geometry,
) -> Option<BusSignal> {
    state.geometry_signal().then(|| {
        BusSignal::new(
            topic::VIEW_GEOMETRY_CHANGED,
            SignalBody::IdRect(view.get(), geometry.x, geometry.y, geometry.width, geometry.height),
        )
    })
}

pub fn tiling_changed(view: ViewId, role: ViewRole, edges: u32) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(topic::VIEW_TILING_CHANGED, SignalBody::IdFlags(view.get(), edges))
    })
}

/// A tile request with all four edges set means maximized.
pub fn maximized_changed(view: ViewId, role: ViewRole, edges: u32) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(
            topic::VIEW_MAXIMIZED_CHANGED,
            SignalBody::IdBool(view.get(), edges == TILED_EDGES_ALL),
        )
    })
}

pub fn minimized_changed(view: ViewId, role: ViewRole, minimized: bool) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(topic::VIEW_MINIMIZED_CHANGED, SignalBody::IdBool(view.get(), minimized))
    })
}

pub fn fullscreen_changed(view: ViewId, fullscreen: bool) -> BusSignal {
    BusSignal::new(topic::VIEW_FULLSCREEN_CHANGED, SignalBody::IdBool(view.get(), fullscreen))
}

pub fn role_changed(view: ViewId, role: ViewRole) -> BusSignal {
    BusSignal::new(topic::VIEW_ROLE_CHANGED, SignalBody::IdFlags(view.get(), role.code()))
}

pub fn workspaces_changed(view: ViewId, role: ViewRole) -> Option<BusSignal> {
    role.is_toplevel()
        .then(|| BusSignal::new(topic::VIEW_WORKSPACES_CHANGED, SignalBody::Id(view.get())))
}

pub fn moving_changed(view: ViewId, role: ViewRole) -> Option<BusSignal> {
    role.is_toplevel()
        .then(|| BusSignal::new(topic::VIEW_MOVING_CHANGED, SignalBody::Id(view.get())))
}

pub fn resizing_changed(view: ViewId, role: ViewRole) -> Option<BusSignal> {
    role.is_toplevel()
        .then(|| BusSignal::new(topic::VIEW_RESIZING_CHANGED, SignalBody::Id(view.get())))
}

pub fn keep_above_changed(view: ViewId, role: ViewRole, above: bool) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(topic::VIEW_KEEP_ABOVE_CHANGED, SignalBody::IdBool(view.get(), above))
    })
}

pub fn output_moved(
    view: ViewId,
    role: ViewRole,
    old_output: OutputId,
    new_output: OutputId,
) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(
            topic::VIEW_OUTPUT_MOVED,
            SignalBody::IdOutputs(view.get(), old_output.get(), new_output.get()),
        )
    })
}

/// The pre-move notification carries no role filter.
pub fn output_move_requested(
    view: ViewId,
    old_output: OutputId,
    new_output: OutputId,
) -> BusSignal {
    BusSignal::new(
        topic::VIEW_OUTPUT_MOVE_REQUESTED,
        SignalBody::IdOutputs(view.get(), old_output.get(), new_output.get()),
    )
}

/// Wants-attention is derived purely from the marker's presence.
pub fn attention_changed(
    view: ViewId,
    role: ViewRole,
    demands_attention: bool,
) -> Option<BusSignal> {
    role.is_toplevel().then(|| {
        BusSignal::new(
            topic::VIEW_ATTENTION_CHANGED,
            SignalBody::IdBool(view.get(), demands_attention),
        )
    })
}

/// Accepted only when the derived state's focus gate passes; this is where
/// duplicate focus notifications are deduplicated.
pub fn focus_changed(
    state: &mut DerivedState,
    view: ViewId,
    role: ViewRole,
    activated: bool,
) -> Option<BusSignal> {
    state
        .try_update_focus(view, role, activated)
        .then(|| BusSignal::new(topic::VIEW_FOCUS_CHANGED, SignalBody::Id(view.get())))
}

pub fn pointer_clicked(x: f64, y: f64, button: u32, released: bool) -> BusSignal {
    BusSignal::new(topic::POINTER_CLICKED, SignalBody::Pointer(x, y, button, released))
}

/// Published with id 0 when no view is under the cursor.
pub fn view_pressed(view: Option<ViewId>) -> BusSignal {
    BusSignal::new(topic::VIEW_PRESSED, SignalBody::Id(view.map_or(0, ViewId::get)))
}

pub fn tablet_touched() -> BusSignal {
    BusSignal::new(topic::TABLET_TOUCHED, SignalBody::Empty)
}

pub fn output_configuration_changed() -> BusSignal {
    BusSignal::new(topic::OUTPUT_CONFIGURATION_CHANGED, SignalBody::Empty)
}

pub fn output_workspace_changed(output: OutputId, horizontal: i32, vertical: i32) -> BusSignal {
    BusSignal::new(
        topic::OUTPUT_WORKSPACE_CHANGED,
        SignalBody::Workspace(output.get(), horizontal, vertical),
    )
}

pub fn output_added(output: OutputId) -> BusSignal {
    BusSignal::new(topic::OUTPUT_ADDED, SignalBody::Id(output.get()))
}

pub fn output_removed(output: OutputId) -> BusSignal {
    BusSignal::new(topic::OUTPUT_REMOVED, SignalBody::Id(output.get()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::SettingValue;
    use crate::state::SETTING_GEOMETRY_SIGNAL;

    fn state() -> DerivedState {
        DerivedState::from_config(&Config::default())
    }

    #[test]
    fn test_role_filter_suppresses_unmanaged() {
        let view = ViewId(3);
        let role = ViewRole::Unmanaged;
        assert!(title_changed(view, role, "t".into()).is_none());
        assert!(tiling_changed(view, role, 0).is_none());
        assert!(workspaces_changed(view, role).is_none());
        assert!(moving_changed(view, role).is_none());
        assert!(resizing_changed(view, role).is_none());
        assert!(output_moved(view, role, OutputId(1), OutputId(2)).is_none());
        assert!(maximized_changed(view, role, TILED_EDGES_ALL).is_none());
        assert!(minimized_changed(view, role, true).is_none());
        assert!(keep_above_changed(view, role, true).is_none());
        assert!(attention_changed(view, role, true).is_none());

        let mut state = state();
        assert!(focus_changed(&mut state, view, role, true).is_none());
    }

    #[test]
    fn test_toplevel_events_pass() {
        let view = ViewId(3);
        let role = ViewRole::Toplevel;
        assert_eq!(
            title_changed(view, role, "editor".into()),
            Some(BusSignal::new(
                topic::VIEW_TITLE_CHANGED,
                SignalBody::IdStr(3, "editor".into())
            ))
        );
        assert_eq!(
            output_moved(view, role, OutputId(1), OutputId(2)),
            Some(BusSignal::new(
                topic::VIEW_OUTPUT_MOVED,
                SignalBody::IdOutputs(3, 1, 2)
            ))
        );
    }

    #[test]
    fn test_unfiltered_events() {
        // app-id, fullscreen, role and the pre-move notification carry no
        // role filter
        assert_eq!(
            app_id_changed(ViewId(4), "org.app".into()).body,
            SignalBody::IdStr(4, "org.app".into())
        );
        assert_eq!(
            fullscreen_changed(ViewId(4), true).body,
            SignalBody::IdBool(4, true)
        );
        assert_eq!(
            role_changed(ViewId(4), ViewRole::Unmanaged).body,
            SignalBody::IdFlags(4, 3)
        );
        assert_eq!(
            output_move_requested(ViewId(4), OutputId(1), OutputId(2)).body,
            SignalBody::IdOutputs(4, 1, 2)
        );
    }

    #[test]
    fn test_geometry_gate() {
        let geometry = Geometry {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        };
        let mut state = state();
        assert!(geometry_changed(&state, ViewId(5), geometry).is_none());

        // Toggling the setting on mid-run enables subsequent events
        state.apply_setting(SETTING_GEOMETRY_SIGNAL, &SettingValue::Bool(true));
        assert_eq!(
            geometry_changed(&state, ViewId(5), geometry),
            Some(BusSignal::new(
                topic::VIEW_GEOMETRY_CHANGED,
                SignalBody::IdRect(5, 0, 0, 800, 600)
            ))
        );
    }

    #[test]
    fn test_focus_dedup_emits_once() {
        let mut state = state();
        assert!(focus_changed(&mut state, ViewId(7), ViewRole::Toplevel, true).is_some());
        assert!(focus_changed(&mut state, ViewId(7), ViewRole::Toplevel, true).is_none());
        assert!(focus_changed(&mut state, ViewId(8), ViewRole::Toplevel, true).is_some());
    }

    #[test]
    fn test_maximized_derivation() {
        let signal = maximized_changed(ViewId(2), ViewRole::Toplevel, TILED_EDGES_ALL).unwrap();
        assert_eq!(signal.body, SignalBody::IdBool(2, true));

        let signal = maximized_changed(ViewId(2), ViewRole::Toplevel, 0b0011).unwrap();
        assert_eq!(signal.body, SignalBody::IdBool(2, false));
    }

    #[test]
    fn test_view_pressed_defaults_to_zero() {
        assert_eq!(view_pressed(Some(ViewId(42))).body, SignalBody::Id(42));
        assert_eq!(view_pressed(None).body, SignalBody::Id(0));
    }

    #[test]
    fn test_output_signals() {
        assert_eq!(output_configuration_changed().body, SignalBody::Empty);
        assert_eq!(
            output_workspace_changed(OutputId(1), 2, 0).body,
            SignalBody::Workspace(1, 2, 0)
        );
        assert_eq!(output_added(OutputId(9)).body, SignalBody::Id(9));
        assert_eq!(output_removed(OutputId(9)).body, SignalBody::Id(9));
        assert_eq!(tablet_touched().body, SignalBody::Empty);
    }
}
